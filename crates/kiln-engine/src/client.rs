use std::fmt;
use std::path::Path;

use kiln_core::ImageRef;

use crate::docker::DockerError;
use crate::executor::{DockerExecutor, RealExecutor};

/// Docker operations client, parameterized over the executor for testability.
pub struct DockerClient<E: DockerExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Build container lifecycle ──

    /// Create and start a throw-away container from `base` that stays alive
    /// until removed, so provisioning commands can be executed inside it.
    pub async fn start_build_container(&self, base: &ImageRef) -> Result<String, DockerError> {
        let base = base.to_string();
        let id = self
            .executor
            .exec(&args([
                "create",
                "--entrypoint",
                "sleep",
                &base,
                "infinity",
            ]))
            .await?
            .trim()
            .to_owned();

        self.executor.exec(&args(["start", &id])).await?;
        tracing::debug!(container = %id, base = %base, "build container started");
        Ok(id)
    }

    /// Run `command` inside the container, streaming its output.
    pub async fn exec_in(
        &self,
        container: &str,
        workdir: Option<&str>,
        command: &[String],
    ) -> Result<(), DockerError> {
        let mut cmd = args(["exec"]);
        if let Some(dir) = workdir {
            cmd.push("-w".to_owned());
            cmd.push(dir.to_owned());
        }
        cmd.push(container.to_owned());
        cmd.extend(command.iter().cloned());

        self.executor.exec_streaming(&cmd).await
    }

    /// Copy a host path into the container (`docker cp`).
    pub async fn copy_into(
        &self,
        container: &str,
        src: &Path,
        dest: &str,
    ) -> Result<(), DockerError> {
        let src_str = src
            .to_str()
            .ok_or_else(|| DockerError::InvalidPath(src.to_path_buf()))?;
        let target = format!("{container}:{dest}");

        self.executor.exec(&args(["cp", src_str, &target])).await?;
        Ok(())
    }

    /// Snapshot the container as `tag`, applying Dockerfile-style config
    /// changes (`WORKDIR`, `ENV`, `ENTRYPOINT`). Returns the image ID.
    pub async fn commit(
        &self,
        container: &str,
        changes: &[String],
        tag: &ImageRef,
    ) -> Result<String, DockerError> {
        let mut cmd = args(["commit"]);
        for change in changes {
            cmd.push("--change".to_owned());
            cmd.push(change.clone());
        }
        cmd.push(container.to_owned());
        cmd.push(tag.to_string());

        let output = self.executor.exec(&cmd).await?;
        Ok(output.trim().to_owned())
    }

    pub async fn remove_container(&self, container: &str) -> Result<(), DockerError> {
        self.executor.exec(&args(["rm", "-f", container])).await?;
        Ok(())
    }

    // ── Dockerfile build ──

    pub async fn build(
        &self,
        dockerfile: &Path,
        context_dir: &Path,
        tag: &ImageRef,
    ) -> Result<(), DockerError> {
        let dockerfile_str = dockerfile
            .to_str()
            .ok_or_else(|| DockerError::InvalidPath(dockerfile.to_path_buf()))?;
        let context_str = context_dir
            .to_str()
            .ok_or_else(|| DockerError::InvalidPath(context_dir.to_path_buf()))?;
        let tag = tag.to_string();

        self.executor
            .exec_streaming(&args([
                "build",
                "--tag",
                &tag,
                "--file",
                dockerfile_str,
                context_str,
            ]))
            .await
    }

    // ── Run ──

    /// Start a container from `tag` with its registered entrypoint and wait
    /// for it to exit. Returns the container's exit code.
    pub async fn run(&self, tag: &ImageRef) -> Result<i32, DockerError> {
        let tag = tag.to_string();
        self.executor
            .exec_status(&args(["run", "--rm", &tag]))
            .await
    }

    // ── Doctor ──

    /// Run all diagnostic checks without early return.
    /// Returns a report with pass/fail for each check item.
    pub async fn doctor(&self, base: &ImageRef) -> DoctorReport {
        let mut report = DoctorReport::default();

        // 1. docker CLI
        match self
            .executor
            .exec(&args(["version", "--format", "{{.Client.Version}}"]))
            .await
        {
            Ok(v) => report.docker = CheckResult::ok(v.trim()),
            Err(e) => {
                report.docker = CheckResult::fail(&e.to_string());
                report.daemon = CheckResult::fail("skipped — docker CLI unavailable");
                report.base_image = CheckResult::fail("skipped — docker CLI unavailable");
                return report;
            }
        }

        // 2. Daemon reachable
        match self
            .executor
            .exec(&args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(v) if !v.trim().is_empty() => report.daemon = CheckResult::ok(v.trim()),
            _ => {
                report.daemon = CheckResult::fail("docker daemon not reachable");
                report.base_image = CheckResult::fail("skipped — daemon not reachable");
                return report;
            }
        }

        // 3. Base image present locally
        let base_str = base.to_string();
        match self
            .executor
            .exec(&args(["image", "inspect", "--format", "{{.Id}}", &base_str]))
            .await
        {
            Ok(_) => report.base_image = CheckResult::ok(&format!("{base_str} (present)")),
            Err(e) => {
                tracing::debug!(error = %e, image = %base_str, "base image inspect failed");
                report.base_image = CheckResult::fail(&format!(
                    "{base_str} not found locally — pull or build it first"
                ));
            }
        }

        report
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Doctor types ──

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub docker: CheckResult,
    pub daemon: CheckResult,
    pub base_image: CheckResult,
    pub config_file: CheckResult,
    pub manifest: CheckResult,
    pub entrypoint: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.items().iter().all(|(_, r)| r.passed)
    }

    fn items(&self) -> [(&'static str, &CheckResult); 6] {
        [
            ("Docker CLI", &self.docker),
            ("Docker daemon", &self.daemon),
            ("Base image", &self.base_image),
            ("Config file", &self.config_file),
            ("Manifest", &self.manifest),
            ("Entrypoint", &self.entrypoint),
        ]
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kiln doctor")?;
        writeln!(f, "{}", "─".repeat(40))?;
        for (label, result) in self.items() {
            writeln!(f, "{label:<16} {}  {}", result.icon(), result.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}
