use std::path::{Path, PathBuf};

use kiln_build::context_files;
use kiln_core::{CONFIG_FILE, Entrypoint, KilnConfig};
use kiln_engine::{CheckResult, DockerClient};

pub async fn doctor(context: &Path) -> anyhow::Result<()> {
    let config_path = context.join(CONFIG_FILE);
    let (config, config_check) = match super::load_recipe(context) {
        Ok((config, _)) if config_path.exists() => (config, CheckResult::ok("Found")),
        Ok((config, _)) => (config, CheckResult::ok("Not found (using defaults)")),
        Err(e) => {
            tracing::debug!(error = %e, "config check failed");
            (KilnConfig::default(), CheckResult::fail(&format!("{e:#}")))
        }
    };

    let client = DockerClient::new();
    let mut report = client.doctor(&config.image.base).await;
    report.config_file = config_check;

    match context_files(context, &config.context) {
        Ok(files) => {
            report.manifest = manifest_check(&files, &config.dependencies.manifest);
            report.entrypoint = entrypoint_check(&files, &config);
        }
        Err(e) => {
            report.manifest = CheckResult::fail(&e.to_string());
            report.entrypoint = CheckResult::fail("skipped — build context unreadable");
        }
    }

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed — see above for details");
    }

    Ok(())
}

fn manifest_check(files: &[PathBuf], manifest: &str) -> CheckResult {
    if files.iter().any(|f| f == Path::new(manifest)) {
        CheckResult::ok(manifest)
    } else {
        CheckResult::fail(&format!("{manifest} not found in build context"))
    }
}

/// The entrypoint target must be part of the staged context, not just present
/// on disk, or the image will not contain it.
fn entrypoint_check(files: &[PathBuf], config: &KilnConfig) -> CheckResult {
    let entrypoint = match Entrypoint::from_command(&config.entrypoint.command) {
        Ok(ep) => ep,
        Err(e) => return CheckResult::fail(&e.to_string()),
    };
    let Some(target) = entrypoint.target() else {
        return CheckResult::ok(&entrypoint.to_string());
    };
    if Path::new(target).is_absolute() {
        return CheckResult::ok(&format!("{target} (resolved in image)"));
    }

    if files.iter().any(|f| f == Path::new(target)) {
        CheckResult::ok(target)
    } else {
        CheckResult::fail(&format!("{target} not in build context"))
    }
}
