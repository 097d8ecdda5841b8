//! The provisioning recipe: an ordered, fail-fast list of image build steps.
//!
//! ```text
//! FROM <base>
//!   1. RefreshIndex        ── package index refresh
//!   2. InstallPackages     ── OS packages (e.g. ffmpeg)
//!   3. Workdir             ── create + switch to /app
//!   4. StageManifest       ── requirements.txt → req.txt
//!   5. InstallDependencies ── pip install --no-cache-dir -r req.txt
//!   6. CopyContext         ── full build context → workdir
//!   7. Entrypoint          ── record `python3 start.sh`
//! ```
//!
//! Steps 1 and 2 are only present when at least one OS package is requested.
//! Every step depends on the filesystem left by its predecessor, so a recipe
//! is executed strictly in order and aborts on the first failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;

use crate::config::{KilnConfig, PackageManager};
use crate::ImageRef;

/// Characters that would change the meaning of a package name once it is
/// placed on a shell `RUN` line.
const SHELL_METACHARS: &[char] = &[
    ';', '&', '|', '$', '`', '<', '>', '(', ')', '\\', '\'', '"', '#', '!', '{', '}',
];

/// The process a container runs on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    pub program: String,
    pub args: Vec<String>,
}

impl Entrypoint {
    pub fn from_command(command: &[String]) -> crate::Result<Self> {
        let (program, args) = command.split_first().ok_or(crate::Error::EmptyEntrypoint)?;
        if program.trim().is_empty() {
            return Err(crate::Error::EmptyEntrypoint);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// The script the program is asked to run: the first non-flag argument.
    pub fn target(&self) -> Option<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .find(|a| !a.starts_with('-'))
    }
}

impl fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    RefreshIndex,
    InstallPackages,
    Workdir,
    StageManifest,
    InstallDependencies,
    CopyContext,
    Entrypoint,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshIndex => "refresh-index",
            Self::InstallPackages => "install-packages",
            Self::Workdir => "workdir",
            Self::StageManifest => "stage-manifest",
            Self::InstallDependencies => "install-dependencies",
            Self::CopyContext => "copy-context",
            Self::Entrypoint => "entrypoint",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    RefreshIndex {
        manager: PackageManager,
    },
    InstallPackages {
        manager: PackageManager,
        packages: Vec<String>,
    },
    Workdir {
        path: String,
    },
    /// Copy `source` (relative to the build context) to `dest` (relative to
    /// the working directory).
    StageManifest {
        source: String,
        dest: String,
    },
    InstallDependencies {
        installer: String,
        manifest: String,
        no_cache: bool,
    },
    CopyContext,
    Entrypoint(Entrypoint),
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::RefreshIndex { .. } => StepKind::RefreshIndex,
            Self::InstallPackages { .. } => StepKind::InstallPackages,
            Self::Workdir { .. } => StepKind::Workdir,
            Self::StageManifest { .. } => StepKind::StageManifest,
            Self::InstallDependencies { .. } => StepKind::InstallDependencies,
            Self::CopyContext => StepKind::CopyContext,
            Self::Entrypoint(_) => StepKind::Entrypoint,
        }
    }

    /// The command run inside the image for steps that execute something.
    pub fn command(&self) -> Option<Vec<String>> {
        match self {
            Self::RefreshIndex { manager } => Some(manager.refresh_command()),
            Self::InstallPackages { manager, packages } => {
                Some(manager.install_command(packages))
            }
            Self::InstallDependencies {
                installer,
                manifest,
                no_cache,
            } => {
                let mut cmd = vec![installer.clone(), "install".to_owned()];
                if *no_cache {
                    cmd.push("--no-cache-dir".to_owned());
                }
                cmd.push("-r".to_owned());
                cmd.push(manifest.clone());
                Some(cmd)
            }
            Self::Workdir { .. }
            | Self::StageManifest { .. }
            | Self::CopyContext
            | Self::Entrypoint(_) => None,
        }
    }

    /// One-line human description, used by `kiln plan` and step logs.
    pub fn describe(&self) -> String {
        match self {
            Self::RefreshIndex { .. } | Self::InstallPackages { .. } | Self::InstallDependencies { .. } => {
                format!("run `{}`", self.command().unwrap_or_default().join(" "))
            }
            Self::Workdir { path } => format!("set working directory {path}"),
            Self::StageManifest { source, dest } => format!("stage {source} as {dest}"),
            Self::CopyContext => "copy build context".to_owned(),
            Self::Entrypoint(ep) => format!("register entrypoint `{ep}`"),
        }
    }
}

impl PackageManager {
    pub fn refresh_command(&self) -> Vec<String> {
        match self {
            Self::Apt => args(["apt-get", "update"]),
            Self::Apk => args(["apk", "update"]),
        }
    }

    pub fn install_command(&self, packages: &[String]) -> Vec<String> {
        let mut cmd = match self {
            Self::Apt => args(["apt-get", "install", "-y"]),
            Self::Apk => args(["apk", "add", "--no-cache"]),
        };
        cmd.extend(packages.iter().cloned());
        cmd
    }
}

/// A validated, ordered provisioning sequence on top of a base image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub base: ImageRef,
    pub workdir: String,
    /// Sorted so rendering and commit changes are deterministic.
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Step>,
}

impl Recipe {
    /// Build the step sequence for a configuration, validating every input
    /// that ends up in an image instruction.
    pub fn from_config(config: &KilnConfig) -> crate::Result<Self> {
        let workdir = config.workdir.path.clone();
        if !workdir.starts_with('/') {
            return Err(crate::Error::RelativeWorkdir(workdir));
        }

        for name in &config.packages.install {
            validate_package_name(name)?;
        }
        validate_manifest_source(&config.dependencies.manifest)?;
        validate_manifest_dest(&config.dependencies.staged_as)?;
        for key in config.image.env.keys() {
            if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
                return Err(crate::Error::InvalidEnvKey(key.clone()));
            }
        }
        let entrypoint = Entrypoint::from_command(&config.entrypoint.command)?;

        let mut steps = Vec::with_capacity(7);
        if !config.packages.install.is_empty() {
            let manager = config.packages.manager;
            steps.push(Step::RefreshIndex { manager });
            steps.push(Step::InstallPackages {
                manager,
                packages: config.packages.install.clone(),
            });
        }
        steps.push(Step::Workdir {
            path: workdir.clone(),
        });
        steps.push(Step::StageManifest {
            source: config.dependencies.manifest.clone(),
            dest: config.dependencies.staged_as.clone(),
        });
        steps.push(Step::InstallDependencies {
            installer: config.dependencies.installer.clone(),
            manifest: config.dependencies.staged_as.clone(),
            no_cache: config.dependencies.no_cache,
        });
        steps.push(Step::CopyContext);
        steps.push(Step::Entrypoint(entrypoint));

        tracing::debug!(
            base = %config.image.base,
            steps = steps.len(),
            "recipe built"
        );

        Ok(Self {
            base: config.image.base.clone(),
            workdir,
            env: config.image.env.clone(),
            steps,
        })
    }

    pub fn entrypoint(&self) -> Option<&Entrypoint> {
        self.steps.iter().rev().find_map(|s| match s {
            Step::Entrypoint(ep) => Some(ep),
            _ => None,
        })
    }

    /// OS packages installed by the recipe, in declaration order.
    pub fn os_packages(&self) -> &[String] {
        self.steps
            .iter()
            .find_map(|s| match s {
                Step::InstallPackages { packages, .. } => Some(packages.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

fn validate_package_name(name: &str) -> crate::Result<()> {
    let invalid = |reason| crate::Error::InvalidPackageName {
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("name contains whitespace"));
    }
    if name.starts_with('-') {
        return Err(invalid("name looks like a flag"));
    }
    if name.contains(SHELL_METACHARS) {
        return Err(invalid("name contains shell metacharacters"));
    }
    Ok(())
}

fn validate_manifest_source(source: &str) -> crate::Result<()> {
    match contained_path_issue(source, "must be relative to the build context") {
        Some(reason) => Err(crate::Error::InvalidManifestSource {
            path: source.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

fn validate_manifest_dest(dest: &str) -> crate::Result<()> {
    match contained_path_issue(dest, "must be relative to the working directory") {
        Some(reason) => Err(crate::Error::InvalidManifestDest {
            path: dest.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Why `raw` could resolve outside the directory it is relative to, if it can.
fn contained_path_issue(raw: &str, absolute_reason: &'static str) -> Option<&'static str> {
    if raw.is_empty() {
        return Some("path is empty");
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        return Some(absolute_reason);
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Some("must not contain `..`");
    }
    None
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
