//! Stepwise execution of a [`Recipe`] against a throw-away build container.
//!
//! ```text
//! docker create/start <base>         ── build container
//!   step 1..n  docker exec / docker cp ── one docker call per step, in order
//! docker commit --change ... <tag>   ── only when every step succeeded
//! docker rm -f                       ── always
//! ```
//!
//! The first failing step aborts the run. Nothing is rolled back: the
//! container, with whatever the earlier steps left in it, is discarded whole
//! and no image is tagged.

use std::collections::BTreeMap;
use std::path::Path;

use kiln_build::{ContextError, StagedContext, env_instruction, exec_form, stage_context};
use kiln_core::{ContextConfig, Entrypoint, ImageRef, Recipe, Step, StepKind};
use serde::Serialize;

use crate::client::DockerClient;
use crate::docker::DockerError;
use crate::executor::DockerExecutor;

/// Declared configuration of the produced image.
///
/// Derived from the recipe alone, so two builds of the same recipe always
/// declare the same image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageManifest {
    pub base: String,
    pub tag: String,
    pub workdir: String,
    pub os_packages: Vec<String>,
    pub dependency_manifest: Option<String>,
    pub entrypoint: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ImageManifest {
    pub fn from_recipe(recipe: &Recipe, tag: &ImageRef) -> Self {
        let dependency_manifest = recipe.steps.iter().find_map(|s| match s {
            Step::StageManifest { dest, .. } => Some(container_path(&recipe.workdir, dest)),
            _ => None,
        });

        Self {
            base: recipe.base.to_string(),
            tag: tag.to_string(),
            workdir: recipe.workdir.clone(),
            os_packages: recipe.os_packages().to_vec(),
            dependency_manifest,
            entrypoint: recipe.entrypoint().map(Entrypoint::argv).unwrap_or_default(),
            env: recipe.env.clone(),
        }
    }

    /// `docker commit --change` instructions that register this manifest's
    /// runtime configuration on the image.
    pub fn commit_changes(&self) -> Vec<String> {
        let mut changes = vec![format!("WORKDIR {}", self.workdir)];
        changes.extend(self.env.iter().map(|(k, v)| env_instruction(k, v)));
        if !self.entrypoint.is_empty() {
            changes.push(format!("ENTRYPOINT {}", exec_form(&self.entrypoint)));
        }
        changes
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based position in the recipe.
    pub index: usize,
    pub step: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub image_id: String,
    pub manifest: ImageManifest,
    pub steps: Vec<StepReport>,
    /// Findings that do not fail the build.
    pub warnings: Vec<String>,
}

/// Executes a recipe step by step through a [`DockerClient`].
pub struct Pipeline<'a, E: DockerExecutor> {
    client: &'a DockerClient<E>,
    recipe: &'a Recipe,
}

/// Mutable state threaded through the steps of one run.
#[derive(Default)]
struct RunState {
    workdir: Option<String>,
    reports: Vec<StepReport>,
    warnings: Vec<String>,
}

impl<'a, E: DockerExecutor> Pipeline<'a, E> {
    pub fn new(client: &'a DockerClient<E>, recipe: &'a Recipe) -> Self {
        Self { client, recipe }
    }

    /// Stage `project_dir` as the build context, then run the recipe on it.
    pub async fn run(
        &self,
        project_dir: &Path,
        context: &ContextConfig,
        tag: &ImageRef,
    ) -> Result<BuildOutcome, PipelineError> {
        let staged =
            stage_context(project_dir, context).map_err(|e| PipelineError::Context { source: e })?;
        self.run_staged(&staged, tag).await
    }

    /// Run the recipe against an already staged build context.
    pub async fn run_staged(
        &self,
        staged: &StagedContext,
        tag: &ImageRef,
    ) -> Result<BuildOutcome, PipelineError> {
        tracing::info!(base = %self.recipe.base, tag = %tag, "starting build container");
        let container = self
            .client
            .start_build_container(&self.recipe.base)
            .await
            .map_err(|e| PipelineError::ContainerCreate {
                base: self.recipe.base.to_string(),
                source: e,
            })?;

        let result = match self.execute_steps(&container, staged).await {
            Ok(state) => self.commit(&container, state, tag).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.client.remove_container(&container).await {
            tracing::warn!(container = %container, error = %e, "failed to remove build container");
        }

        match &result {
            Ok(outcome) => tracing::info!(tag = %tag, image = %outcome.image_id, "image built"),
            Err(e) => tracing::error!(error = %e, "build aborted"),
        }
        result
    }

    async fn execute_steps(
        &self,
        container: &str,
        staged: &StagedContext,
    ) -> Result<RunState, PipelineError> {
        let mut state = RunState::default();
        let total = self.recipe.steps.len();

        for (i, step) in self.recipe.steps.iter().enumerate() {
            let index = i + 1;
            let description = step.describe();
            tracing::info!(step = index, total, kind = %step.kind(), "{description}");

            self.apply(container, staged, step, &mut state)
                .await
                .map_err(|source| PipelineError::Step {
                    index,
                    step: step.kind(),
                    source,
                })?;

            state.reports.push(StepReport {
                index,
                step: step.kind().as_str(),
                description,
            });
        }

        Ok(state)
    }

    async fn apply(
        &self,
        container: &str,
        staged: &StagedContext,
        step: &Step,
        state: &mut RunState,
    ) -> Result<(), StepError> {
        let workdir = state
            .workdir
            .clone()
            .unwrap_or_else(|| self.recipe.workdir.clone());

        match step {
            Step::RefreshIndex { .. } => {
                let command = step.command().unwrap_or_default();
                self.client
                    .exec_in(container, None, &command)
                    .await
                    .map_err(|e| StepError::IndexRefresh { source: e })
            }
            Step::InstallPackages { packages, .. } => {
                let command = step.command().unwrap_or_default();
                self.client
                    .exec_in(container, None, &command)
                    .await
                    .map_err(|e| StepError::PackageInstall {
                        packages: packages.clone(),
                        source: e,
                    })
            }
            Step::Workdir { path } => {
                let command = vec!["mkdir".to_owned(), "-p".to_owned(), path.clone()];
                self.client
                    .exec_in(container, None, &command)
                    .await
                    .map_err(|e| StepError::Workdir {
                        path: path.clone(),
                        source: e,
                    })?;
                state.workdir = Some(path.clone());
                Ok(())
            }
            Step::StageManifest { source, dest } => {
                if !staged.contains(Path::new(source)) {
                    return Err(StepError::ManifestMissing {
                        path: source.clone(),
                    });
                }
                self.client
                    .copy_into(container, &staged.dir.join(source), &container_path(&workdir, dest))
                    .await
                    .map_err(|e| StepError::ManifestCopy {
                        path: source.clone(),
                        source: e,
                    })
            }
            Step::InstallDependencies { manifest, .. } => {
                let command = step.command().unwrap_or_default();
                self.client
                    .exec_in(container, Some(&workdir), &command)
                    .await
                    .map_err(|e| StepError::DependencyInstall {
                        manifest: manifest.clone(),
                        source: e,
                    })
            }
            Step::CopyContext => self
                .client
                .copy_into(container, &staged.dir.join("."), &workdir)
                .await
                .map_err(|e| StepError::SourceCopy {
                    workdir: workdir.clone(),
                    source: e,
                }),
            Step::Entrypoint(entrypoint) => {
                // Recorded only; the target is not required to exist until a
                // container is started from the image.
                if let Some(target) = entrypoint.target()
                    && Path::new(target).is_relative()
                    && !staged.contains(Path::new(target))
                {
                    let warning = format!(
                        "entrypoint target {target} is not in the build context; \
                         containers started from this image will fail"
                    );
                    tracing::warn!(entrypoint_target = target, "entrypoint target missing from build context");
                    state.warnings.push(warning);
                }
                Ok(())
            }
        }
    }

    async fn commit(
        &self,
        container: &str,
        state: RunState,
        tag: &ImageRef,
    ) -> Result<BuildOutcome, PipelineError> {
        let manifest = ImageManifest::from_recipe(self.recipe, tag);
        let image_id = self
            .client
            .commit(container, &manifest.commit_changes(), tag)
            .await
            .map_err(|e| PipelineError::Commit {
                tag: tag.to_string(),
                source: e,
            })?;

        Ok(BuildOutcome {
            image_id,
            manifest,
            steps: state.reports,
            warnings: state.warnings,
        })
    }
}

/// Absolute path of `relative` inside the image's working directory.
fn container_path(workdir: &str, relative: &str) -> String {
    format!("{}/{}", workdir.trim_end_matches('/'), relative)
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to stage build context")]
    Context { source: ContextError },

    #[error("failed to start build container from {base}")]
    ContainerCreate { base: String, source: DockerError },

    #[error("step {index} ({step}) failed")]
    Step {
        index: usize,
        step: StepKind,
        source: StepError,
    },

    #[error("failed to commit image {tag}")]
    Commit { tag: String, source: DockerError },
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("package index refresh failed")]
    IndexRefresh { source: DockerError },

    #[error("failed to install OS packages: {}", .packages.join(", "))]
    PackageInstall {
        packages: Vec<String>,
        source: DockerError,
    },

    #[error("failed to create working directory {path}")]
    Workdir { path: String, source: DockerError },

    #[error("dependency manifest {path} not found in build context")]
    ManifestMissing { path: String },

    #[error("failed to stage dependency manifest {path}")]
    ManifestCopy { path: String, source: DockerError },

    #[error("dependency installation from {manifest} failed")]
    DependencyInstall {
        manifest: String,
        source: DockerError,
    },

    #[error("failed to copy build context into {workdir}")]
    SourceCopy { workdir: String, source: DockerError },
}
