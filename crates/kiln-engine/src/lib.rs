//! Docker operations and stepwise image provisioning for kiln.
//!
//! All docker access goes through [`DockerExecutor`], so the
//! [`Pipeline`] and [`DockerClient`] can be exercised without a daemon.

pub mod client;
pub mod docker;
pub mod executor;
pub mod pipeline;

pub use client::{CheckResult, DockerClient, DoctorReport};
pub use docker::DockerError;
pub use executor::{DockerExecutor, RealExecutor};
pub use pipeline::{BuildOutcome, ImageManifest, Pipeline, PipelineError, StepError, StepReport};
