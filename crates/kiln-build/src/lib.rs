//! Dockerfile rendering, build context staging, and eject for kiln.
//!
//! # Build flow
//!
//! ```text
//! kiln build
//!   1. Recipe     ── kiln.toml → Recipe::from_config()
//!   2. Stage      ── project tree → .kiln-build/context/
//!   3a. Stepwise  ── kiln-engine Pipeline (docker exec / cp / commit)
//!   3b. Dockerfile── DockerfileGenerator::render() → docker build
//! ```
//!
//! # Context strategy
//!
//! The staged context mirrors the project directory:
//! - every regular file, recursively
//! - `.kiln-build/`, `.kiln/`, `.git/` are always excluded
//! - literal entries of `[context].exclude` and `.dockerignore` are excluded

pub mod context;
pub mod dockerfile;
pub mod eject;

pub use context::{ContextError, StagedContext, context_files, stage_context};
pub use dockerfile::{DockerfileGenerator, env_instruction, exec_form};
