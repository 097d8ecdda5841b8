//! Core types and configuration for kiln.
//!
//! This crate defines the `kiln.toml` schema ([`KilnConfig`]), container
//! image references ([`ImageRef`]), the ordered provisioning [`Recipe`],
//! and shared error types.

pub mod config;
pub mod error;
pub mod image;
pub mod recipe;

pub use config::{
    CONFIG_FILE, ContextConfig, DependencyConfig, EntrypointConfig, ImageConfig, KilnConfig,
    PackageConfig, PackageManager, WorkdirConfig,
};
pub use error::{Error, Result};
pub use image::{DEFAULT_TAG, ImageRef};
pub use recipe::{Entrypoint, Recipe, Step, StepKind};
