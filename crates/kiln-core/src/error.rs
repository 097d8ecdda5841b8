use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize default config")]
    ConfigSerialize { source: toml::ser::Error },

    #[error("config already exists at {0}")]
    ConfigExists(PathBuf),

    #[error("failed to write config to {path}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Image references ──
    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidImageRef {
        reference: String,
        reason: &'static str,
    },

    // ── Recipe validation ──
    #[error("working directory must be an absolute path, got {0:?}")]
    RelativeWorkdir(String),

    #[error("invalid dependency manifest {path:?}: {reason}")]
    InvalidManifestSource { path: String, reason: &'static str },

    #[error("invalid manifest destination {path:?}: {reason}")]
    InvalidManifestDest { path: String, reason: &'static str },

    #[error("invalid OS package name {name:?}: {reason}")]
    InvalidPackageName { name: String, reason: &'static str },

    #[error("entrypoint command is empty — set [entrypoint].command in kiln.toml")]
    EmptyEntrypoint,

    #[error("invalid environment variable name {0:?}")]
    InvalidEnvKey(String),
}
