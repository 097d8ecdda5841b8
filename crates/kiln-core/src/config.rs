use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ImageRef;

/// File name of the per-context configuration.
pub const CONFIG_FILE: &str = "kiln.toml";

/// kiln.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub packages: PackageConfig,
    #[serde(default)]
    pub dependencies: DependencyConfig,
    #[serde(default)]
    pub workdir: WorkdirConfig,
    #[serde(default)]
    pub entrypoint: EntrypointConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image the provisioning steps are layered on
    #[serde(default = "default_base_image")]
    pub base: ImageRef,
    /// Tag of the produced image (defaults to `<context dir name>:latest`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ImageRef>,
    /// Static environment variables baked into the image config.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Apt,
    Apk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// OS package manager provided by the base image
    #[serde(default)]
    pub manager: PackageManager,
    /// OS packages to install, unpinned
    #[serde(default = "default_os_packages")]
    pub install: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Manifest path, relative to the build context
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Name the manifest is staged under inside the working directory
    #[serde(default = "default_staged_manifest")]
    pub staged_as: String,
    /// Installer executable inside the image
    #[serde(default = "default_installer")]
    pub installer: String,
    /// Disable the installer's local download cache
    #[serde(default = "default_no_cache")]
    pub no_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkdirConfig {
    #[serde(default = "default_workdir")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointConfig {
    /// Program followed by its arguments, passed through unchanged
    #[serde(default = "default_entrypoint")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Paths (relative to the context root) left out of the staged context,
    /// in addition to `.dockerignore` entries.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base: default_base_image(),
            tag: None,
            env: BTreeMap::new(),
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            manager: PackageManager::default(),
            install: default_os_packages(),
        }
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            staged_as: default_staged_manifest(),
            installer: default_installer(),
            no_cache: default_no_cache(),
        }
    }
}

impl Default for WorkdirConfig {
    fn default() -> Self {
        Self {
            path: default_workdir(),
        }
    }
}

impl Default for EntrypointConfig {
    fn default() -> Self {
        Self {
            command: default_entrypoint(),
        }
    }
}

impl KilnConfig {
    /// Load from kiln.toml in the given directory, or return defaults if not found.
    pub fn load(context_dir: &Path) -> crate::Result<Self> {
        let config_path = context_dir.join(CONFIG_FILE);
        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading config");
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write the default configuration to kiln.toml, refusing to overwrite.
    pub fn write_default(context_dir: &Path) -> crate::Result<std::path::PathBuf> {
        let config_path = context_dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(crate::Error::ConfigExists(config_path));
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| crate::Error::ConfigSerialize { source: e })?;
        std::fs::write(&config_path, content).map_err(|e| crate::Error::ConfigWrite {
            path: config_path.clone(),
            source: e,
        })?;
        Ok(config_path)
    }

    /// Tag for the produced image: the configured one, else derived from the
    /// context directory name.
    pub fn image_tag(&self, context_dir: &Path) -> crate::Result<ImageRef> {
        if let Some(tag) = &self.image.tag {
            return Ok(tag.clone());
        }
        let dir_name = match context_dir.canonicalize() {
            Ok(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    path = %context_dir.display(),
                    error = %e,
                    "failed to resolve context directory; using fallback image name"
                );
                String::new()
            }
        };
        ImageRef::local(&dir_name)
    }
}

fn default_base_image() -> ImageRef {
    ImageRef {
        name: "music2".to_owned(),
        tag: Some("latest".to_owned()),
        digest: None,
    }
}

fn default_os_packages() -> Vec<String> {
    vec!["ffmpeg".to_owned()]
}

fn default_manifest() -> String {
    "requirements.txt".to_owned()
}

fn default_staged_manifest() -> String {
    "req.txt".to_owned()
}

fn default_installer() -> String {
    "pip".to_owned()
}

fn default_no_cache() -> bool {
    true
}

fn default_workdir() -> String {
    "/app".to_owned()
}

fn default_entrypoint() -> Vec<String> {
    vec!["python3".to_owned(), "start.sh".to_owned()]
}
