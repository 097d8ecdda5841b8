use std::path::{Path, PathBuf};

use kiln_core::ContextConfig;

/// Scratch directory kiln stages builds in, relative to the project.
pub const STAGING_DIR: &str = ".kiln-build";

/// Files/directories that kiln always excludes from the build context,
/// regardless of configuration.
const KILN_EXCLUDES: &[&str] = &[STAGING_DIR, ".kiln", ".git"];

/// A build context copied into `.kiln-build/context/`.
#[derive(Debug, Clone)]
pub struct StagedContext {
    /// `.kiln-build/`
    pub root: PathBuf,
    /// `.kiln-build/context/`, the tree copied into the image.
    pub dir: PathBuf,
    /// Relative paths of every staged file, sorted.
    pub files: Vec<PathBuf>,
}

impl StagedContext {
    /// Whether `relative` was staged. Absolute paths and paths that were
    /// excluded are never part of the context.
    pub fn contains(&self, relative: &Path) -> bool {
        let relative = relative.strip_prefix(".").unwrap_or(relative);
        self.files.iter().any(|f| f == relative)
    }

    /// Write a Dockerfile next to (not inside) the staged context, so it does
    /// not end up in the image.
    pub fn write_dockerfile(&self, content: &str) -> Result<PathBuf, ContextError> {
        let path = self.root.join("Dockerfile");
        std::fs::write(&path, content).map_err(|e| ContextError::WriteDockerfile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Stages the project directory as a build context.
///
/// Walks the project tree and copies every file that is not excluded by
/// kiln itself, `[context].exclude`, or `.dockerignore` into
/// `.kiln-build/context/`. Any previous staging directory is removed first.
pub fn stage_context(
    project_dir: &Path,
    config: &ContextConfig,
) -> Result<StagedContext, ContextError> {
    let root = project_dir.join(STAGING_DIR);
    let dir = root.join("context");

    // Clean previous staging
    if root.exists() {
        std::fs::remove_dir_all(&root).map_err(|e| ContextError::Cleanup {
            path: root.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&dir).map_err(|e| ContextError::Create {
        path: dir.clone(),
        source: e,
    })?;

    let files = context_files(project_dir, config)?;

    for relative_path in &files {
        let src = project_dir.join(relative_path);
        let dst = dir.join(relative_path);

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContextError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::copy(&src, &dst).map_err(|e| ContextError::CopyFile {
            path: src,
            source: e,
        })?;
    }

    tracing::debug!(
        files = files.len(),
        dir = %dir.display(),
        "build context staged"
    );

    Ok(StagedContext { root, dir, files })
}

/// Relative paths of the files that [`stage_context`] would copy, without
/// copying anything.
pub fn context_files(
    project_dir: &Path,
    config: &ContextConfig,
) -> Result<Vec<PathBuf>, ContextError> {
    let mut excludes: Vec<String> = KILN_EXCLUDES.iter().map(|s| (*s).to_owned()).collect();
    excludes.extend(config.exclude.iter().cloned());
    excludes.extend(read_dockerignore(project_dir)?);
    list_files(project_dir, &excludes)
}

/// Returns the relative paths of all files under `project_dir` that are not
/// excluded, sorted for a stable copy order.
pub fn list_files(project_dir: &Path, excludes: &[String]) -> Result<Vec<PathBuf>, ContextError> {
    let patterns: Vec<PathBuf> = excludes
        .iter()
        .filter_map(|e| normalize_pattern(e))
        .collect();
    let mut files = Vec::new();
    walk(project_dir, Path::new(""), &patterns, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(
    root: &Path,
    relative: &Path,
    patterns: &[PathBuf],
    out: &mut Vec<PathBuf>,
) -> Result<(), ContextError> {
    let dir = root.join(relative);
    let entries = std::fs::read_dir(&dir).map_err(|e| ContextError::ReadDir {
        path: dir.clone(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ContextError::ReadDir {
            path: dir.clone(),
            source: e,
        })?;
        let rel = relative.join(entry.file_name());
        if is_excluded(&rel, patterns) {
            continue;
        }

        let file_type = entry.file_type().map_err(|e| ContextError::ReadDir {
            path: entry.path(),
            source: e,
        })?;

        if file_type.is_dir() {
            walk(root, &rel, patterns, out)?;
        } else if file_type.is_file() || entry.path().is_file() {
            // Symlinks to files are copied by content.
            out.push(rel);
        } else {
            tracing::warn!(
                path = %rel.display(),
                "skipping entry that is neither a file nor a directory (symlinked directories are not followed)"
            );
        }
    }

    Ok(())
}

fn is_excluded(relative: &Path, patterns: &[PathBuf]) -> bool {
    patterns.iter().any(|p| relative.starts_with(p))
}

/// Normalises an exclude entry to a relative path prefix. Returns `None` for
/// entries that cannot match anything.
fn normalize_pattern(raw: &str) -> Option<PathBuf> {
    let trimmed = raw
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Reads literal path entries from `.dockerignore`.
///
/// Comment and blank lines are skipped. Wildcard and negation entries are
/// not supported and are reported with a warning instead of being applied.
pub fn read_dockerignore(project_dir: &Path) -> Result<Vec<String>, ContextError> {
    let path = project_dir.join(".dockerignore");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| ContextError::ReadIgnore {
        path: path.clone(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('!') || line.contains(['*', '?', '[']) {
            tracing::warn!(entry = line, "unsupported .dockerignore pattern ignored");
            continue;
        }
        entries.push(line.to_owned());
    }
    Ok(entries)
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to clean up staging directory {path}")]
    Cleanup {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read directory {path}")]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}")]
    ReadIgnore {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
