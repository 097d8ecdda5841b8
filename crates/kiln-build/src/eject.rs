use std::path::{Path, PathBuf};

/// Directory holding hand-maintained build files, relative to the project.
pub const EJECT_DIR: &str = ".kiln";

/// Writes the rendered Dockerfile to `.kiln/Dockerfile` for manual editing.
///
/// An existing ejected Dockerfile is never overwritten. Once ejected,
/// `kiln build --dockerfile` uses that file instead of rendering `kiln.toml`.
pub fn eject(project_dir: &Path, dockerfile_content: &str) -> Result<PathBuf, EjectError> {
    let path = ejected_path(project_dir);
    if path.exists() {
        return Err(EjectError::AlreadyEjected(path));
    }

    let dir = project_dir.join(EJECT_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| EjectError::CreateDir {
        path: dir.clone(),
        source: e,
    })?;
    std::fs::write(&path, dockerfile_content).map_err(|e| EjectError::Write {
        path: path.clone(),
        source: e,
    })?;

    tracing::debug!(path = %path.display(), "Dockerfile ejected");
    Ok(path)
}

pub fn is_ejected(project_dir: &Path) -> bool {
    ejected_path(project_dir).is_file()
}

pub fn load_ejected_dockerfile(project_dir: &Path) -> Result<String, EjectError> {
    let path = ejected_path(project_dir);
    std::fs::read_to_string(&path).map_err(|e| EjectError::Read { path, source: e })
}

pub fn ejected_path(project_dir: &Path) -> PathBuf {
    project_dir.join(EJECT_DIR).join("Dockerfile")
}

#[derive(Debug, thiserror::Error)]
pub enum EjectError {
    #[error("failed to create {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Dockerfile already ejected at {0} — edit directly or delete to re-eject")]
    AlreadyEjected(PathBuf),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read ejected Dockerfile at {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
