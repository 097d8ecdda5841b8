use std::path::{Path, PathBuf};

use kiln_build::context::{context_files, list_files, read_dockerignore, stage_context};
use kiln_build::dockerfile::DockerfileGenerator;
use kiln_build::eject::{eject, is_ejected, load_ejected_dockerfile};
use kiln_core::{ContextConfig, KilnConfig, PackageManager, Recipe};
use tempfile::TempDir;

fn default_recipe() -> Recipe {
    Recipe::from_config(&KilnConfig::default()).unwrap()
}

/// Create a minimal application context: manifest plus entrypoint script.
fn init_app_context(dir: &Path) {
    std::fs::write(dir.join("requirements.txt"), "requests==2.31.0\n").unwrap();
    std::fs::write(
        dir.join("start.sh"),
        "#!/usr/bin/env python3\nprint('ok')\n",
    )
    .unwrap();
}

// ── Dockerfile Generation Tests ──

#[test]
fn dockerfile_renders_default_provisioning_sequence() {
    let output = DockerfileGenerator::new(&default_recipe()).render();

    assert_eq!(
        output,
        "FROM music2:latest\n\
         RUN apt-get update\n\
         RUN apt-get install -y ffmpeg\n\
         WORKDIR /app\n\
         COPY requirements.txt req.txt\n\
         RUN pip install --no-cache-dir -r req.txt\n\
         COPY . .\n\
         ENTRYPOINT [\"python3\", \"start.sh\"]\n"
    );
}

#[test]
fn dockerfile_uses_configured_base_and_workdir() {
    let mut config = KilnConfig::default();
    config.image.base = "python:3.12-slim".parse().unwrap();
    config.workdir.path = "/srv/app".to_owned();
    let output = DockerfileGenerator::new(&Recipe::from_config(&config).unwrap()).render();

    assert!(output.starts_with("FROM python:3.12-slim\n"));
    assert!(output.contains("WORKDIR /srv/app\n"));
}

#[test]
fn dockerfile_installs_multiple_packages() {
    let mut config = KilnConfig::default();
    config.packages.install = vec!["ffmpeg".to_owned(), "sox".to_owned()];
    let output = DockerfileGenerator::new(&Recipe::from_config(&config).unwrap()).render();

    assert!(output.contains("RUN apt-get install -y ffmpeg sox\n"));
}

#[test]
fn dockerfile_apk_manager() {
    let mut config = KilnConfig::default();
    config.packages.manager = PackageManager::Apk;
    let output = DockerfileGenerator::new(&Recipe::from_config(&config).unwrap()).render();

    assert!(output.contains("RUN apk update\n"));
    assert!(output.contains("RUN apk add --no-cache ffmpeg\n"));
    assert!(!output.contains("apt-get"));
}

#[test]
fn dockerfile_no_package_steps_when_empty() {
    let mut config = KilnConfig::default();
    config.packages.install.clear();
    let output = DockerfileGenerator::new(&Recipe::from_config(&config).unwrap()).render();

    assert!(!output.contains("apt-get"));
    assert!(output.contains("WORKDIR /app"));
}

#[test]
fn dockerfile_manifest_copied_before_install_and_tree_after() {
    let output = DockerfileGenerator::new(&default_recipe()).render();

    let stage = output.find("COPY requirements.txt req.txt").unwrap();
    let install = output.find("RUN pip install").unwrap();
    let tree = output.find("COPY . .").unwrap();
    let entry = output.find("ENTRYPOINT").unwrap();
    assert!(stage < install && install < tree && tree < entry);
}

#[test]
fn dockerfile_env_directives_sorted_before_entrypoint() {
    let mut config = KilnConfig::default();
    config
        .image
        .env
        .insert("TEMPLATE_DIR".to_owned(), "/app/templates".to_owned());
    config
        .image
        .env
        .insert("GREETING".to_owned(), "hello world".to_owned());
    let output = DockerfileGenerator::new(&Recipe::from_config(&config).unwrap()).render();

    let greeting = output.find("ENV GREETING=\"hello world\"").unwrap();
    let template = output.find("ENV TEMPLATE_DIR=/app/templates").unwrap();
    let entry = output.find("ENTRYPOINT").unwrap();
    assert!(greeting < template && template < entry);
}

#[test]
fn dockerfile_no_env_when_empty() {
    let output = DockerfileGenerator::new(&default_recipe()).render();

    assert!(!output.contains("ENV "));
}

#[test]
fn dockerfile_rendering_is_deterministic() {
    let a = DockerfileGenerator::new(&default_recipe()).render();
    let b = DockerfileGenerator::new(&default_recipe()).render();
    assert_eq!(a, b);
}

// ── Context Staging Tests ──

#[test]
fn stage_copies_full_tree() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::create_dir_all(project.join("helpers")).unwrap();
    std::fs::write(project.join("helpers/avconv.py"), "# helper\n").unwrap();

    let staged = stage_context(project, &ContextConfig::default()).unwrap();

    assert!(staged.contains(Path::new("requirements.txt")));
    assert!(staged.contains(Path::new("start.sh")));
    assert!(staged.contains(Path::new("helpers/avconv.py")));
    assert_eq!(
        staged.files,
        vec![
            PathBuf::from("helpers/avconv.py"),
            PathBuf::from("requirements.txt"),
            PathBuf::from("start.sh"),
        ]
    );
    let content = std::fs::read_to_string(staged.dir.join("start.sh")).unwrap();
    assert!(content.contains("print('ok')"));
}

#[test]
fn stage_without_manifest_still_succeeds() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    std::fs::write(project.join("start.sh"), "print('ok')\n").unwrap();

    let staged = stage_context(project, &ContextConfig::default()).unwrap();

    assert!(!staged.contains(Path::new("requirements.txt")));
    assert!(staged.contains(Path::new("start.sh")));
}

#[test]
fn staged_contains_only_files_from_the_context() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("app");
    std::fs::create_dir(&project).unwrap();
    std::fs::write(project.join("start.sh"), "print('ok')\n").unwrap();
    let outside = tmp.path().join("host-secrets.txt");
    std::fs::write(&outside, "token=abc\n").unwrap();

    let staged = stage_context(&project, &ContextConfig::default()).unwrap();

    assert!(!staged.contains(&outside));
    assert!(!staged.contains(Path::new("../host-secrets.txt")));
    assert!(staged.contains(Path::new("./start.sh")));
}

#[cfg(unix)]
#[test]
fn stage_copies_symlinked_files_but_not_symlinked_dirs() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("app");
    std::fs::create_dir(&project).unwrap();
    init_app_context(&project);
    let shared = tmp.path().join("shared");
    std::fs::create_dir(&shared).unwrap();
    std::fs::write(shared.join("codec.py"), "").unwrap();
    std::os::unix::fs::symlink(&shared, project.join("shared")).unwrap();
    std::os::unix::fs::symlink(project.join("start.sh"), project.join("run.sh")).unwrap();

    let staged = stage_context(&project, &ContextConfig::default()).unwrap();

    assert!(staged.contains(Path::new("run.sh")));
    assert!(!staged.contains(Path::new("shared/codec.py")));
    assert!(!staged.dir.join("shared").exists());
}

#[test]
fn stage_excludes_kiln_and_git_dirs() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::create_dir_all(project.join(".kiln")).unwrap();
    std::fs::create_dir_all(project.join(".git")).unwrap();
    std::fs::write(project.join(".kiln/Dockerfile"), "custom").unwrap();
    std::fs::write(project.join(".git/HEAD"), "ref: refs/heads/main").unwrap();

    let staged = stage_context(project, &ContextConfig::default()).unwrap();

    assert!(!staged.dir.join(".kiln").exists());
    assert!(!staged.dir.join(".git").exists());
    assert!(!staged.dir.join(".kiln-build").exists());
    assert!(staged.contains(Path::new("start.sh")));
}

#[test]
fn stage_respects_configured_excludes() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::create_dir_all(project.join("samples")).unwrap();
    std::fs::write(project.join("samples/track.flac"), "bytes").unwrap();
    std::fs::write(project.join("notes.md"), "todo").unwrap();

    let config = ContextConfig {
        exclude: vec!["samples/".to_owned(), "./notes.md".to_owned()],
    };
    let staged = stage_context(project, &config).unwrap();

    assert!(!staged.dir.join("samples").exists());
    assert!(!staged.dir.join("notes.md").exists());
    assert!(staged.contains(Path::new("requirements.txt")));
}

#[test]
fn stage_respects_dockerignore() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::create_dir_all(project.join("cache")).unwrap();
    std::fs::write(project.join("cache/blob"), "x").unwrap();
    std::fs::write(
        project.join(".dockerignore"),
        "# local artifacts\n\ncache/\n*.pyc\n",
    )
    .unwrap();

    let staged = stage_context(project, &ContextConfig::default()).unwrap();

    assert!(!staged.dir.join("cache").exists());
    assert!(staged.contains(Path::new(".dockerignore")));
}

#[test]
fn dockerignore_skips_comments_and_wildcards() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join(".dockerignore"),
        "# comment\n\nbuild/\n*.log\n!keep.log\nvenv\n",
    )
    .unwrap();

    let entries = read_dockerignore(tmp.path()).unwrap();
    assert_eq!(entries, vec!["build/", "venv"]);
}

#[test]
fn dockerignore_missing_is_empty() {
    let tmp = TempDir::new().unwrap();
    assert!(read_dockerignore(tmp.path()).unwrap().is_empty());
}

#[test]
fn stage_cleans_previous_staging() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::write(project.join("old.py"), "x").unwrap();

    let first = stage_context(project, &ContextConfig::default()).unwrap();
    assert!(first.contains(Path::new("old.py")));

    std::fs::remove_file(project.join("old.py")).unwrap();
    let second = stage_context(project, &ContextConfig::default()).unwrap();
    assert!(!second.contains(Path::new("old.py")));
}

#[test]
fn stage_is_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);

    let first = stage_context(project, &ContextConfig::default()).unwrap();
    let second = stage_context(project, &ContextConfig::default()).unwrap();
    assert_eq!(first.files, second.files);
}

#[test]
fn staged_dockerfile_is_outside_context() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);

    let staged = stage_context(project, &ContextConfig::default()).unwrap();
    let path = staged.write_dockerfile("FROM music2:latest\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "FROM music2:latest\n");
    assert!(!path.starts_with(&staged.dir));
    assert!(!staged.contains(Path::new("Dockerfile")));
}

#[test]
fn list_files_sorted_and_relative() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    std::fs::create_dir_all(project.join("b/c")).unwrap();
    std::fs::write(project.join("b/c/d.txt"), "").unwrap();
    std::fs::write(project.join("a.txt"), "").unwrap();

    let files = list_files(project, &[]).unwrap();
    assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b/c/d.txt")]);
}

#[test]
fn context_files_matches_what_staging_copies() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_app_context(project);
    std::fs::create_dir_all(project.join(".git")).unwrap();
    std::fs::write(project.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    std::fs::write(project.join(".dockerignore"), "notes.md\n").unwrap();
    std::fs::write(project.join("notes.md"), "scratch").unwrap();

    let config = ContextConfig::default();
    let listed = context_files(project, &config).unwrap();
    let staged = stage_context(project, &config).unwrap();

    assert_eq!(listed, staged.files);
    assert!(!listed.contains(&PathBuf::from("notes.md")));
    assert!(!listed.iter().any(|f| f.starts_with(".git")));
}

// ── Eject Tests ──

#[test]
fn eject_creates_kiln_dir_with_dockerfile() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    assert!(!is_ejected(project));

    let path = eject(project, "FROM music2:latest\n").unwrap();

    assert!(is_ejected(project));
    assert_eq!(path, project.join(".kiln/Dockerfile"));
}

#[test]
fn eject_preserves_dockerfile_content() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    let content = DockerfileGenerator::new(&default_recipe()).render();

    eject(project, &content).unwrap();

    let loaded = load_ejected_dockerfile(project).unwrap();
    assert_eq!(loaded, content);
}

#[test]
fn eject_fails_if_already_ejected() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    eject(project, "first").unwrap();
    let result = eject(project, "second");

    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("already ejected"));
    assert_eq!(load_ejected_dockerfile(project).unwrap(), "first");
}

#[test]
fn load_ejected_fails_without_eject() {
    let tmp = TempDir::new().unwrap();
    assert!(load_ejected_dockerfile(tmp.path()).is_err());
}
