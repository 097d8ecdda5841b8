use kiln_core::{Recipe, Step};

/// Renders a [`Recipe`] as a single-stage Dockerfile, one instruction per step.
pub struct DockerfileGenerator<'a> {
    recipe: &'a Recipe,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(recipe: &'a Recipe) -> Self {
        Self { recipe }
    }

    pub fn render(&self) -> String {
        let mut out = format!("FROM {}\n", self.recipe.base);

        for step in &self.recipe.steps {
            match step {
                Step::RefreshIndex { .. }
                | Step::InstallPackages { .. }
                | Step::InstallDependencies { .. } => {
                    let command = step.command().unwrap_or_default();
                    out.push_str(&format!("RUN {}\n", command.join(" ")));
                }
                Step::Workdir { path } => out.push_str(&format!("WORKDIR {path}\n")),
                Step::StageManifest { source, dest } => {
                    out.push_str(&format!("COPY {source} {dest}\n"));
                }
                Step::CopyContext => out.push_str("COPY . .\n"),
                Step::Entrypoint(ep) => {
                    for (key, value) in &self.recipe.env {
                        out.push_str(&env_instruction(key, value));
                        out.push('\n');
                    }
                    out.push_str(&format!("ENTRYPOINT {}\n", exec_form(&ep.argv())));
                }
            }
        }

        out
    }
}

/// Exec (JSON array) form of a command line, as used by `ENTRYPOINT`.
pub fn exec_form(argv: &[String]) -> String {
    let parts: Vec<String> = argv
        .iter()
        .map(|a| serde_json::Value::String(a.clone()).to_string())
        .collect();
    format!("[{}]", parts.join(", "))
}

/// `ENV KEY=value` with the value quoted when it is not a bare word.
pub fn env_instruction(key: &str, value: &str) -> String {
    format!("ENV {key}={}", quote_env_value(value))
}

fn quote_env_value(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-:,+@".contains(c))
    {
        value.to_owned()
    } else {
        serde_json::Value::String(value.to_owned()).to_string()
    }
}
