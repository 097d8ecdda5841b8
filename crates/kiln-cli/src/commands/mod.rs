mod build;
mod doctor;
mod eject;
mod init;
mod plan;
mod render;
mod run;

use std::path::Path;

use kiln_core::{KilnConfig, Recipe};

pub use build::build;
pub use doctor::doctor;
pub use eject::eject;
pub use init::init;
pub use plan::plan;
pub use render::render;
pub use run::run;

/// Load `kiln.toml` from the context directory and turn it into a validated
/// recipe.
pub(crate) fn load_recipe(context: &Path) -> anyhow::Result<(KilnConfig, Recipe)> {
    let config = KilnConfig::load(context)?;
    let recipe = Recipe::from_config(&config)?;
    Ok((config, recipe))
}
