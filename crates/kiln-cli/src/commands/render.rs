use std::path::Path;

use kiln_build::DockerfileGenerator;

pub fn render(context: &Path) -> anyhow::Result<()> {
    let (_, recipe) = super::load_recipe(context)?;
    print!("{}", DockerfileGenerator::new(&recipe).render());
    Ok(())
}
