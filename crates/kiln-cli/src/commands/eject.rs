use std::path::Path;

use kiln_build::DockerfileGenerator;

pub fn eject(context: &Path) -> anyhow::Result<()> {
    let (_, recipe) = super::load_recipe(context)?;
    let dockerfile = DockerfileGenerator::new(&recipe).render();

    let path = kiln_build::eject::eject(context, &dockerfile)?;

    println!("Ejected Dockerfile to {}", path.display());
    println!("You can now edit it directly. `kiln build --dockerfile` will use this file.");
    Ok(())
}
