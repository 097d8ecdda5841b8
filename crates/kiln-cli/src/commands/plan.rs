use std::path::Path;

pub fn plan(context: &Path) -> anyhow::Result<()> {
    let (config, recipe) = super::load_recipe(context)?;
    let tag = config.image_tag(context)?;

    println!("base: {}", recipe.base);
    println!("tag:  {tag}");
    println!();
    for (i, step) in recipe.steps.iter().enumerate() {
        println!("{:>2}. {:<20} {}", i + 1, step.kind(), step.describe());
    }
    Ok(())
}
