use std::path::Path;

use kiln_core::KilnConfig;

pub fn init(context: &Path) -> anyhow::Result<()> {
    let path = KilnConfig::write_default(context)?;

    println!("Created {}", path.display());
    println!("Edit it to change the base image, packages, or entrypoint, then run `kiln build`.");
    Ok(())
}
