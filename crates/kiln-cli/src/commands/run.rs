use std::path::Path;

use kiln_core::{ImageRef, KilnConfig};
use kiln_engine::DockerClient;

/// Start a container from the built image. Returns the container's exit code.
pub async fn run(context: &Path, tag: Option<&str>) -> anyhow::Result<i32> {
    let tag = match tag {
        Some(t) => ImageRef::parse(t)?,
        None => KilnConfig::load(context)?.image_tag(context)?,
    };

    tracing::info!(tag = %tag, "starting container");
    let code = DockerClient::new().run(&tag).await?;
    if code != 0 {
        tracing::warn!(tag = %tag, code, "container exited with non-zero status");
    }
    Ok(code)
}
