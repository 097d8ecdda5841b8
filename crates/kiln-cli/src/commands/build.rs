use std::path::Path;

use kiln_build::{DockerfileGenerator, stage_context};
use kiln_core::{ImageRef, KilnConfig, Recipe};
use kiln_engine::{BuildOutcome, DockerClient, Pipeline};

pub async fn build(
    context: &Path,
    tag: Option<&str>,
    dockerfile: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (config, recipe) = super::load_recipe(context)?;
    let tag = match tag {
        Some(t) => ImageRef::parse(t)?,
        None => config.image_tag(context)?,
    };
    let client = DockerClient::new();

    if dockerfile {
        return build_from_dockerfile(&client, context, &config, &recipe, &tag).await;
    }

    let outcome = Pipeline::new(&client, &recipe)
        .run(context, &config.context, &tag)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

async fn build_from_dockerfile(
    client: &DockerClient,
    context: &Path,
    config: &KilnConfig,
    recipe: &Recipe,
    tag: &ImageRef,
) -> anyhow::Result<()> {
    let content = if kiln_build::eject::is_ejected(context) {
        tracing::info!("using ejected .kiln/Dockerfile");
        kiln_build::eject::load_ejected_dockerfile(context)?
    } else {
        DockerfileGenerator::new(recipe).render()
    };

    let staged = stage_context(context, &config.context)?;
    let dockerfile_path = staged.write_dockerfile(&content)?;
    tracing::info!(files = staged.files.len(), tag = %tag, "running docker build");

    client.build(&dockerfile_path, &staged.dir, tag).await?;

    println!("Built {tag}");
    Ok(())
}

fn print_outcome(outcome: &BuildOutcome) {
    for step in &outcome.steps {
        println!("[{}/{}] {}", step.index, outcome.steps.len(), step.description);
    }
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    println!();
    println!("Built {} ({})", outcome.manifest.tag, outcome.image_id);
    println!("  entrypoint: {}", outcome.manifest.entrypoint.join(" "));
}
