mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kiln",
    about = "Provision runnable container images from a build context"
)]
#[command(version)]
struct Cli {
    /// Build context directory
    #[arg(long, short = 'C', global = true, default_value = ".")]
    context: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default kiln.toml
    Init,
    /// Show the provisioning steps in execution order
    Plan,
    /// Print the equivalent Dockerfile
    Render,
    /// Eject the Dockerfile for manual customization
    Eject,
    /// Build the image
    Build {
        /// Image tag (overrides [image].tag)
        #[arg(long, short = 't')]
        tag: Option<String>,
        /// Build with `docker build` from the rendered or ejected Dockerfile
        #[arg(long)]
        dockerfile: bool,
        /// Print the build outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a container from the built image
    Run {
        /// Image tag (overrides [image].tag)
        #[arg(long, short = 't')]
        tag: Option<String>,
    },
    /// Check Docker setup and build context readiness
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = cli.context.as_path();

    match cli.command {
        Commands::Init => commands::init(context)?,
        Commands::Plan => commands::plan(context)?,
        Commands::Render => commands::render(context)?,
        Commands::Eject => commands::eject(context)?,
        Commands::Build {
            tag,
            dockerfile,
            json,
        } => commands::build(context, tag.as_deref(), dockerfile, json).await?,
        Commands::Run { tag } => {
            let code = commands::run(context, tag.as_deref()).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Doctor => commands::doctor(context).await?,
    }

    Ok(())
}
