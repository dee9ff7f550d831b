mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::ConfigArgs;

#[derive(Parser)]
#[command(name = "infuse", about = "Inject files and secrets into container images")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a derived image with the assets injected
    Inject {
        /// Image descriptor (TOML) of the base image
        #[arg(long)]
        image: PathBuf,
        /// Asset manifest (TOML)
        #[arg(long)]
        assets: PathBuf,
        /// Write the derived image descriptor here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Print the Dockerfile an injection would build, without building
    Render {
        /// Image descriptor (TOML) of the base image
        #[arg(long)]
        image: PathBuf,
        /// Asset manifest (TOML)
        #[arg(long)]
        assets: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.load()?;

    match cli.command {
        Commands::Inject {
            image,
            assets,
            output,
        } => commands::inject(&config, &image, &assets, output.as_deref()).await?,
        Commands::Render { image, assets } => commands::render(&config, &image, &assets).await?,
    }

    Ok(())
}
