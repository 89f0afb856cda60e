//! Offline catalog preparation: normalize brand exports, then build vectors.

use clap::{Parser, Subcommand};
use clozyt_recommender_api::{
    config::Config,
    scripts::{build_index, normalize_catalog},
};
use log::info;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalog-tool")]
#[command(about = "Prepare catalog and vector artifacts for the recommender", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge per-brand CSV exports into catalog.csv
    Normalize {
        /// Directory holding one <brand>_products.csv per brand
        #[arg(short, long, default_value = "./data/brands")]
        brands_dir: PathBuf,

        /// Output catalog path
        #[arg(short, long, default_value = "./data/catalog.csv")]
        out: PathBuf,
    },

    /// Encode catalog.csv and write the vector artifacts
    Build {
        /// Artifact directory; defaults to the configured data_dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clozyt_recommender_api=info,catalog_tool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { brands_dir, out } => {
            let catalog = normalize_catalog(&brands_dir, &out)?;
            info!("✅ Normalized {} items into {}", catalog.len(), out.display());
        }
        Commands::Build { data_dir } => {
            let config = Config::load()?;
            let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
            let meta = build_index(&config, &data_dir).await?;
            info!(
                "✅ Built {} index over {} items in {}",
                meta.kind,
                meta.count,
                data_dir.display()
            );
        }
    }

    Ok(())
}
