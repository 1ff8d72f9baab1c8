use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use order_relay::config;
use order_relay::image_check::validate_image;
use order_relay::model::ImageAsset;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Check local image files against the upload rules and print a verdict for each"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Image files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let constraints = cfg.image_constraints();

    let mut rejected = 0usize;
    for path in &args.files {
        let asset = ImageAsset::from_path(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        match validate_image(&asset, &constraints) {
            Ok(dims) => println!("OK    {} ({}×{})", path.display(), dims.width, dims.height),
            Err(reason) => {
                rejected += 1;
                println!("FAIL  {}: {}", path.display(), reason);
            }
        }
    }
    if rejected > 0 {
        bail!("{} of {} images rejected", rejected, args.files.len());
    }
    Ok(())
}
