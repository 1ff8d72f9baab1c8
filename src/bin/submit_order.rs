use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use tracing::info;

use order_relay::config;
use order_relay::model::{slot_label, Field, ImageAsset, SLOT_COUNT};
use order_relay::orchestrator::{FormSettings, Notice, OrderForm, ResubmissionForm};
use order_relay::prefill::Prefill;
use order_relay::transport::RelayClient;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Fill in the order form from the command line and submit it to a relay"
)]
struct Args {
    /// Path to YAML config file (image rules and QR settings)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Site hosting the form; the relay is reached at `/api/orders` under it
    #[arg(long, default_value = "http://127.0.0.1:8080/")]
    site_url: Url,
    /// API base replacing `/api` (absolute, or a path on the site); orders go to `{base}/orders`
    #[arg(long)]
    api_base: Option<String>,
    /// Landing URL whose query string pre-fills the form
    #[arg(long)]
    prefill_url: Option<Url>,
    #[arg(long)]
    order_number: Option<String>,
    #[arg(long)]
    creator_name: Option<String>,
    #[arg(long)]
    quantity: Option<String>,
    #[arg(long)]
    submitted_url: Option<String>,
    #[arg(long)]
    confirmation_link: Option<String>,
    #[arg(long)]
    message: Option<String>,
    /// Image file for the next free slot; repeat up to five times
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Prepare a resubmission for this order id instead of a new order
    #[arg(long)]
    resubmit: Option<String>,
}

impl Args {
    fn edits(&self) -> Vec<(Field, &str)> {
        [
            (Field::OrderNumber, &self.order_number),
            (Field::CreatorName, &self.creator_name),
            (Field::QuantityOrdered, &self.quantity),
            (Field::SubmittedUrl, &self.submitted_url),
            (Field::OrderConfirmationLink, &self.confirmation_link),
            (Field::Message, &self.message),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }
}

async fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageAsset>> {
    if paths.len() > SLOT_COUNT {
        bail!("at most {} images can be attached", SLOT_COUNT);
    }
    let mut assets = Vec::with_capacity(paths.len());
    for path in paths {
        let asset = ImageAsset::from_path(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        assets.push(asset);
    }
    Ok(assets)
}

fn print_notice(notice: Option<&Notice>) {
    match notice {
        Some(Notice::UploadError(entry)) => println!("Upload rejected: {}", entry),
        Some(Notice::ValidationErrors(entries)) => {
            println!("Please fix the following:");
            for entry in entries {
                println!("  - {}", entry);
            }
        }
        Some(Notice::SubmitError(message)) => println!("Submission failed: {}", message),
        Some(Notice::Submitted) => println!("Order submitted."),
        None => {}
    }
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
    let images = load_images(&args.images).await?;

    if let Some(order_id) = &args.resubmit {
        let mut form = ResubmissionForm::new(cfg.image_constraints()).set_order_id(order_id.as_str());
        for (slot, asset) in images.into_iter().enumerate() {
            form = form.attach_image(slot, asset);
            print_notice(form.notice());
        }
        return match form.prepare() {
            Ok(prepared) => {
                println!("Resubmission ready for {}:", prepared.order_id);
                for image in &prepared.images {
                    println!("  {} ({} bytes)", image.file_name, image.size());
                }
                Ok(())
            }
            Err(form) => {
                print_notice(form.notice());
                bail!("resubmission is incomplete");
            }
        };
    }

    let mut form = OrderForm::new(FormSettings::from(&cfg));
    if let Some(url) = &args.prefill_url {
        let prefill = Prefill::from_url(url);
        info!(fields = ?prefill, "applying prefill");
        form = form.with_prefill(&prefill);
    }
    for (field, value) in args.edits() {
        form = form.edit(field, value);
    }
    for (slot, asset) in images.into_iter().enumerate() {
        form = form.attach_image(slot, asset);
        if form.notice().is_some() {
            print_notice(form.notice());
            bail!("{} was not accepted", slot_label(slot));
        }
    }

    let endpoint = RelayClient::endpoint_for(&args.site_url, args.api_base.as_deref())?;
    let client = RelayClient::new(endpoint)?;
    let form = form.submit(&client).await;
    print_notice(form.notice());
    match form.notice() {
        Some(Notice::Submitted) => Ok(()),
        _ => bail!("order was not submitted"),
    }
}
