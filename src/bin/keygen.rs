//! Generate the image pair for a single username
//!
//! ```bash
//! keygen RXvB1WwdAXe7i65KE1km2GxP9Uy --output-dir out
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use brachiosaure_solver_lib::application::KeygenService;
use brachiosaure_solver_lib::infrastructure::{ConfigManager, ImageStore, brachiosaure, logging};

#[derive(Parser, Debug)]
#[command(name = "keygen", version, about = "Forge img1.png / img2.png for one username")]
struct Cli {
    /// Username shown on the challenge page
    #[arg(default_value = brachiosaure::SAMPLE_USERNAME)]
    username: String,

    /// Config file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the two images
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Fixed noise seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config()?;
    if let Some(output_dir) = &cli.output_dir {
        config.keygen.output_dir.clone_from(output_dir);
    }
    // Files only clutter a one-shot run
    config.logging.file_output = false;

    logging::init_logging_with_config(&config.logging)?;
    info!("{}", manager.source_description());
    config.validate().context("Invalid configuration")?;

    let service = match cli.seed {
        Some(seed) => KeygenService::with_seed(&config.keygen, seed)?,
        None => KeygenService::new(&config.keygen)?,
    };

    let generated = service.generate(&cli.username)?;
    if !generated.pair.multiplies_to_identity() {
        bail!("generated pair does not multiply to the identity");
    }

    let store = ImageStore::new(
        config.keygen.first_image_path(),
        config.keygen.second_image_path(),
    );
    store.write_pair(&generated.pair)?;

    info!(
        "Wrote {:?} and {:?} (QR version {}, fingerprint {})",
        store.first_path(),
        store.second_path(),
        generated.qr_version,
        generated.pair.fingerprint()
    );
    Ok(())
}
