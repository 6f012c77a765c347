//! Solve loop entry point
//!
//! ```bash
//! brachiosaure-solver --validator ./brachiosaure
//! brachiosaure-solver --skip-validation --max-attempts 20
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use brachiosaure_solver_lib::application::{ChallengeSolver, KeygenService, SolverSettings};
use brachiosaure_solver_lib::infrastructure::{
    AppConfig, ConfigManager, FlagExtractor, HttpChallengeGateway, ImageStore, ImageValidator,
    ProcessValidator, SkipValidator, logging,
};

#[derive(Parser, Debug)]
#[command(name = "brachiosaure-solver", version, about = "Solve the Brachiosaure challenge end to end")]
struct Cli {
    /// Config file (JSON or TOML); defaults to the per-user config if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Challenge landing page
    #[arg(long)]
    base_url: Option<String>,

    /// Validator binary to check images with before uploading
    #[arg(long)]
    validator: Option<String>,

    /// Upload without checking images locally
    #[arg(long)]
    skip_validation: bool,

    /// Give up after this many attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Directory for img1.png / img2.png
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.challenge.base_url.clone_from(base_url);
        }
        if let Some(program) = &self.validator {
            config.validator.program.clone_from(program);
            config.validator.enabled = true;
        }
        if self.skip_validation {
            config.validator.enabled = false;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.solver.max_attempts = max_attempts;
        }
        if let Some(output_dir) = &self.output_dir {
            config.keygen.output_dir.clone_from(output_dir);
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config()?;
    cli.apply(&mut config);

    logging::init_logging_with_config(&config.logging)?;
    logging::log_system_info();
    info!("{}", manager.source_description());

    config.validate().context("Invalid configuration")?;

    if cli.write_config {
        manager.save_config(&config).await?;
        return Ok(());
    }

    let validator: Arc<dyn ImageValidator> = if config.validator.enabled {
        info!("🔍 Validating images with {}", config.validator.program);
        Arc::new(ProcessValidator::new(&config.validator.program))
    } else {
        warn!("Local validation disabled, every pair goes straight to the server");
        Arc::new(SkipValidator)
    };

    let mut solver = ChallengeSolver::new(
        Arc::new(HttpChallengeGateway::new(&config.challenge)?),
        validator,
        KeygenService::new(&config.keygen)?,
        ImageStore::new(
            config.keygen.first_image_path(),
            config.keygen.second_image_path(),
        ),
        FlagExtractor::new(&config.challenge.flag_pattern)?,
        SolverSettings::from_config(&config.solver),
    )?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Interrupted, stopping after the current step");
            ctrl_c.cancel();
        }
    });

    match solver.run(cancel).await {
        Ok(outcome) => {
            println!("{}", outcome.flag);
            info!(
                "Solved as {} after {} attempt(s)",
                outcome.username, outcome.attempts
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            Err(e.into())
        }
    }
}
