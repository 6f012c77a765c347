//! Configuration infrastructure
//!
//! Settings are layered, later layers winning:
//! 1. Built-in defaults (`defaults` and `brachiosaure` modules below)
//! 2. Optional config file (JSON or TOML, picked by extension)
//! 3. Environment variables, e.g. `BRACHIO__SOLVER__MAX_ATTEMPTS=20`
//!
//! Command line flags are applied on top by the binaries.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::infrastructure::error::SolverError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Challenge server endpoints and page markers
    pub challenge: ChallengeConfig,

    /// QR rendering and image output
    pub keygen: KeygenConfig,

    /// Local validator binary
    pub validator: ValidatorConfig,

    /// Solve loop pacing
    pub solver: SolverConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Challenge server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Page that shows the current username
    pub base_url: String,

    /// Upload endpoint, resolved against `base_url`
    pub login_path: String,

    /// CSS selector for the username element
    pub username_selector: String,

    /// Raw markers used when the selector finds nothing
    pub username_start_marker: String,
    pub username_end_marker: String,

    /// Regex matching the flag in the upload response
    pub flag_pattern: String,

    /// Multipart field names for the two images
    pub first_upload_field: String,
    pub second_upload_field: String,

    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub follow_redirects: bool,
}

/// QR rendering and output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenConfig {
    /// Pixels per QR module
    pub box_size: u32,

    /// Light modules around the code
    pub border: u32,

    /// Error correction level: "L", "M", "Q" or "H"
    pub error_correction: String,

    /// Noise is drawn uniformly from `0..=noise_mask` and XORed into each pixel
    pub noise_mask: u8,

    /// Where img1/img2 are written
    pub output_dir: String,
    pub first_file_name: String,
    pub second_file_name: String,
}

/// Local validator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Run the validator before submitting
    pub enabled: bool,

    /// Path to the challenge binary
    pub program: String,
}

/// Solve loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Minimum time between attempts in milliseconds
    pub attempt_interval_ms: u64,

    /// Stop after this many attempts (0 = never)
    pub max_attempts: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; empty means `logs/` next to the executable
    pub log_dir: String,

    /// Log file name inside `log_dir`
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            base_url: brachiosaure::BASE_URL.to_string(),
            login_path: brachiosaure::LOGIN_PATH.to_string(),
            username_selector: brachiosaure::USERNAME_SELECTOR.to_string(),
            username_start_marker: brachiosaure::USERNAME_START_MARKER.to_string(),
            username_end_marker: brachiosaure::USERNAME_END_MARKER.to_string(),
            flag_pattern: brachiosaure::FLAG_PATTERN.to_string(),
            first_upload_field: brachiosaure::FIRST_UPLOAD_FIELD.to_string(),
            second_upload_field: brachiosaure::SECOND_UPLOAD_FIELD.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            follow_redirects: true,
        }
    }
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            box_size: defaults::BOX_SIZE,
            border: defaults::BORDER,
            error_correction: defaults::ERROR_CORRECTION.to_string(),
            noise_mask: defaults::NOISE_MASK,
            output_dir: ".".to_string(),
            first_file_name: defaults::FIRST_IMAGE_NAME.to_string(),
            second_file_name: defaults::SECOND_IMAGE_NAME.to_string(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: brachiosaure::VALIDATOR_PROGRAM.to_string(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            attempt_interval_ms: defaults::ATTEMPT_INTERVAL_MS,
            max_attempts: defaults::MAX_ATTEMPTS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: String::new(),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
        }
    }
}

impl ChallengeConfig {
    /// Absolute URL of the upload endpoint
    pub fn login_url(&self) -> Result<String, SolverError> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| SolverError::configuration("challenge.base_url", e.to_string()))?;
        let login = base
            .join(&self.login_path)
            .map_err(|e| SolverError::configuration("challenge.login_path", e.to_string()))?;
        Ok(login.to_string())
    }
}

impl KeygenConfig {
    #[must_use]
    pub fn first_image_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.first_file_name)
    }

    #[must_use]
    pub fn second_image_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.second_file_name)
    }
}

impl AppConfig {
    /// Reject settings the solver cannot run with
    pub fn validate(&self) -> Result<(), SolverError> {
        self.challenge.login_url()?;

        if self.challenge.username_selector.trim().is_empty()
            && self.challenge.username_start_marker.is_empty()
        {
            return Err(SolverError::configuration(
                "challenge.username_selector",
                "either a selector or a start marker is required",
            ));
        }

        regex::Regex::new(&self.challenge.flag_pattern)
            .map_err(|e| SolverError::configuration("challenge.flag_pattern", e.to_string()))?;

        if self.challenge.request_timeout_seconds == 0 {
            return Err(SolverError::configuration(
                "challenge.request_timeout_seconds",
                "must be greater than 0",
            ));
        }

        if self.keygen.box_size == 0 {
            return Err(SolverError::configuration("keygen.box_size", "must be greater than 0"));
        }

        if !matches!(
            self.keygen.error_correction.to_uppercase().as_str(),
            "L" | "M" | "Q" | "H"
        ) {
            return Err(SolverError::configuration(
                "keygen.error_correction",
                format!("unknown level '{}'", self.keygen.error_correction),
            ));
        }

        // Dark and light modules must stay apart after noise
        if self.keygen.noise_mask > 0x3f {
            return Err(SolverError::configuration(
                "keygen.noise_mask",
                "must not exceed 63",
            ));
        }

        if self.keygen.first_file_name == self.keygen.second_file_name {
            return Err(SolverError::configuration(
                "keygen.second_file_name",
                "both images would share one file",
            ));
        }

        if self.validator.enabled && self.validator.program.trim().is_empty() {
            return Err(SolverError::configuration(
                "validator.program",
                "empty while validation is enabled",
            ));
        }

        if self.solver.attempt_interval_ms == 0 {
            return Err(SolverError::configuration(
                "solver.attempt_interval_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
    required: bool,
    /// Stand-in for the process environment; `None` reads the real one
    env_source: Option<config::Map<String, String>>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("brachiosaure-solver");

        Ok(config_dir)
    }

    /// Manager for the per-user config file; a missing file is fine
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("config.json");
        Ok(Self {
            config_path,
            required: false,
            env_source: None,
        })
    }

    /// Manager for an explicit file, which must exist
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            required: true,
            env_source: None,
        }
    }

    /// Read `BRACHIO__*` variables from `vars` instead of the process environment
    #[must_use]
    pub fn with_env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Merge defaults, the config file and `BRACHIO__*` environment variables
    pub fn load_config(&self) -> Result<AppConfig> {
        let baseline = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let layered = config::Config::builder()
            .add_source(baseline)
            .add_source(config::File::from(self.config_path.as_path()).required(self.required))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env_source.clone()),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {:?}", self.config_path))?;

        let app_config: AppConfig = layered
            .try_deserialize()
            .context("Configuration has invalid values")?;

        Ok(app_config)
    }

    /// Save configuration to file as pretty JSON
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// One line naming where the settings came from, for the startup log
    #[must_use]
    pub fn source_description(&self) -> String {
        if self.config_path.exists() {
            format!("Loaded configuration from: {:?}", self.config_path)
        } else {
            format!("No configuration file at {:?}, using defaults", self.config_path)
        }
    }
}

/// Brachiosaure challenge endpoints and page layout
pub mod brachiosaure {
    /// Challenge page; shows a fresh username on each load
    pub const BASE_URL: &str = "https://brachiosaure.france-cybersecurity-challenge.fr/";

    /// Upload endpoint relative to `BASE_URL`
    pub const LOGIN_PATH: &str = "login";

    /// The username is the text of this element
    pub const USERNAME_SELECTOR: &str = "h4.text-warning";
    pub const USERNAME_START_MARKER: &str = r#"<h4 class="text-warning">"#;
    pub const USERNAME_END_MARKER: &str = "</h4>";

    pub const FLAG_PATTERN: &str = r"FCSC\{[^}]*\}";

    pub const FIRST_UPLOAD_FIELD: &str = "upload1";
    pub const SECOND_UPLOAD_FIELD: &str = "upload2";

    /// Validator shipped with the challenge, called as `<program> <username> <img1> <img2>`
    pub const VALIDATOR_PROGRAM: &str = "./brachiosaure";

    /// Username used by the keygen when none is given
    pub const SAMPLE_USERNAME: &str = "RXvB1WwdAXe7i65KE1km2GxP9Uy";
}

/// Default configuration values
pub mod defaults {
    pub const ENV_PREFIX: &str = "BRACHIO";

    pub const USER_AGENT: &str = "brachiosaure-solver/0.1";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    // Keygen
    pub const BOX_SIZE: u32 = 2;
    pub const BORDER: u32 = 2;
    pub const ERROR_CORRECTION: &str = "L";
    pub const NOISE_MASK: u8 = 7;
    pub const FIRST_IMAGE_NAME: &str = "img1.png";
    pub const SECOND_IMAGE_NAME: &str = "img2.png";

    // Solver
    /// One attempt per second keeps us from getting banned
    pub const ATTEMPT_INTERVAL_MS: u64 = 1000;
    pub const MAX_ATTEMPTS: u32 = 0;

    // Logging
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "brachiosaure-solver.log";
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;
}
