//! Infrastructure layer: configuration, logging and everything that touches
//! the network, the filesystem or a child process.

pub mod challenge_gateway;
pub mod config;
pub mod error;
pub mod html_parser;
pub mod http_client;
pub mod image_store;
pub mod logging;
pub mod qr_encoder;
pub mod validator;

// Re-export commonly used items
pub use challenge_gateway::{ChallengeGateway, HttpChallengeGateway};
pub use config::{AppConfig, ConfigManager, brachiosaure};
pub use error::{SolverError, SolverResult};
pub use html_parser::{FlagExtractor, UsernameExtractor};
pub use http_client::{HttpClient, HttpClientConfig};
pub use image_store::ImageStore;
pub use logging::{init_logging, init_logging_with_config};
pub use qr_encoder::{QrEncoder, QrGrid};
pub use validator::{ImageValidator, ProcessValidator, SkipValidator, Verdict};
