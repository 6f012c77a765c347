//! Brachiosaure solver
//!
//! Scrapes the username the challenge server wants, forges the two QR-derived
//! images its validator accepts, and uploads them until a flag comes back.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{ChallengeSolver, FlagOutcome, KeygenService};
pub use infrastructure::{AppConfig, SolverError, SolverResult};
