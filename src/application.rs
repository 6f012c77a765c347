//! Application layer
//!
//! Use cases that wire the domain to the infrastructure: generating an image
//! pair for one username, and the solve loop around it.

pub mod keygen;
pub mod solver;

pub use keygen::{GeneratedImages, KeygenService};
pub use solver::{AttemptStats, ChallengeSolver, FlagOutcome, SolverSettings};
