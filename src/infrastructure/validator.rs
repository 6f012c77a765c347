//! Local check of an image pair with the challenge's own validator binary
//!
//! The binary is run as `<program> <username> <img1> <img2>`; exit status 0
//! means the pair passes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::infrastructure::error::{SolverError, SolverResult};

/// Outcome of a validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { code: Option<i32>, stderr: String },
}

impl Verdict {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[async_trait]
pub trait ImageValidator: Send + Sync {
    async fn validate(&self, username: &str, first: &Path, second: &Path) -> SolverResult<Verdict>;
}

/// Runs the validator binary as a child process
#[derive(Debug, Clone)]
pub struct ProcessValidator {
    program: PathBuf,
}

impl ProcessValidator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ImageValidator for ProcessValidator {
    async fn validate(&self, username: &str, first: &Path, second: &Path) -> SolverResult<Verdict> {
        let output = Command::new(&self.program)
            .arg(username)
            .arg(first)
            .arg(second)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SolverError::Validator {
                program: self.program.display().to_string(),
                message: e.to_string(),
            })?;

        debug!(
            "Validator exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).trim()
        );

        if output.status.success() {
            Ok(Verdict::Accepted)
        } else {
            Ok(Verdict::Rejected {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Accepts every pair; used when no validator binary is available
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipValidator;

#[async_trait]
impl ImageValidator for SkipValidator {
    async fn validate(&self, _username: &str, _first: &Path, _second: &Path) -> SolverResult<Verdict> {
        Ok(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skip_validator_accepts() {
        let verdict = SkipValidator
            .validate("user", Path::new("a.png"), Path::new("b.png"))
            .await
            .unwrap();
        assert!(verdict.is_accepted());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_exit_status_maps_to_verdict() {
        let accepted = ProcessValidator::new("true")
            .validate("user", Path::new("a.png"), Path::new("b.png"))
            .await
            .unwrap();
        assert_eq!(accepted, Verdict::Accepted);

        let rejected = ProcessValidator::new("false")
            .validate("user", Path::new("a.png"), Path::new("b.png"))
            .await
            .unwrap();
        assert!(matches!(rejected, Verdict::Rejected { code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_passed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("check.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n[ \"$1\" = \"alice\" ] && [ \"$2\" = \"one.png\" ] && [ \"$3\" = \"two.png\" ]\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let validator = ProcessValidator::new(&script);
        let ok = validator
            .validate("alice", Path::new("one.png"), Path::new("two.png"))
            .await
            .unwrap();
        assert!(ok.is_accepted());

        let swapped = validator
            .validate("alice", Path::new("two.png"), Path::new("one.png"))
            .await
            .unwrap();
        assert!(!swapped.is_accepted());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let err = ProcessValidator::new("/nonexistent/brachiosaure")
            .validate("user", Path::new("a.png"), Path::new("b.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Validator { .. }));
        assert!(!err.is_retryable());
    }
}
