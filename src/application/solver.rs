//! The solve loop
//!
//! Every attempt starts from scratch: fresh username, fresh images, local
//! validation, upload. The loop ends on the first response carrying a flag,
//! on cancellation, or when the optional attempt budget runs out.

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::keygen::KeygenService;
use crate::infrastructure::challenge_gateway::ChallengeGateway;
use crate::infrastructure::config::SolverConfig;
use crate::infrastructure::error::{SolverError, SolverResult};
use crate::infrastructure::html_parser::FlagExtractor;
use crate::infrastructure::image_store::ImageStore;
use crate::infrastructure::validator::{ImageValidator, Verdict};

/// Loop pacing and budget
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub attempt_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl SolverSettings {
    #[must_use]
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            attempt_interval: Duration::from_millis(config.attempt_interval_ms),
            max_attempts: (config.max_attempts > 0).then_some(config.max_attempts),
        }
    }
}

/// A successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagOutcome {
    pub flag: String,
    pub username: String,
    pub attempts: u32,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptStats {
    pub attempts: u32,
    pub invalid_images: u32,
    pub refusals: u32,
    pub transport_errors: u32,
}

enum AttemptOutcome {
    Flag { flag: String, username: String },
    InvalidImages,
    Refused,
}

pub struct ChallengeSolver {
    gateway: Arc<dyn ChallengeGateway>,
    validator: Arc<dyn ImageValidator>,
    keygen: KeygenService,
    store: ImageStore,
    flags: FlagExtractor,
    settings: SolverSettings,
    pacer: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    stats: AttemptStats,
}

impl ChallengeSolver {
    pub fn new(
        gateway: Arc<dyn ChallengeGateway>,
        validator: Arc<dyn ImageValidator>,
        keygen: KeygenService,
        store: ImageStore,
        flags: FlagExtractor,
        settings: SolverSettings,
    ) -> SolverResult<Self> {
        let quota = Quota::with_period(settings.attempt_interval).ok_or_else(|| {
            SolverError::configuration("solver.attempt_interval_ms", "must be greater than 0")
        })?;

        Ok(Self {
            gateway,
            validator,
            keygen,
            store,
            flags,
            settings,
            pacer: RateLimiter::direct(quota),
            stats: AttemptStats::default(),
        })
    }

    #[must_use]
    pub const fn stats(&self) -> AttemptStats {
        self.stats
    }

    /// Loop until a flag comes back
    pub async fn run(&mut self, cancel: CancellationToken) -> SolverResult<FlagOutcome> {
        let result = self.run_inner(&cancel).await;
        self.log_summary();
        result
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> SolverResult<FlagOutcome> {
        loop {
            if let Some(max) = self.settings.max_attempts {
                if self.stats.attempts >= max {
                    return Err(SolverError::AttemptsExhausted {
                        attempts: self.stats.attempts,
                    });
                }
            }

            // Don't get banned for bruteforcing
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SolverError::Cancelled),
                () = self.pacer.until_ready() => {},
            }

            self.stats.attempts += 1;
            let attempt = self.stats.attempts;
            info!("🔄 Attempt {}", attempt);

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SolverError::Cancelled),
                result = self.attempt() => result,
            };

            match outcome {
                Ok(AttemptOutcome::Flag { flag, username }) => {
                    info!("🏁 Got the flag: {}", flag);
                    return Ok(FlagOutcome {
                        flag,
                        username,
                        attempts: attempt,
                    });
                }
                Ok(AttemptOutcome::InvalidImages) => {
                    self.stats.invalid_images += 1;
                    warn!("Images are not valid, trying again...");
                }
                Ok(AttemptOutcome::Refused) => {
                    self.stats.refusals += 1;
                    warn!("Server refused the images, trying again...");
                }
                Err(e) if e.is_retryable() => {
                    self.stats.transport_errors += 1;
                    warn!("⚠️  Attempt {} failed: {}", attempt, e);
                    if let Some(seconds) = e.retry_delay_seconds() {
                        tokio::select! {
                            () = tokio::time::sleep(Duration::from_secs(seconds)) => {},
                            () = cancel.cancelled() => return Err(SolverError::Cancelled),
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self) -> SolverResult<AttemptOutcome> {
        let username = self.gateway.fetch_username().await?;

        info!("Generating images...");
        let generated = self.keygen.generate(&username)?;
        self.store.write_pair(&generated.pair)?;
        info!("Images generation OK");

        let verdict = self
            .validator
            .validate(&username, self.store.first_path(), self.store.second_path())
            .await?;
        if let Verdict::Rejected { code, stderr } = verdict {
            if !stderr.is_empty() {
                warn!("Validator exited with {:?}: {}", code, stderr);
            }
            return Ok(AttemptOutcome::InvalidImages);
        }

        info!("✅ Found valid images for username {}", username);
        let response = match self
            .gateway
            .submit(self.store.first_path(), self.store.second_path())
            .await
        {
            Ok(body) => body,
            // A 4xx answer to the upload is the server turning the images down
            Err(SolverError::HttpRequestFailed { status, .. })
                if (400..500).contains(&status) && status != 429 =>
            {
                warn!("Upload answered with status {}", status);
                return Ok(AttemptOutcome::Refused);
            }
            Err(e) => return Err(e),
        };

        Ok(match self.flags.find(&response) {
            Some(flag) => AttemptOutcome::Flag { flag, username },
            None => AttemptOutcome::Refused,
        })
    }

    fn log_summary(&self) {
        let s = self.stats;
        info!(
            "📊 attempts={} invalid_images={} refusals={} transport_errors={}",
            s.attempts, s.invalid_images, s.refusals, s.transport_errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_zero_means_unlimited() {
        let settings = SolverSettings::from_config(&SolverConfig {
            attempt_interval_ms: 250,
            max_attempts: 0,
        });
        assert_eq!(settings.max_attempts, None);
        assert_eq!(settings.attempt_interval, Duration::from_millis(250));

        let settings = SolverSettings::from_config(&SolverConfig {
            attempt_interval_ms: 1,
            max_attempts: 3,
        });
        assert_eq!(settings.max_attempts, Some(3));
    }
}
