//! Environment-driven station configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::database::constants::DEFAULT_DB_PATH;
use crate::error::{StationError, StationResult};
use crate::identity::DigestKind;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FAST_STORE_PATH: &str = "station_fast.json";
pub const DEFAULT_FEEDBACK_DISPLAY_MS: u64 = 7000;
pub const DEFAULT_FEEDBACK_SETTLE_MS: u64 = 600;
pub const DEFAULT_RESULTS_DELAY_MS: u64 = 1000;

/// Parse an environment variable into a type implementing FromStr, with a default fallback
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Durations of the cast feedback sequence and the results hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub feedback_display: Duration,
    pub feedback_settle: Duration,
    pub results_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            feedback_display: Duration::from_millis(DEFAULT_FEEDBACK_DISPLAY_MS),
            feedback_settle: Duration::from_millis(DEFAULT_FEEDBACK_SETTLE_MS),
            results_delay: Duration::from_millis(DEFAULT_RESULTS_DELAY_MS),
        }
    }
}

impl TimingConfig {
    /// No waiting at all. Handy for tests and scripted votes.
    pub fn immediate() -> Self {
        Self {
            feedback_display: Duration::ZERO,
            feedback_settle: Duration::ZERO,
            results_delay: Duration::ZERO,
        }
    }

    pub fn from_env() -> Self {
        Self {
            feedback_display: Duration::from_millis(env_parse(
                "FEEDBACK_DISPLAY_MS",
                DEFAULT_FEEDBACK_DISPLAY_MS,
            )),
            feedback_settle: Duration::from_millis(env_parse(
                "FEEDBACK_SETTLE_MS",
                DEFAULT_FEEDBACK_SETTLE_MS,
            )),
            results_delay: Duration::from_millis(env_parse(
                "RESULTS_DELAY_MS",
                DEFAULT_RESULTS_DELAY_MS,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub port: u16,
    pub db_path: String,
    pub fast_store_path: PathBuf,
    /// Unset means the built-in roster.
    pub candidates_path: Option<PathBuf>,
    pub timing: TimingConfig,
    pub digest: DigestKind,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: DEFAULT_DB_PATH.to_string(),
            fast_store_path: PathBuf::from(DEFAULT_FAST_STORE_PATH),
            candidates_path: None,
            timing: TimingConfig::default(),
            digest: DigestKind::default(),
        }
    }
}

impl StationConfig {
    pub fn from_env() -> StationResult<Self> {
        // An unknown digest name is refused rather than silently downgraded.
        let digest = match std::env::var("IDENTITY_DIGEST") {
            Ok(v) if !v.trim().is_empty() => v.trim().parse().map_err(StationError::Config)?,
            _ => DigestKind::default(),
        };

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            fast_store_path: std::env::var("FAST_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FAST_STORE_PATH)),
            candidates_path: std::env::var("CANDIDATES_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            timing: TimingConfig::from_env(),
            digest,
        })
    }
}
