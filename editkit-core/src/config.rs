//! Tunables for recovery and update scheduling.
//!
//! Both configs default to the values the editor ships with and can be
//! overridden from `EDITKIT_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when a null-reference repair finds the canvas handle gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCanvasPolicy {
    /// Report the recovery as failed; the session needs re-initialization.
    /// The consumed attempt is held for `escalation_decay_ms`, so repeated
    /// detections exhaust the retry budget for a while.
    #[default]
    Escalate,
    /// Log that re-initialization is required and finish the sequence.
    LogOnly,
}

/// Configuration for the recovery coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Errors accepted per window before handling is refused.
    pub max_errors_per_window: u32,
    /// Rate-limit window length in milliseconds.
    pub window_ms: u64,
    /// Concurrent recovery attempts allowed before refusing.
    pub max_recovery_attempts: u32,
    /// Delay before a successful attempt is returned to the budget.
    pub attempt_decay_ms: u64,
    /// Delay before an attempt that ended in re-initialization is returned.
    pub escalation_decay_ms: u64,
    /// Delay before re-enabling pointer events.
    pub enable_events_delay_ms: u64,
    /// Delay before validating editor state.
    pub validate_delay_ms: u64,
    /// Missing canvas handling during null-reference repair.
    pub missing_canvas: MissingCanvasPolicy,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_errors_per_window: 10,
            window_ms: 60_000,
            max_recovery_attempts: 3,
            attempt_decay_ms: 5_000,
            escalation_decay_ms: 30_000,
            enable_events_delay_ms: 100,
            validate_delay_ms: 200,
            missing_canvas: MissingCanvasPolicy::Escalate,
        }
    }
}

impl RecoveryConfig {
    /// Defaults overridden by environment variables.
    ///
    /// Reads `EDITKIT_MAX_ERRORS_PER_MINUTE`, `EDITKIT_RATE_WINDOW_MS`,
    /// `EDITKIT_MAX_RECOVERY_ATTEMPTS`, `EDITKIT_ATTEMPT_DECAY_MS`,
    /// `EDITKIT_ESCALATION_DECAY_MS` and `EDITKIT_MISSING_CANVAS` (`escalate` or `log_only`). Unparseable
    /// values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_errors_per_window: env_or(
                "EDITKIT_MAX_ERRORS_PER_MINUTE",
                defaults.max_errors_per_window,
            ),
            window_ms: env_or("EDITKIT_RATE_WINDOW_MS", defaults.window_ms),
            max_recovery_attempts: env_or(
                "EDITKIT_MAX_RECOVERY_ATTEMPTS",
                defaults.max_recovery_attempts,
            ),
            attempt_decay_ms: env_or("EDITKIT_ATTEMPT_DECAY_MS", defaults.attempt_decay_ms),
            escalation_decay_ms: env_or(
                "EDITKIT_ESCALATION_DECAY_MS",
                defaults.escalation_decay_ms,
            ),
            missing_canvas: match std::env::var("EDITKIT_MISSING_CANVAS").as_deref() {
                Ok("log_only") => MissingCanvasPolicy::LogOnly,
                Ok("escalate") | Err(_) => MissingCanvasPolicy::Escalate,
                Ok(other) => {
                    tracing::warn!("Ignoring EDITKIT_MISSING_CANVAS={other}");
                    defaults.missing_canvas
                }
            },
            ..defaults
        }
    }

    /// Rate-limit window.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Attempt decay delay.
    #[must_use]
    pub fn attempt_decay(&self) -> Duration {
        Duration::from_millis(self.attempt_decay_ms)
    }

    /// Decay delay for attempts that ended in re-initialization.
    #[must_use]
    pub fn escalation_decay(&self) -> Duration {
        Duration::from_millis(self.escalation_decay_ms)
    }

    /// Delay before re-enabling pointer events.
    #[must_use]
    pub fn enable_events_delay(&self) -> Duration {
        Duration::from_millis(self.enable_events_delay_ms)
    }

    /// Delay before validating editor state.
    #[must_use]
    pub fn validate_delay(&self) -> Duration {
        Duration::from_millis(self.validate_delay_ms)
    }
}

/// Configuration for the update scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet period before a sync fires, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { debounce_ms: 150 }
    }
}

impl SchedulerConfig {
    /// Create a config with the given debounce period.
    #[must_use]
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        Self { debounce_ms }
    }

    /// Defaults overridden by `EDITKIT_DEBOUNCE_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            debounce_ms: env_or("EDITKIT_DEBOUNCE_MS", Self::default().debounce_ms),
        }
    }

    /// Debounce period.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {key}={raw}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_defaults() {
        let config = RecoveryConfig::default();
        assert_eq!(config.max_errors_per_window, 10);
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.max_recovery_attempts, 3);
        assert_eq!(config.attempt_decay(), Duration::from_secs(5));
        assert_eq!(config.escalation_decay(), Duration::from_secs(30));
        assert_eq!(config.enable_events_delay(), Duration::from_millis(100));
        assert_eq!(config.validate_delay(), Duration::from_millis(200));
        assert_eq!(config.missing_canvas, MissingCanvasPolicy::Escalate);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecoveryConfig =
            serde_json::from_str(r#"{"max_recovery_attempts": 5, "missing_canvas": "log_only"}"#)
                .expect("should deserialize");
        assert_eq!(config.max_recovery_attempts, 5);
        assert_eq!(config.missing_canvas, MissingCanvasPolicy::LogOnly);
        assert_eq!(config.max_errors_per_window, 10);
    }

    #[test]
    fn test_scheduler_defaults() {
        assert_eq!(SchedulerConfig::default().debounce(), Duration::from_millis(150));
        assert_eq!(SchedulerConfig::with_debounce_ms(20).debounce_ms, 20);
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("EDITKIT_TEST_UNSET_VARIABLE", 7_u32), 7);
    }
}
