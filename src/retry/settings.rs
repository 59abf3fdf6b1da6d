use super::{Backoff, RetryConfig, DEFAULT_RETRY_DELAY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry knobs as they appear in configuration files.
///
/// ```toml
/// [retry]
/// start_timeout = "5m"
/// tries = 11
///
/// [retry.backoff]
/// initial = "200ms"
/// max = "30s"
/// multiplier = 2.0
/// ```
///
/// When `backoff` is absent, attempts are spaced by the fixed `delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    #[serde(with = "humantime_serde")]
    pub start_timeout: Duration,

    pub tries: u32,

    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    pub backoff: Option<BackoffSettings>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            start_timeout: Duration::ZERO,
            tries: 0,
            delay: DEFAULT_RETRY_DELAY,
            backoff: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(with = "humantime_serde")]
    pub initial: Duration,

    #[serde(default, with = "humantime_serde")]
    pub max: Duration,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    2.0
}

impl BackoffSettings {
    pub fn to_backoff(&self) -> Backoff {
        Backoff::new(self.initial, self.max, self.multiplier)
    }
}

impl RetrySettings {
    /// Build a fresh policy; predicates are added by the caller
    pub fn to_config(&self) -> RetryConfig {
        let config = RetryConfig::new()
            .with_start_timeout(self.start_timeout)
            .with_tries(self.tries);

        match &self.backoff {
            Some(backoff) => config.with_backoff(backoff.to_backoff()),
            None => config.with_fixed_delay(self.delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_backoff() {
        let settings: RetrySettings = toml::from_str(
            r#"
            start_timeout = "5m"
            tries = 11

            [backoff]
            initial = "200ms"
            max = "30s"
            "#,
        )
        .unwrap();

        assert_eq!(settings.start_timeout, Duration::from_secs(300));
        assert_eq!(settings.tries, 11);
        assert_eq!(settings.delay, DEFAULT_RETRY_DELAY);

        let backoff = settings.backoff.unwrap();
        assert_eq!(backoff.initial, Duration::from_millis(200));
        assert_eq!(backoff.max, Duration::from_secs(30));
        assert_eq!(backoff.multiplier, 2.0);
    }

    #[test]
    fn test_empty_table_uses_defaults() {
        let settings: RetrySettings = toml::from_str("").unwrap();
        assert_eq!(settings, RetrySettings::default());
    }

    #[test]
    fn test_backoff_settings_build_linear_backoff() {
        let settings = BackoffSettings {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(3),
            multiplier: 2.0,
        };
        let mut backoff = settings.to_backoff();
        assert_eq!(backoff.linear(), Duration::from_secs(1));
        assert_eq!(backoff.linear(), Duration::from_secs(2));
        assert_eq!(backoff.linear(), Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_bad_duration() {
        let result: Result<RetrySettings, _> = toml::from_str(r#"delay = "soon""#);
        assert!(result.is_err());
    }
}
