use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Tunables for attempt sessions.
#[derive(Debug, Clone)]
pub struct AttemptConfig {
    /// Countdown length, in ticks.
    pub duration_ticks: u32,
    /// Length of one tick.
    pub tick: Duration,
    /// Upper bound on a single result write.
    pub persist_timeout: Duration,
    /// Writes allowed before the attempt is marked failed.
    pub max_persist_attempts: u32,
    /// Name recorded when the timer submits an attempt without one.
    pub default_student_name: String,
    /// Backoff used when a timer-triggered submission hits a transient store error.
    pub expiry_retry: RetryConfig,
}

/// Name used when neither the student nor the configuration supplies one.
pub const FALLBACK_STUDENT_NAME: &str = "Anonymous";

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            duration_ticks: 600,
            tick: Duration::from_secs(1),
            persist_timeout: Duration::from_secs(5),
            max_persist_attempts: 3,
            default_student_name: FALLBACK_STUDENT_NAME.into(),
            expiry_retry: RetryConfig::default(),
        }
    }
}

fn parse_positive<T>(raw: Option<String>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}

fn env_positive<T>(key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    parse_positive(env::var(key).ok())
}

impl AttemptConfig {
    /// Defaults overridden by `QUIZ_*` environment variables.
    ///
    /// Unparseable or non-positive values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let duration_ticks =
            env_positive::<u32>("QUIZ_DURATION_TICKS").unwrap_or(defaults.duration_ticks);
        let tick = env_positive::<u64>("QUIZ_TICK_MILLIS")
            .map_or(defaults.tick, Duration::from_millis);
        let persist_timeout = env_positive::<u64>("QUIZ_PERSIST_TIMEOUT_MS")
            .map_or(defaults.persist_timeout, Duration::from_millis);
        let max_persist_attempts =
            env_positive::<u32>("QUIZ_PERSIST_ATTEMPTS").unwrap_or(defaults.max_persist_attempts);
        let default_student_name = env::var("QUIZ_DEFAULT_NAME")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_student_name);

        let expiry_retry = RetryConfig {
            max_attempts: usize::try_from(max_persist_attempts).unwrap_or(usize::MAX),
            ..defaults.expiry_retry
        };

        Self {
            duration_ticks,
            tick,
            persist_timeout,
            max_persist_attempts,
            default_student_name,
            expiry_retry,
        }
    }

    /// Name stored for an attempt submitted without one.
    ///
    /// Falls back to [`FALLBACK_STUDENT_NAME`] when `default_student_name` is blank.
    #[must_use]
    pub fn fallback_student_name(&self) -> &str {
        match self.default_student_name.trim() {
            "" => FALLBACK_STUDENT_NAME,
            name => name,
        }
    }

    /// Total countdown length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.tick * self.duration_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ten_minute_quiz() {
        let cfg = AttemptConfig::default();
        assert_eq!(cfg.duration(), Duration::from_secs(600));
        assert_eq!(cfg.default_student_name, "Anonymous");
        assert_eq!(cfg.max_persist_attempts, 3);
    }

    #[test]
    fn blank_default_name_falls_back() {
        let cfg = AttemptConfig {
            default_student_name: " \t".into(),
            ..AttemptConfig::default()
        };
        assert_eq!(cfg.fallback_student_name(), FALLBACK_STUDENT_NAME);

        let named = AttemptConfig {
            default_student_name: " Guest ".into(),
            ..AttemptConfig::default()
        };
        assert_eq!(named.fallback_student_name(), "Guest");
    }

    #[test]
    fn non_positive_and_garbage_values_are_ignored() {
        assert_eq!(parse_positive::<u32>(Some("0".into())), None);
        assert_eq!(parse_positive::<u32>(Some("ten".into())), None);
        assert_eq!(parse_positive::<u64>(None), None);
        assert_eq!(parse_positive::<u32>(Some(" 42 ".into())), Some(42));
    }
}
