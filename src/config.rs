use std::time::Duration;

/// Default resampling interval for both the CPU and network samplers.
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Tunables for a [`Probe`](crate::probe::Probe).
///
/// The intervals control how often the background samplers take a fresh
/// counter snapshot. They affect freshness of the reported rates, not
/// correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Interval between CPU tick snapshots.
    pub cpu_sample_interval: Duration,
    /// Interval between network byte-counter snapshots.
    pub net_sample_interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cpu_sample_interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            net_sample_interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }
}

impl ProbeConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `SYSPROBE_CPU_INTERVAL_MS` and
    /// `SYSPROBE_NET_INTERVAL_MS`, both in milliseconds. Unparseable values
    /// are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(interval) = interval_from_env("SYSPROBE_CPU_INTERVAL_MS") {
            config.cpu_sample_interval = interval;
        }
        if let Some(interval) = interval_from_env("SYSPROBE_NET_INTERVAL_MS") {
            config.net_sample_interval = interval;
        }
        config
    }
}

fn interval_from_env(var: &str) -> Option<Duration> {
    let raw = std::env::var(var).ok()?;
    parse_interval(&raw, var)
}

/// Parses a millisecond interval, rejecting zero (which would spin the
/// sampling loop).
fn parse_interval(raw: &str, var: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            log::warn!("{var} must be nonzero, ignoring");
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            log::warn!("{var}={raw:?} is not a valid interval: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.cpu_sample_interval, Duration::from_millis(1000));
        assert_eq!(config.net_sample_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_parse_interval_valid() {
        assert_eq!(
            parse_interval("250", "TEST_VAR"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            parse_interval(" 2000 ", "TEST_VAR"),
            Some(Duration::from_millis(2000))
        );
    }

    #[test]
    fn test_parse_interval_rejects_zero() {
        assert_eq!(parse_interval("0", "TEST_VAR"), None);
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert_eq!(parse_interval("fast", "TEST_VAR"), None);
        assert_eq!(parse_interval("-5", "TEST_VAR"), None);
    }
}
