//! Engine configuration.

use std::time::Duration;

/// Configuration error (malformed environment values).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Job service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobServiceConfig {
    /// Number of worker threads executing runners.
    pub worker_count: usize,
    /// Time-to-live for jobs whose specification does not set one.
    pub default_time_to_live: Duration,
    /// How often the maintenance thread sweeps expired jobs.
    pub maintenance_interval: Duration,
    /// Prefix for worker thread names and log fields.
    pub name: String,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            default_time_to_live: Duration::from_secs(2 * 60 * 60),
            maintenance_interval: Duration::from_secs(5 * 60),
            name: "job-worker".to_string(),
        }
    }
}

impl JobServiceConfig {
    /// Defaults overridden by `DEPOT_JOB_WORKERS`, `DEPOT_JOB_TTL_SECS` and
    /// `DEPOT_JOB_MAINTENANCE_SECS` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(workers) = parse_u64(&lookup, "DEPOT_JOB_WORKERS")? {
            if workers == 0 {
                return Err(ConfigError::Invalid {
                    var: "DEPOT_JOB_WORKERS",
                    value: workers.to_string(),
                    reason: "at least one worker is required".to_string(),
                });
            }
            config.worker_count = workers as usize;
        }

        if let Some(secs) = parse_u64(&lookup, "DEPOT_JOB_TTL_SECS")? {
            config.default_time_to_live = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_u64(&lookup, "DEPOT_JOB_MAINTENANCE_SECS")? {
            config.maintenance_interval = Duration::from_secs(secs.max(1));
        }

        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_default_time_to_live(mut self, ttl: Duration) -> Self {
        self.default_time_to_live = ttl;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = JobServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, JobServiceConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = JobServiceConfig::from_lookup(lookup(&[
            ("DEPOT_JOB_WORKERS", "2"),
            ("DEPOT_JOB_TTL_SECS", "60"),
            ("DEPOT_JOB_MAINTENANCE_SECS", " 10 "),
        ]))
        .unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.default_time_to_live, Duration::from_secs(60));
        assert_eq!(config.maintenance_interval, Duration::from_secs(10));
    }

    #[test]
    fn malformed_and_zero_workers_are_rejected() {
        let err = JobServiceConfig::from_lookup(lookup(&[("DEPOT_JOB_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEPOT_JOB_TTL_SECS", .. }));

        let err = JobServiceConfig::from_lookup(lookup(&[("DEPOT_JOB_WORKERS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEPOT_JOB_WORKERS", .. }));
    }
}
