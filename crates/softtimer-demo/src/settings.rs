//! Resolution of the timer configuration from defaults, a YAML file and
//! command-line overrides, in that order of precedence (last wins).

use serde::Deserialize;
use softtimer::TimerConfig;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DemoError;

/// Settings accepted in the YAML config file. Every key is optional.
///
/// ```yaml
/// pool_capacity: 8
/// bucket_count: 10
/// tick_ms: 100
/// tick_queue_depth: 256
/// worker_name: demo-timers
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub pool_capacity: Option<usize>,
    pub bucket_count: Option<usize>,
    pub tick_ms: Option<u64>,
    pub tick_queue_depth: Option<usize>,
    pub worker_name: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Overrides {
    pub pool_size: Option<usize>,
    pub tick_ms: Option<u64>,
    pub buckets: Option<usize>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, DemoError> {
        let text = fs::read_to_string(path).map_err(|source| DemoError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| DemoError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    fn apply(self, config: &mut TimerConfig) {
        if let Some(capacity) = self.pool_capacity {
            config.pool_capacity = capacity;
        }
        if let Some(buckets) = self.bucket_count {
            config.bucket_count = buckets;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period = Duration::from_millis(ms);
        }
        if let Some(depth) = self.tick_queue_depth {
            config.tick_queue_depth = depth;
        }
        if let Some(name) = self.worker_name {
            config.worker_name = name;
        }
    }
}

impl Overrides {
    fn apply(self, config: &mut TimerConfig) {
        if let Some(capacity) = self.pool_size {
            config.pool_capacity = capacity;
        }
        if let Some(buckets) = self.buckets {
            config.bucket_count = buckets;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period = Duration::from_millis(ms);
        }
    }
}

/// Build and validate the configuration the demo runs with.
pub fn resolve(file: Option<&Path>, overrides: Overrides) -> Result<TimerConfig, DemoError> {
    let mut config = TimerConfig::default();
    if let Some(path) = file {
        FileSettings::load(path)?.apply(&mut config);
    }
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn defaults_without_file_or_flags() -> TestResult {
        let config = resolve(None, Overrides::default())?;
        assert_eq!(config, TimerConfig::default());
        Ok(())
    }

    #[test]
    fn flags_override_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "pool_capacity: 4\ntick_ms: 20\nworker_name: yaml-timers")?;

        let overrides = Overrides {
            tick_ms: Some(5),
            ..Overrides::default()
        };
        let config = resolve(Some(file.path()), overrides)?;
        assert_eq!(config.pool_capacity, 4);
        assert_eq!(config.tick_period, Duration::from_millis(5));
        assert_eq!(config.worker_name, "yaml-timers");
        assert_eq!(config.bucket_count, 10);
        Ok(())
    }

    #[test]
    fn empty_file_is_defaults() -> TestResult {
        assert_eq!(FileSettings::parse("  \n")?, FileSettings::default());
        Ok(())
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(FileSettings::parse("pool_size: 3").is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let overrides = Overrides {
            pool_size: Some(0),
            ..Overrides::default()
        };
        assert!(matches!(
            resolve(None, overrides),
            Err(DemoError::Timer(softtimer::TimerError::InvalidConfiguration(_)))
        ));
    }

    #[test]
    fn huge_tick_period_fails_validation() {
        let overrides = Overrides {
            tick_ms: Some(u64::MAX),
            ..Overrides::default()
        };
        assert!(matches!(
            resolve(None, overrides),
            Err(DemoError::Timer(softtimer::TimerError::InvalidConfiguration(_)))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("/nonexistent/softtimer.yaml");
        match resolve(Some(path), Overrides::default()) {
            Err(DemoError::ConfigRead { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected ConfigRead, got {other:?}"),
        }
    }
}
