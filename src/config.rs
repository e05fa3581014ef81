//! Environment-driven configuration for the `artisan` binary.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::{ConsoleError, Result};
use crate::process::{Factory, DEFAULT_TIMEOUT};

/// Settings read from `ARTISAN_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Default timeout for processes; `None` lets them run forever.
    pub process_timeout: Option<Duration>,
    /// Answer every prompt with its default.
    pub no_interaction: bool,
    /// Where to write a cassette of every process run, if anywhere.
    pub record_path: Option<PathBuf>,
    /// Cassette to replay processes from, if any.
    pub replay_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            process_timeout: Some(DEFAULT_TIMEOUT),
            no_interaction: false,
            record_path: None,
            replay_path: None,
        }
    }
}

impl ConsoleConfig {
    /// Reads the process environment (including anything `.env` loaded).
    ///
    /// # Errors
    ///
    /// Returns an error when a variable holds an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error when `ARTISAN_TIMEOUT` is not a whole number of
    /// seconds or `ARTISAN_NO_INTERACTION` is not a boolean.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("ARTISAN_TIMEOUT") {
            let seconds: u64 = raw.trim().parse().map_err(|_| {
                ConsoleError::config(format!("ARTISAN_TIMEOUT must be a number of seconds, got {raw:?}"))
            })?;
            config.process_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        if let Some(raw) = lookup("ARTISAN_NO_INTERACTION") {
            config.no_interaction = parse_bool(&raw).ok_or_else(|| {
                ConsoleError::config(format!("ARTISAN_NO_INTERACTION must be a boolean, got {raw:?}"))
            })?;
        }

        config.record_path = lookup("ARTISAN_RECORD").filter(|v| !v.is_empty()).map(PathBuf::from);
        config.replay_path = lookup("ARTISAN_REPLAY").filter(|v| !v.is_empty()).map(PathBuf::from);
        Ok(config)
    }

    /// Applies the process settings to `factory`: default timeout, cassette
    /// replay (with stray processes prevented) and recording.
    ///
    /// # Errors
    ///
    /// Returns an error when the replay cassette cannot be loaded.
    pub fn apply(&self, factory: &Factory) -> Result<()> {
        factory.set_default_timeout(self.process_timeout);
        if let Some(path) = &self.replay_path {
            info!(cassette = %path.display(), "replaying processes from cassette");
            factory.fake_from_cassette(path)?.prevent_stray_processes(true);
        }
        if self.record_path.is_some() {
            factory.start_recording();
        }
        Ok(())
    }

    /// Writes the recorded processes to the record path, if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error when the cassette cannot be written.
    pub fn finish_recording(&self, factory: &Factory) -> Result<Option<PathBuf>> {
        let Some(path) = &self.record_path else {
            return Ok(None);
        };
        Ok(Some(factory.save_cassette(Path::new(path), "artisan-session")?))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ConsoleConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        ConsoleConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.process_timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("ARTISAN_TIMEOUT", "5"),
            ("ARTISAN_NO_INTERACTION", "yes"),
            ("ARTISAN_RECORD", "/tmp/rec.yaml"),
            ("ARTISAN_REPLAY", "/tmp/play.yaml"),
        ])
        .unwrap();
        assert_eq!(config.process_timeout, Some(Duration::from_secs(5)));
        assert!(config.no_interaction);
        assert_eq!(config.record_path, Some(PathBuf::from("/tmp/rec.yaml")));
        assert_eq!(config.replay_path, Some(PathBuf::from("/tmp/play.yaml")));
    }

    #[test]
    fn zero_timeout_means_forever() {
        let config = config_from(&[("ARTISAN_TIMEOUT", "0")]).unwrap();
        assert_eq!(config.process_timeout, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(config_from(&[("ARTISAN_TIMEOUT", "soon")]), Err(ConsoleError::Config(_))));
        assert!(matches!(config_from(&[("ARTISAN_NO_INTERACTION", "maybe")]), Err(ConsoleError::Config(_))));
    }

    #[test]
    fn apply_sets_timeout_and_recording() {
        let factory = Factory::new();
        let config = ConsoleConfig {
            process_timeout: None,
            record_path: Some(PathBuf::from("/tmp/unused.yaml")),
            ..ConsoleConfig::default()
        };
        config.apply(&factory).unwrap();
        assert!(factory.is_recording());
        assert_eq!(factory.new_pending_process().timeout_duration(), None);
    }

    #[test]
    fn finish_recording_without_path_writes_nothing() {
        let factory = Factory::new();
        assert_eq!(ConsoleConfig::default().finish_recording(&factory).unwrap(), None);
    }
}
