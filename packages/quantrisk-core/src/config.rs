//! Runtime settings resolved from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::var::MonteCarloConfig;
use crate::{Error, Result};

pub const DATA_DIR_VAR: &str = "QUANTRISK_DATA_DIR";
pub const HISTORY_FILE_VAR: &str = "QUANTRISK_HISTORY_FILE";
pub const MC_SAMPLES_VAR: &str = "QUANTRISK_MC_SAMPLES";
pub const MC_SEED_VAR: &str = "QUANTRISK_MC_SEED";

/// Settings shared by the CLI and embedding callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding `<SYMBOL>.csv` price files
    pub data_dir: PathBuf,
    /// Analysis history JSON file
    pub history_file: PathBuf,
    /// Monte Carlo draw count and optional seed
    pub monte_carlo: MonteCarloConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            history_file: default_history_path(),
            monte_carlo: MonteCarloConfig::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from `QUANTRISK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let history_file = lookup(HISTORY_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or(defaults.history_file);

        let samples = match lookup(MC_SAMPLES_VAR) {
            Some(raw) => parse_var::<usize>("samples", &raw)?,
            None => defaults.monte_carlo.samples,
        };
        let seed = lookup(MC_SEED_VAR)
            .map(|raw| parse_var::<u64>("seed", &raw))
            .transpose()?;

        Ok(Self {
            data_dir,
            history_file,
            monte_carlo: MonteCarloConfig { samples, seed },
        })
    }
}

/// Default history path: `~/.quantrisk/history.json`.
pub fn default_history_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".quantrisk/history.json"))
        .unwrap_or_else(|| PathBuf::from("history.json"))
}

fn parse_var<T: FromStr>(name: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::invalid(name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.monte_carlo, MonteCarloConfig::default());
        assert!(settings.history_file.ends_with("history.json"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/srv/prices"),
            (HISTORY_FILE_VAR, "/tmp/h.json"),
            (MC_SAMPLES_VAR, "10000"),
            (MC_SEED_VAR, "42"),
        ]))
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/srv/prices"));
        assert_eq!(settings.history_file, PathBuf::from("/tmp/h.json"));
        assert_eq!(settings.monte_carlo.samples, 10_000);
        assert_eq!(settings.monte_carlo.seed, Some(42));
    }

    #[test]
    fn test_unparseable_samples() {
        let result = Settings::from_lookup(lookup(&[(MC_SAMPLES_VAR, "lots")]));
        assert!(matches!(
            result,
            Err(Error::InvalidParameter {
                name: "samples",
                ..
            })
        ));
    }
}
