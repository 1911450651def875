//! Simulator configuration
//!
//! Built in three layers: defaults, then environment variables (after
//! `dotenvy` has loaded any `.env`), then an optional JSON file. Command-line
//! flags are applied last by the binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zpd_algo::{BayesianConfig, EntropyConfig, KlUcbConfig, ZpdesConfig, DEFAULT_NGRAM_SIZE};

use crate::error::{Result, SimError};

/// Largest operand length; keeps sums well inside i64
pub const MAX_DIGITS: u32 = 9;

// ==================== Logging ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub file_logs: bool,
    pub log_dir: PathBuf,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            file_logs: var("ENABLE_FILE_LOGS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            log_dir: var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
        }
    }
}

// ==================== Simulation ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimConfig {
    /// Seed shared by problem generation, learners and estimators
    pub seed: Option<u64>,
    /// Addition problems generated per operand length
    pub problems_per_digit: usize,
    /// Operand lengths 1..=max_digits
    pub max_digits: u32,
    pub ngram_size: usize,
    /// Safety stop for simulated ZPDES sessions
    pub max_zpdes_trials: usize,
    pub bayesian: BayesianConfig,
    pub entropy: EntropyConfig,
    pub kl_ucb: KlUcbConfig,
    pub zpdes: ZpdesConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            problems_per_digit: 15,
            max_digits: 4,
            ngram_size: DEFAULT_NGRAM_SIZE,
            max_zpdes_trials: 100_000,
            bayesian: BayesianConfig::default(),
            entropy: EntropyConfig::default(),
            kl_ucb: KlUcbConfig::default(),
            zpdes: ZpdesConfig::default(),
        }
    }
}

/// Partial overlay read from a JSON file; absent keys keep their value
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub seed: Option<u64>,
    pub problems_per_digit: Option<usize>,
    pub max_digits: Option<u32>,
    pub ngram_size: Option<usize>,
    pub max_zpdes_trials: Option<usize>,
    pub bayesian: Option<BayesianConfig>,
    pub entropy: Option<EntropyConfig>,
    pub kl_ucb: Option<KlUcbConfig>,
    pub zpdes: Option<ZpdesConfig>,
}

impl SimConfig {
    /// Defaults overridden by `ZPD_SEED`, `ZPD_PROBLEMS_PER_DIGIT`, `ZPD_MAX_DIGITS`, `ZPD_NGRAM_SIZE`
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| var(name).and_then(|value| value.trim().parse::<u64>().ok());

        Self {
            seed: parsed("ZPD_SEED").or(defaults.seed),
            problems_per_digit: parsed("ZPD_PROBLEMS_PER_DIGIT")
                .map(|v| v as usize)
                .unwrap_or(defaults.problems_per_digit),
            max_digits: parsed("ZPD_MAX_DIGITS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_digits),
            ngram_size: parsed("ZPD_NGRAM_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.ngram_size),
            ..defaults
        }
    }

    /// Environment, then the JSON file at `path` if given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_env();
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        Ok(config)
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
            path: display.clone(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|source| SimError::ConfigParse { path: display, source })?;
        self.apply(file);
        Ok(())
    }

    pub fn apply(&mut self, file: ConfigFile) {
        if file.seed.is_some() {
            self.seed = file.seed;
        }
        if let Some(v) = file.problems_per_digit {
            self.problems_per_digit = v;
        }
        if let Some(v) = file.max_digits {
            self.max_digits = v;
        }
        if let Some(v) = file.ngram_size {
            self.ngram_size = v;
        }
        if let Some(v) = file.max_zpdes_trials {
            self.max_zpdes_trials = v;
        }
        if let Some(v) = file.bayesian {
            self.bayesian = v;
        }
        if let Some(v) = file.entropy {
            self.entropy = v;
        }
        if let Some(v) = file.kl_ucb {
            self.kl_ucb = v;
        }
        if let Some(v) = file.zpdes {
            self.zpdes = v;
        }
    }

    /// Push the shared n-gram size and seed down into the estimator configs
    ///
    /// Estimator seeds set explicitly are kept; derived ones are offset so the
    /// prior draw and the ZPDES sampler do not share a stream.
    pub fn resolved(mut self) -> Self {
        self.entropy.ngram_size = self.ngram_size;
        self.kl_ucb.ngram_size = self.ngram_size;
        if let Some(seed) = self.seed {
            self.bayesian.seed.get_or_insert(seed.wrapping_add(1));
            self.zpdes.seed.get_or_insert(seed.wrapping_add(2));
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.problems_per_digit == 0 {
            return Err(SimError::InvalidValue {
                name: "problems_per_digit",
                value: self.problems_per_digit.to_string(),
            });
        }
        if !(1..=MAX_DIGITS).contains(&self.max_digits) {
            return Err(SimError::InvalidValue {
                name: "max_digits",
                value: self.max_digits.to_string(),
            });
        }
        self.bayesian.validate()?;
        self.entropy.validate()?;
        self.kl_ucb.validate()?;
        self.zpdes.validate()?;
        Ok(())
    }

    /// Operand length -> number of problems to generate
    pub fn digit_counts(&self) -> BTreeMap<u32, usize> {
        (1..=self.max_digits).map(|d| (d, self.problems_per_digit)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = SimConfig::from_vars(vars(&[("ZPD_SEED", "42"), ("ZPD_PROBLEMS_PER_DIGIT", "5")]));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.problems_per_digit, 5);
        assert_eq!(config.max_digits, 4);
    }

    #[test]
    fn test_unparsable_env_falls_back() {
        let config = SimConfig::from_vars(vars(&[("ZPD_NGRAM_SIZE", "three")]));
        assert_eq!(config.ngram_size, DEFAULT_NGRAM_SIZE);
    }

    #[test]
    fn test_log_settings() {
        let settings = LogSettings::from_vars(vars(&[("ENABLE_FILE_LOGS", "1"), ("RUST_LOG", "debug")]));
        assert!(settings.file_logs);
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.log_dir, PathBuf::from("./logs"));
    }

    #[test]
    fn test_file_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_digits": 2, "zpdes": {{"d": 4, "h": 0.75}}}}"#).unwrap();

        let mut config = SimConfig::default();
        config.apply_file(file.path()).unwrap();
        assert_eq!(config.max_digits, 2);
        assert_eq!(config.zpdes.d, 4);
        // Missing keys inside a section take the section defaults
        assert_eq!(config.zpdes.gamma, 0.3);
        assert_eq!(config.problems_per_digit, 15);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"digits": 2}}"#).unwrap();
        let result = SimConfig::default().apply_file(file.path());
        assert!(matches!(result, Err(SimError::ConfigParse { .. })));
    }

    #[test]
    fn test_resolved_propagates_shared_settings() {
        let config = SimConfig {
            seed: Some(10),
            ngram_size: 2,
            ..SimConfig::default()
        }
        .resolved();

        assert_eq!(config.entropy.ngram_size, 2);
        assert_eq!(config.kl_ucb.ngram_size, 2);
        assert_eq!(config.bayesian.seed, Some(11));
        assert_eq!(config.zpdes.seed, Some(12));
    }

    #[test]
    fn test_validate() {
        assert!(SimConfig::default().validate().is_ok());
        let config = SimConfig {
            max_digits: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidValue { name: "max_digits", .. })
        ));
    }
}
