//! Immutable extraction and data-source configuration.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SEQ_LENGTH: usize = 730;
pub const NULL_GROUP_ID: i64 = 204;

pub const OUTLIER_THRESHOLDS: [f64; 7] = [
    500.0,
    5_000.0,
    10_000.0,
    30_000.0,
    50_000.0,
    100_000.0,
    1_000_000.0,
];

pub const IMPORTANT_GROUPS: [i64; 51] = [
    0, 1, 2, 3, 4, 5, 7, 8, 9, 11, 12, 13, 14, 15, 16, 18, 147, 20, 21, 23, 24, 25, 26, 151, 28,
    29, 31, 32, 34, 35, 36, 37, 39, 43, 44, 46, 50, 55, 57, 59, 61, 64, 69, 80, 81, 82, 105, 109,
    110, 112, 123,
];

pub const VALIDATION_SALT: &str = "GSvsdv[f30-fj[23pmf'\x0b,mf]4[0-fj[9q03j[f3vf,;\\w,c03jrf23";
pub const DEFAULT_NUM_BINS: u64 = 10;
pub const DEFAULT_TRAIN_BINS: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggLevel {
    pub name: String,
    pub duration_days: i64,
    pub n_buckets: usize,
}

impl AggLevel {
    pub fn new(name: &str, duration_days: i64, n_buckets: usize) -> Self {
        Self {
            name: name.to_string(),
            duration_days,
            n_buckets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub seq_length: usize,
    pub null_group_id: i64,
    pub outlier_thresholds: Vec<f64>,
    pub important_groups: Vec<i64>,
    pub agg_levels: Vec<AggLevel>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            seq_length: SEQ_LENGTH,
            null_group_id: NULL_GROUP_ID,
            outlier_thresholds: OUTLIER_THRESHOLDS.to_vec(),
            important_groups: IMPORTANT_GROUPS.to_vec(),
            agg_levels: vec![AggLevel::new("month", 30, 25), AggLevel::new("quarter", 90, 9)],
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seq_length == 0 {
            return Err(ConfigError::Invalid("seq_length must be > 0".to_string()));
        }

        if self
            .outlier_thresholds
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(ConfigError::Invalid(
                "outlier_thresholds must be strictly ascending".to_string(),
            ));
        }
        if self.outlier_thresholds.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::Invalid(
                "outlier_thresholds must be finite".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for group in &self.important_groups {
            if !seen.insert(*group) {
                return Err(ConfigError::Invalid(format!(
                    "important_groups contains duplicate code {group}"
                )));
            }
        }

        let mut names = HashSet::new();
        for level in &self.agg_levels {
            if level.duration_days <= 0 || level.n_buckets == 0 {
                return Err(ConfigError::Invalid(format!(
                    "agg level '{}' needs duration_days > 0 and n_buckets > 0",
                    level.name
                )));
            }
            if !names.insert(level.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "agg level name '{}' is not unique",
                    level.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub salt: String,
    pub num_bins: u64,
    pub train_bins: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            salt: VALIDATION_SALT.to_string(),
            num_bins: DEFAULT_NUM_BINS,
            train_bins: DEFAULT_TRAIN_BINS,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_bins == 0 {
            return Err(ConfigError::Invalid("num_bins must be > 0".to_string()));
        }
        if self.train_bins > self.num_bins {
            return Err(ConfigError::Invalid(format!(
                "train_bins ({}) must not exceed num_bins ({})",
                self.train_bins, self.num_bins
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    pub transactions_path: PathBuf,
    pub targets_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            transactions_path: PathBuf::from("data/transactions_train.csv"),
            targets_path: PathBuf::from("data/train_target.csv"),
            output_dir: PathBuf::from("data/features"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub fn data_source_config_from_env() -> DataSourceConfig {
    let mut config = DataSourceConfig::default();

    if let Some(path) = non_empty_var("TXFEAT_TRANSACTIONS_PATH") {
        config.transactions_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty_var("TXFEAT_TARGETS_PATH") {
        config.targets_path = PathBuf::from(path);
    }
    if let Some(path) = non_empty_var("TXFEAT_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(path);
    }

    config
}

pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Serializes tests that mutate process environment.
#[cfg(test)]
pub(crate) fn env_lock() -> &'static std::sync::Mutex<()> {
    static ENV_LOCK: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    ENV_LOCK.get_or_init(|| std::sync::Mutex::new(()))
}
