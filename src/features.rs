//! Global per-client feature vectors.
//!
//! A vector is the concatenation of the date block, the money block and the
//! category block, in that order, followed by one NaN-to-zero pass. Its
//! length depends only on the extraction config, never on the client.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ExtractionConfig};
use crate::dataset::{
    write_atomic, write_matrix, ClientIndex, DatasetError, FeatureMatrix, TargetRow, Transaction,
};
use crate::dates::{date_feature_names, date_features};
use crate::groups::{group_feature_names, group_features};
use crate::money::{money_feature_names, money_features};
use crate::stats::nan_to_num;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDType {
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dtype: FeatureDType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no transactions supplied")]
    EmptyTransactions,
    #[error("target table is empty")]
    EmptyTargets,
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

pub fn build_feature_schema(cfg: &ExtractionConfig) -> FeatureSchema {
    let columns: Vec<FeatureColumn> = date_feature_names()
        .into_iter()
        .chain(money_feature_names(cfg))
        .chain(group_feature_names(&cfg.important_groups))
        .map(|name| FeatureColumn {
            name,
            dtype: FeatureDType::F64,
        })
        .collect();

    let fingerprint = schema_fingerprint(cfg, &columns);

    info!(
        component = "features",
        event = "features.schema.built",
        version = FEATURE_SCHEMA_VERSION,
        column_count = columns.len(),
        fingerprint = fingerprint
    );

    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), FeatureError> {
    if expected_version != actual.version {
        return Err(FeatureError::SchemaVersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(FeatureError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct GlobalFeatureExtractor {
    cfg: ExtractionConfig,
    schema: FeatureSchema,
}

impl GlobalFeatureExtractor {
    pub fn new(cfg: ExtractionConfig) -> Result<Self, FeatureError> {
        cfg.validate()?;
        let schema = build_feature_schema(&cfg);
        Ok(Self { cfg, schema })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.cfg
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_len(&self) -> usize {
        self.schema.columns.len()
    }

    pub fn extract(&self, transactions: &[Transaction]) -> Vec<f64> {
        let mut features = Vec::with_capacity(self.feature_len());
        features.extend(date_features(transactions));
        features.extend(money_features(transactions, &self.cfg));
        features.extend(group_features(transactions, &self.cfg.important_groups));
        nan_to_num(&mut features);
        features
    }

    pub fn extract_from_dataset(
        &self,
        transactions: &[Transaction],
        targets: &[TargetRow],
    ) -> Result<FeatureMatrix, FeatureError> {
        if transactions.is_empty() {
            return Err(FeatureError::EmptyTransactions);
        }
        if targets.is_empty() {
            return Err(FeatureError::EmptyTargets);
        }

        info!(
            component = "features",
            event = "features.batch.start",
            targets = targets.len(),
            transactions = transactions.len(),
            feature_len = self.feature_len()
        );

        let index = ClientIndex::new(transactions);
        let rows: Vec<Vec<f64>> = targets
            .par_iter()
            .map(|row| self.extract(index.slice(&row.client_id)))
            .collect();
        let clients_without_transactions = targets
            .iter()
            .filter(|row| index.slice(&row.client_id).is_empty())
            .count();

        info!(
            component = "features",
            event = "features.batch.finish",
            rows = rows.len(),
            clients_without_transactions = clients_without_transactions
        );

        Ok(FeatureMatrix {
            columns: self.schema.column_names(),
            client_ids: targets.iter().map(|row| row.client_id.clone()).collect(),
            rows,
        })
    }

    pub fn write(&self, matrix: &FeatureMatrix, path: &Path) -> Result<PathBuf, FeatureError> {
        write_matrix(path, &matrix.columns, &matrix.client_ids, &matrix.rows)?;
        let schema_path = schema_path_for(path);
        let payload = serde_json::to_vec_pretty(&self.schema)?;
        write_atomic(&schema_path, &payload)?;
        Ok(schema_path)
    }
}

pub fn schema_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(".schema.json");
    path.with_file_name(name)
}

fn schema_fingerprint(cfg: &ExtractionConfig, columns: &[FeatureColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{FEATURE_SCHEMA_VERSION};"));
    hasher.update("thresholds:");
    for threshold in &cfg.outlier_thresholds {
        hasher.update(format!("{threshold},"));
    }
    hasher.update(";levels:");
    for level in &cfg.agg_levels {
        hasher.update(format!(
            "{}/{}/{},",
            level.name, level.duration_days, level.n_buckets
        ));
    }
    hasher.update(";columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(":f64;");
    }
    hex::encode(hasher.finalize())
}
