//! Deterministic client partitioning for reproducible train/validation splits.
//!
//! A client's bucket is `md5(salt ++ client_id) mod num_bins`, reading the
//! digest as a big-endian 128-bit integer. The salt and digest are part of the
//! contract: changing either reshuffles every previously published split.

use std::collections::{HashMap, HashSet};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, SplitConfig};
use crate::dataset::{TargetRow, Transaction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid hex digest: '{0}'")]
    InvalidHash(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBin {
    pub client_id: String,
    pub bin: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetSplit {
    pub train_transactions: Vec<Transaction>,
    pub valid_transactions: Vec<Transaction>,
    pub train_targets: Vec<TargetRow>,
    pub valid_targets: Vec<TargetRow>,
}

pub fn client_id_hash(salt: &str, client_id: &str) -> String {
    hex::encode(salted_digest(salt, client_id))
}

pub fn hash_bin(hash_hex: &str, num_bins: u64) -> Result<u64, SplitError> {
    let value = u128::from_str_radix(hash_hex, 16)
        .map_err(|_| SplitError::InvalidHash(hash_hex.to_string()))?;
    let bin = value
        .checked_rem(u128::from(num_bins))
        .ok_or_else(|| ConfigError::Invalid("num_bins must be > 0".to_string()))?;
    Ok(bin as u64)
}

pub fn client_bucket(client_id: &str, cfg: &SplitConfig) -> Result<u64, SplitError> {
    cfg.validate()?;
    Ok(bucket_of(client_id, cfg))
}

pub fn client_id_bins<'a, I>(
    client_ids: I,
    cfg: &SplitConfig,
) -> Result<Vec<ClientBin>, SplitError>
where
    I: IntoIterator<Item = &'a str>,
{
    cfg.validate()?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for client_id in client_ids {
        if seen.insert(client_id) {
            out.push(ClientBin {
                client_id: client_id.to_string(),
                bin: bucket_of(client_id, cfg),
            });
        }
    }
    Ok(out)
}

pub fn validation_split(
    transactions: &[Transaction],
    targets: &[TargetRow],
    cfg: &SplitConfig,
) -> Result<DatasetSplit, SplitError> {
    let bins = client_id_bins(
        targets
            .iter()
            .map(|row| row.client_id.as_str())
            .chain(transactions.iter().map(|txn| txn.client_id.as_str())),
        cfg,
    )?;
    let is_train: HashMap<&str, bool> = bins
        .iter()
        .map(|entry| (entry.client_id.as_str(), entry.bin < cfg.train_bins))
        .collect();
    let train_side = |client_id: &str| is_train.get(client_id).copied().unwrap_or(false);

    let mut split = DatasetSplit::default();
    for txn in transactions {
        if train_side(txn.client_id.as_str()) {
            split.train_transactions.push(txn.clone());
        } else {
            split.valid_transactions.push(txn.clone());
        }
    }
    for row in targets {
        if train_side(row.client_id.as_str()) {
            split.train_targets.push(row.clone());
        } else {
            split.valid_targets.push(row.clone());
        }
    }

    info!(
        component = "split",
        event = "split.finish",
        clients = bins.len(),
        num_bins = cfg.num_bins,
        train_bins = cfg.train_bins,
        train_targets = split.train_targets.len(),
        valid_targets = split.valid_targets.len(),
        train_transactions = split.train_transactions.len(),
        valid_transactions = split.valid_transactions.len()
    );

    Ok(split)
}

fn bucket_of(client_id: &str, cfg: &SplitConfig) -> u64 {
    let digest = salted_digest(&cfg.salt, client_id);
    (u128::from_be_bytes(digest) % u128::from(cfg.num_bins)) as u64
}

fn salted_digest(salt: &str, client_id: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(client_id.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}
