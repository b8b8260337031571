//! Date-aligned, fixed-length `(small_group, amount)` sequences.
//!
//! One slot per date in `[0, seq_length)`. Same-date rows collapse to the
//! largest amount and the first row wins an exact tie.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExtractionConfig;
use crate::dataset::{write_matrix, ClientIndex, TargetRow, Transaction};
use crate::features::FeatureError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub small_group_seq: Vec<i64>,
    pub money_seq: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesBatch {
    pub client_ids: Vec<String>,
    pub small_group_seq: Vec<Vec<i64>>,
    pub money_seq: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesPaths {
    pub small_group_seq: PathBuf,
    pub money_seq: PathBuf,
}

impl TimeSeriesPaths {
    pub fn in_dir(dir: &Path, prefix: &str) -> Self {
        Self {
            small_group_seq: dir.join(format!("{prefix}_small_group_seq.csv")),
            money_seq: dir.join(format!("{prefix}_money_seq.csv")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesExtractor {
    cfg: ExtractionConfig,
}

impl TimeSeriesExtractor {
    pub fn new(cfg: ExtractionConfig) -> Result<Self, FeatureError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn seq_length(&self) -> usize {
        self.cfg.seq_length
    }

    pub fn extract(&self, transactions: &[Transaction]) -> TimeSeries {
        let len = self.cfg.seq_length;
        let mut kept: Vec<Option<&Transaction>> = vec![None; len];
        for txn in transactions {
            let Ok(idx) = usize::try_from(txn.trans_date) else {
                continue;
            };
            let Some(slot) = kept.get_mut(idx) else {
                continue;
            };
            let replace = match *slot {
                Some(current) => txn.amount_rur > current.amount_rur,
                None => true,
            };
            if replace {
                *slot = Some(txn);
            }
        }

        let mut small_group_seq = Vec::with_capacity(len);
        let mut money_seq = Vec::with_capacity(len);
        for slot in kept {
            match slot {
                Some(txn) => {
                    small_group_seq.push(txn.small_group.unwrap_or(self.cfg.null_group_id));
                    money_seq.push(txn.amount_rur);
                }
                None => {
                    small_group_seq.push(self.cfg.null_group_id);
                    money_seq.push(0.0);
                }
            }
        }

        TimeSeries {
            small_group_seq,
            money_seq,
        }
    }

    pub fn extract_from_dataset(
        &self,
        transactions: &[Transaction],
        targets: &[TargetRow],
    ) -> Result<TimeSeriesBatch, FeatureError> {
        if transactions.is_empty() {
            return Err(FeatureError::EmptyTransactions);
        }
        if targets.is_empty() {
            return Err(FeatureError::EmptyTargets);
        }

        let index = ClientIndex::new(transactions);
        let series: Vec<TimeSeries> = targets
            .par_iter()
            .map(|row| self.extract(index.slice(&row.client_id)))
            .collect();

        let mut batch = TimeSeriesBatch {
            client_ids: targets.iter().map(|row| row.client_id.clone()).collect(),
            ..TimeSeriesBatch::default()
        };
        for ts in series {
            batch.small_group_seq.push(ts.small_group_seq);
            batch.money_seq.push(ts.money_seq);
        }

        info!(
            component = "timeseries",
            event = "timeseries.batch.finish",
            rows = batch.client_ids.len(),
            seq_length = self.cfg.seq_length
        );

        Ok(batch)
    }

    pub fn write(
        &self,
        batch: &TimeSeriesBatch,
        paths: &TimeSeriesPaths,
    ) -> Result<(), FeatureError> {
        let columns: Vec<String> = (0..self.cfg.seq_length).map(|d| format!("d{d}")).collect();
        write_matrix(
            &paths.small_group_seq,
            &columns,
            &batch.client_ids,
            &batch.small_group_seq,
        )?;
        write_matrix(&paths.money_seq, &columns, &batch.client_ids, &batch.money_seq)?;
        Ok(())
    }
}
