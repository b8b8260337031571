//! Distributional statistics of transaction amounts.
//!
//! Fixed-duration levels emit six stats per bucket over the full bucket
//! skeleton, then the same six stats over each per-bucket series. Outlier
//! columns interleave the flag and the flagged amount for min, max and sum.

use crate::config::{AggLevel, ExtractionConfig};
use crate::dataset::Transaction;
use crate::dates::DATE_CYCLES;
use crate::stats::{describe, HighLevelStat, DESCRIBE_LABELS, HIGH_LEVEL_STATS};

pub fn money_feature_names(cfg: &ExtractionConfig) -> Vec<String> {
    let mut names: Vec<String> = DESCRIBE_LABELS
        .iter()
        .map(|label| format!("amount_{label}"))
        .collect();

    for cycle in DATE_CYCLES {
        for bucket in 0..cycle.period() {
            for label in DESCRIBE_LABELS {
                names.push(format!("amount_{}_{bucket}_{label}", cycle.as_str()));
            }
        }
    }

    for level in &cfg.agg_levels {
        for bucket in 0..level.n_buckets {
            for stat in HIGH_LEVEL_STATS {
                names.push(format!("{}_{bucket}_{}", level.name, stat.as_str()));
            }
        }
        for stat in HIGH_LEVEL_STATS {
            for outer in HIGH_LEVEL_STATS {
                names.push(format!(
                    "{}_{}_{}",
                    level.name,
                    stat.as_str(),
                    outer.as_str()
                ));
            }
        }
    }

    for threshold in &cfg.outlier_thresholds {
        for agg in ["min", "max", "sum"] {
            names.push(format!("outlier_{threshold}_flag_{agg}"));
            names.push(format!("outlier_{threshold}_amount_{agg}"));
        }
    }

    names
}

pub fn money_features(transactions: &[Transaction], cfg: &ExtractionConfig) -> Vec<f64> {
    let amounts: Vec<f64> = transactions.iter().map(|txn| txn.amount_rur).collect();
    let mut out = Vec::with_capacity(money_feature_names(cfg).len());
    out.extend_from_slice(&describe(&amounts));
    out.extend(cycle_summaries(transactions));
    for level in &cfg.agg_levels {
        out.extend(level_aggregates(transactions, level));
    }
    out.extend(outlier_features(transactions, &cfg.outlier_thresholds));
    out
}

pub fn cycle_summaries(transactions: &[Transaction]) -> Vec<f64> {
    let mut out = Vec::new();
    for cycle in DATE_CYCLES {
        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); cycle.period()];
        for txn in transactions {
            buckets[cycle.convert(txn.trans_date)].push(txn.amount_rur);
        }
        for bucket in &buckets {
            out.extend_from_slice(&describe(bucket));
        }
    }
    out
}

pub fn level_aggregates(transactions: &[Transaction], level: &AggLevel) -> Vec<f64> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); level.n_buckets];
    for txn in transactions {
        let bucket_id = txn.trans_date.div_euclid(level.duration_days);
        if let Ok(idx) = usize::try_from(bucket_id) {
            if let Some(bucket) = buckets.get_mut(idx) {
                bucket.push(txn.amount_rur);
            }
        }
    }

    let width = HIGH_LEVEL_STATS.len();
    let mut out = Vec::with_capacity(level.n_buckets * width + width * width);
    let mut series: Vec<Vec<f64>> = vec![Vec::with_capacity(level.n_buckets); width];
    for bucket in &buckets {
        for (stat_idx, stat) in HIGH_LEVEL_STATS.iter().enumerate() {
            let value = if bucket.is_empty() {
                0.0
            } else {
                stat.apply(bucket)
            };
            out.push(value);
            series[stat_idx].push(value);
        }
    }

    for values in &series {
        for outer in HIGH_LEVEL_STATS {
            out.push(outer.apply(values));
        }
    }

    out
}

pub fn outlier_features(transactions: &[Transaction], thresholds: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(thresholds.len() * 6);
    for threshold in thresholds {
        let flags: Vec<f64> = transactions
            .iter()
            .map(|txn| if txn.amount_rur > *threshold { 1.0 } else { 0.0 })
            .collect();
        let flagged: Vec<f64> = transactions
            .iter()
            .filter(|txn| txn.amount_rur > *threshold)
            .map(|txn| txn.amount_rur)
            .collect();
        for stat in [HighLevelStat::Min, HighLevelStat::Max, HighLevelStat::Sum] {
            out.push(stat.apply(&flags));
            out.push(stat.apply(&flagged));
        }
    }
    out
}
