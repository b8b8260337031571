//! Calendar-cycle features over integer day offsets.
//!
//! Months are 30 days and quarters 90 days; the cycles are approximate on
//! purpose and must not be replaced with calendar-accurate ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Transaction;
use crate::stats::{self, describe, DESCRIBE_LABELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateCycle {
    DayOfWeek,
    Month,
    Quarter,
}

pub const DATE_CYCLES: [DateCycle; 3] =
    [DateCycle::DayOfWeek, DateCycle::Month, DateCycle::Quarter];

impl DateCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DayOfWeek => "dow",
            Self::Month => "month",
            Self::Quarter => "quarter",
        }
    }

    pub fn period(self) -> usize {
        match self {
            Self::DayOfWeek => 7,
            Self::Month => 12,
            Self::Quarter => 4,
        }
    }

    pub fn convert(self, trans_date: i64) -> usize {
        match self {
            Self::DayOfWeek => day_of_week(trans_date),
            Self::Month => month(trans_date),
            Self::Quarter => quarter(trans_date),
        }
    }
}

pub fn day_of_week(trans_date: i64) -> usize {
    trans_date.rem_euclid(7) as usize
}

pub fn month(trans_date: i64) -> usize {
    trans_date.div_euclid(30).rem_euclid(12) as usize
}

pub fn quarter(trans_date: i64) -> usize {
    trans_date.div_euclid(90).rem_euclid(4) as usize
}

pub fn date_feature_names() -> Vec<String> {
    let mut names = vec!["period_length".to_string(), "date_density".to_string()];
    for cycle in DATE_CYCLES {
        let prefix = cycle.as_str();
        for bucket in 0..cycle.period() {
            names.push(format!("{prefix}_{bucket}_frac"));
        }
        for agg in ["mean", "std", "min", "max"] {
            names.push(format!("{prefix}_frac_{agg}"));
        }
    }
    for label in DESCRIBE_LABELS {
        names.push(format!("txn_per_day_{label}"));
    }
    names
}

pub fn date_features(transactions: &[Transaction]) -> Vec<f64> {
    let n = transactions.len();
    let mut per_day: BTreeMap<i64, usize> = BTreeMap::new();
    for txn in transactions {
        *per_day.entry(txn.trans_date).or_default() += 1;
    }

    let (period_length, density) = match (per_day.keys().next(), per_day.keys().next_back()) {
        (Some(first), Some(last)) => {
            let period = (*last as f64) - (*first as f64) + 1.0;
            (period, per_day.len() as f64 / period)
        }
        _ => (0.0, 0.0),
    };

    let mut out = vec![period_length, density];
    for cycle in DATE_CYCLES {
        let fracs = cycle_fractions(transactions, cycle, n);
        out.extend_from_slice(&fracs);
        out.push(stats::mean(&fracs));
        out.push(stats::std_dev(&fracs, 0));
        out.push(stats::min(&fracs));
        out.push(stats::max(&fracs));
    }

    let counts: Vec<f64> = per_day.values().map(|count| *count as f64).collect();
    out.extend_from_slice(&describe(&counts));
    out
}

fn cycle_fractions(transactions: &[Transaction], cycle: DateCycle, n: usize) -> Vec<f64> {
    let mut counts = vec![0usize; cycle.period()];
    for txn in transactions {
        counts[cycle.convert(txn.trans_date)] += 1;
    }
    if n == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|c| *c as f64 / n as f64).collect()
}
