//! Statistic kernels shared by the aggregation passes.
//!
//! Undefined results (statistics of an empty slice, sample std of a single
//! value) come back as NaN; callers coerce them with [`nan_to_num`] once the
//! full vector is assembled.

use serde::{Deserialize, Serialize};

pub const DESCRIBE_WIDTH: usize = 8;
pub const DESCRIBE_LABELS: [&str; DESCRIBE_WIDTH] =
    ["count", "mean", "std", "min", "p25", "p50", "p75", "max"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighLevelStat {
    Min,
    Max,
    Sum,
    Std,
    Mean,
    Median,
}

pub const HIGH_LEVEL_STATS: [HighLevelStat; 6] = [
    HighLevelStat::Min,
    HighLevelStat::Max,
    HighLevelStat::Sum,
    HighLevelStat::Std,
    HighLevelStat::Mean,
    HighLevelStat::Median,
];

impl HighLevelStat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Std => "std",
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Self::Min => min(values),
            Self::Max => max(values),
            Self::Sum => values.iter().sum(),
            Self::Std => std_dev(values, 0),
            Self::Mean => mean(values),
            Self::Median => quantile(&sorted(values), 0.5),
        }
    }
}

pub fn describe(values: &[f64]) -> [f64; DESCRIBE_WIDTH] {
    let sorted = sorted(values);
    [
        values.len() as f64,
        mean(values),
        std_dev(values, 1),
        min(values),
        quantile(&sorted, 0.25),
        quantile(&sorted, 0.5),
        quantile(&sorted, 0.75),
        max(values),
    ]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    if values.len() <= ddof {
        return f64::NAN;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<f64>()
        / (values.len() - ddof) as f64;
    variance.sqrt()
}

pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn nan_to_num(values: &mut [f64]) {
    for value in values.iter_mut() {
        if value.is_nan() {
            *value = 0.0;
        } else if *value == f64::INFINITY {
            *value = f64::MAX;
        } else if *value == f64::NEG_INFINITY {
            *value = f64::MIN;
        }
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn describe_uses_sample_std_and_linear_percentiles() {
        let out = describe(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out[0], 4.0);
        assert_close(out[1], 2.5);
        assert_close(out[2], (5.0_f64 / 3.0).sqrt());
        assert_eq!(out[3], 1.0);
        assert_close(out[4], 1.75);
        assert_close(out[5], 2.5);
        assert_close(out[6], 3.25);
        assert_eq!(out[7], 4.0);
    }

    #[test]
    fn describe_of_empty_and_singleton_leaves_undefined_as_nan() {
        let empty = describe(&[]);
        assert_eq!(empty[0], 0.0);
        assert!(empty[1..].iter().all(|v| v.is_nan()));

        let single = describe(&[7.0]);
        assert_eq!(single[0], 1.0);
        assert_eq!(single[1], 7.0);
        assert!(single[2].is_nan());
        assert_eq!(single[5], 7.0);
    }

    #[test]
    fn high_level_stats_use_population_std_and_median() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(HighLevelStat::Min.apply(&values), 1.0);
        assert_eq!(HighLevelStat::Max.apply(&values), 4.0);
        assert_eq!(HighLevelStat::Sum.apply(&values), 10.0);
        assert_close(HighLevelStat::Std.apply(&values), 1.25_f64.sqrt());
        assert_close(HighLevelStat::Mean.apply(&values), 2.5);
        assert_close(HighLevelStat::Median.apply(&values), 2.5);
        assert_eq!(HighLevelStat::Std.apply(&[5.0]), 0.0);
    }

    #[test]
    fn nan_to_num_matches_numpy_policy() {
        let mut values = [f64::NAN, 1.5, f64::INFINITY, f64::NEG_INFINITY];
        nan_to_num(&mut values);
        assert_eq!(values, [0.0, 1.5, f64::MAX, f64::MIN]);
    }
}
