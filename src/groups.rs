//! Per-category count/sum/max over a fixed category vocabulary.
//!
//! The count block comes first, then sum, then max, each in vocabulary order.
//! Categories a client never used are NaN until the final coercion.

use std::collections::{BTreeSet, HashMap};

use crate::dataset::Transaction;

const GROUP_AGGS: [&str; 3] = ["count", "sum", "max"];

#[derive(Debug, Clone, Copy)]
struct GroupTotals {
    count: usize,
    sum: f64,
    max: f64,
}

pub fn group_feature_names(vocabulary: &[i64]) -> Vec<String> {
    GROUP_AGGS
        .iter()
        .flat_map(|agg| {
            vocabulary
                .iter()
                .map(move |group| format!("group_{group}_{agg}"))
        })
        .collect()
}

pub fn group_features(transactions: &[Transaction], vocabulary: &[i64]) -> Vec<f64> {
    let observed = totals_by_group(transactions);

    let mut out = Vec::with_capacity(vocabulary.len() * GROUP_AGGS.len());
    let picks: [fn(&GroupTotals) -> f64; 3] = [count_of, sum_of, max_of];
    for pick in picks {
        for group in vocabulary {
            out.push(observed.get(group).map(pick).unwrap_or(f64::NAN));
        }
    }
    out
}

pub fn rank_important_groups(transactions: &[Transaction], top_k: usize) -> Vec<i64> {
    let observed = totals_by_group(transactions);
    let mut important = BTreeSet::new();

    let picks: [fn(&GroupTotals) -> f64; 3] = [count_of, max_of, sum_of];
    for pick in picks {
        let mut ranked: Vec<(i64, f64)> = observed.iter().map(|(g, t)| (*g, pick(t))).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        important.extend(ranked.into_iter().take(top_k).map(|(group, _)| group));
    }

    important.into_iter().collect()
}

fn count_of(t: &GroupTotals) -> f64 {
    t.count as f64
}

fn sum_of(t: &GroupTotals) -> f64 {
    t.sum
}

fn max_of(t: &GroupTotals) -> f64 {
    t.max
}

fn totals_by_group(transactions: &[Transaction]) -> HashMap<i64, GroupTotals> {
    let mut observed: HashMap<i64, GroupTotals> = HashMap::new();
    for txn in transactions {
        let Some(group) = txn.small_group else {
            continue;
        };
        let entry = observed.entry(group).or_insert(GroupTotals {
            count: 0,
            sum: 0.0,
            max: f64::NEG_INFINITY,
        });
        entry.count += 1;
        entry.sum += txn.amount_rur;
        entry.max = entry.max.max(txn.amount_rur);
    }
    observed
}
