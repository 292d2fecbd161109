//! Turns a score vector into ordered rank records

use crate::graph::Roster;
use followrank_common::db::RankRecord;
use std::cmp::Ordering;

/// Pair every roster member with its score and a 1-based rank.
///
/// Highest score first. Equal scores are ordered by raw key so the result
/// does not depend on roster order. Missing scores count as zero.
pub fn assemble(roster: &Roster, scores: &[f64]) -> Vec<RankRecord> {
    let score_of = |position: usize| scores.get(position).copied().unwrap_or(0.0);

    let mut order: Vec<usize> = (0..roster.len()).collect();
    order.sort_by(|&a, &b| {
        score_of(b)
            .total_cmp(&score_of(a))
            .then_with(|| compare_keys(roster, a, b))
    });

    order
        .into_iter()
        .zip(1..)
        .filter_map(|(position, rank)| {
            roster.get(position).map(|entry| RankRecord {
                pubkey: entry.npub.clone(),
                score: score_of(position),
                rank,
            })
        })
        .collect()
}

fn compare_keys(roster: &Roster, a: usize, b: usize) -> Ordering {
    let key = |position| roster.get(position).map(|entry| entry.key);
    key(a).cmp(&key(b))
}
