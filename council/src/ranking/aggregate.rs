//! Cross-ranker aggregation into per-persona average standing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ranking::LabelMapping;
use crate::stages::Stage2Result;

/// A persona's average standing across all rankers that mentioned it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateRanking {
    pub persona_name: String,
    /// Arithmetic mean of 1-based positions, rounded to 2 decimals.
    pub average_rank: f64,
    /// Number of positions collected across all rankers.
    pub rankings_count: usize,
}

/// Combine parsed rankings into average rank per persona, best first.
///
/// Position is the 1-based index within each ranker's parsed order. Labels
/// that do not resolve through the mapping are skipped. A ranker mentioning
/// a persona twice contributes two positions; one omitting it contributes
/// none. Ties sort by persona name so the ordering is deterministic.
pub fn aggregate_rankings(
    stage2: &[Stage2Result],
    mapping: &LabelMapping,
) -> Vec<AggregateRanking> {
    let mut positions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for result in stage2 {
        for (index, label) in result.parsed_ranking.iter().enumerate() {
            if let Some(name) = mapping.resolve(label) {
                positions.entry(name).or_default().push(index + 1);
            }
        }
    }

    let mut aggregate: Vec<AggregateRanking> = positions
        .into_iter()
        .map(|(name, positions)| {
            let mean = positions.iter().sum::<usize>() as f64 / positions.len() as f64;
            AggregateRanking {
                persona_name: name.to_string(),
                average_rank: (mean * 100.0).round() / 100.0,
                rankings_count: positions.len(),
            }
        })
        .collect();

    aggregate.sort_by(|a, b| {
        a.average_rank
            .partial_cmp(&b.average_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.persona_name.cmp(&b.persona_name))
    });
    aggregate
}
