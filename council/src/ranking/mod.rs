//! Anonymized peer ranking: label assignment, grammar parsing, aggregation.
//!
//! ```text
//! Stage1 order ──> LabelMapping ("Response A" -> persona name, frozen)
//!                       │
//! ranker text ──> parse_ranking ──> ordered labels ──> aggregate_rankings
//! ```

pub mod aggregate;
pub mod anonymize;
pub mod parse;

pub use aggregate::{aggregate_rankings, AggregateRanking};
pub use anonymize::{response_label, LabelMapping};
pub use parse::{parse_ranking, RANKING_MARKER};
