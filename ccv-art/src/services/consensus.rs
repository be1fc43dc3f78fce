//! Majority-vote consensus over source outcomes
//!
//! Candidate names are compared under a normalization that lowercases and
//! strips surrounding whitespace and quote characters. A majority exists only
//! when the top normalized value's count strictly exceeds half of the
//! successful outcomes; ties never produce a majority.

use std::collections::HashMap;

use crate::models::{ConsensusOutcome, SourceOutcome};

/// Normalize a candidate name for comparison.
///
/// Surrounding whitespace and quote characters are stripped together, so
/// repeated application is a fixed point and case/quote variants of the same
/// value collide to one bucket.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .to_string()
}

/// Compute the majority answer over one sub-query's outcomes.
///
/// Only successful outcomes with a non-empty name participate. The majority
/// is returned in its original casing; `candidates` lists every raw name.
pub fn resolve(outcomes: &[SourceOutcome]) -> ConsensusOutcome {
    let successful: Vec<&SourceOutcome> = outcomes
        .iter()
        .filter(|o| o.success && !o.name.is_empty())
        .collect();

    if successful.is_empty() {
        return ConsensusOutcome::default();
    }

    let names: Vec<String> = successful.iter().map(|o| o.name.clone()).collect();
    let normalized: Vec<String> = names.iter().map(|n| normalize(n)).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for n in &normalized {
        *counts.entry(n.as_str()).or_insert(0) += 1;
    }

    let top_count = counts.values().copied().max().unwrap_or(0);

    // Strict majority: more than half of the successful outcomes. Two
    // distinct values can't both clear that bar, so a tie at the top never
    // passes the test.
    if top_count * 2 > successful.len() {
        let top_name = counts
            .iter()
            .find(|(_, &count)| count == top_count)
            .map(|(&name, _)| name.to_string());

        if let Some(top_name) = top_name {
            // Report the first raw (non-normalized) spelling of the winner
            let majority = names
                .iter()
                .zip(&normalized)
                .find(|(_, norm)| **norm == top_name)
                .map(|(raw, _)| raw.clone());

            return ConsensusOutcome {
                majority,
                candidates: names,
            };
        }
    }

    ConsensusOutcome {
        majority: None,
        candidates: names,
    }
}
