#![allow(dead_code)]

use solvedag::dag::Level;

pub use solvedag_test_utils::init_tracing;

/// Ids of each level, in order.
pub fn level_ids(levels: &[Level]) -> Vec<Vec<String>> {
    levels
        .iter()
        .map(|level| level.iter().map(|sp| sp.id.clone()).collect())
        .collect()
}

/// Owned string vector from literals.
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
