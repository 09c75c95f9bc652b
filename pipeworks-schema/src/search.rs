//! Fuzzy "did you mean" suggestions for schema lookups

use strsim::levenshtein;

use crate::pool::DescriptorPool;

/// A fuzzy match suggestion with candidate name and edit distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub candidate: String,
    pub distance: usize,
}

/// Suggest similar names from a list of candidates.
///
/// Exact matches are excluded. Case-insensitive matches rank first (distance
/// 0), substring matches next (distance 1), then Levenshtein distance up to
/// `max_distance`. Ties keep candidate order.
pub fn suggest_similar(name: &str, candidates: &[&str], max_distance: usize) -> Vec<Suggestion> {
    let wanted = name.to_lowercase();
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter(|&&candidate| candidate != name)
        .filter_map(|&candidate| {
            let lowered = candidate.to_lowercase();
            let distance = if lowered == wanted {
                0
            } else if lowered.contains(&wanted) || wanted.contains(&lowered) {
                1
            } else {
                levenshtein(name, candidate)
            };
            (distance <= max_distance).then(|| Suggestion {
                candidate: candidate.to_string(),
                distance,
            })
        })
        .collect();
    suggestions.sort_by_key(|s| s.distance);
    suggestions.dedup_by(|a, b| a.candidate == b.candidate);
    suggestions
}

/// Service names in the pool that look like `name`.
pub fn suggest_services(pool: &DescriptorPool, name: &str) -> Vec<String> {
    let names = pool.service_names();
    suggest_similar(name, &names, 4)
        .into_iter()
        .take(3)
        .map(|s| s.candidate)
        .collect()
}
