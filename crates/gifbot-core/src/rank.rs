//! Result ranking: descending score, stable ties, optional cap.

use crate::fuzzy::FuzzyMatch;

/// Sort matches by descending score and apply `max_matches`.
///
/// The sort is stable, so matches with equal scores keep the order they were
/// produced in (corpus order). `max_matches == 0` means unlimited.
pub fn rank(mut matches: Vec<FuzzyMatch>, max_matches: usize) -> Vec<FuzzyMatch> {
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    if max_matches > 0 {
        matches.truncate(max_matches);
    }
    matches
}
