//! Ordered-subsequence fuzzy matching.
//!
//! A text matches a query when every query character appears in the text in
//! order, not necessarily contiguously. Comparison is case-insensitive.
//! Among all ways the query can be embedded, the best-scoring span is kept.
//!
//! # Scoring
//!
//! The number of skipped chars inside the matched span decides first: a
//! span with fewer gaps always outranks one with more. Among spans with the
//! same number of gaps, bonuses break the tie:
//!
//! | Bonus | Points |
//! |-------|--------|
//! | matched char directly after the previous match | `+1` |
//! | matched char at a word boundary | `+1` |
//!
//! Both parts are packed into one `u32`: the gap tier in the high 16 bits,
//! the bonus total in the low 16 bits. Gap counts saturate at 65534, so every
//! match scores at least `1 << 16` and non-matching texts are excluded
//! entirely.

use serde::{Deserialize, Serialize};

use crate::models::Record;

const BONUS_CONSECUTIVE: u32 = 1;
const BONUS_BOUNDARY: u32 = 1;
const BONUS_BITS: u32 = 16;
const GAP_TIERS: u32 = (1 << BONUS_BITS) - 1;

/// A collection the matcher can score: a length plus text at each index.
pub trait Searchable {
    fn len(&self) -> usize;

    fn text_at(&self, index: usize) -> &str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Searchable for [Record] {
    fn len(&self) -> usize {
        <[Record]>::len(self)
    }

    fn text_at(&self, index: usize) -> &str {
        &self[index].text
    }
}

impl Searchable for Vec<Record> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn text_at(&self, index: usize) -> &str {
        &self[index].text
    }
}

/// What an empty (or whitespace-only) query matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQueryPolicy {
    /// An empty query returns no results.
    #[default]
    MatchNone,
    /// An empty query returns every record with an equal score of `1`.
    MatchAll,
}

/// One matched entry of a [`Searchable`] collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyMatch {
    /// Index into the searched collection.
    pub index: usize,
    /// Relevance score, always `>= 1`.
    pub score: u32,
    /// Char offsets in the text that matched the query, ascending.
    pub positions: Vec<usize>,
}

/// Score every entry of `data` against `query`.
///
/// Matches are returned in collection order; ranking is left to
/// [`rank`](crate::rank::rank). The query is trimmed first; an empty result
/// of trimming is handled according to `policy`.
pub fn find_from<S: Searchable + ?Sized>(
    query: &str,
    data: &S,
    policy: EmptyQueryPolicy,
) -> Vec<FuzzyMatch> {
    let needle: Vec<char> = query.trim().chars().map(fold).collect();

    if needle.is_empty() {
        return match policy {
            EmptyQueryPolicy::MatchNone => Vec::new(),
            EmptyQueryPolicy::MatchAll => (0..data.len())
                .map(|index| FuzzyMatch {
                    index,
                    score: 1,
                    positions: Vec::new(),
                })
                .collect(),
        };
    }

    (0..data.len())
        .filter_map(|index| {
            score_text(&needle, data.text_at(index)).map(|(score, positions)| FuzzyMatch {
                index,
                score,
                positions,
            })
        })
        .collect()
}

/// Score a single text against an already folded, non-empty needle.
///
/// Returns `None` unless the needle is an ordered subsequence of the text.
pub fn score_text(needle: &[char], text: &str) -> Option<(u32, Vec<usize>)> {
    let first = *needle.first()?;
    let hay: Vec<char> = text.chars().map(fold).collect();

    let mut best: Option<(u32, Vec<usize>)> = None;
    for start in 0..hay.len() {
        if hay[start] != first {
            continue;
        }

        let mut positions = Vec::with_capacity(needle.len());
        positions.push(start);
        let mut rest = needle[1..].iter().peekable();
        for (offset, c) in hay[start + 1..].iter().enumerate() {
            match rest.peek() {
                Some(&&want) if want == *c => {
                    positions.push(start + 1 + offset);
                    rest.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        if rest.peek().is_some() {
            // A later start has strictly less text to work with.
            break;
        }

        let score = span_score(&hay, &positions);
        if best.as_ref().map_or(true, |(b, _)| score > *b) {
            best = Some((score, positions));
        }
    }

    best
}

fn span_score(hay: &[char], positions: &[usize]) -> u32 {
    let mut bonus = 0u32;
    for (i, &pos) in positions.iter().enumerate() {
        if i > 0 && positions[i - 1] + 1 == pos {
            bonus += BONUS_CONSECUTIVE;
        }
        if pos == 0 || !hay[pos - 1].is_alphanumeric() {
            bonus += BONUS_BOUNDARY;
        }
    }

    let skipped = match (positions.first(), positions.last()) {
        (Some(first), Some(last)) => last - first + 1 - positions.len(),
        _ => 0,
    };
    let skipped = u32::try_from(skipped).unwrap_or(u32::MAX).min(GAP_TIERS - 1);
    let tier = GAP_TIERS - skipped;

    (tier << BONUS_BITS) | bonus.min(GAP_TIERS)
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
