//! Lexical text similarity.
//!
//! The scoring rubrics were tuned against `difflib.SequenceMatcher`
//! ratios, so the built-in scorer reproduces that measure: total matched
//! characters under Ratcliff/Obershelp recursive longest-common-substring
//! matching, scaled by the combined length. Neural similarity models stay
//! behind the [`Similarity`] trait and are not implemented here.

/// Trim and lowercase before comparison.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A pluggable similarity measure returning a score in [0, 1].
pub trait Similarity: Send + Sync {
    fn score(&self, candidate: &str, reference: &str) -> f64;
}

/// The built-in character-level scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarity;

impl Similarity for LexicalSimilarity {
    fn score(&self, candidate: &str, reference: &str) -> f64 {
        ratio(&normalize(candidate), &normalize(reference))
    }
}

/// Ratcliff/Obershelp similarity of two strings: `2 * M / T` where `M`
/// is the number of matched characters and `T` the total length.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 1.0;
    }

    let matches = match_total(&a_chars, 0, a_chars.len(), &b_chars, 0, b_chars.len());
    2.0 * matches as f64 / total as f64
}

/// Longest common substring between `a[alo..ahi]` and `b[blo..bhi]`.
/// Returns (start in a, start in b, length).
fn longest_match(
    a: &[char],
    alo: usize,
    ahi: usize,
    b: &[char],
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);

    // j2len[j] = length of the common run ending at a[i], b[j]
    let mut j2len = vec![0usize; bhi.saturating_sub(blo)];
    for i in alo..ahi {
        let mut new_j2len = vec![0usize; bhi - blo];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = if j > blo { j2len[j - blo - 1] + 1 } else { 1 };
                new_j2len[j - blo] = k;
                if k > best_len {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_len = k;
                }
            }
        }
        j2len = new_j2len;
    }

    (best_i, best_j, best_len)
}

/// Total matched characters: the longest common substring plus matches
/// recursively found to its left and right.
fn match_total(a: &[char], alo: usize, ahi: usize, b: &[char], blo: usize, bhi: usize) -> usize {
    if alo >= ahi || blo >= bhi {
        return 0;
    }

    let (i, j, len) = longest_match(a, alo, ahi, b, blo, bhi);
    if len == 0 {
        return 0;
    }

    len + match_total(a, alo, i, b, blo, j) + match_total(a, i + len, ahi, b, j + len, bhi)
}
