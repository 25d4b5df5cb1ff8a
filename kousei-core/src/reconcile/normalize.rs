//! normalize.rs - Offset-preserving text normalization.
//!
//! Normalization unifies line endings and applies NFKC. The [`IndexMap`] produced
//! alongside records, per grapheme cluster, where each normalized piece came from in the
//! original text, so any normalized offset can be translated back.
//!
//! License: MIT OR APACHE 2.0

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Normalizes a single piece of text the same way [`normalize`] does. Used for strings
/// that only need comparing, such as LLM-returned quotes.
pub fn normalize_str(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").nfkc().collect()
}

/// Maps byte offsets in normalized text back to byte offsets in the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    /// `(normalized_start, original_start)` for each grapheme cluster, ascending.
    pieces: Vec<(usize, usize)>,
    normalized_len: usize,
    original_len: usize,
    identity: bool,
}

impl IndexMap {
    fn identity(len: usize) -> Self {
        Self {
            pieces: Vec::new(),
            normalized_len: len,
            original_len: len,
            identity: true,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    fn locate(&self, normalized: usize) -> usize {
        match self.pieces.binary_search_by_key(&normalized, |&(n, _)| n) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }

    fn original_end_of(&self, piece: usize) -> usize {
        self.pieces.get(piece + 1).map(|&(_, o)| o).unwrap_or(self.original_len)
    }

    /// Original offset for a range start. Offsets inside a piece round down to the start
    /// of the original grapheme cluster.
    pub fn map_start(&self, normalized: usize) -> usize {
        if self.identity {
            return normalized.min(self.original_len);
        }
        if normalized >= self.normalized_len || self.pieces.is_empty() {
            return self.original_len;
        }
        self.pieces[self.locate(normalized)].1
    }

    /// Original offset for a range end. Offsets inside a piece round up to the end of
    /// the original grapheme cluster.
    pub fn map_end(&self, normalized: usize) -> usize {
        if self.identity {
            return normalized.min(self.original_len);
        }
        if normalized >= self.normalized_len || self.pieces.is_empty() {
            return self.original_len;
        }
        let i = self.locate(normalized);
        let (n_start, o_start) = self.pieces[i];
        if n_start == normalized {
            o_start
        } else {
            self.original_end_of(i)
        }
    }
}

/// Normalized text plus the map back to the original.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    pub map: IndexMap,
}

/// Normalizes `original` grapheme by grapheme. When nothing changes the map is the
/// identity and no per-cluster table is built.
pub fn normalize(original: &str) -> NormalizedText {
    let quick = normalize_str(original);
    if quick == original {
        return NormalizedText {
            text: quick,
            map: IndexMap::identity(original.len()),
        };
    }

    let mut text = String::with_capacity(quick.len());
    let mut pieces = Vec::new();
    for (orig_start, grapheme) in original.grapheme_indices(true) {
        let piece = normalize_str(grapheme);
        if !piece.is_empty() {
            pieces.push((text.len(), orig_start));
            text.push_str(&piece);
        }
    }
    let normalized_len = text.len();
    NormalizedText {
        text,
        map: IndexMap {
            pieces,
            normalized_len,
            original_len: original.len(),
            identity: false,
        },
    }
}
