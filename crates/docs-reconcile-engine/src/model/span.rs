use serde::{Deserialize, Serialize};

/// A half-open range `[start, end)` of UTF-16 code units within a segment.
///
/// Spans are never stored in the textual snapshot; they are recomputed by the
/// indexer every time the tree changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start index.
    pub start: u32,
    /// Exclusive end index.
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `at`, used for insertion points.
    pub fn point(at: u32) -> Self {
        Self { start: at, end: at }
    }

    /// Returns the length in code units. Uses saturating subtraction.
    #[must_use]
    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span is empty (start >= end).
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Half-open overlap test.
    #[must_use]
    pub fn overlaps(self, start: u32, end: u32) -> bool {
        self.start < end && self.end > start
    }

    #[must_use]
    pub fn contains(self, index: u32) -> bool {
        self.start <= index && index < self.end
    }
}
