//! Source file spans and locations

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A unique identifier for a source file
#[derive(
    Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[display("file#{_0}")]
pub struct FileId(pub u32);

impl FileId {
    /// File id used for nodes parsed out of quoted fragments. Such nodes have
    /// no location in a user file until they are merged into one.
    pub const SYNTHETIC: Self = Self(u32::MAX);

    /// File id of the built-in prelude
    pub const PRELUDE: Self = Self(u32::MAX - 1);

    /// Creates a new file id
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Whether this id marks quoted, not-yet-merged code
    #[must_use]
    pub fn is_synthetic(self) -> bool {
        self == Self::SYNTHETIC
    }
}

/// A byte offset span in a source file
#[derive(
    Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[display("{start}..{end}")]
pub struct Span {
    /// Inclusive start offset
    pub start: u32,
    /// Exclusive end offset
    pub end: u32,
}

impl Span {
    /// Creates a new span
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates a span from a byte range
    #[must_use]
    pub fn from_range(range: Range<usize>) -> Self {
        Self::new(range.start as u32, range.end as u32)
    }

    /// Empty span at `offset`
    #[must_use]
    pub fn point(offset: u32) -> Self {
        Self::new(offset, offset)
    }

    /// Byte range covered by this span
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A span with associated file
#[derive(
    Copy, Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[display("{file}:{span}")]
pub struct FileSpan {
    /// File the span points into
    pub file: FileId,
    /// Byte range in that file
    pub span: Span,
}

impl FileSpan {
    /// Creates a new file span
    #[must_use]
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }

    /// Span inside a quoted fragment
    #[must_use]
    pub fn synthetic(span: Span) -> Self {
        Self::new(FileId::SYNTHETIC, span)
    }

    /// Byte range in the file
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }

    /// Smallest span covering both spans; keeps the file of `self`
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self::new(self.file, self.span.merge(other.span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_spans() {
        let merged = Span::new(4, 8).merge(Span::new(2, 5));
        assert_eq!(merged, Span::new(2, 8));
        assert_eq!(merged.len(), 6);
    }

    #[test]
    fn file_spans_order_by_file_then_offset() {
        let first = FileSpan::new(FileId(0), Span::new(10, 12));
        let second = FileSpan::new(FileId(0), Span::new(20, 21));
        let other_file = FileSpan::new(FileId(1), Span::new(0, 1));
        let mut spans = vec![other_file, second, first];
        spans.sort();
        assert_eq!(spans, vec![first, second, other_file]);
    }

    #[test]
    fn display_is_compact() {
        let span = FileSpan::new(FileId(3), Span::new(1, 4));
        assert_eq!(span.to_string(), "file#3:1..4");
    }
}
