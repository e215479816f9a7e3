use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` into a source buffer.
///
/// Offsets are always bytes, never characters, so that ranges stay comparable
/// across grammars with different unicode handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ByteRange {
	/// Start byte offset (inclusive).
	pub start: u32,
	/// End byte offset (exclusive).
	pub end: u32,
}

impl ByteRange {
	/// Creates a new range. `start` must not exceed `end`.
	#[inline]
	pub fn new(start: u32, end: u32) -> Self {
		debug_assert!(start <= end, "ByteRange start {start} > end {end}");
		Self { start, end }
	}

	/// Creates a zero-width range at `offset`.
	#[inline]
	pub fn empty(offset: u32) -> Self {
		Self::new(offset, offset)
	}

	/// Returns the length in bytes.
	#[inline]
	pub fn len(&self) -> u32 {
		self.end - self.start
	}

	/// Returns true if the range covers no bytes.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start >= self.end
	}

	/// Converts to a `usize` range suitable for slicing.
	#[inline]
	pub fn to_usize(self) -> Range<usize> {
		self.start as usize..self.end as usize
	}
}

impl From<Range<u32>> for ByteRange {
	fn from(range: Range<u32>) -> Self {
		Self::new(range.start, range.end)
	}
}

impl From<ByteRange> for Range<u32> {
	fn from(range: ByteRange) -> Self {
		range.start..range.end
	}
}

impl fmt::Display for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}..{}", self.start, self.end)
	}
}

/// A zero-based line and byte column.
///
/// Displayed one-based (`line:col`) for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LineCol {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based byte offset from the start of the line.
	pub column: u32,
}

impl LineCol {
	pub fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for LineCol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line + 1, self.column + 1)
	}
}
