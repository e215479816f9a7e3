//! Span resolution.
//!
//! Query evaluation yields overlapping captures. [`resolve`] flattens them into
//! ordered, non-overlapping [`HighlightSpan`]s: every byte belongs to the
//! highest-ranked capture covering it, and a capture interrupted by a stronger
//! nested one is split around it.
//!
//! Rank compares, in order: priority, narrower byte range, later pattern,
//! later capture name, later node.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glint_primitives::{ByteRange, HighlightName};

use crate::query::Capture;
use crate::tree::ParseTree;

/// A span of text with a specific highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
	/// Start byte offset (inclusive).
	pub start: u32,
	/// End byte offset (exclusive).
	pub end: u32,
	/// The highlight to apply.
	pub highlight: HighlightName,
}

impl HighlightSpan {
	/// Returns the byte range.
	pub fn range(&self) -> std::ops::Range<u32> {
		self.start..self.end
	}

	/// Returns the length in bytes.
	pub fn len(&self) -> u32 {
		self.end - self.start
	}

	/// Returns true if the span is empty.
	pub fn is_empty(&self) -> bool {
		self.start >= self.end
	}
}

/// A capture reduced to what ranking needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
	pub(crate) range: ByteRange,
	pub(crate) highlight: HighlightName,
	pub(crate) priority: i32,
	pub(crate) pattern_index: u32,
	pub(crate) capture_index: u32,
	pub(crate) order: u32,
}

type Rank = (i32, Reverse<u32>, u32, u32, u32);

impl Candidate {
	fn rank(&self) -> Rank {
		(
			self.priority,
			Reverse(self.range.len()),
			self.pattern_index,
			self.capture_index,
			self.order,
		)
	}
}

/// Resolves captures on `tree` into final spans.
pub fn resolve(captures: &[Capture], tree: &ParseTree) -> Vec<HighlightSpan> {
	let candidates = captures
		.iter()
		.map(|c| Candidate {
			range: tree.node(c.node).byte_range(),
			highlight: c.highlight,
			priority: c.priority,
			pattern_index: c.pattern_index,
			capture_index: c.capture_index,
			order: c.node.idx() as u32,
		})
		.collect();
	resolve_candidates(candidates)
}

pub(crate) fn resolve_candidates(mut candidates: Vec<Candidate>) -> Vec<HighlightSpan> {
	candidates.retain(|c| !c.range.is_empty());
	candidates.sort_by(|a, b| {
		a.range
			.start
			.cmp(&b.range.start)
			.then(b.range.end.cmp(&a.range.end))
			.then(a.rank().cmp(&b.rank()))
	});

	let mut boundaries: Vec<u32> = candidates.iter().flat_map(|c| [c.range.start, c.range.end]).collect();
	boundaries.sort_unstable();
	boundaries.dedup();

	let mut spans: Vec<HighlightSpan> = Vec::new();
	// Active candidates by rank; entries past their end are dropped lazily.
	let mut active: BinaryHeap<(Rank, usize)> = BinaryHeap::new();
	let mut next = 0;
	let mut last_owner = None;

	for window in boundaries.windows(2) {
		let (from, to) = (window[0], window[1]);
		while next < candidates.len() && candidates[next].range.start <= from {
			active.push((candidates[next].rank(), next));
			next += 1;
		}
		while active.peek().is_some_and(|&(_, i)| candidates[i].range.end <= from) {
			active.pop();
		}
		let Some(&(_, owner)) = active.peek() else {
			last_owner = None;
			continue;
		};

		match spans.last_mut() {
			Some(span) if last_owner == Some(owner) && span.end == from => span.end = to,
			_ => spans.push(HighlightSpan {
				start: from,
				end: to,
				highlight: candidates[owner].highlight,
			}),
		}
		last_owner = Some(owner);
	}

	spans
}

#[cfg(test)]
mod tests;
