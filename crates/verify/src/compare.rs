//! Snapshot comparison.

use std::fmt::Write as _;

use glint_language::HighlightSpan;
use glint_primitives::{LineCol, SourceBuffer};
use thiserror::Error;

use crate::expectation::{ExpectedSpan, render};

/// Context elements shown on each side of the first mismatch.
const CONTEXT: usize = 2;

/// The first element where actual output departs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("span #{index} at {position}: expected {}, found {}", show(.expected), show(.actual))]
pub struct MismatchError {
	pub index: usize,
	/// `None` when the expectation ends before `index`.
	pub expected: Option<ExpectedSpan>,
	/// `None` when the actual output ends before `index`.
	pub actual: Option<ExpectedSpan>,
	/// Start of the actual span, or the end of the buffer when there is none.
	pub position: LineCol,
	expected_context: Vec<ExpectedSpan>,
	actual_context: Vec<(ExpectedSpan, LineCol)>,
	context_start: usize,
}

fn show(span: &Option<ExpectedSpan>) -> String {
	match span {
		Some(span) => span.to_string(),
		None => "nothing".to_owned(),
	}
}

impl MismatchError {
	/// Renders the mismatch with surrounding elements from both sides.
	pub fn report(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(out, "first mismatch at span #{} ({})", self.index, self.position);
		let _ = writeln!(out, "  expected:");
		for (i, span) in self.expected_context.iter().enumerate() {
			let _ = writeln!(out, "  {} {:>4}  {span}", self.marker(i), self.context_start + i);
		}
		if self.expected.is_none() {
			let _ = writeln!(out, "  > {:>4}  <end>", self.index);
		}
		let _ = writeln!(out, "  actual:");
		for (i, (span, pos)) in self.actual_context.iter().enumerate() {
			let _ = writeln!(out, "  {} {:>4}  {span}  @ {pos}", self.marker(i), self.context_start + i);
		}
		if self.actual.is_none() {
			let _ = writeln!(out, "  > {:>4}  <end>", self.index);
		}
		out
	}

	fn marker(&self, offset: usize) -> char {
		if self.context_start + offset == self.index { '>' } else { ' ' }
	}
}

/// Compares resolved spans against the stored rendering.
///
/// Equality is exact on the `(text, highlight)` sequence. Only the first
/// differing element is reported.
pub fn compare(source: &SourceBuffer, spans: &[HighlightSpan], expected: &[ExpectedSpan]) -> Result<(), MismatchError> {
	let actual = render(source, spans);
	let Some(index) = first_difference(expected, &actual) else {
		return Ok(());
	};

	let position_of = |i: usize| spans.get(i).map_or_else(|| source.line_col(source.len()), |s| source.line_col(s.start));
	let context_start = index.saturating_sub(CONTEXT);
	let window = |len: usize| context_start.min(len)..(index + CONTEXT + 1).min(len);

	Err(MismatchError {
		index,
		expected: expected.get(index).cloned(),
		actual: actual.get(index).cloned(),
		position: position_of(index),
		expected_context: expected[window(expected.len())].to_vec(),
		actual_context: window(actual.len())
			.map(|i| (actual[i].clone(), position_of(i)))
			.collect(),
		context_start,
	})
}

fn first_difference(expected: &[ExpectedSpan], actual: &[ExpectedSpan]) -> Option<usize> {
	expected
		.iter()
		.zip(actual)
		.position(|(e, a)| e != a)
		.or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}
