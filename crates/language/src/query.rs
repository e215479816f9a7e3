//! Highlight queries.
//!
//! Queries use tree-sitter's S-expression pattern language:
//!
//! ```scheme
//! ; keywords are anonymous nodes
//! ["class" "public" "return"] @keyword
//!
//! (method_declaration name: (identifier) @function.method)
//!
//! ((identifier) @constant
//!  (#match? @constant "^[A-Z][A-Z_0-9]*$")
//!  (#set! priority 110))
//! ```
//!
//! Evaluation is a single preorder traversal that tries every pattern at every
//! node. Every match contributes its captures; overlaps are left to the
//! [resolver](crate::highlight::resolve).

mod matcher;
mod parser;
mod pattern;
mod predicate;

use glint_primitives::{Deadline, DeadlineExceeded, HighlightName, SourceBuffer};
use thiserror::Error;

use self::pattern::Pattern;
use crate::tree::{NodeId, ParseTree};

/// Priority of patterns without `#set! priority`.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Why a query failed to compile. Always fatal for a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("query error at {}:{}: {kind}", .row + 1, .column + 1)]
pub struct QueryDefinitionError {
	/// Zero-based line of the offending token.
	pub row: usize,
	/// Zero-based byte column of the offending token.
	pub column: usize,
	pub kind: QueryErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryErrorKind {
	#[error("syntax error: {0}")]
	Syntax(String),
	#[error("unbalanced parentheses")]
	UnbalancedParens,
	#[error("unknown predicate `#{0}`")]
	UnknownPredicate(String),
	#[error("unknown capture `@{0}`")]
	UnknownCapture(String),
	#[error("invalid regex: {0}")]
	InvalidRegex(String),
	#[error("capture `@{0}` is not a highlight name")]
	UnknownHighlight(String),
	#[error("invalid property: {0}")]
	InvalidProperty(String),
	#[error("invalid pattern: {0}")]
	Structure(String),
}

/// A capture name declared by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureName {
	pub name: Box<str>,
	/// `None` for private (`@_name`) captures.
	pub highlight: Option<HighlightName>,
}

/// A node tagged by a query match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capture {
	pub node: NodeId,
	pub highlight: HighlightName,
	pub priority: i32,
	/// Declaration order of the matching pattern.
	pub pattern_index: u32,
	/// Declaration order of the capture name.
	pub capture_index: u32,
}

/// A compiled highlight query.
#[derive(Debug, Clone)]
pub struct HighlightQuery {
	patterns: Vec<Pattern>,
	captures: Vec<CaptureName>,
}

impl HighlightQuery {
	/// Compiles query source. Every pattern, predicate and capture name is
	/// validated here, so evaluation never fails on the query itself.
	pub fn new(source: &str) -> Result<Self, QueryDefinitionError> {
		let (patterns, captures) = parser::parse(source)?;
		tracing::debug!(patterns = patterns.len(), captures = captures.len(), "compiled highlight query");
		Ok(Self { patterns, captures })
	}

	pub fn pattern_count(&self) -> usize {
		self.patterns.len()
	}

	/// Returns the zero-based source row where pattern `index` starts.
	pub fn pattern_row(&self, index: usize) -> Option<usize> {
		self.patterns.get(index).map(|p| p.row)
	}

	/// Evaluates every pattern against `tree`.
	///
	/// Returns captures in traversal order, without duplicates. Private
	/// captures are dropped after their predicates ran.
	pub fn evaluate(
		&self,
		tree: &ParseTree,
		source: &SourceBuffer,
		deadline: &Deadline,
	) -> Result<Vec<Capture>, DeadlineExceeded> {
		let mut captures = Vec::new();
		let mut seen = rustc_hash::FxHashSet::default();
		for node in tree.preorder() {
			deadline.check()?;
			for (pattern_index, pattern) in self.patterns.iter().enumerate() {
				let matches = matcher::match_at(tree, pattern, node, deadline).inspect_err(|_| {
					tracing::debug!(pattern = pattern_index, node = ?node, "deadline passed while matching");
				})?;
				for bindings in matches {
					if !predicate::satisfied(&pattern.predicates, &bindings, tree, source) {
						continue;
					}
					for &(capture_index, node) in &bindings {
						let Some(highlight) = self.captures[capture_index as usize].highlight else {
							continue;
						};
						let capture = Capture {
							node,
							highlight,
							priority: pattern.priority,
							pattern_index: pattern_index as u32,
							capture_index,
						};
						if seen.insert(capture) {
							captures.push(capture);
						}
					}
				}
			}
		}
		Ok(captures)
	}
}

#[cfg(test)]
mod tests;
