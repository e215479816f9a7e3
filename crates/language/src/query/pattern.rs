//! Compiled query patterns.

use regex::Regex;

/// Index into the query's capture name table.
pub(crate) type CaptureId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KindMatcher {
	/// `(kind)`
	Named(Box<str>),
	/// `(_)`
	AnyNamed,
	/// `_`
	Any,
	/// `"text"`
	Anonymous(Box<str>),
	/// `(ERROR)`
	Error,
	/// `(MISSING)` or `(MISSING kind)`
	Missing(Option<Box<str>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quantifier {
	One,
	ZeroOrOne,
	ZeroOrMore,
	OneOrMore,
}

impl Quantifier {
	pub(crate) fn allows_zero(self) -> bool {
		matches!(self, Self::ZeroOrOne | Self::ZeroOrMore)
	}

	pub(crate) fn repeats(self) -> bool {
		matches!(self, Self::ZeroOrMore | Self::OneOrMore)
	}
}

#[derive(Debug, Clone)]
pub(crate) struct NodePattern {
	pub(crate) kind: KindMatcher,
	pub(crate) negated_fields: Vec<Box<str>>,
	pub(crate) children: Sequence,
}

/// Ordered child items. Other siblings may sit between items unless the
/// later item is anchored.
#[derive(Debug, Clone, Default)]
pub(crate) struct Sequence {
	pub(crate) items: Vec<Item>,
	/// `.` after the last item: no named sibling may follow it.
	pub(crate) anchor_end: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Item {
	pub(crate) expr: Expr,
	pub(crate) quantifier: Quantifier,
	/// `.` before this item: no named sibling may be skipped to reach it.
	pub(crate) anchored: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
	Node(NodePattern),
	Alternation(Vec<Expr>),
	/// Sibling sequence, `((a) (b))`.
	Group(Sequence),
}

#[derive(Debug, Clone)]
pub(crate) struct Expr {
	pub(crate) kind: ExprKind,
	pub(crate) field: Option<Box<str>>,
	pub(crate) captures: Vec<CaptureId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PredicateArg {
	Capture(CaptureId),
	Text(Box<str>),
}

#[derive(Debug, Clone)]
pub(crate) enum Predicate {
	Eq {
		capture: CaptureId,
		other: PredicateArg,
		negated: bool,
	},
	AnyOf {
		capture: CaptureId,
		values: Vec<Box<str>>,
		negated: bool,
	},
	Match {
		capture: CaptureId,
		regex: Regex,
		negated: bool,
	},
}

/// One top-level pattern of a query.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
	pub(crate) expr: Expr,
	pub(crate) predicates: Vec<Predicate>,
	pub(crate) priority: i32,
	/// Zero-based row of the pattern's first token.
	pub(crate) row: usize,
}
