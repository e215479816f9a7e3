//! Structural matching of a pattern at one node.
//!
//! Plain child items enumerate every way they can match; quantified items are
//! greedy and take the earliest run of repetitions, falling back to zero
//! repetitions only when the rest of the sequence cannot match after them.
//!
//! Every completed match is kept. The search itself is bounded only by the
//! fixture deadline, polled every [`POLL_INTERVAL`] steps.

use std::ops::Range;

use glint_primitives::{Deadline, DeadlineExceeded};
use smallvec::SmallVec;

use super::pattern::{CaptureId, Expr, ExprKind, Item, KindMatcher, Pattern, Quantifier, Sequence};
use crate::tree::{Node, NodeId, ParseTree};

/// Nodes bound to captures by one match, sorted.
pub(super) type Bindings = SmallVec<[(CaptureId, NodeId); 4]>;

/// Search steps between deadline checks.
const POLL_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seek {
	/// Must match the node at the current position.
	Exact,
	/// May skip anonymous siblings only.
	Anchored,
	/// May skip any siblings.
	Free,
}

impl Seek {
	fn tighten(self, anchored: bool) -> Self {
		if anchored && self == Self::Free { Self::Anchored } else { self }
	}
}

struct Matcher<'t> {
	tree: &'t ParseTree,
	deadline: &'t Deadline,
	steps: usize,
	expired: Option<DeadlineExceeded>,
}

/// Matches `pattern` with `node` as the pattern's outermost node (or, for a
/// sibling group, as its first node).
///
/// Fails only when `deadline` passes mid-search; partial results are never
/// returned.
pub(super) fn match_at(
	tree: &ParseTree,
	pattern: &Pattern,
	node: Node<'_>,
	deadline: &Deadline,
) -> Result<Vec<Bindings>, DeadlineExceeded> {
	let mut m = Matcher {
		tree,
		deadline,
		steps: 0,
		expired: None,
	};
	let mut bindings = match &pattern.expr.kind {
		ExprKind::Group(seq) => {
			let siblings = match node.parent() {
				Some(parent) => parent.child_ids(),
				None => std::slice::from_ref(&NodeId::ROOT),
			};
			m.match_seq(&seq.items, siblings, node.index_in_parent(), Seek::Exact)
				.into_iter()
				.map(|(b, _)| b)
				.collect()
		}
		_ => m.match_node(&pattern.expr, node),
	};

	for b in &mut bindings {
		b.sort_unstable();
		b.dedup();
	}
	if let Some(expired) = m.expired {
		return Err(expired);
	}
	bindings.sort_unstable();
	bindings.dedup();
	Ok(bindings)
}

fn kind_matches(kind: &KindMatcher, node: Node<'_>) -> bool {
	match kind {
		KindMatcher::Named(k) => node.is_named() && node.kind() == &**k,
		KindMatcher::AnyNamed => node.is_named(),
		KindMatcher::Any => true,
		KindMatcher::Anonymous(text) => !node.is_named() && node.kind() == &**text,
		KindMatcher::Error => node.is_error(),
		KindMatcher::Missing(None) => node.is_missing(),
		KindMatcher::Missing(Some(k)) => node.is_missing() && node.kind() == &**k,
	}
}

impl Matcher<'_> {
	/// Returns false once the deadline has passed.
	fn step(&mut self) -> bool {
		self.steps += 1;
		if self.expired.is_none() && self.steps % POLL_INTERVAL == 0 {
			self.expired = self.deadline.check().err();
		}
		self.expired.is_none()
	}

	fn candidates(&self, children: &[NodeId], pos: usize, seek: Seek) -> Range<usize> {
		let len = children.len();
		if pos >= len {
			return len..len;
		}
		match seek {
			Seek::Exact => pos..pos + 1,
			Seek::Free => pos..len,
			Seek::Anchored => {
				let end = children[pos..]
					.iter()
					.position(|&id| self.tree.node(id).is_named())
					.map_or(len, |i| pos + i + 1);
				pos..end
			}
		}
	}

	fn match_node(&mut self, expr: &Expr, node: Node<'_>) -> Vec<Bindings> {
		if let Some(field) = &expr.field {
			if node.field_name() != Some(&**field) {
				return Vec::new();
			}
		}
		let mut results = match &expr.kind {
			ExprKind::Node(pattern) => {
				if !kind_matches(&pattern.kind, node) || pattern.negated_fields.iter().any(|f| node.has_field(f)) {
					Vec::new()
				} else if pattern.children.items.is_empty() {
					vec![Bindings::new()]
				} else {
					self.match_children(&pattern.children, node.child_ids())
				}
			}
			ExprKind::Alternation(alternatives) => {
				let mut out = Vec::new();
				for alt in alternatives {
					out.extend(self.match_node(alt, node));
				}
				out
			}
			ExprKind::Group(_) => Vec::new(),
		};
		for b in &mut results {
			b.extend(expr.captures.iter().map(|&c| (c, node.id())));
		}
		results
	}

	fn match_children(&mut self, seq: &Sequence, children: &[NodeId]) -> Vec<Bindings> {
		let tree = self.tree;
		self.match_seq(&seq.items, children, 0, Seek::Free)
			.into_iter()
			.filter(|(_, end)| !seq.anchor_end || children[*end..].iter().all(|&c| !tree.node(c).is_named()))
			.map(|(b, _)| b)
			.collect()
	}

	fn match_seq(&mut self, items: &[Item], children: &[NodeId], pos: usize, seek: Seek) -> Vec<(Bindings, usize)> {
		let Some((item, rest)) = items.split_first() else {
			return vec![(Bindings::new(), pos)];
		};
		if !self.step() {
			return Vec::new();
		}
		let seek = seek.tighten(item.anchored);

		let mut out = Vec::new();
		let mut consumed = false;
		for (head, end) in self.match_item(item, children, pos, seek) {
			consumed |= end > pos;
			for (tail, tail_end) in self.match_seq(rest, children, end, Seek::Free) {
				let mut b = head.clone();
				b.extend(tail);
				out.push((b, tail_end));
			}
		}
		if out.is_empty() && consumed && item.quantifier.allows_zero() {
			out = self.match_seq(rest, children, pos, seek);
		}
		out
	}

	fn match_item(&mut self, item: &Item, children: &[NodeId], pos: usize, seek: Seek) -> Vec<(Bindings, usize)> {
		if item.quantifier == Quantifier::One {
			return self.match_once(&item.expr, children, pos, seek);
		}

		let mut bindings = Bindings::new();
		let mut cur = pos;
		let mut count = 0;
		let mut seek = seek;
		while count == 0 || item.quantifier.repeats() {
			let Some((b, end)) = self.match_once(&item.expr, children, cur, seek).into_iter().next() else {
				break;
			};
			if end <= cur {
				break;
			}
			bindings.extend(b);
			cur = end;
			count += 1;
			seek = Seek::Anchored;
		}

		match count {
			0 if item.quantifier.allows_zero() => vec![(Bindings::new(), pos)],
			0 => Vec::new(),
			_ => vec![(bindings, cur)],
		}
	}

	fn match_once(&mut self, expr: &Expr, children: &[NodeId], pos: usize, seek: Seek) -> Vec<(Bindings, usize)> {
		if let ExprKind::Group(seq) = &expr.kind {
			return self.match_seq(&seq.items, children, pos, seek);
		}
		let mut out = Vec::new();
		for j in self.candidates(children, pos, seek) {
			if !self.step() {
				break;
			}
			let node = self.tree.node(children[j]);
			out.extend(self.match_node(expr, node).into_iter().map(|b| (b, j + 1)));
		}
		out
	}
}
