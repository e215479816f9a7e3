use glint_primitives::SourceBuffer;

use super::matcher::Bindings;
use super::pattern::{CaptureId, Predicate, PredicateArg};
use crate::tree::ParseTree;

/// Text of every node bound to `capture`.
fn texts<'a>(
	bindings: &'a Bindings,
	capture: CaptureId,
	tree: &'a ParseTree,
	source: &'a SourceBuffer,
) -> impl Iterator<Item = &'a str> + 'a {
	bindings
		.iter()
		.filter(move |(c, _)| *c == capture)
		.map(move |&(_, id)| tree.node(id).text(source))
}

/// Evaluates text predicates. A predicate must hold for every node of a
/// quantified capture; a capture with no nodes satisfies it.
pub(super) fn satisfied(predicates: &[Predicate], bindings: &Bindings, tree: &ParseTree, source: &SourceBuffer) -> bool {
	predicates.iter().all(|predicate| match predicate {
		Predicate::Eq {
			capture,
			other,
			negated,
		} => {
			let expected = match other {
				PredicateArg::Text(text) => Some(&**text),
				PredicateArg::Capture(other) => texts(bindings, *other, tree, source).next(),
			};
			match expected {
				Some(expected) => texts(bindings, *capture, tree, source).all(|text| (text == expected) != *negated),
				None => true,
			}
		}
		Predicate::AnyOf {
			capture,
			values,
			negated,
		} => texts(bindings, *capture, tree, source).all(|text| values.iter().any(|v| &**v == text) != *negated),
		Predicate::Match {
			capture,
			regex,
			negated,
		} => texts(bindings, *capture, tree, source).all(|text| regex.is_match(text) != *negated),
	})
}
