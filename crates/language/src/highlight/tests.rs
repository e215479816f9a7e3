use glint_primitives::ByteRange;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use super::*;
use crate::query::{Capture, DEFAULT_PRIORITY};
use crate::tree::TreeBuilder;

use glint_primitives::HighlightName::{Escape, Function, Identifier, Keyword, String as Str};

fn cand(range: std::ops::Range<u32>, highlight: HighlightName, priority: i32, pattern_index: u32) -> Candidate {
	Candidate {
		range: range.into(),
		highlight,
		priority,
		pattern_index,
		capture_index: 0,
		order: 0,
	}
}

fn span(range: std::ops::Range<u32>, highlight: HighlightName) -> HighlightSpan {
	HighlightSpan {
		start: range.start,
		end: range.end,
		highlight,
	}
}

#[test]
fn test_highlight_span() {
	let span = span(10..20, Keyword);
	assert_eq!(span.range(), 10..20);
	assert_eq!(span.len(), 10);
	assert!(!span.is_empty());
}

#[rstest]
#[case::higher_priority_inner_splits_outer(
	vec![cand(0..20, Function, 100, 0), cand(9..13, Identifier, 110, 1)],
	vec![span(0..9, Function), span(9..13, Identifier), span(13..20, Function)],
)]
#[case::narrower_wins_at_equal_priority(
	vec![cand(9..13, Identifier, 100, 0), cand(0..20, Function, 100, 1)],
	vec![span(0..9, Function), span(9..13, Identifier), span(13..20, Function)],
)]
#[case::higher_priority_outer_wins(
	vec![cand(0..20, Function, 120, 0), cand(9..13, Identifier, 100, 1)],
	vec![span(0..20, Function)],
)]
#[case::later_pattern_wins_ties(
	vec![cand(0..5, Keyword, 100, 0), cand(0..5, Function, 100, 1)],
	vec![span(0..5, Function)],
)]
#[case::gaps_stay_untagged(
	vec![cand(0..2, Keyword, 100, 0), cand(5..7, Keyword, 100, 0)],
	vec![span(0..2, Keyword), span(5..7, Keyword)],
)]
#[case::adjacent_captures_stay_separate(
	vec![cand(0..3, Keyword, 100, 0), cand(3..5, Keyword, 100, 0)],
	vec![span(0..3, Keyword), span(3..5, Keyword)],
)]
#[case::zero_length_dropped(
	vec![cand(4..4, Keyword, 200, 0), cand(0..8, Str, 100, 0)],
	vec![span(0..8, Str)],
)]
#[case::escapes_inside_string(
	vec![cand(0..10, Str, 100, 0), cand(2..4, Escape, 100, 1), cand(6..8, Escape, 100, 1)],
	vec![
		span(0..2, Str),
		span(2..4, Escape),
		span(4..6, Str),
		span(6..8, Escape),
		span(8..10, Str),
	],
)]
#[case::partial_overlap(
	vec![cand(0..6, Keyword, 100, 0), cand(4..10, Function, 100, 1)],
	vec![span(0..4, Keyword), span(4..10, Function)],
)]
fn test_resolve_candidates(#[case] candidates: Vec<Candidate>, #[case] expected: Vec<HighlightSpan>) {
	assert_eq!(resolve_candidates(candidates), expected);
}

#[test]
fn test_later_capture_name_breaks_remaining_ties() {
	let mut first = cand(0..4, Keyword, 100, 0);
	let mut second = cand(0..4, Function, 100, 0);
	first.capture_index = 3;
	second.capture_index = 1;
	assert_eq!(resolve_candidates(vec![first, second]), vec![span(0..4, Keyword)]);
}

#[test]
fn test_resolve_uses_node_ranges() {
	// `f(x)` as (call (identifier) (arguments (identifier)))
	let mut b = TreeBuilder::new();
	b.start_node("call", true, None, 0).unwrap();
	let name = b.leaf("identifier", true, Some("name"), 0..1).unwrap();
	let args = b.start_node("arguments", true, None, 1).unwrap();
	let arg = b.leaf("identifier", true, None, 2..3).unwrap();
	b.finish_node(4).unwrap();
	let call = b.finish_node(4).unwrap();
	let tree = b.finish().unwrap();

	let capture = |node, highlight, pattern_index| Capture {
		node,
		highlight,
		priority: DEFAULT_PRIORITY,
		pattern_index,
		capture_index: 0,
	};
	let captures = [
		capture(call, Str, 0),
		capture(name, Function, 0),
		capture(args, Keyword, 0),
		capture(arg, Identifier, 0),
	];
	assert_eq!(
		resolve(&captures, &tree),
		vec![
			span(0..1, Function),
			span(1..2, Keyword),
			span(2..3, Identifier),
			span(3..4, Keyword),
		]
	);
}

#[test]
fn test_resolution_ignores_input_order() {
	let candidates = vec![
		cand(0..20, Function, 100, 0),
		cand(3..9, Str, 100, 2),
		cand(9..13, Identifier, 110, 1),
		cand(5..6, Escape, 90, 3),
	];
	let forward = resolve_candidates(candidates.clone());
	let mut reversed = candidates;
	reversed.reverse();
	assert_eq!(resolve_candidates(reversed), forward);
}

/// Owner of each byte by brute force; `None` when nothing covers it.
fn owners(candidates: &[Candidate], len: u32) -> Vec<Option<usize>> {
	(0..len)
		.map(|byte| {
			candidates
				.iter()
				.enumerate()
				.filter(|(_, c)| c.range.start <= byte && byte < c.range.end)
				.max_by_key(|(_, c)| c.rank())
				.map(|(i, _)| i)
		})
		.collect()
}

fn arb_candidates() -> impl Strategy<Value = Vec<Candidate>> {
	let highlights = [Keyword, Function, Identifier, Str, Escape];
	prop::collection::vec((0u32..40, 0u32..12, 0usize..5, 98i32..103, 0u32..4), 0..12).prop_map(move |raw| {
		raw.into_iter()
			.enumerate()
			.map(|(i, (start, len, h, priority, pattern_index))| Candidate {
				range: ByteRange::new(start, start + len),
				highlight: highlights[h],
				priority,
				pattern_index,
				capture_index: 0,
				order: i as u32,
			})
			.collect()
	})
}

proptest! {
	#[test]
	fn prop_spans_are_ordered_disjoint_and_match_brute_force(candidates in arb_candidates()) {
		let spans = resolve_candidates(candidates.clone());

		for span in &spans {
			prop_assert!(!span.is_empty());
		}
		for pair in spans.windows(2) {
			prop_assert!(pair[0].end <= pair[1].start);
		}

		let owners = owners(&candidates, 52);
		let mut expected_runs = 0;
		for (byte, owner) in owners.iter().enumerate() {
			let byte = byte as u32;
			let covering = spans.iter().find(|s| s.start <= byte && byte < s.end);
			match owner {
				Some(i) => {
					let covering = covering.map(|s| s.highlight);
					prop_assert_eq!(covering, Some(candidates[*i].highlight));
					if byte == 0 || owners[byte as usize - 1] != *owner {
						expected_runs += 1;
					}
				}
				None => prop_assert!(covering.is_none()),
			}
		}
		prop_assert_eq!(spans.len(), expected_runs);
	}

	#[test]
	fn prop_resolution_is_idempotent(candidates in arb_candidates()) {
		prop_assert_eq!(resolve_candidates(candidates.clone()), resolve_candidates(candidates));
	}
}
