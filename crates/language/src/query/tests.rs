use std::time::Duration;

use glint_primitives::{Deadline, HighlightName, SourceBuffer};
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::grammar::Grammar;
use crate::rules::RulesGrammar;

const CALC: &str = r#"
name = "calc"
root = "program"
keywords = ["let"]
punctuation = [";", ",", "="]

[[tokens]]
kind = "identifier"
pattern = '[A-Za-z_][A-Za-z0-9_]*'

[[tokens]]
kind = "number"
pattern = '[0-9]+'

[[tokens]]
kind = "comment"
pattern = '//[^\n]*'
extra = true

[[groups]]
kind = "argument_list"
open = "("
close = ")"

[[rules]]
kind = "call"
sequence = [
  { kind = "identifier", field = "name" },
  { kind = "argument_list", field = "arguments" },
]

[[rules]]
kind = "let_declaration"
sequence = [
  { kind = "let" },
  { kind = "identifier", field = "name" },
  { kind = "=" },
  { kind = "number", field = "value", optional = true },
  { kind = ";" },
]
"#;

fn parse(text: &str) -> (SourceBuffer, ParseTree) {
	let grammar = RulesGrammar::from_toml(CALC).unwrap();
	let source = SourceBuffer::new(text).unwrap();
	let tree = grammar.parse(&source, &Deadline::none()).unwrap();
	(source, tree)
}

fn captured(query: &str, text: &str) -> Vec<(String, HighlightName)> {
	let (source, tree) = parse(text);
	let query = HighlightQuery::new(query).unwrap();
	query
		.evaluate(&tree, &source, &Deadline::none())
		.unwrap()
		.into_iter()
		.map(|c| (tree.node(c.node).text(&source).to_owned(), c.highlight))
		.collect()
}

fn texts(captures: &[(String, HighlightName)]) -> Vec<&str> {
	captures.iter().map(|(t, _)| t.as_str()).collect()
}

#[test]
fn test_anonymous_keywords() {
	let got = captured(r#"["let" "="] @keyword"#, "let x = 1;");
	assert_eq!(
		got,
		vec![
			("let".to_owned(), HighlightName::Keyword),
			("=".to_owned(), HighlightName::Keyword),
		]
	);
}

#[test]
fn test_field_capture_binds_only_the_child() {
	let got = captured("(let_declaration name: (identifier) @variable)", "let x = 1; y");
	assert_eq!(got, vec![("x".to_owned(), HighlightName::Variable)]);
}

#[test]
fn test_plain_child_pattern_matches_every_child() {
	let got = captured("(argument_list (identifier) @variable)", "f(a, 2, b)");
	assert_eq!(texts(&got), ["a", "b"]);
}

#[rstest]
#[case::comments("(program (comment) @comment)", "// c")]
#[case::identifiers("(program (identifier) @variable)", "v")]
fn test_wide_parents_keep_every_child_match(#[case] query: &str, #[case] prefix: &str) {
	let text: String = (0..300).map(|i| format!("{prefix}{i}\n")).collect();
	let got = captured(query, &text);
	assert_eq!(got.len(), 300);
	assert_eq!(got[299].0, format!("{prefix}299"));
}

#[test]
fn test_dotted_capture_maps_to_base_highlight() {
	let got = captured("(call name: (identifier) @function.call)", "f(a)");
	assert_eq!(got, vec![("f".to_owned(), HighlightName::Function)]);
}

#[test]
fn test_wildcards() {
	let named = captured("(call (_) @variable)", "f(a)");
	assert_eq!(texts(&named), ["f", "(a)"]);

	let any = captured("(argument_list _ @punctuation)", "f(a)");
	assert_eq!(texts(&any), ["(", "a", ")"]);
}

#[test]
fn test_negated_field() {
	let got = captured("(let_declaration !value name: (identifier) @variable)", "let a = 1; let b = ;");
	assert_eq!(texts(&got), ["b"]);
}

#[rstest]
#[case::first("(argument_list . (identifier) @variable)", &["a"])]
#[case::last("(argument_list (identifier) @variable .)", &["c"])]
#[case::adjacent("(argument_list (identifier) @variable . \",\" . (number) @number)", &["b", "2"])]
fn test_anchors(#[case] query: &str, #[case] expected: &[&str]) {
	let got = captured(query, "f(a, b, 2, c)");
	assert_eq!(texts(&got), expected);
}

#[test]
fn test_one_or_more_binds_every_repetition() {
	let got = captured("(argument_list \"(\" (identifier)+ @variable)", "f(a, b, 2, c)");
	assert_eq!(texts(&got), ["a", "b"]);
}

#[test]
fn test_optional_falls_back_to_zero_repetitions() {
	let got = captured("(argument_list (number)? @number . (identifier) @variable .)", "f(a)");
	assert_eq!(texts(&got), ["a"]);

	let got = captured("(argument_list (number)? @number . (identifier) @variable .)", "f(1, a)");
	assert_eq!(texts(&got), ["1", "a"]);
}

#[test]
fn test_sibling_group() {
	let query = "((comment) @comment . (let_declaration))";
	assert_eq!(texts(&captured(query, "// doc\nlet x = 1;")), ["// doc"]);
	assert!(captured(query, "// doc\nx").is_empty());
}

#[test]
fn test_text_predicates() {
	let types = r#"((identifier) @type (#any-of? @type "int" "str"))"#;
	assert_eq!(texts(&captured(types, "int x str")), ["int", "str"]);

	let not_types = r#"((identifier) @variable (#not-any-of? @variable "int" "str"))"#;
	assert_eq!(texts(&captured(not_types, "int x str")), ["x"]);

	let eq = r#"((identifier) @constant (#eq? @constant "PI"))"#;
	assert_eq!(texts(&captured(eq, "PI pi")), ["PI"]);

	let not_match = r#"((identifier) @variable (#not-match? @variable "^[A-Z]"))"#;
	assert_eq!(texts(&captured(not_match, "PI pi")), ["pi"]);
}

#[test]
fn test_eq_between_captures() {
	let query = "(call name: (identifier) @function (argument_list (identifier) @_arg) (#eq? @function @_arg))";
	assert_eq!(texts(&captured(query, "f(f) g(h)")), ["f"]);
}

#[test]
fn test_private_captures_are_not_emitted() {
	let query = r#"(let_declaration name: (identifier) @_name value: (number) @number (#eq? @_name "x"))"#;
	assert_eq!(texts(&captured(query, "let x = 1; let y = 2;")), ["1"]);
}

#[test]
fn test_predicate_holds_for_every_quantified_node() {
	let query = r#"(argument_list (identifier)+ @variable (#match? @variable "^[a-z]$"))"#;
	assert_eq!(texts(&captured(query, "f(a, b)")), ["a", "b"]);
	assert!(captured(query, "f(a, Bee)").is_empty());
}

#[test]
fn test_priority_and_indices() {
	let (source, tree) = parse("PI x");
	let query = HighlightQuery::new(
		r#"
(identifier) @variable
((identifier) @constant
 (#match? @constant "^[A-Z]+$")
 (#set! priority 120))
"#,
	)
	.unwrap();
	let captures = query.evaluate(&tree, &source, &Deadline::none()).unwrap();
	let summary: Vec<_> = captures
		.iter()
		.map(|c| (tree.node(c.node).text(&source), c.highlight, c.priority, c.pattern_index, c.capture_index))
		.collect();
	let expected: Vec<(&str, HighlightName, i32, u32, u32)> = vec![
		("PI", HighlightName::Variable, DEFAULT_PRIORITY, 0, 0),
		("PI", HighlightName::Constant, 120, 1, 1),
		("x", HighlightName::Variable, DEFAULT_PRIORITY, 0, 0),
	];
	assert_eq!(summary, expected);
	assert_eq!(query.pattern_count(), 2);
	assert_eq!(query.pattern_row(1), Some(2));
}

#[test]
fn test_duplicate_matches_are_collapsed() {
	let got = captured("[(identifier) (identifier)] @variable", "a");
	assert_eq!(texts(&got), ["a"]);
}

#[test]
fn test_error_and_missing_nodes() {
	let errors = captured("(ERROR) @punctuation", "let x = 1; @");
	assert_eq!(texts(&errors), ["@"]);

	let (source, tree) = parse("f(a");
	let query = HighlightQuery::new(r#"(MISSING ")") @punctuation"#).unwrap();
	let captures = query.evaluate(&tree, &source, &Deadline::none()).unwrap();
	assert_eq!(captures.len(), 1);
	assert!(tree.node(captures[0].node).is_missing());
}

#[test]
fn test_no_match_contributes_nothing() {
	assert!(captured("(class_declaration) @type", "let x = 1;").is_empty());
}

#[test]
fn test_expired_deadline_times_out() {
	let (source, tree) = parse("x");
	let query = HighlightQuery::new("(identifier) @variable").unwrap();
	let err = query
		.evaluate(&tree, &source, &Deadline::after(Duration::ZERO))
		.unwrap_err();
	assert_eq!(err.budget, Duration::ZERO);
}

#[test]
fn test_deadline_interrupts_a_combinatorial_match() {
	let text: String = (0..300).map(|i| format!("v{i} ")).collect();
	let (source, tree) = parse(&text);
	let query = HighlightQuery::new("(program (identifier) @a (identifier) @b (identifier) @c)").unwrap();
	let budget = Duration::from_millis(10);
	let err = query.evaluate(&tree, &source, &Deadline::after(budget)).unwrap_err();
	assert_eq!(err.budget, budget);
}

#[rstest]
#[case::unknown_highlight("(identifier) @bogus", QueryErrorKind::UnknownHighlight("bogus".into()))]
#[case::unknown_predicate(
	"((identifier) @variable (#frob? @variable))",
	QueryErrorKind::UnknownPredicate("frob?".into())
)]
#[case::unknown_capture(
	r#"((identifier) @variable (#eq? @other "a"))"#,
	QueryErrorKind::UnknownCapture("other".into())
)]
#[case::unclosed("(identifier", QueryErrorKind::UnbalancedParens)]
#[case::extra_close("(identifier))", QueryErrorKind::UnbalancedParens)]
fn test_definition_errors(#[case] source: &str, #[case] expected: QueryErrorKind) {
	let err = HighlightQuery::new(source).unwrap_err();
	assert_eq!(err.kind, expected);
}

#[rstest]
#[case::bad_regex(r#"((identifier) @variable (#match? @variable "("))"#)]
#[case::bare_identifier("identifier @variable")]
#[case::bad_priority("((identifier) @variable (#set! priority high))")]
#[case::unknown_property("((identifier) @variable (#set! color red))")]
#[case::eq_arity("((identifier) @variable (#eq? @variable))")]
#[case::top_level_quantifier("(identifier)+ @variable")]
#[case::unterminated_string("\"abc")]
fn test_malformed_queries_fail_at_load(#[case] source: &str) {
	assert!(HighlightQuery::new(source).is_err());
}

#[test]
fn test_error_position_is_reported() {
	let err = HighlightQuery::new("; header\n  (identifier) @bogus").unwrap_err();
	assert_eq!((err.row, err.column), (1, 15));
	assert_eq!(
		err.to_string(),
		"query error at 2:16: capture `@bogus` is not a highlight name"
	);
}

#[test]
fn test_comments_and_empty_query() {
	let query = HighlightQuery::new("; nothing here\n").unwrap();
	assert_eq!(query.pattern_count(), 0);
	assert!(captured("; only a comment", "x").is_empty());
}
