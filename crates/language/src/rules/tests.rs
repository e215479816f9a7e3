use std::time::Duration;

use glint_primitives::ByteRange;
use pretty_assertions::assert_eq;

use super::*;

const MINI: &str = r#"
name = "mini"
root = "program"
keywords = ["class", "int", "return"]
punctuation = [";", ",", "=", "=="]

[[tokens]]
kind = "identifier"
pattern = '[A-Za-z_][A-Za-z0-9_]*'

[[tokens]]
kind = "number"
pattern = '[0-9]+'

[[tokens]]
kind = "line_comment"
pattern = '//[^\n]*'
extra = true

[[tokens]]
kind = "string_literal"
begin = '"'
end = '"'
escape = '\'

[[groups]]
kind = "argument_list"
open = "("
close = ")"

[[groups]]
kind = "block"
open = "{"
close = "}"

[[rules]]
kind = "method_invocation"
sequence = [
  { kind = "identifier", field = "name" },
  { kind = "argument_list", field = "arguments" },
]

[[rules]]
kind = "class_declaration"
sequence = [
  { kind = "class" },
  { kind = "identifier", field = "name" },
  { kind = "block", field = "body" },
]
"#;

fn parse(text: &str) -> (SourceBuffer, ParseTree) {
	let grammar = RulesGrammar::from_toml(MINI).unwrap();
	let source = SourceBuffer::new(text).unwrap();
	let tree = grammar.parse(&source, &Deadline::none()).unwrap();
	(source, tree)
}

#[test]
fn test_line_comment_is_one_token() {
	let (source, tree) = parse("// note \"x\nfoo");
	assert_eq!(tree.to_sexp(), "(program (line_comment) (identifier))");
	let comment = tree.root().child(0).unwrap();
	assert_eq!(comment.text(&source), "// note \"x");
}

#[test]
fn test_string_with_escapes_is_one_token() {
	let (source, tree) = parse(r#""a\"b // c" x"#);
	assert_eq!(tree.to_sexp(), "(program (string_literal) (identifier))");
	let string = tree.root().child(0).unwrap();
	assert_eq!(string.text(&source), r#""a\"b // c""#);
	assert!(!tree.has_error());
}

#[test]
fn test_keywords_become_anonymous_nodes() {
	let (_, tree) = parse("class Foo {}");
	assert_eq!(
		tree.to_sexp(),
		"(program (class_declaration name: (identifier) body: (block)))"
	);
	let class = tree.root().child(0).unwrap().child(0).unwrap();
	assert_eq!(class.kind(), "class");
	assert!(!class.is_named());
}

#[test]
fn test_longest_punctuation_wins() {
	let (_, tree) = parse("a == b");
	let op = tree.root().child(1).unwrap();
	assert_eq!(op.kind(), "==");
	assert_eq!(op.byte_range(), ByteRange::new(2, 4));
}

#[test]
fn test_sequence_rules_assign_fields() {
	let (source, tree) = parse("print(x, 1);");
	assert_eq!(
		tree.to_sexp(),
		"(program (method_invocation name: (identifier) arguments: (argument_list (identifier) (number))))"
	);
	let call = tree.root().child(0).unwrap();
	assert_eq!(call.text(&source), "print(x, 1)");
	assert_eq!(call.child_by_field_name("name").unwrap().text(&source), "print");
}

#[test]
fn test_extras_may_interrupt_a_sequence() {
	let (_, tree) = parse("print // c\n(x)");
	assert_eq!(
		tree.to_sexp(),
		"(program (method_invocation name: (identifier) (line_comment) arguments: (argument_list (identifier))))"
	);
}

#[test]
fn test_unrecognized_bytes_become_one_error_node() {
	let (source, tree) = parse("x @# y");
	assert_eq!(tree.to_sexp(), "(program (identifier) (ERROR) (identifier))");
	let error = tree.root().child(1).unwrap();
	assert_eq!(error.text(&source), "@#");
	assert!(tree.has_error());
}

#[test]
fn test_stray_closer_is_wrapped_in_error() {
	let (_, tree) = parse("x)");
	assert_eq!(tree.to_sexp(), "(program (identifier) (ERROR))");
	let error = tree.root().child(1).unwrap();
	assert_eq!(error.child(0).unwrap().kind(), ")");
}

#[test]
fn test_unclosed_group_gets_missing_closer() {
	let (_, tree) = parse("f(x");
	assert_eq!(
		tree.to_sexp(),
		"(program (method_invocation name: (identifier) arguments: (argument_list (identifier))))"
	);
	let args = tree.root().child(0).unwrap().child(1).unwrap();
	let close = args.child(args.child_count() - 1).unwrap();
	assert_eq!(close.kind(), ")");
	assert!(close.is_missing());
	assert_eq!(close.byte_range(), ByteRange::empty(3));
	assert!(tree.has_error());
}

#[test]
fn test_outer_closer_closes_inner_groups() {
	let (_, tree) = parse("{ f( }");
	assert_eq!(
		tree.to_sexp(),
		"(program (block (method_invocation name: (identifier) arguments: (argument_list))))"
	);
	let block = tree.root().child(0).unwrap();
	assert_eq!(block.byte_range(), ByteRange::new(0, 6));
	let args = block.child(1).unwrap().child(1).unwrap();
	assert!(args.child(1).unwrap().is_missing());
	assert_eq!(args.byte_range(), ByteRange::new(3, 4));
}

#[test]
fn test_unterminated_string_stops_at_line_end() {
	let (source, tree) = parse("\"abc\nx");
	assert_eq!(tree.to_sexp(), "(program (ERROR) (identifier))");
	assert_eq!(tree.root().child(0).unwrap().text(&source), "\"abc");
}

#[test]
fn test_root_covers_whole_buffer() {
	let (source, tree) = parse("  x  \n");
	assert_eq!(tree.root().byte_range(), ByteRange::new(0, source.len()));

	let (_, empty) = parse("");
	assert_eq!(empty.to_sexp(), "(program)");
	assert_eq!(empty.root().byte_range(), ByteRange::new(0, 0));
}

#[test]
fn test_parse_is_deterministic() {
	let text = "class A { run(\"s\", 2); } // tail";
	let (_, first) = parse(text);
	let (_, second) = parse(text);
	assert_eq!(first.to_sexp(), second.to_sexp());
	assert_eq!(first.len(), second.len());
}

#[test]
fn test_expired_deadline_times_out() {
	let grammar = RulesGrammar::from_toml(MINI).unwrap();
	let source = SourceBuffer::new("x").unwrap();
	let err = grammar
		.parse(&source, &Deadline::after(Duration::ZERO))
		.unwrap_err();
	assert!(matches!(err, ParseError::Timeout(_)), "{err}");
}

#[rstest::rstest]
#[case::empty_name("name = \"\"")]
#[case::pattern_and_delimiters("name = \"x\"\n[[tokens]]\nkind = \"t\"\npattern = \"a\"\nbegin = \"b\"\nend = \"c\"")]
#[case::bad_regex("name = \"x\"\n[[tokens]]\nkind = \"t\"\npattern = \"(\"")]
#[case::only_optional("name = \"x\"\n[[rules]]\nkind = \"r\"\nsequence = [{ kind = \"a\", optional = true }]")]
#[case::same_open_close("name = \"x\"\n[[groups]]\nkind = \"g\"\nopen = \"|\"\nclose = \"|\"")]
#[case::unknown_key("name = \"x\"\nkeyword = [\"if\"]")]
fn test_invalid_definitions_are_rejected(#[case] text: &str) {
	let err = RulesGrammar::from_toml(text).unwrap_err();
	assert!(matches!(err, GrammarError::Definition { .. }), "{err}");
}

#[test]
fn test_from_path_names_the_file_on_syntax_errors() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("broken.toml");
	std::fs::write(&path, "name = ").unwrap();
	let err = RulesGrammar::from_path(&path).unwrap_err();
	match err {
		GrammarError::Definition { grammar, .. } => assert!(grammar.ends_with("broken.toml")),
		other => panic!("unexpected error: {other}"),
	}

	let missing = RulesGrammar::from_path(&dir.path().join("absent.toml")).unwrap_err();
	assert!(matches!(missing, GrammarError::Io { .. }), "{missing}");
}
