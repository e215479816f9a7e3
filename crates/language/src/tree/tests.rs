use glint_primitives::SourceBuffer;
use pretty_assertions::assert_eq;

use super::*;

/// `int x;` as `(declaration type: (type) name: (identifier))` plus a `;` token.
fn declaration() -> ParseTree {
	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	b.start_node("declaration", true, None, 0).unwrap();
	b.leaf("type", true, Some("type"), 0..3).unwrap();
	b.leaf("identifier", true, Some("name"), 4..5).unwrap();
	b.leaf(";", false, None, 5..6).unwrap();
	b.finish_node(6).unwrap();
	b.finish_node(6).unwrap();
	b.finish().unwrap()
}

#[test]
fn test_builder_links_parents_and_fields() {
	let tree = declaration();
	let root = tree.root();
	assert_eq!(root.kind(), "program");
	assert_eq!(root.child_count(), 1);

	let decl = root.child(0).unwrap();
	assert_eq!(decl.parent(), Some(root));
	assert_eq!(decl.byte_range(), ByteRange::new(0, 6));

	let name = decl.child_by_field_name("name").unwrap();
	assert_eq!(name.kind(), "identifier");
	assert_eq!(name.index_in_parent(), 1);
	assert!(decl.has_field("type"));
	assert!(!decl.has_field("value"));
	assert_eq!(decl.named_children().count(), 2);
}

#[test]
fn test_preorder_is_document_order() {
	let tree = declaration();
	let kinds: Vec<_> = tree.preorder().map(|n| n.kind()).collect();
	assert_eq!(kinds, ["program", "declaration", "type", "identifier", ";"]);
}

#[test]
fn test_sexp_and_pretty_print() {
	let tree = declaration();
	assert_eq!(
		tree.to_sexp(),
		"(program (declaration type: (type) name: (identifier)))"
	);

	let source = SourceBuffer::new("int x;").unwrap();
	let mut out = String::new();
	tree.pretty_print(&source, &mut out).unwrap();
	assert_eq!(
		out,
		"(program) [0..6]\n  (declaration) [0..6]\n    type: (type) [0..3] \"int\"\n    name: (identifier) [4..5] \"x\"\n    \";\" [5..6]\n"
	);
}

#[test]
fn test_error_and_missing_nodes_are_reported() {
	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	b.leaf(ERROR_KIND, true, None, 0..1).unwrap();
	b.missing(";", false, None, 1).unwrap();
	b.finish_node(1).unwrap();
	let tree = b.finish().unwrap();

	assert!(tree.has_error());
	assert!(tree.root().child(0).unwrap().is_error());
	assert!(tree.root().child(1).unwrap().is_missing());
	assert_eq!(tree.to_sexp(), "(program (ERROR))");
}

#[test]
fn test_builder_rejects_overlapping_children() {
	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	b.leaf("a", true, None, 0..4).unwrap();
	b.leaf("b", true, None, 2..6).unwrap();
	let err = b.finish_node(6).unwrap_err();
	assert!(matches!(err, GrammarError::MalformedTree(_)), "{err}");
}

#[test]
fn test_builder_rejects_child_outside_parent() {
	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	b.leaf("a", true, None, 0..9).unwrap();
	assert!(b.finish_node(4).is_err());
}

#[test]
fn test_builder_rejects_unfinished_and_second_root() {
	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	assert!(b.finish().is_err());

	let mut b = TreeBuilder::new();
	b.start_node("program", true, None, 0).unwrap();
	b.finish_node(0).unwrap();
	assert!(b.start_node("program", true, None, 0).is_err());
}
