//! Immutable parse trees.
//!
//! A [`ParseTree`] owns every node in a flat arena. Nodes refer to each other by
//! [`NodeId`], so captures and spans can point back into a tree without holding
//! borrows across pipeline stages, and nothing dangles once the tree is dropped.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use glint_primitives::{ByteRange, SourceBuffer};
use rustc_hash::FxHashMap;

use crate::grammar::GrammarError;

/// Kind of the nodes produced by error recovery.
pub const ERROR_KIND: &str = "ERROR";

/// Index of a node inside its [`ParseTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
	/// The root of every tree.
	pub const ROOT: NodeId = NodeId(0);

	#[inline]
	pub fn idx(self) -> usize {
		self.0 as usize
	}
}

#[derive(Debug, Clone)]
struct NodeData {
	kind: Arc<str>,
	field: Option<Arc<str>>,
	range: ByteRange,
	named: bool,
	missing: bool,
	parent: Option<NodeId>,
	index_in_parent: u32,
	children: Vec<NodeId>,
}

/// The structural result of parsing one source buffer.
#[derive(Debug, Clone)]
pub struct ParseTree {
	nodes: Vec<NodeData>,
}

impl ParseTree {
	/// Returns the root node.
	pub fn root(&self) -> Node<'_> {
		self.node(NodeId::ROOT)
	}

	/// Returns the node with the given id.
	///
	/// # Panics
	///
	/// Panics if `id` does not belong to this tree.
	pub fn node(&self, id: NodeId) -> Node<'_> {
		assert!(id.idx() < self.nodes.len(), "node {id:?} out of bounds");
		Node { tree: self, id }
	}

	/// Returns the number of nodes, including anonymous ones.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Returns true if any node is an error or missing node.
	pub fn has_error(&self) -> bool {
		self.nodes.iter().any(|n| n.missing || &*n.kind == ERROR_KIND)
	}

	/// Iterates all nodes in document (pre-)order.
	pub fn preorder(&self) -> Preorder<'_> {
		Preorder {
			tree: self,
			stack: vec![NodeId::ROOT],
		}
	}

	/// Renders named nodes as a tree-sitter style S-expression.
	pub fn to_sexp(&self) -> String {
		let mut out = String::new();
		write_sexp(self.root(), &mut out);
		out
	}

	/// Writes an indented dump of every node, including anonymous tokens.
	pub fn pretty_print(&self, source: &SourceBuffer, out: &mut impl fmt::Write) -> fmt::Result {
		fn go(node: Node<'_>, source: &SourceBuffer, depth: usize, out: &mut impl fmt::Write) -> fmt::Result {
			write!(out, "{:indent$}", "", indent = depth * 2)?;
			if let Some(field) = node.field_name() {
				write!(out, "{field}: ")?;
			}
			if node.is_named() {
				write!(out, "({})", node.kind())?;
			} else {
				write!(out, "{:?}", node.kind())?;
			}
			write!(out, " [{}]", node.byte_range())?;
			if node.is_missing() {
				out.write_str(" MISSING")?;
			} else if node.child_count() == 0 && node.is_named() {
				write!(out, " {:?}", node.text(source))?;
			}
			out.write_char('\n')?;
			for child in node.children() {
				go(child, source, depth + 1, out)?;
			}
			Ok(())
		}
		go(self.root(), source, 0, out)
	}
}

fn write_sexp(node: Node<'_>, out: &mut String) {
	out.push('(');
	if node.is_missing() {
		out.push_str("MISSING ");
	}
	out.push_str(node.kind());
	for child in node.children().filter(|c| c.is_named()) {
		out.push(' ');
		if let Some(field) = child.field_name() {
			out.push_str(field);
			out.push_str(": ");
		}
		write_sexp(child, out);
	}
	out.push(')');
}

/// A borrowed handle to one node of a [`ParseTree`].
#[derive(Clone, Copy)]
pub struct Node<'tree> {
	tree: &'tree ParseTree,
	id: NodeId,
}

impl<'tree> Node<'tree> {
	#[inline]
	fn data(&self) -> &'tree NodeData {
		&self.tree.nodes[self.id.idx()]
	}

	#[inline]
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Returns the node type. Anonymous nodes use their literal text.
	#[inline]
	pub fn kind(&self) -> &'tree str {
		&self.data().kind
	}

	#[inline]
	pub fn byte_range(&self) -> ByteRange {
		self.data().range
	}

	#[inline]
	pub fn start_byte(&self) -> u32 {
		self.data().range.start
	}

	#[inline]
	pub fn end_byte(&self) -> u32 {
		self.data().range.end
	}

	#[inline]
	pub fn is_named(&self) -> bool {
		self.data().named
	}

	#[inline]
	pub fn is_error(&self) -> bool {
		self.kind() == ERROR_KIND
	}

	/// Returns true for zero-width nodes inserted by error recovery.
	#[inline]
	pub fn is_missing(&self) -> bool {
		self.data().missing
	}

	/// Returns the field under which this node hangs off its parent.
	#[inline]
	pub fn field_name(&self) -> Option<&'tree str> {
		self.data().field.as_deref()
	}

	pub fn parent(&self) -> Option<Node<'tree>> {
		self.data().parent.map(|id| self.tree.node(id))
	}

	/// Returns the position of this node among its parent's children.
	#[inline]
	pub fn index_in_parent(&self) -> usize {
		self.data().index_in_parent as usize
	}

	#[inline]
	pub fn child_count(&self) -> usize {
		self.data().children.len()
	}

	pub fn child(&self, index: usize) -> Option<Node<'tree>> {
		self.data().children.get(index).map(|&id| self.tree.node(id))
	}

	/// Returns the ids of all children, named and anonymous.
	#[inline]
	pub fn child_ids(&self) -> &'tree [NodeId] {
		&self.data().children
	}

	pub fn children(self) -> impl DoubleEndedIterator<Item = Node<'tree>> + ExactSizeIterator + 'tree {
		let tree = self.tree;
		self.data().children.iter().map(move |&id| tree.node(id))
	}

	pub fn named_children(self) -> impl Iterator<Item = Node<'tree>> + 'tree {
		self.children().filter(|c| c.is_named())
	}

	/// Returns the first child hanging off `field`.
	pub fn child_by_field_name(&self, field: &str) -> Option<Node<'tree>> {
		self.children().find(|c| c.field_name() == Some(field))
	}

	/// Returns true if some child hangs off `field`.
	pub fn has_field(&self, field: &str) -> bool {
		self.child_by_field_name(field).is_some()
	}

	/// Returns the source text covered by this node.
	pub fn text<'s>(&self, source: &'s SourceBuffer) -> &'s str {
		source.slice(self.byte_range())
	}
}

impl fmt::Debug for Node<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{Node {:?} {}}}", self.kind(), self.byte_range())
	}
}

impl PartialEq for Node<'_> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self.tree, other.tree) && self.id == other.id
	}
}

impl Eq for Node<'_> {}

/// Depth-first, document-order node iterator.
pub struct Preorder<'tree> {
	tree: &'tree ParseTree,
	stack: Vec<NodeId>,
}

impl<'tree> Iterator for Preorder<'tree> {
	type Item = Node<'tree>;

	fn next(&mut self) -> Option<Self::Item> {
		let id = self.stack.pop()?;
		let node = self.tree.node(id);
		self.stack.extend(node.child_ids().iter().rev());
		Some(node)
	}
}

/// Incrementally assembles a [`ParseTree`].
///
/// Nodes are opened with [`start_node`](Self::start_node), filled with children,
/// and closed with [`finish_node`](Self::finish_node). The first node opened is
/// the root. Structural invariants (ordered, non-overlapping children that lie
/// inside their parent) are checked as nodes close.
#[derive(Debug, Default)]
pub struct TreeBuilder {
	nodes: Vec<NodeData>,
	open: Vec<NodeId>,
	kinds: FxHashMap<Box<str>, Arc<str>>,
	closed_root: bool,
}

impl TreeBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	fn intern(&mut self, kind: &str) -> Arc<str> {
		if let Some(kind) = self.kinds.get(kind) {
			return kind.clone();
		}
		let interned: Arc<str> = kind.into();
		self.kinds.insert(kind.into(), interned.clone());
		interned
	}

	fn push(
		&mut self,
		kind: &str,
		named: bool,
		missing: bool,
		field: Option<&str>,
		range: ByteRange,
	) -> Result<NodeId, GrammarError> {
		if self.closed_root {
			return Err(GrammarError::MalformedTree(format!(
				"node `{kind}` added after the root was closed"
			)));
		}
		if self.open.is_empty() && !self.nodes.is_empty() {
			return Err(GrammarError::MalformedTree("tree has more than one root".into()));
		}
		let id = NodeId(self.nodes.len() as u32);
		let parent = self.open.last().copied();
		let index_in_parent = match parent {
			Some(p) => {
				let siblings = &mut self.nodes[p.idx()].children;
				siblings.push(id);
				siblings.len() as u32 - 1
			}
			None => 0,
		};
		let kind = self.intern(kind);
		let field = field.map(|f| self.intern(f));
		self.nodes.push(NodeData {
			kind,
			field,
			range,
			named,
			missing,
			parent,
			index_in_parent,
			children: Vec::new(),
		});
		Ok(id)
	}

	/// Opens an interior node starting at byte `start`.
	pub fn start_node(
		&mut self,
		kind: &str,
		named: bool,
		field: Option<&str>,
		start: u32,
	) -> Result<NodeId, GrammarError> {
		let id = self.push(kind, named, false, field, ByteRange::empty(start))?;
		self.open.push(id);
		Ok(id)
	}

	/// Adds a childless node to the innermost open node.
	pub fn leaf(
		&mut self,
		kind: &str,
		named: bool,
		field: Option<&str>,
		range: Range<u32>,
	) -> Result<NodeId, GrammarError> {
		let id = self.push(kind, named, false, field, range.into())?;
		if self.open.is_empty() {
			self.closed_root = true;
		}
		Ok(id)
	}

	/// Adds a zero-width node standing in for a token the input lacks.
	pub fn missing(&mut self, kind: &str, named: bool, field: Option<&str>, offset: u32) -> Result<NodeId, GrammarError> {
		self.push(kind, named, true, field, ByteRange::empty(offset))
	}

	/// Closes the innermost open node at byte `end`.
	pub fn finish_node(&mut self, end: u32) -> Result<NodeId, GrammarError> {
		let id = self
			.open
			.pop()
			.ok_or_else(|| GrammarError::MalformedTree("finish_node without an open node".into()))?;
		let node = &self.nodes[id.idx()];
		let start = node.range.start;
		if end < start {
			return Err(GrammarError::MalformedTree(format!(
				"`{}` ends at {end} before it starts at {start}",
				node.kind
			)));
		}
		let mut cursor = start;
		for &child in &node.children {
			let child = &self.nodes[child.idx()];
			if child.range.start < cursor || child.range.end > end {
				return Err(GrammarError::MalformedTree(format!(
					"child `{}` at {} is out of order or outside `{}` at {}..{end}",
					child.kind, child.range, node.kind, start
				)));
			}
			cursor = child.range.end;
		}
		self.nodes[id.idx()].range.end = end;
		if self.open.is_empty() {
			self.closed_root = true;
		}
		Ok(id)
	}

	/// Completes the tree. Every opened node must have been finished.
	pub fn finish(self) -> Result<ParseTree, GrammarError> {
		if let Some(&open) = self.open.last() {
			return Err(GrammarError::MalformedTree(format!(
				"node `{}` was never finished",
				self.nodes[open.idx()].kind
			)));
		}
		if self.nodes.is_empty() {
			return Err(GrammarError::MalformedTree("empty tree".into()));
		}
		Ok(ParseTree { nodes: self.nodes })
	}
}

#[cfg(test)]
mod tests;
