use glint_primitives::{ByteRange, Deadline};

use super::RulesGrammar;
use super::lexer::Token;
use crate::grammar::{GrammarError, ParseError};
use crate::tree::{ERROR_KIND, ParseTree, TreeBuilder};

/// Owned intermediate tree; rules rewrite sibling lists before the arena is built.
#[derive(Debug, Clone)]
pub(super) struct RawNode<'a> {
	kind: &'a str,
	named: bool,
	missing: bool,
	field: Option<&'a str>,
	range: ByteRange,
	children: Vec<RawNode<'a>>,
}

impl<'a> RawNode<'a> {
	fn token(token: Token<'a>) -> Self {
		Self {
			kind: token.kind,
			named: token.named,
			missing: false,
			field: None,
			range: token.range,
			children: Vec::new(),
		}
	}

	fn parent(kind: &'a str, start: u32) -> Self {
		Self {
			kind,
			named: true,
			missing: false,
			field: None,
			range: ByteRange::empty(start),
			children: Vec::new(),
		}
	}

	fn push(&mut self, child: RawNode<'a>) {
		self.range.end = self.range.end.max(child.range.end);
		self.children.push(child);
	}
}

struct OpenGroup<'a> {
	group: usize,
	node: RawNode<'a>,
}

/// Nests tokens under bracket groups, recovering from unbalanced brackets,
/// then applies the sequence rules bottom-up.
pub(super) fn structure<'a>(
	grammar: &'a RulesGrammar,
	tokens: Vec<Token<'a>>,
	len: u32,
	deadline: &Deadline,
) -> Result<RawNode<'a>, ParseError> {
	let mut root = RawNode::parent(&grammar.root, 0);
	let mut open: Vec<OpenGroup<'a>> = Vec::new();

	for token in tokens {
		deadline.check()?;
		if token.named {
			innermost(&mut root, &mut open).push(RawNode::token(token));
			continue;
		}

		if let Some(group) = grammar.groups.iter().position(|g| g.open == token.kind) {
			let mut node = RawNode::parent(&grammar.groups[group].kind, token.range.start);
			node.push(RawNode::token(token));
			open.push(OpenGroup { group, node });
			continue;
		}

		if grammar.groups.iter().any(|g| g.close == token.kind) {
			let target = open
				.iter()
				.rposition(|o| grammar.groups[o.group].close == token.kind);
			match target {
				Some(depth) => {
					while open.len() > depth + 1 {
						close_unterminated(grammar, &mut root, &mut open);
					}
					if let Some(OpenGroup { mut node, .. }) = open.pop() {
						node.push(RawNode::token(token));
						innermost(&mut root, &mut open).push(node);
					}
				}
				None => {
					// A closer with no opener is wrapped so queries can find it.
					let mut error = RawNode::parent(ERROR_KIND, token.range.start);
					error.push(RawNode::token(token));
					innermost(&mut root, &mut open).push(error);
				}
			}
			continue;
		}

		innermost(&mut root, &mut open).push(RawNode::token(token));
	}

	while !open.is_empty() {
		close_unterminated(grammar, &mut root, &mut open);
	}
	root.range = ByteRange::new(0, len);

	fold(grammar, &mut root, deadline)?;
	Ok(root)
}

fn innermost<'s, 'a>(root: &'s mut RawNode<'a>, open: &'s mut [OpenGroup<'a>]) -> &'s mut RawNode<'a> {
	match open.last_mut() {
		Some(group) => &mut group.node,
		None => root,
	}
}

/// Closes the innermost group with a synthesized missing closer.
fn close_unterminated<'a>(grammar: &'a RulesGrammar, root: &mut RawNode<'a>, open: &mut Vec<OpenGroup<'a>>) {
	let Some(OpenGroup { group, mut node }) = open.pop() else {
		return;
	};
	node.push(RawNode {
		kind: &grammar.groups[group].close,
		named: false,
		missing: true,
		field: None,
		range: ByteRange::empty(node.range.end),
		children: Vec::new(),
	});
	innermost(root, open).push(node);
}

fn fold<'a>(grammar: &'a RulesGrammar, node: &mut RawNode<'a>, deadline: &Deadline) -> Result<(), ParseError> {
	for child in &mut node.children {
		if !child.children.is_empty() {
			fold(grammar, child, deadline)?;
		}
	}
	deadline.check()?;
	apply_rules(grammar, &mut node.children);
	Ok(())
}

/// Each rule is tried once per position in declaration order, so a later
/// rule can wrap the result of an earlier one.
fn apply_rules<'a>(grammar: &'a RulesGrammar, children: &mut Vec<RawNode<'a>>) {
	let mut i = 0;
	while i < children.len() {
		for rule in &grammar.rules {
			let Some((end, assignments)) = match_sequence(grammar, &rule.sequence, children, i) else {
				continue;
			};
			let mut taken: Vec<RawNode<'a>> = children.drain(i..end).collect();
			for (offset, field) in assignments {
				taken[offset - i].field = field;
			}
			let range = ByteRange::new(taken[0].range.start, taken[taken.len() - 1].range.end);
			children.insert(
				i,
				RawNode {
					kind: &rule.kind,
					named: true,
					missing: false,
					field: None,
					range,
					children: taken,
				},
			);
		}
		i += 1;
	}
}

type Assignments<'a> = Vec<(usize, Option<&'a str>)>;

fn match_sequence<'a>(
	grammar: &'a RulesGrammar,
	sequence: &'a [super::SequenceElement],
	children: &[RawNode<'a>],
	start: usize,
) -> Option<(usize, Assignments<'a>)> {
	let mut next = start;
	let mut assignments = Vec::with_capacity(sequence.len());
	for element in sequence {
		let mut candidate = next;
		if !assignments.is_empty() {
			while children
				.get(candidate)
				.is_some_and(|c| c.named && grammar.extras.contains(c.kind))
			{
				candidate += 1;
			}
		}
		match children.get(candidate) {
			Some(child) if !child.missing && child.kind == element.kind => {
				assignments.push((candidate, element.field.as_deref()));
				next = candidate + 1;
			}
			_ if element.optional => {}
			_ => return None,
		}
	}
	(!assignments.is_empty()).then_some((next, assignments))
}

/// Builds the arena tree.
pub(super) fn emit(root: RawNode<'_>) -> Result<ParseTree, GrammarError> {
	let mut builder = TreeBuilder::new();
	emit_node(&mut builder, &root, true)?;
	builder.finish()
}

fn emit_node(builder: &mut TreeBuilder, node: &RawNode<'_>, is_root: bool) -> Result<(), GrammarError> {
	if node.missing {
		builder.missing(node.kind, node.named, node.field, node.range.start)?;
	} else if node.children.is_empty() && !is_root {
		builder.leaf(node.kind, node.named, node.field, node.range.into())?;
	} else {
		builder.start_node(node.kind, node.named, node.field, node.range.start)?;
		for child in &node.children {
			emit_node(builder, child, false)?;
		}
		builder.finish_node(node.range.end)?;
	}
	Ok(())
}
