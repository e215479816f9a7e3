//! Query source to [`Pattern`]s.

use glint_primitives::HighlightName;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::pattern::{
	CaptureId, Expr, ExprKind, Item, KindMatcher, NodePattern, Pattern, Predicate, PredicateArg, Quantifier, Sequence,
};
use super::{CaptureName, DEFAULT_PRIORITY, QueryDefinitionError, QueryErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
	LParen,
	RParen,
	LBracket,
	RBracket,
	Dot,
	Quant(Quantifier),
	Str(String),
	Ident(String),
	Field(String),
	Negated(String),
	Capture(String),
	Predicate(String),
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_capture_char(c: char) -> bool {
	is_ident_char(c) || c == '.'
}

fn position(source: &str, offset: usize) -> (usize, usize) {
	let before = &source[..offset.min(source.len())];
	let row = before.matches('\n').count();
	let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1);
	(row, column)
}

fn error_at(source: &str, offset: usize, kind: QueryErrorKind) -> QueryDefinitionError {
	let (row, column) = position(source, offset);
	QueryDefinitionError { row, column, kind }
}

fn take_while(source: &str, start: usize, pred: impl Fn(char) -> bool) -> usize {
	source[start..]
		.char_indices()
		.find(|&(_, c)| !pred(c))
		.map_or(source.len(), |(i, _)| start + i)
}

fn tokenize(source: &str) -> Result<Vec<(Tok, usize)>, QueryDefinitionError> {
	let mut tokens = Vec::new();
	let mut pos = 0;
	while let Some(c) = source[pos..].chars().next() {
		let start = pos;
		let tok = match c {
			c if c.is_whitespace() => {
				pos += c.len_utf8();
				continue;
			}
			';' => {
				pos = source[pos..].find('\n').map_or(source.len(), |nl| pos + nl);
				continue;
			}
			'(' => Tok::LParen,
			')' => Tok::RParen,
			'[' => Tok::LBracket,
			']' => Tok::RBracket,
			'.' => Tok::Dot,
			'?' => Tok::Quant(Quantifier::ZeroOrOne),
			'*' => Tok::Quant(Quantifier::ZeroOrMore),
			'+' => Tok::Quant(Quantifier::OneOrMore),
			'"' => {
				let (text, end) = lex_string(source, pos)?;
				pos = end;
				tokens.push((Tok::Str(text), start));
				continue;
			}
			'@' | '#' | '!' => {
				let end = if c == '@' {
					take_while(source, pos + 1, is_capture_char)
				} else {
					take_while(source, pos + 1, is_ident_char)
				};
				let mut name_end = end;
				if c == '#' && source[end..].starts_with(['?', '!']) {
					name_end += 1;
				}
				let name = source[pos + 1..name_end].to_owned();
				if name.is_empty() {
					return Err(error_at(source, start, QueryErrorKind::Syntax(format!("expected a name after `{c}`"))));
				}
				pos = name_end;
				tokens.push((
					match c {
						'@' => Tok::Capture(name),
						'#' => Tok::Predicate(name),
						_ => Tok::Negated(name),
					},
					start,
				));
				continue;
			}
			c if is_ident_char(c) => {
				let end = take_while(source, pos, is_ident_char);
				let name = source[pos..end].to_owned();
				if source[end..].starts_with(':') {
					pos = end + 1;
					tokens.push((Tok::Field(name), start));
				} else {
					pos = end;
					tokens.push((Tok::Ident(name), start));
				}
				continue;
			}
			other => {
				return Err(error_at(
					source,
					start,
					QueryErrorKind::Syntax(format!("unexpected character `{other}`")),
				));
			}
		};
		pos += c.len_utf8();
		tokens.push((tok, start));
	}
	Ok(tokens)
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), QueryDefinitionError> {
	let mut text = String::new();
	let mut chars = source[start + 1..].char_indices();
	while let Some((i, c)) = chars.next() {
		match c {
			'"' => return Ok((text, start + 1 + i + 1)),
			'\\' => match chars.next() {
				Some((_, 'n')) => text.push('\n'),
				Some((_, 't')) => text.push('\t'),
				Some((_, 'r')) => text.push('\r'),
				Some((_, '0')) => text.push('\0'),
				Some((_, other)) => text.push(other),
				None => break,
			},
			c => text.push(c),
		}
	}
	Err(error_at(source, start, QueryErrorKind::Syntax("unterminated string".into())))
}

enum RawArg {
	Capture(String),
	Text(String),
}

struct RawPredicate {
	name: String,
	args: Vec<(RawArg, usize)>,
	offset: usize,
}

/// Captures and predicates of the pattern being parsed.
#[derive(Default)]
struct PatternScope {
	captures: FxHashSet<CaptureId>,
	predicates: Vec<RawPredicate>,
}

struct Parser<'s> {
	source: &'s str,
	tokens: Vec<(Tok, usize)>,
	pos: usize,
	capture_names: Vec<CaptureName>,
	capture_ids: FxHashMap<String, CaptureId>,
	scope: PatternScope,
}

/// Parses a whole query.
pub(super) fn parse(source: &str) -> Result<(Vec<Pattern>, Vec<CaptureName>), QueryDefinitionError> {
	let mut parser = Parser {
		source,
		tokens: tokenize(source)?,
		pos: 0,
		capture_names: Vec::new(),
		capture_ids: FxHashMap::default(),
		scope: PatternScope::default(),
	};
	let mut patterns = Vec::new();
	while parser.pos < parser.tokens.len() {
		patterns.push(parser.pattern()?);
	}
	Ok((patterns, parser.capture_names))
}

impl Parser<'_> {
	fn peek(&self) -> Option<&Tok> {
		self.tokens.get(self.pos).map(|(t, _)| t)
	}

	fn offset(&self) -> usize {
		self.tokens.get(self.pos).map_or(self.source.len(), |&(_, o)| o)
	}

	fn bump(&mut self) -> Option<(Tok, usize)> {
		let tok = self.tokens.get(self.pos).cloned();
		self.pos += 1;
		tok
	}

	fn error(&self, offset: usize, kind: QueryErrorKind) -> QueryDefinitionError {
		error_at(self.source, offset, kind)
	}

	fn pattern(&mut self) -> Result<Pattern, QueryDefinitionError> {
		self.scope = PatternScope::default();
		let start = self.offset();
		let mut expr = self.expr_core()?;
		if let Some(Tok::Quant(_)) = self.peek() {
			return Err(self.error(
				self.offset(),
				QueryErrorKind::Structure("quantifiers are only allowed on child patterns".into()),
			));
		}
		self.captures(&mut expr)?;

		// `((node) @cap (#pred? ...))` is the usual way to attach predicates.
		if let ExprKind::Group(seq) = &mut expr.kind {
			if seq.items.len() == 1 && seq.items[0].quantifier == Quantifier::One && !seq.anchor_end {
				let mut inner = seq.items.remove(0).expr;
				inner.captures.extend(expr.captures.drain(..));
				expr = inner;
			}
		}

		let scope = std::mem::take(&mut self.scope);
		let mut priority = DEFAULT_PRIORITY;
		let mut predicates = Vec::new();
		for raw in scope.predicates {
			if let Some(p) = self.resolve_predicate(&scope.captures, raw, &mut priority)? {
				predicates.push(p);
			}
		}
		Ok(Pattern {
			expr,
			predicates,
			priority,
			row: position(self.source, start).0,
		})
	}

	fn expr_core(&mut self) -> Result<Expr, QueryDefinitionError> {
		let offset = self.offset();
		let kind = match self.bump() {
			Some((Tok::LParen, _)) => self.parenthesized(offset)?,
			Some((Tok::LBracket, _)) => {
				let mut alternatives = Vec::new();
				loop {
					match self.peek() {
						Some(Tok::RBracket) => {
							self.pos += 1;
							break;
						}
						None => return Err(self.error(offset, QueryErrorKind::UnbalancedParens)),
						_ => {
							let mut alt = self.expr_core()?;
							self.captures(&mut alt)?;
							if matches!(alt.kind, ExprKind::Group(_)) {
								return Err(self.error(
									offset,
									QueryErrorKind::Structure("alternatives must be node patterns".into()),
								));
							}
							alternatives.push(alt);
						}
					}
				}
				if alternatives.is_empty() {
					return Err(self.error(offset, QueryErrorKind::Structure("empty alternation".into())));
				}
				ExprKind::Alternation(alternatives)
			}
			Some((Tok::Str(text), _)) => ExprKind::Node(NodePattern {
				kind: KindMatcher::Anonymous(text.into()),
				negated_fields: Vec::new(),
				children: Sequence::default(),
			}),
			Some((Tok::Ident(name), _)) if name == "_" => ExprKind::Node(NodePattern {
				kind: KindMatcher::Any,
				negated_fields: Vec::new(),
				children: Sequence::default(),
			}),
			Some((Tok::RParen | Tok::RBracket, _)) => {
				return Err(self.error(offset, QueryErrorKind::UnbalancedParens));
			}
			Some((tok, _)) => {
				return Err(self.error(offset, QueryErrorKind::Syntax(format!("unexpected {}", describe(&tok)))));
			}
			None => {
				return Err(self.error(offset, QueryErrorKind::Syntax("unexpected end of query".into())));
			}
		};
		Ok(Expr {
			kind,
			field: None,
			captures: Vec::new(),
		})
	}

	/// After `(`: a node pattern or a sibling group.
	fn parenthesized(&mut self, open: usize) -> Result<ExprKind, QueryDefinitionError> {
		let kind = match self.peek() {
			Some(Tok::Ident(name)) => {
				let kind = match name.as_str() {
					"_" => KindMatcher::AnyNamed,
					"ERROR" => KindMatcher::Error,
					"MISSING" => KindMatcher::Missing(None),
					other => KindMatcher::Named(other.into()),
				};
				self.pos += 1;
				match (kind, self.peek()) {
					(KindMatcher::Missing(None), Some(Tok::Ident(k) | Tok::Str(k))) => {
						let k = k.as_str().into();
						self.pos += 1;
						KindMatcher::Missing(Some(k))
					}
					(kind, _) => kind,
				}
			}
			None => return Err(self.error(open, QueryErrorKind::UnbalancedParens)),
			_ => {
				let mut seq = Sequence::default();
				self.items(open, &mut seq, None)?;
				if seq.items.is_empty() {
					return Err(self.error(open, QueryErrorKind::Structure("empty group".into())));
				}
				return Ok(ExprKind::Group(seq));
			}
		};
		let mut node = NodePattern {
			kind,
			negated_fields: Vec::new(),
			children: Sequence::default(),
		};
		self.items(open, &mut node.children, Some(&mut node.negated_fields))?;
		Ok(ExprKind::Node(node))
	}

	/// Parses child items up to and including the closing `)`.
	fn items(
		&mut self,
		open: usize,
		seq: &mut Sequence,
		mut negated: Option<&mut Vec<Box<str>>>,
	) -> Result<(), QueryDefinitionError> {
		let mut anchored = false;
		loop {
			let offset = self.offset();
			match self.peek() {
				None => return Err(self.error(open, QueryErrorKind::UnbalancedParens)),
				Some(Tok::RParen) => {
					self.pos += 1;
					seq.anchor_end = anchored;
					return Ok(());
				}
				Some(Tok::Dot) => {
					self.pos += 1;
					anchored = true;
					continue;
				}
				Some(Tok::LParen) if matches!(self.tokens.get(self.pos + 1), Some((Tok::Predicate(_), _))) => {
					self.predicate()?;
					continue;
				}
				Some(Tok::Negated(name)) => {
					let name: Box<str> = name.as_str().into();
					let Some(negated) = negated.as_deref_mut() else {
						return Err(self.error(
							offset,
							QueryErrorKind::Structure("negated fields are only allowed inside node patterns".into()),
						));
					};
					self.pos += 1;
					negated.push(name);
					continue;
				}
				_ => {}
			}

			let field = match self.peek() {
				Some(Tok::Field(name)) => {
					let name: Box<str> = name.as_str().into();
					self.pos += 1;
					Some(name)
				}
				_ => None,
			};
			let mut expr = self.expr_core()?;
			if field.is_some() && matches!(expr.kind, ExprKind::Group(_)) {
				return Err(self.error(offset, QueryErrorKind::Structure("fields cannot apply to a group".into())));
			}
			expr.field = field;
			let quantifier = match self.peek() {
				Some(Tok::Quant(q)) => {
					let q = *q;
					self.pos += 1;
					q
				}
				_ => Quantifier::One,
			};
			self.captures(&mut expr)?;
			seq.items.push(Item {
				expr,
				quantifier,
				anchored: std::mem::take(&mut anchored),
			});
		}
	}

	fn captures(&mut self, expr: &mut Expr) -> Result<(), QueryDefinitionError> {
		while let Some(Tok::Capture(name)) = self.peek() {
			let name = name.clone();
			let offset = self.offset();
			self.pos += 1;
			if matches!(expr.kind, ExprKind::Group(_)) {
				return Err(self.error(
					offset,
					QueryErrorKind::Structure("captures on sibling groups are not supported".into()),
				));
			}
			let id = self.capture_id(&name, offset)?;
			self.scope.captures.insert(id);
			if !expr.captures.contains(&id) {
				expr.captures.push(id);
			}
		}
		Ok(())
	}

	fn capture_id(&mut self, name: &str, offset: usize) -> Result<CaptureId, QueryDefinitionError> {
		if let Some(&id) = self.capture_ids.get(name) {
			return Ok(id);
		}
		let highlight = if name.starts_with('_') {
			None
		} else {
			Some(
				HighlightName::from_capture(name)
					.map_err(|_| self.error(offset, QueryErrorKind::UnknownHighlight(name.to_owned())))?,
			)
		};
		let id = self.capture_names.len() as CaptureId;
		self.capture_names.push(CaptureName {
			name: name.into(),
			highlight,
		});
		self.capture_ids.insert(name.to_owned(), id);
		Ok(id)
	}

	fn predicate(&mut self) -> Result<(), QueryDefinitionError> {
		let (_, open) = self.bump().unwrap_or((Tok::LParen, self.source.len()));
		let Some((Tok::Predicate(name), offset)) = self.bump() else {
			return Err(self.error(open, QueryErrorKind::Syntax("expected a predicate".into())));
		};
		let mut args = Vec::new();
		loop {
			match self.bump() {
				Some((Tok::RParen, _)) => break,
				Some((Tok::Capture(c), at)) => args.push((RawArg::Capture(c), at)),
				Some((Tok::Str(s) | Tok::Ident(s), at)) => args.push((RawArg::Text(s), at)),
				Some((tok, at)) => {
					return Err(self.error(at, QueryErrorKind::Syntax(format!("unexpected {} in predicate", describe(&tok)))));
				}
				None => return Err(self.error(open, QueryErrorKind::UnbalancedParens)),
			}
		}
		self.scope.predicates.push(RawPredicate { name, args, offset });
		Ok(())
	}

	fn resolve_predicate(
		&self,
		scope: &FxHashSet<CaptureId>,
		raw: RawPredicate,
		priority: &mut i32,
	) -> Result<Option<Predicate>, QueryDefinitionError> {
		let arity = |expected: &str| {
			self.error(
				raw.offset,
				QueryErrorKind::Syntax(format!("#{} expects {expected}", raw.name)),
			)
		};
		let capture = |arg: &(RawArg, usize)| -> Result<CaptureId, QueryDefinitionError> {
			match arg {
				(RawArg::Capture(name), at) => self
					.capture_ids
					.get(name)
					.copied()
					.filter(|id| scope.contains(id))
					.ok_or_else(|| self.error(*at, QueryErrorKind::UnknownCapture(name.clone()))),
				(RawArg::Text(_), at) => Err(self.error(
					*at,
					QueryErrorKind::Syntax(format!("#{} expects a capture first", raw.name)),
				)),
			}
		};
		let text = |arg: &(RawArg, usize)| -> Result<Box<str>, QueryDefinitionError> {
			match arg {
				(RawArg::Text(s), _) => Ok(s.as_str().into()),
				(RawArg::Capture(_), at) => Err(self.error(
					*at,
					QueryErrorKind::Syntax(format!("#{} expects string arguments", raw.name)),
				)),
			}
		};

		let predicate = match raw.name.as_str() {
			"eq?" | "not-eq?" => {
				let [first, second] = raw.args.as_slice() else {
					return Err(arity("two arguments"));
				};
				let other = match second {
					(RawArg::Capture(_), _) => PredicateArg::Capture(capture(second)?),
					(RawArg::Text(s), _) => PredicateArg::Text(s.as_str().into()),
				};
				Predicate::Eq {
					capture: capture(first)?,
					other,
					negated: raw.name.starts_with("not-"),
				}
			}
			"any-of?" | "not-any-of?" => {
				let Some((first, rest)) = raw.args.split_first().filter(|(_, rest)| !rest.is_empty()) else {
					return Err(arity("a capture and at least one string"));
				};
				Predicate::AnyOf {
					capture: capture(first)?,
					values: rest.iter().map(text).collect::<Result<_, _>>()?,
					negated: raw.name.starts_with("not-"),
				}
			}
			"match?" | "not-match?" => {
				let [first, second] = raw.args.as_slice() else {
					return Err(arity("a capture and a regex"));
				};
				let pattern = text(second)?;
				let regex = Regex::new(&pattern)
					.map_err(|e| self.error(second.1, QueryErrorKind::InvalidRegex(e.to_string())))?;
				Predicate::Match {
					capture: capture(first)?,
					regex,
					negated: raw.name.starts_with("not-"),
				}
			}
			"set!" => {
				match raw.args.as_slice() {
					[(RawArg::Text(key), _), (RawArg::Text(value), at)] if key == "priority" => {
						*priority = value
							.parse()
							.map_err(|_| self.error(*at, QueryErrorKind::InvalidProperty(format!("priority `{value}`"))))?;
					}
					_ => {
						return Err(self.error(
							raw.offset,
							QueryErrorKind::InvalidProperty("only `#set! priority <int>` is supported".into()),
						));
					}
				}
				return Ok(None);
			}
			_ => return Err(self.error(raw.offset, QueryErrorKind::UnknownPredicate(raw.name.clone()))),
		};
		Ok(Some(predicate))
	}
}

fn describe(tok: &Tok) -> String {
	match tok {
		Tok::LParen => "`(`".into(),
		Tok::RParen => "`)`".into(),
		Tok::LBracket => "`[`".into(),
		Tok::RBracket => "`]`".into(),
		Tok::Dot => "anchor `.`".into(),
		Tok::Quant(_) => "quantifier".into(),
		Tok::Str(s) => format!("string {s:?}"),
		Tok::Ident(s) => format!("identifier `{s}` (node patterns need parentheses)"),
		Tok::Field(s) => format!("field `{s}:`"),
		Tok::Negated(s) => format!("negated field `!{s}`"),
		Tok::Capture(s) => format!("capture `@{s}`"),
		Tok::Predicate(s) => format!("predicate `#{s}`"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tokenize_fields_captures_and_comments() {
		let tokens: Vec<Tok> = tokenize("; note\n(call name: (identifier) @function.method !body)")
			.unwrap()
			.into_iter()
			.map(|(t, _)| t)
			.collect();
		assert_eq!(
			tokens,
			vec![
				Tok::LParen,
				Tok::Ident("call".into()),
				Tok::Field("name".into()),
				Tok::LParen,
				Tok::Ident("identifier".into()),
				Tok::RParen,
				Tok::Capture("function.method".into()),
				Tok::Negated("body".into()),
				Tok::RParen,
			]
		);
	}

	#[test]
	fn test_tokenize_string_escapes() {
		let tokens = tokenize(r#""a\"b\n""#).unwrap();
		assert_eq!(tokens, vec![(Tok::Str("a\"b\n".into()), 0)]);
	}

	#[test]
	fn test_position_is_zero_based() {
		assert_eq!(position("ab\ncd", 4), (1, 1));
		assert_eq!(position("ab", 0), (0, 0));
	}
}
