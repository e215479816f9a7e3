use glint_primitives::{ByteRange, Deadline};

use super::{RulesGrammar, TokenMatcher};
use crate::grammar::ParseError;
use crate::tree::ERROR_KIND;

/// A lexed token. `kind` is the rule kind for named tokens, or the token text
/// for keywords and punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Token<'a> {
	pub(super) kind: &'a str,
	pub(super) named: bool,
	pub(super) range: ByteRange,
}

struct Candidate<'a> {
	len: usize,
	kind: &'a str,
	named: bool,
}

pub(super) fn tokenize<'a>(
	grammar: &'a RulesGrammar,
	text: &'a str,
	deadline: &Deadline,
) -> Result<Vec<Token<'a>>, ParseError> {
	let mut tokens = Vec::new();
	let mut pos = 0;
	let mut error_start = None;

	while pos < text.len() {
		deadline.check()?;
		let rest = &text[pos..];

		if let Some(m) = grammar.whitespace.find(rest) {
			if m.end() > 0 {
				flush_error(&mut tokens, &mut error_start, pos);
				pos += m.end();
				continue;
			}
		}

		let Some(best) = longest_match(grammar, rest) else {
			// Unrecognized input accumulates into a single ERROR token.
			error_start.get_or_insert(pos);
			pos += rest.chars().next().map_or(1, char::len_utf8);
			continue;
		};

		flush_error(&mut tokens, &mut error_start, pos);
		let range = ByteRange::new(pos as u32, (pos + best.len) as u32);
		let token = if best.named && best.kind == grammar.word && grammar.keywords.contains(&text[range.to_usize()]) {
			Token {
				kind: &text[range.to_usize()],
				named: false,
				range,
			}
		} else {
			Token {
				kind: best.kind,
				named: best.named,
				range,
			}
		};
		tokens.push(token);
		pos += best.len;
	}
	flush_error(&mut tokens, &mut error_start, pos);

	Ok(tokens)
}

fn flush_error(tokens: &mut Vec<Token<'_>>, error_start: &mut Option<usize>, pos: usize) {
	if let Some(start) = error_start.take() {
		tokens.push(Token {
			kind: ERROR_KIND,
			named: true,
			range: ByteRange::new(start as u32, pos as u32),
		});
	}
}

/// Picks the longest token at the start of `rest`. Ties go to token rules in
/// declaration order, then to punctuation.
fn longest_match<'a>(grammar: &'a RulesGrammar, rest: &str) -> Option<Candidate<'a>> {
	let mut best: Option<Candidate<'a>> = None;
	let mut offer = |candidate: Candidate<'a>| {
		if candidate.len > 0 && best.as_ref().is_none_or(|b| candidate.len > b.len) {
			best = Some(candidate);
		}
	};

	for rule in &grammar.tokens {
		match &rule.matcher {
			TokenMatcher::Pattern(re) => {
				if let Some(m) = re.find(rest) {
					offer(Candidate {
						len: m.end(),
						kind: rule.kind.as_str(),
						named: true,
					});
				}
			}
			TokenMatcher::Delimited {
				begin,
				end,
				escape,
				multiline,
			} => {
				if let Some((len, terminated)) = scan_delimited(rest, begin, end, *escape, *multiline) {
					offer(Candidate {
						len,
						kind: if terminated { rule.kind.as_str() } else { ERROR_KIND },
						named: true,
					});
				}
			}
		}
	}

	if let Some(punct) = grammar.punctuation.iter().find(|p| rest.starts_with(p.as_str())) {
		offer(Candidate {
			len: punct.len(),
			kind: punct.as_str(),
			named: false,
		});
	}

	best
}

/// Scans a delimited token. Returns its length and whether the closing
/// delimiter was found; an unterminated token stops before the line break
/// (single-line tokens) or at the end of input.
fn scan_delimited(rest: &str, begin: &str, end: &str, escape: Option<char>, multiline: bool) -> Option<(usize, bool)> {
	if !rest.starts_with(begin) {
		return None;
	}
	let mut chars = rest[begin.len()..].char_indices();
	while let Some((i, c)) = chars.next() {
		let at = begin.len() + i;
		if rest[at..].starts_with(end) {
			return Some((at + end.len(), true));
		}
		if Some(c) == escape {
			chars.next();
			continue;
		}
		if !multiline && (c == '\n' || c == '\r') {
			return Some((at, false));
		}
	}
	Some((rest.len(), false))
}
