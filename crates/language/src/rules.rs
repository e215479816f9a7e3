//! Data-defined grammars.
//!
//! A rules grammar is described in TOML: token rules (regexes or delimited
//! tokens such as strings and block comments), keyword and punctuation sets
//! that become anonymous nodes, bracket groups that nest, and sequence rules
//! that fold runs of siblings into named parents with fields:
//!
//! ```toml
//! name = "java"
//! root = "program"
//! keywords = ["class", "public"]
//! punctuation = [";", "."]
//!
//! [[tokens]]
//! kind = "line_comment"
//! pattern = '//[^\n]*'
//! extra = true
//!
//! [[tokens]]
//! kind = "string_literal"
//! begin = '"'
//! end = '"'
//! escape = '\'
//!
//! [[groups]]
//! kind = "argument_list"
//! open = "("
//! close = ")"
//!
//! [[rules]]
//! kind = "method_invocation"
//! sequence = [
//!   { kind = "identifier", field = "name" },
//!   { kind = "argument_list", field = "arguments" },
//! ]
//! ```
//!
//! Parsing never fails on malformed input: unknown bytes, unterminated
//! delimited tokens, stray closers and unclosed groups become `ERROR` or
//! missing nodes.

mod fold;
mod lexer;

use std::path::Path;

use glint_primitives::{Deadline, SourceBuffer};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::grammar::{Grammar, GrammarError, ParseError};
use crate::tree::ParseTree;

/// Serialized form of a rules grammar.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesDefinition {
	pub name: String,
	#[serde(default = "default_root")]
	pub root: String,
	/// Text skipped between tokens.
	#[serde(default = "default_whitespace")]
	pub whitespace: String,
	/// Token kind whose matches are checked against `keywords`.
	#[serde(default = "default_word")]
	pub word: String,
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub punctuation: Vec<String>,
	#[serde(default)]
	pub tokens: Vec<TokenDefinition>,
	#[serde(default)]
	pub groups: Vec<GroupDefinition>,
	#[serde(default)]
	pub rules: Vec<SequenceDefinition>,
}

fn default_root() -> String {
	"source_file".into()
}

fn default_whitespace() -> String {
	r"\s+".into()
}

fn default_word() -> String {
	"identifier".into()
}

/// A named token: either `pattern` or a `begin`/`end` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenDefinition {
	pub kind: String,
	pub pattern: Option<String>,
	pub begin: Option<String>,
	pub end: Option<String>,
	/// Character that makes the following character literal (delimited only).
	pub escape: Option<char>,
	/// Whether a delimited token may span lines.
	#[serde(default)]
	pub multiline: bool,
	/// Extras (comments) may appear between the elements of a sequence rule.
	#[serde(default)]
	pub extra: bool,
}

/// A bracket pair whose contents nest under a named node.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDefinition {
	pub kind: String,
	pub open: String,
	pub close: String,
}

/// Folds a run of consecutive siblings into a named parent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceDefinition {
	pub kind: String,
	pub sequence: Vec<SequenceElement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceElement {
	/// Node kind to match. Anonymous tokens match by their text.
	pub kind: String,
	pub field: Option<String>,
	#[serde(default)]
	pub optional: bool,
}

#[derive(Debug)]
enum TokenMatcher {
	Pattern(Regex),
	Delimited {
		begin: String,
		end: String,
		escape: Option<char>,
		multiline: bool,
	},
}

#[derive(Debug)]
struct TokenRule {
	kind: String,
	matcher: TokenMatcher,
	extra: bool,
}

/// A compiled rules grammar.
#[derive(Debug)]
pub struct RulesGrammar {
	name: String,
	root: String,
	whitespace: Regex,
	word: String,
	keywords: FxHashSet<String>,
	/// Sorted longest first so the lexer can take the first hit.
	punctuation: Vec<String>,
	tokens: Vec<TokenRule>,
	groups: Vec<GroupDefinition>,
	rules: Vec<SequenceDefinition>,
	extras: FxHashSet<String>,
}

impl RulesGrammar {
	/// Reads and compiles a TOML definition from disk.
	pub fn from_path(path: &Path) -> Result<Self, GrammarError> {
		let text = std::fs::read_to_string(path).map_err(|e| GrammarError::io(path, &e))?;
		Self::from_toml(&text).map_err(|e| match e {
			GrammarError::Definition { grammar, message } if grammar.is_empty() => GrammarError::Definition {
				grammar: path.display().to_string(),
				message,
			},
			other => other,
		})
	}

	/// Compiles a TOML definition.
	pub fn from_toml(text: &str) -> Result<Self, GrammarError> {
		let definition: RulesDefinition = toml::from_str(text).map_err(|e| GrammarError::Definition {
			grammar: String::new(),
			message: e.to_string(),
		})?;
		Self::new(definition)
	}

	/// Validates and compiles a definition.
	pub fn new(def: RulesDefinition) -> Result<Self, GrammarError> {
		let invalid = |message: String| GrammarError::Definition {
			grammar: def.name.clone(),
			message,
		};

		if def.name.trim().is_empty() {
			return Err(invalid("grammar name must not be empty".into()));
		}

		let whitespace = anchored(&def.whitespace).map_err(|e| invalid(format!("whitespace: {e}")))?;

		let mut tokens = Vec::with_capacity(def.tokens.len());
		for token in &def.tokens {
			if token.kind.is_empty() {
				return Err(invalid("token kind must not be empty".into()));
			}
			let matcher = match (&token.pattern, &token.begin, &token.end) {
				(Some(pattern), None, None) => {
					let re = anchored(pattern).map_err(|e| invalid(format!("token `{}`: {e}", token.kind)))?;
					TokenMatcher::Pattern(re)
				}
				(None, Some(begin), Some(end)) if !begin.is_empty() && !end.is_empty() => TokenMatcher::Delimited {
					begin: begin.clone(),
					end: end.clone(),
					escape: token.escape,
					multiline: token.multiline,
				},
				_ => {
					return Err(invalid(format!(
						"token `{}` needs either `pattern` or non-empty `begin` and `end`",
						token.kind
					)));
				}
			};
			tokens.push(TokenRule {
				kind: token.kind.clone(),
				matcher,
				extra: token.extra,
			});
		}

		let mut punctuation: Vec<String> = def.punctuation.clone();
		for group in &def.groups {
			if group.open.is_empty() || group.close.is_empty() || group.open == group.close {
				return Err(invalid(format!(
					"group `{}` needs distinct, non-empty open and close tokens",
					group.kind
				)));
			}
			punctuation.push(group.open.clone());
			punctuation.push(group.close.clone());
		}
		if punctuation.iter().any(String::is_empty) {
			return Err(invalid("punctuation must not contain empty strings".into()));
		}
		punctuation.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
		punctuation.dedup();

		for rule in &def.rules {
			if rule.sequence.iter().all(|e| e.optional) {
				return Err(invalid(format!(
					"rule `{}` needs at least one required element",
					rule.kind
				)));
			}
		}

		let extras = tokens.iter().filter(|t| t.extra).map(|t| t.kind.clone()).collect();

		Ok(Self {
			keywords: def.keywords.iter().cloned().collect(),
			name: def.name,
			root: def.root,
			whitespace,
			word: def.word,
			punctuation,
			tokens,
			groups: def.groups,
			rules: def.rules,
			extras,
		})
	}
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
	Regex::new(&format!(r"\A(?:{pattern})"))
}

impl Grammar for RulesGrammar {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, source: &SourceBuffer, deadline: &Deadline) -> Result<ParseTree, ParseError> {
		let tokens = lexer::tokenize(self, source.text(), deadline)?;
		let root = fold::structure(self, tokens, source.len(), deadline)?;
		let tree = fold::emit(root)?;
		tracing::trace!(grammar = %self.name, nodes = tree.len(), "rules parse");
		Ok(tree)
	}
}

#[cfg(test)]
mod tests;
