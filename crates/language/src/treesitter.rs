//! Tree-sitter grammars loaded from compiled shared libraries.

use std::path::{Path, PathBuf};

use glint_primitives::{Deadline, SourceBuffer};
use libloading::{Library, Symbol};
use parking_lot::Mutex;
use tree_sitter::{Language, ParseOptions, ParseState, Parser, Point};
use tree_sitter_language::LanguageFn;

use crate::grammar::{Grammar, GrammarError, ParseError, resolve_library};
use crate::tree::{ParseTree, TreeBuilder};

type LanguageEntry = unsafe extern "C" fn() -> *const ();

/// A grammar backed by a tree-sitter parser.
pub struct TreeSitterGrammar {
	name: String,
	path: PathBuf,
	language: Language,
	// `Parser` is not `Sync`; parses of one grammar are serialized.
	parser: Mutex<Parser>,
	// Must outlive `language`. `None` for grammars linked into the binary.
	_library: Option<Library>,
}

impl std::fmt::Debug for TreeSitterGrammar {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TreeSitterGrammar")
			.field("name", &self.name)
			.field("path", &self.path)
			.field("node_kinds", &self.language.node_kind_count())
			.finish()
	}
}

impl TreeSitterGrammar {
	/// Loads grammar `name` from `path`. The entry point defaults to
	/// `tree_sitter_<name>`.
	pub fn load(name: &str, path: &Path, symbol: Option<&str>) -> Result<Self, GrammarError> {
		let path = resolve_library(name, path)?;
		let symbol = symbol.map_or_else(|| format!("tree_sitter_{}", name.replace('-', "_")), str::to_owned);

		let library = unsafe { Library::new(&path) }.map_err(|e| GrammarError::LoadError {
			path: path.clone(),
			message: e.to_string(),
		})?;
		let language = unsafe {
			let entry: Symbol<LanguageEntry> = library
				.get(format!("{symbol}\0").as_bytes())
				.map_err(|_| GrammarError::MissingSymbol(symbol.clone()))?;
			Language::new(LanguageFn::from_raw(*entry))
		};

		let grammar = Self::with_language(name, path, language, Some(library))?;
		tracing::debug!(grammar = name, path = %grammar.path.display(), "loaded tree-sitter grammar");
		Ok(grammar)
	}

	/// Wraps a grammar linked into the binary, such as a `tree-sitter-<lang>`
	/// crate's `LANGUAGE`.
	pub fn from_language(name: &str, language: LanguageFn) -> Result<Self, GrammarError> {
		Self::with_language(name, PathBuf::new(), Language::new(language), None)
	}

	fn with_language(
		name: &str,
		path: PathBuf,
		language: Language,
		library: Option<Library>,
	) -> Result<Self, GrammarError> {
		let mut parser = Parser::new();
		parser.set_language(&language).map_err(|e| GrammarError::LoadError {
			path: path.clone(),
			message: e.to_string(),
		})?;
		Ok(Self {
			name: name.to_owned(),
			path,
			language,
			parser: Mutex::new(parser),
			_library: library,
		})
	}
}

impl Grammar for TreeSitterGrammar {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, source: &SourceBuffer, deadline: &Deadline) -> Result<ParseTree, ParseError> {
		deadline.check()?;
		let bytes = source.as_bytes();
		let mut read = |offset: usize, _: Point| bytes.get(offset..).unwrap_or_default();
		// Returning true cancels the parse.
		let mut expired = |_: &ParseState| deadline.is_expired();
		let tree = {
			let mut parser = self.parser.lock();
			parser.reset();
			let options = ParseOptions::new().progress_callback(&mut expired);
			parser.parse_with_options(&mut read, None, Some(options))
		};
		let Some(tree) = tree else {
			deadline.check()?;
			return Err(GrammarError::Crashed {
				grammar: self.name.clone(),
				message: "parser returned no tree".into(),
			}
			.into());
		};
		convert(&tree, deadline)
	}
}

/// Copies a tree-sitter tree into a [`ParseTree`].
fn convert(tree: &tree_sitter::Tree, deadline: &Deadline) -> Result<ParseTree, ParseError> {
	let mut builder = TreeBuilder::new();
	let mut cursor = tree.walk();
	loop {
		deadline.check()?;
		let node = cursor.node();
		let field = cursor.field_name();
		let (start, end) = (node.start_byte() as u32, node.end_byte() as u32);

		if node.is_missing() {
			builder.missing(node.kind(), node.is_named(), field, start)?;
		} else if node.child_count() == 0 {
			builder.leaf(node.kind(), node.is_named(), field, start..end)?;
		} else {
			builder.start_node(node.kind(), node.is_named(), field, start)?;
			if cursor.goto_first_child() {
				continue;
			}
			builder.finish_node(end)?;
		}

		loop {
			if cursor.goto_next_sibling() {
				break;
			}
			if !cursor.goto_parent() {
				return Ok(builder.finish()?);
			}
			builder.finish_node(cursor.node().end_byte() as u32)?;
		}
	}
}
