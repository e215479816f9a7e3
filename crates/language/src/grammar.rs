//! Grammar adapter contract.
//!
//! A grammar turns a [`SourceBuffer`] into a [`ParseTree`]. Implementations wrap
//! whatever actually parses (a data-defined rules grammar, a tree-sitter shared
//! library, a fixed tree in tests) so the query and verification layers never
//! depend on a grammar's binary shape.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glint_primitives::{Deadline, DeadlineExceeded, SourceBuffer};
use thiserror::Error;

use crate::tree::ParseTree;

/// Errors that make a grammar unusable. Always fatal for a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
	#[error("grammar not found: {0}")]
	NotFound(String),

	#[error("failed to load grammar library {path}: {message}")]
	LoadError { path: PathBuf, message: String },

	#[error("grammar library missing language function: {0}")]
	MissingSymbol(String),

	#[error("IO error reading {path}: {message}")]
	Io { path: PathBuf, message: String },

	#[error("invalid grammar definition `{grammar}`: {message}")]
	Definition { grammar: String, message: String },

	#[error("grammar produced a malformed tree: {0}")]
	MalformedTree(String),

	#[error("grammar `{grammar}` failed to parse input: {message}")]
	Crashed { grammar: String, message: String },
}

impl GrammarError {
	pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
		Self::Io {
			path: path.to_path_buf(),
			message: err.to_string(),
		}
	}
}

/// Why a single parse did not produce a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
	/// The grammar itself is broken. Fatal.
	#[error(transparent)]
	Grammar(#[from] GrammarError),

	/// The fixture's time budget ran out mid-parse.
	#[error("parse timed out: {0}")]
	Timeout(#[from] DeadlineExceeded),
}

/// A language grammar.
///
/// `parse` must not fail on syntactically invalid input: recoverable errors
/// are represented as `ERROR`/missing nodes inside the returned tree. It fails
/// only when the grammar cannot process the input at all, or when `deadline`
/// expires. Byte ranges in the tree are byte offsets into `source`.
pub trait Grammar: Send + Sync {
	/// Returns the grammar identity (e.g. `java`).
	fn name(&self) -> &str;

	/// Parses `source` into a tree.
	fn parse(&self, source: &SourceBuffer, deadline: &Deadline) -> Result<ParseTree, ParseError>;
}

impl fmt::Debug for dyn Grammar + '_ {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Grammar({})", self.name())
	}
}

/// Source for loading a grammar.
#[derive(Clone)]
pub enum GrammarSource {
	/// A rules grammar definition (TOML) at the given path.
	Rules(PathBuf),
	/// A tree-sitter shared library. `symbol` defaults to `tree_sitter_<id>`.
	Library { path: PathBuf, symbol: Option<String> },
	/// An already constructed grammar.
	Loaded(Arc<dyn Grammar>),
}

impl fmt::Debug for GrammarSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Rules(path) => f.debug_tuple("Rules").field(path).finish(),
			Self::Library { path, symbol } => f
				.debug_struct("Library")
				.field("path", path)
				.field("symbol", symbol)
				.finish(),
			Self::Loaded(grammar) => f.debug_tuple("Loaded").field(&grammar.name()).finish(),
		}
	}
}

/// Directories searched for grammar libraries that are not given by path:
/// `$GLINT_RUNTIME/grammars`, then `$XDG_DATA_HOME/glint/grammars` (falling
/// back to `~/.local/share`).
pub fn grammar_search_paths() -> Vec<PathBuf> {
	search_paths(
		std::env::var_os("GLINT_RUNTIME"),
		std::env::var_os("XDG_DATA_HOME"),
		std::env::var_os("HOME"),
	)
}

fn search_paths(runtime: Option<OsString>, data_home: Option<OsString>, home: Option<OsString>) -> Vec<PathBuf> {
	let data_home = data_home
		.filter(|d| !d.is_empty())
		.map(PathBuf::from)
		.or_else(|| home.map(|h| PathBuf::from(h).join(".local/share")));
	runtime
		.filter(|r| !r.is_empty())
		.map(|r| PathBuf::from(r).join("grammars"))
		.into_iter()
		.chain(data_home.map(|d| d.join("glint/grammars")))
		.collect()
}

/// Platform file name of a compiled grammar library.
pub fn library_file_name(grammar: &str) -> String {
	#[cfg(target_os = "macos")]
	let ext = "dylib";
	#[cfg(windows)]
	let ext = "dll";
	#[cfg(not(any(target_os = "macos", windows)))]
	let ext = "so";
	format!("{grammar}.{ext}")
}

/// Resolves a grammar library path.
///
/// Existing paths are returned as-is; bare names are looked up in
/// [`grammar_search_paths`].
pub fn resolve_library(grammar: &str, path: &Path) -> Result<PathBuf, GrammarError> {
	if path.exists() {
		return Ok(path.to_path_buf());
	}
	let file_name = if path.as_os_str().is_empty() {
		library_file_name(grammar)
	} else {
		path.to_string_lossy().into_owned()
	};
	grammar_search_paths()
		.into_iter()
		.map(|dir| dir.join(&file_name))
		.find(|candidate| candidate.exists())
		.ok_or_else(|| GrammarError::NotFound(format!("{grammar} ({file_name})")))
}
