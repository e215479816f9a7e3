//! Suite configuration (`glint.toml`).
//!
//! ```toml
//! expectations = "expectations"
//! timeout_ms = 5000
//!
//! [[grammar]]
//! id = "java"
//! rules = "grammars/java.toml"
//! queries = ["queries/java/highlights.scm"]
//! fixtures = ["fixtures/java"]
//! extensions = ["java"]
//! ```
//!
//! Relative paths resolve against the directory holding the suite file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glint_language::GrammarSource;
use serde::Deserialize;
use thiserror::Error;

/// Per-fixture budget when the suite does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reading the suite file.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },

	#[error("invalid suite {}: {error}", path.display())]
	Toml { path: PathBuf, error: toml::de::Error },

	#[error("grammar `{0}` must set exactly one of `rules`, `library` or `grammar`")]
	GrammarSource(String),

	#[error("grammar `{0}` is declared more than once")]
	DuplicateGrammar(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
	#[serde(default = "default_expectations")]
	pub expectations: PathBuf,
	pub timeout_ms: Option<u64>,
	pub jobs: Option<usize>,
	#[serde(default, rename = "grammar")]
	pub grammars: Vec<GrammarEntry>,
}

fn default_expectations() -> PathBuf {
	PathBuf::from("expectations")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrammarEntry {
	pub id: String,
	/// A rules grammar definition.
	pub rules: Option<PathBuf>,
	/// A tree-sitter shared library, or a directory to search.
	pub library: Option<PathBuf>,
	/// Entry symbol, defaulting to `tree_sitter_<id>`.
	pub symbol: Option<String>,
	/// A tree-sitter grammar found on the search path by id.
	#[serde(default)]
	pub grammar: bool,
	#[serde(default)]
	pub queries: Vec<PathBuf>,
	#[serde(default)]
	pub fixtures: Vec<PathBuf>,
	/// Sample extensions to pick up from fixture directories. Empty means all.
	#[serde(default)]
	pub extensions: Vec<String>,
}

/// A resolved suite ready to run.
#[derive(Debug, Clone)]
pub struct Suite {
	pub expectations: PathBuf,
	pub timeout: Option<Duration>,
	pub jobs: Option<usize>,
	pub grammars: Vec<SuiteGrammar>,
}

#[derive(Debug, Clone)]
pub struct SuiteGrammar {
	pub id: String,
	pub source: GrammarSource,
	/// Query files, concatenated in order.
	pub queries: Vec<PathBuf>,
	/// Sample files or directories searched recursively.
	pub fixtures: Vec<PathBuf>,
	pub extensions: Vec<String>,
}

impl Suite {
	/// Reads a suite file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_owned(),
			error,
		})?;
		let file: SuiteFile = toml::from_str(&text).map_err(|error| ConfigError::Toml {
			path: path.to_owned(),
			error,
		})?;
		let root = path.parent().unwrap_or(Path::new(""));
		Self::from_file(file, root)
	}

	/// Resolves `file` against `root`.
	pub fn from_file(file: SuiteFile, root: &Path) -> Result<Self, ConfigError> {
		let mut grammars: Vec<SuiteGrammar> = Vec::with_capacity(file.grammars.len());
		for entry in file.grammars {
			if grammars.iter().any(|g| g.id == entry.id) {
				return Err(ConfigError::DuplicateGrammar(entry.id));
			}
			let source = match (entry.rules, entry.library, entry.grammar) {
				(Some(rules), None, false) => GrammarSource::Rules(root.join(rules)),
				(None, Some(path), false) => GrammarSource::Library {
					path: root.join(path),
					symbol: entry.symbol,
				},
				(None, None, true) => GrammarSource::Library {
					path: PathBuf::new(),
					symbol: entry.symbol,
				},
				_ => return Err(ConfigError::GrammarSource(entry.id)),
			};
			grammars.push(SuiteGrammar {
				id: entry.id,
				source,
				queries: entry.queries.into_iter().map(|p| root.join(p)).collect(),
				fixtures: entry.fixtures.into_iter().map(|p| root.join(p)).collect(),
				extensions: entry.extensions,
			});
		}

		Ok(Self {
			expectations: root.join(file.expectations),
			timeout: Some(file.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis)),
			jobs: file.jobs,
			grammars,
		})
	}

	pub fn grammar(&self, id: &str) -> Option<&SuiteGrammar> {
		self.grammars.iter().find(|g| g.id == id)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn parse(text: &str) -> Result<Suite, ConfigError> {
		Suite::from_file(toml::from_str(text).unwrap(), Path::new("/suite"))
	}

	#[test]
	fn test_defaults_and_relative_paths() {
		let suite = parse(
			r#"
[[grammar]]
id = "java"
rules = "grammars/java.toml"
queries = ["queries/java/highlights.scm"]
fixtures = ["fixtures/java"]
"#,
		)
		.unwrap();
		assert_eq!(suite.expectations, Path::new("/suite/expectations"));
		assert_eq!(suite.timeout, Some(DEFAULT_TIMEOUT));
		assert_eq!(suite.jobs, None);

		let java = suite.grammar("java").unwrap();
		assert!(matches!(&java.source, GrammarSource::Rules(p) if p == Path::new("/suite/grammars/java.toml")));
		assert_eq!(java.queries, [PathBuf::from("/suite/queries/java/highlights.scm")]);
		assert_eq!(java.fixtures, [PathBuf::from("/suite/fixtures/java")]);
		assert!(suite.grammar("rust").is_none());
	}

	#[test]
	fn test_library_source() {
		let suite = parse(
			r#"
timeout_ms = 250
jobs = 2

[[grammar]]
id = "c"
library = "lib/libtree-sitter-c.so"
symbol = "tree_sitter_c"
"#,
		)
		.unwrap();
		assert_eq!(suite.timeout, Some(Duration::from_millis(250)));
		assert_eq!(suite.jobs, Some(2));
		let GrammarSource::Library { path, symbol } = &suite.grammars[0].source else {
			panic!("expected a library source");
		};
		assert_eq!(path, Path::new("/suite/lib/libtree-sitter-c.so"));
		assert_eq!(symbol.as_deref(), Some("tree_sitter_c"));
	}

	#[rstest]
	#[case::no_source("[[grammar]]\nid = \"x\"\n")]
	#[case::two_sources("[[grammar]]\nid = \"x\"\nrules = \"a\"\nlibrary = \"b\"\n")]
	fn test_grammar_needs_one_source(#[case] text: &str) {
		assert!(matches!(parse(text), Err(ConfigError::GrammarSource(id)) if id == "x"));
	}

	#[test]
	fn test_duplicate_grammar() {
		let text = "[[grammar]]\nid = \"x\"\nrules = \"a\"\n[[grammar]]\nid = \"x\"\nrules = \"b\"\n";
		assert!(matches!(parse(text), Err(ConfigError::DuplicateGrammar(id)) if id == "x"));
	}

	#[test]
	fn test_unknown_keys_are_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("glint.toml");
		std::fs::write(&path, "expectation = \"typo\"\n").unwrap();
		let err = Suite::load(&path).unwrap_err();
		assert!(matches!(err, ConfigError::Toml { .. }));
		assert!(err.to_string().contains("glint.toml"));
	}
}
