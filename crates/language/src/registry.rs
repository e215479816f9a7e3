//! Process-wide grammar cache.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::grammar::{Grammar, GrammarError, GrammarSource};
use crate::rules::RulesGrammar;

type LoadResult = Result<Arc<dyn Grammar>, GrammarError>;

/// Maps grammar ids to their sources and loads each at most once.
///
/// Concurrent [`load`](Self::load) calls for the same id block on a shared
/// cell; all of them observe the same grammar, or the same error.
#[derive(Debug, Default)]
pub struct GrammarRegistry {
	sources: FxHashMap<String, GrammarSource>,
	cells: Mutex<FxHashMap<String, Arc<OnceLock<LoadResult>>>>,
}

impl GrammarRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers (or replaces) the source for `id`.
	pub fn register(&mut self, id: impl Into<String>, source: GrammarSource) {
		let id = id.into();
		self.cells.get_mut().remove(&id);
		self.sources.insert(id, source);
	}


	/// Returns the grammar for `id`, loading it on first use.
	pub fn load(&self, id: &str) -> LoadResult {
		let source = self
			.sources
			.get(id)
			.ok_or_else(|| GrammarError::NotFound(id.to_owned()))?;
		let cell = self.cells.lock().entry(id.to_owned()).or_default().clone();
		cell.get_or_init(|| load_source(id, source)).clone()
	}
}

fn load_source(id: &str, source: &GrammarSource) -> LoadResult {
	let started = Instant::now();
	let result: LoadResult = match source {
		GrammarSource::Loaded(grammar) => Ok(grammar.clone()),
		GrammarSource::Rules(path) => RulesGrammar::from_path(path).map(|g| Arc::new(g) as Arc<dyn Grammar>),
		#[cfg(feature = "tree-sitter")]
		GrammarSource::Library { path, symbol } => crate::treesitter::TreeSitterGrammar::load(id, path, symbol.as_deref())
			.map(|g| Arc::new(g) as Arc<dyn Grammar>),
		#[cfg(not(feature = "tree-sitter"))]
		GrammarSource::Library { path, .. } => Err(GrammarError::LoadError {
			path: path.clone(),
			message: "built without the `tree-sitter` feature".into(),
		}),
	};
	match &result {
		Ok(_) => tracing::info!(grammar = id, source = ?source, elapsed = ?started.elapsed(), "loaded grammar"),
		Err(e) => tracing::error!(grammar = id, error = %e, "failed to load grammar"),
	}
	result
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;

	fn rules_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
		let path = dir.path().join("mini.toml");
		std::fs::write(&path, body).unwrap();
		path
	}

	#[test]
	fn test_unknown_id_is_not_found() {
		let registry = GrammarRegistry::new();
		assert_eq!(
			registry.load("java").unwrap_err(),
			GrammarError::NotFound("java".into())
		);
	}

	#[test]
	fn test_concurrent_loads_share_one_instance() {
		let dir = tempfile::tempdir().unwrap();
		let path = rules_file(&dir, "name = \"mini\"\n[[tokens]]\nkind = \"identifier\"\npattern = '[a-z]+'\n");
		let mut registry = GrammarRegistry::new();
		registry.register("mini", GrammarSource::Rules(path));

		let registry = &registry;
		let loaded: Vec<Arc<dyn Grammar>> = std::thread::scope(|s| {
			let handles: Vec<_> = (0..8).map(|_| s.spawn(move || registry.load("mini").unwrap())).collect();
			handles.into_iter().map(|h| h.join().unwrap()).collect()
		});
		for grammar in &loaded[1..] {
			assert!(Arc::ptr_eq(&loaded[0], grammar));
		}
		assert_eq!(loaded[0].name(), "mini");
	}

	#[test]
	fn test_errors_are_cached() {
		let dir = tempfile::tempdir().unwrap();
		let path = rules_file(&dir, "name = \"\"\n");
		let mut registry = GrammarRegistry::new();
		registry.register("broken", GrammarSource::Rules(path.clone()));

		let first = registry.load("broken").unwrap_err();
		// Fixing the file does not reload a cached failure.
		std::fs::write(&path, "name = \"fixed\"\n").unwrap();
		assert_eq!(registry.load("broken").unwrap_err(), first);

		// Re-registering clears the cell.
		registry.register("broken", GrammarSource::Rules(path));
		assert_eq!(registry.load("broken").unwrap().name(), "fixed");
	}
}
