//! Suite execution.
//!
//! [`Runner::new`] is the fatal pre-flight: it discovers fixtures, loads every
//! grammar they reference and compiles every query set. Any failure there
//! aborts before a single fixture runs. [`Runner::run`] then verifies fixtures
//! on a pool of scoped worker threads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use glint_language::{Grammar, GrammarError, GrammarRegistry, HighlightQuery, ParseTree, QueryErrorKind};
use glint_primitives::{Deadline, SourceBuffer};
use thiserror::Error;

use crate::config::{ConfigError, Suite, SuiteGrammar};
use crate::fixture::{Fixture, FixtureContext, FixtureOutcome, Stage, Status, VerifyError, parse_sample, run_fixture};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("grammar `{grammar}`: {source}")]
	Grammar { grammar: String, source: GrammarError },

	#[error("{}:{}:{}: {kind}", path.display(), .row + 1, .column + 1)]
	Query {
		path: PathBuf,
		row: usize,
		column: usize,
		kind: QueryErrorKind,
	},

	#[error("failed to read {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },

	#[error("unknown grammar `{0}`")]
	UnknownGrammar(String),

	#[error("{} is not a sample of any selected grammar", .0.display())]
	UnknownSample(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
	/// Rewrite expectations instead of comparing.
	pub update: bool,
	/// Restrict the run to one grammar.
	pub grammar: Option<String>,
	/// Restrict the run to these samples, or samples under these directories.
	pub paths: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct RunReport {
	/// One outcome per fixture, in discovery order.
	pub outcomes: Vec<FixtureOutcome>,
	pub passed: usize,
	pub updated: usize,
	pub failed: usize,
	pub elapsed: Duration,
}

impl RunReport {
	pub fn is_success(&self) -> bool {
		self.failed == 0
	}

	pub fn failures(&self) -> impl Iterator<Item = &FixtureOutcome> {
		self.outcomes.iter().filter(|o| o.is_failure())
	}
}

struct Prepared {
	grammar: Arc<dyn Grammar>,
	query: HighlightQuery,
}

/// A suite that passed pre-flight.
pub struct Runner {
	expectations: PathBuf,
	timeout: Option<Duration>,
	jobs: usize,
	update: bool,
	fixtures: Vec<Fixture>,
	prepared: BTreeMap<String, Prepared>,
}

impl Runner {
	pub fn new(suite: &Suite, options: &RunOptions) -> Result<Self, RunError> {
		let selected: Vec<&SuiteGrammar> = match &options.grammar {
			Some(id) => vec![suite.grammar(id).ok_or_else(|| RunError::UnknownGrammar(id.clone()))?],
			None => suite.grammars.iter().collect(),
		};

		let mut fixtures = Vec::new();
		for grammar in &selected {
			discover(grammar, &mut fixtures)?;
		}
		let fixtures = select(fixtures, &options.paths)?;

		let mut registry = GrammarRegistry::new();
		for grammar in &selected {
			registry.register(grammar.id.clone(), grammar.source.clone());
		}

		let mut prepared = BTreeMap::new();
		for grammar in selected {
			if !fixtures.iter().any(|f| f.grammar == grammar.id) {
				continue;
			}
			let loaded = registry.load(&grammar.id).map_err(|source| RunError::Grammar {
				grammar: grammar.id.clone(),
				source,
			})?;
			let query = compile_queries(&grammar.queries)?;
			tracing::debug!(grammar = %grammar.id, patterns = query.pattern_count(), "prepared grammar");
			prepared.insert(
				grammar.id.clone(),
				Prepared {
					grammar: loaded,
					query,
				},
			);
		}

		let jobs = suite
			.jobs
			.unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
			.max(1);

		Ok(Self {
			expectations: suite.expectations.clone(),
			timeout: suite.timeout,
			jobs,
			update: options.update,
			fixtures,
			prepared,
		})
	}

	pub fn fixtures(&self) -> &[Fixture] {
		&self.fixtures
	}

	/// Reads and parses one fixture without highlighting it.
	pub fn parse(&self, fixture: &Fixture) -> Result<Result<(SourceBuffer, ParseTree), (Stage, VerifyError)>, RunError> {
		let prepared = self.prepared_for(fixture)?;
		let deadline = self.timeout.map_or_else(Deadline::none, Deadline::after);
		parse_sample(prepared.grammar.as_ref(), &fixture.path, &deadline).map_err(|source| RunError::Grammar {
			grammar: fixture.grammar.clone(),
			source,
		})
	}

	/// Verifies (or, in update mode, rewrites) every fixture.
	///
	/// Fixture failures land in the report. A grammar crashing mid-run stops
	/// further scheduling and fails the run.
	pub fn run(&self) -> Result<RunReport, RunError> {
		let started = Instant::now();
		let total = self.fixtures.len();
		let jobs = self.jobs.min(total).max(1);
		tracing::info!(fixtures = total, jobs, update = self.update, "starting run");

		let cursor = AtomicUsize::new(0);
		let abort = AtomicBool::new(false);
		let (tx, rx) = mpsc::channel();

		thread::scope(|s| {
			for _ in 0..jobs {
				let tx = tx.clone();
				let (cursor, abort) = (&cursor, &abort);
				s.spawn(move || {
					while !abort.load(Ordering::Relaxed) {
						let index = cursor.fetch_add(1, Ordering::Relaxed);
						let Some(fixture) = self.fixtures.get(index) else {
							break;
						};
						let result = self.context(fixture).and_then(|ctx| {
							run_fixture(fixture.clone(), ctx).map_err(|source| RunError::Grammar {
								grammar: fixture.grammar.clone(),
								source,
							})
						});
						if result.is_err() {
							abort.store(true, Ordering::Relaxed);
						}
						if tx.send((index, result)).is_err() {
							break;
						}
					}
				});
			}
		});
		drop(tx);

		let mut slots: Vec<Option<FixtureOutcome>> = (0..total).map(|_| None).collect();
		let mut fatal: Option<(usize, RunError)> = None;
		for (index, result) in rx {
			match result {
				Ok(outcome) => slots[index] = Some(outcome),
				Err(err) if fatal.as_ref().is_none_or(|(first, _)| index < *first) => fatal = Some((index, err)),
				Err(_) => {}
			}
		}

		if let Some((_, err)) = fatal {
			tracing::error!(error = %err, "aborting run");
			return Err(err);
		}

		let outcomes: Vec<FixtureOutcome> = slots.into_iter().flatten().collect();
		let mut report = RunReport {
			passed: 0,
			updated: 0,
			failed: 0,
			outcomes,
			elapsed: started.elapsed(),
		};
		for outcome in &report.outcomes {
			match outcome.status {
				Status::Pass => report.passed += 1,
				Status::Updated => report.updated += 1,
				Status::Fail { .. } => report.failed += 1,
			}
		}
		tracing::info!(
			passed = report.passed,
			updated = report.updated,
			failed = report.failed,
			elapsed = ?report.elapsed,
			"run finished"
		);
		Ok(report)
	}

	fn prepared_for(&self, fixture: &Fixture) -> Result<&Prepared, RunError> {
		self.prepared
			.get(&fixture.grammar)
			.ok_or_else(|| RunError::UnknownGrammar(fixture.grammar.clone()))
	}

	fn context(&self, fixture: &Fixture) -> Result<FixtureContext<'_>, RunError> {
		let prepared = self.prepared_for(fixture)?;
		Ok(FixtureContext {
			grammar: prepared.grammar.as_ref(),
			query: &prepared.query,
			expectations: &self.expectations,
			timeout: self.timeout,
			update: self.update,
		})
	}
}

/// Concatenates query files and compiles them as one query.
///
/// Error positions are mapped back to the file they came from.
pub fn compile_queries(paths: &[PathBuf]) -> Result<HighlightQuery, RunError> {
	let mut source = String::new();
	let mut starts: Vec<(usize, &Path)> = Vec::with_capacity(paths.len());
	let mut row = 0;
	for path in paths {
		let text = std::fs::read_to_string(path).map_err(|error| RunError::Io {
			path: path.clone(),
			error,
		})?;
		starts.push((row, path.as_path()));
		source.push_str(&text);
		if !text.is_empty() && !text.ends_with('\n') {
			source.push('\n');
		}
		row += text.lines().count();
	}

	HighlightQuery::new(&source).map_err(|err| {
		let (first_row, path) = starts
			.iter()
			.rev()
			.find(|(start, _)| *start <= err.row)
			.copied()
			.unwrap_or((0, Path::new("<query>")));
		RunError::Query {
			path: path.to_owned(),
			row: err.row - first_row,
			column: err.column,
			kind: err.kind,
		}
	})
}

fn discover(grammar: &SuiteGrammar, out: &mut Vec<Fixture>) -> Result<(), RunError> {
	for root in &grammar.fixtures {
		let meta = std::fs::metadata(root).map_err(|error| RunError::Io {
			path: root.clone(),
			error,
		})?;
		if meta.is_file() {
			let sample = root.file_name().map(PathBuf::from).unwrap_or_else(|| root.clone());
			out.push(Fixture {
				grammar: grammar.id.clone(),
				path: root.clone(),
				sample,
			});
			continue;
		}

		let mut files = Vec::new();
		walk(root, &mut files)?;
		files.sort();
		for path in files {
			if !grammar.extensions.is_empty()
				&& !path
					.extension()
					.is_some_and(|ext| grammar.extensions.iter().any(|e| ext == e.as_str()))
			{
				continue;
			}
			let sample = path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.clone());
			out.push(Fixture {
				grammar: grammar.id.clone(),
				path,
				sample,
			});
		}
	}
	Ok(())
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RunError> {
	let io_err = |error| RunError::Io {
		path: dir.to_owned(),
		error,
	};
	for entry in std::fs::read_dir(dir).map_err(io_err)? {
		let path = entry.map_err(io_err)?.path();
		if path.is_dir() {
			walk(&path, out)?;
		} else {
			out.push(path);
		}
	}
	Ok(())
}

fn select(fixtures: Vec<Fixture>, paths: &[PathBuf]) -> Result<Vec<Fixture>, RunError> {
	if paths.is_empty() {
		return Ok(fixtures);
	}
	let wanted: Vec<(PathBuf, PathBuf)> = paths.iter().map(|p| (p.clone(), canonical(p))).collect();
	if let Some((missing, _)) = wanted
		.iter()
		.find(|(_, want)| !fixtures.iter().any(|f| canonical(&f.path).starts_with(want)))
	{
		return Err(RunError::UnknownSample(missing.clone()));
	}
	Ok(fixtures
		.into_iter()
		.filter(|f| {
			let path = canonical(&f.path);
			wanted.iter().any(|(_, want)| path.starts_with(want))
		})
		.collect())
}

fn canonical(path: &Path) -> PathBuf {
	std::fs::canonicalize(path).unwrap_or_else(|_| path.to_owned())
}
