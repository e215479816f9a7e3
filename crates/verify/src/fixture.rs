//! Verification of a single sample.
//!
//! Each fixture moves through `Loaded → Parsed → Queried → Resolved →
//! Compared`. The first failing stage ends the run of that fixture and is
//! recorded in its [`FixtureOutcome`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use glint_language::{Grammar, GrammarError, HighlightQuery, HighlightSpan, ParseError, ParseTree, resolve};
use glint_primitives::{Deadline, DeadlineExceeded, SourceBuffer, SourceError};
use thiserror::Error;

use crate::compare::{MismatchError, compare};
use crate::expectation::{Expectation, ExpectationError, expectation_path};

/// The stage a fixture reached, or failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
	Loaded,
	Parsed,
	Queried,
	Resolved,
	Compared,
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Loaded => "load",
			Self::Parsed => "parse",
			Self::Queried => "query",
			Self::Resolved => "resolve",
			Self::Compared => "compare",
		})
	}
}

/// Why a fixture failed. Never aborts sibling fixtures.
#[derive(Debug, Error)]
pub enum VerifyError {
	#[error("failed to read {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },

	#[error(transparent)]
	Source(#[from] SourceError),

	#[error("timed out: {0}")]
	Timeout(#[from] DeadlineExceeded),

	#[error("no expectation at {}", .0.display())]
	MissingExpectation(PathBuf),

	#[error("expectation {} was captured for {grammar} {sample}", path.display())]
	ForeignExpectation { path: PathBuf, grammar: String, sample: String },

	#[error(transparent)]
	Expectation(#[from] ExpectationError),

	#[error(transparent)]
	Mismatch(Box<MismatchError>),
}

impl From<MismatchError> for VerifyError {
	fn from(err: MismatchError) -> Self {
		Self::Mismatch(Box::new(err))
	}
}

/// A sample file bound to the grammar that verifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
	pub grammar: String,
	/// Path to read the sample from.
	pub path: PathBuf,
	/// Path relative to its fixture root; keys the expectation file.
	pub sample: PathBuf,
}

#[derive(Debug)]
pub enum Status {
	Pass,
	/// The expectation was rewritten from current output.
	Updated,
	Fail { stage: Stage, error: VerifyError },
}

#[derive(Debug)]
pub struct FixtureOutcome {
	pub fixture: Fixture,
	pub status: Status,
	/// Non-fatal observations, such as a stale content hash.
	pub notes: Vec<String>,
	pub elapsed: Duration,
}

impl FixtureOutcome {
	pub fn is_failure(&self) -> bool {
		matches!(self.status, Status::Fail { .. })
	}
}

/// Everything a fixture run reads besides the sample itself.
#[derive(Debug, Clone, Copy)]
pub struct FixtureContext<'a> {
	pub grammar: &'a dyn Grammar,
	pub query: &'a HighlightQuery,
	pub expectations: &'a Path,
	pub timeout: Option<Duration>,
	pub update: bool,
}

/// Reads and parses a sample.
pub fn parse_sample(
	grammar: &dyn Grammar,
	path: &Path,
	deadline: &Deadline,
) -> Result<Result<(SourceBuffer, ParseTree), (Stage, VerifyError)>, GrammarError> {
	let source = match load(path) {
		Ok(source) => source,
		Err(err) => return Ok(Err((Stage::Loaded, err))),
	};
	match grammar.parse(&source, deadline) {
		Ok(tree) => Ok(Ok((source, tree))),
		Err(ParseError::Timeout(err)) => Ok(Err((Stage::Parsed, err.into()))),
		Err(ParseError::Grammar(err)) => Err(err),
	}
}

fn load(path: &Path) -> Result<SourceBuffer, VerifyError> {
	let bytes = std::fs::read(path).map_err(|error| VerifyError::Io {
		path: path.to_owned(),
		error,
	})?;
	Ok(SourceBuffer::from_bytes(bytes)?)
}

/// Runs one fixture to completion.
///
/// Per-fixture failures are folded into the outcome. A [`GrammarError`] means
/// the grammar itself is broken and is returned for the runner to abort on.
pub fn run_fixture(fixture: Fixture, ctx: FixtureContext<'_>) -> Result<FixtureOutcome, GrammarError> {
	let span = tracing::debug_span!("fixture", grammar = %fixture.grammar, sample = %fixture.sample.display());
	let _guard = span.enter();

	let started = Instant::now();
	let deadline = ctx.timeout.map_or_else(Deadline::none, Deadline::after);
	let mut notes = Vec::new();
	let status = match verify(&fixture, ctx, &deadline, &mut notes)? {
		Ok(status) => status,
		Err((stage, error)) => {
			tracing::debug!(%stage, %error, "fixture failed");
			Status::Fail { stage, error }
		}
	};

	Ok(FixtureOutcome {
		fixture,
		status,
		notes,
		elapsed: started.elapsed(),
	})
}

type StageResult<T> = Result<T, (Stage, VerifyError)>;

fn at<E: Into<VerifyError>>(stage: Stage) -> impl FnOnce(E) -> (Stage, VerifyError) {
	move |err| (stage, err.into())
}

fn verify(
	fixture: &Fixture,
	ctx: FixtureContext<'_>,
	deadline: &Deadline,
	notes: &mut Vec<String>,
) -> Result<StageResult<Status>, GrammarError> {
	let (source, tree) = match parse_sample(ctx.grammar, &fixture.path, deadline)? {
		Ok(parsed) => parsed,
		Err(err) => return Ok(Err(err)),
	};
	tracing::debug!(nodes = tree.len(), has_error = tree.has_error(), "parsed");
	Ok(highlight_and_compare(fixture, ctx, deadline, notes, &source, &tree))
}

fn highlight_and_compare(
	fixture: &Fixture,
	ctx: FixtureContext<'_>,
	deadline: &Deadline,
	notes: &mut Vec<String>,
	source: &SourceBuffer,
	tree: &ParseTree,
) -> StageResult<Status> {
	let captures = ctx
		.query
		.evaluate(tree, source, deadline)
		.map_err(at(Stage::Queried))?;
	tracing::debug!(captures = captures.len(), "queried");

	let spans: Vec<HighlightSpan> = resolve(&captures, tree);
	deadline.check().map_err(at(Stage::Resolved))?;
	tracing::debug!(spans = spans.len(), "resolved");

	let path = expectation_path(ctx.expectations, &fixture.grammar, &fixture.sample);
	if ctx.update {
		Expectation::capture(&fixture.grammar, &fixture.sample, source, &spans)
			.save(&path)
			.map_err(at(Stage::Compared))?;
		tracing::debug!(path = %path.display(), "updated expectation");
		return Ok(Status::Updated);
	}

	let expectation = Expectation::load(&path)
		.map_err(at(Stage::Compared))?
		.ok_or_else(|| (Stage::Compared, VerifyError::MissingExpectation(path.clone())))?;
	if !expectation.belongs_to(&fixture.grammar, &fixture.sample) {
		return Err((
			Stage::Compared,
			VerifyError::ForeignExpectation {
				path,
				grammar: expectation.grammar,
				sample: expectation.sample,
			},
		));
	}

	let hash = source.content_hash();
	if expectation.content_hash != hash {
		tracing::warn!(
			path = %path.display(),
			stored = %expectation.content_hash,
			current = %hash,
			"sample changed since its expectation was written"
		);
		notes.push(format!(
			"content hash {} differs from stored {}; run with --update if the change is intended",
			hash, expectation.content_hash
		));
	}

	compare(source, &spans, &expectation.spans).map_err(at(Stage::Compared))?;
	Ok(Status::Pass)
}
