//! Stored golden renderings.

use std::io;
use std::path::{Path, PathBuf};

use glint_language::HighlightSpan;
use glint_primitives::{ByteRange, HighlightName, SourceBuffer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading or writing an expectation file.
#[derive(Debug, Error)]
pub enum ExpectationError {
	#[error("failed to read {}: {error}", path.display())]
	Read { path: PathBuf, error: io::Error },

	#[error("failed to write {}: {error}", path.display())]
	Write { path: PathBuf, error: io::Error },

	#[error("malformed expectation {}: {error}", path.display())]
	Parse { path: PathBuf, error: serde_json::Error },

	#[error("failed to encode expectation {}: {error}", path.display())]
	Encode { path: PathBuf, error: serde_json::Error },
}

/// One element of the canonical rendering: the highlighted text and its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedSpan {
	pub text: String,
	pub highlight: HighlightName,
}

impl std::fmt::Display for ExpectedSpan {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?} {}", self.text, self.highlight)
	}
}

/// A persisted rendering plus the identity of the fixture it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
	pub grammar: String,
	/// Sample path relative to its fixture root, `/`-separated.
	pub sample: String,
	pub content_hash: String,
	pub spans: Vec<ExpectedSpan>,
}

impl Expectation {
	/// Builds the expectation for the current output of a sample.
	pub fn capture(grammar: &str, sample: &Path, source: &SourceBuffer, spans: &[HighlightSpan]) -> Self {
		Self {
			grammar: grammar.to_owned(),
			sample: sample_key(sample),
			content_hash: source.content_hash(),
			spans: render(source, spans),
		}
	}

	/// Returns true if this expectation was captured for `sample` of `grammar`.
	pub fn belongs_to(&self, grammar: &str, sample: &Path) -> bool {
		self.grammar == grammar && self.sample == sample_key(sample)
	}

	/// Reads an expectation, returning `None` when the file does not exist.
	pub fn load(path: &Path) -> Result<Option<Self>, ExpectationError> {
		let bytes = match std::fs::read(path) {
			Ok(bytes) => bytes,
			Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(error) => {
				return Err(ExpectationError::Read {
					path: path.to_owned(),
					error,
				});
			}
		};
		serde_json::from_slice(&bytes)
			.map(Some)
			.map_err(|error| ExpectationError::Parse {
				path: path.to_owned(),
				error,
			})
	}

	/// Writes pretty JSON with a trailing newline, creating parent directories.
	pub fn save(&self, path: &Path) -> Result<(), ExpectationError> {
		let write_err = |error| ExpectationError::Write {
			path: path.to_owned(),
			error,
		};
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(write_err)?;
		}
		let mut json = serde_json::to_string_pretty(self).map_err(|error| ExpectationError::Encode {
			path: path.to_owned(),
			error,
		})?;
		json.push('\n');
		std::fs::write(path, json).map_err(write_err)
	}
}

/// Renders resolved spans as `(text, highlight)` pairs.
pub fn render(source: &SourceBuffer, spans: &[HighlightSpan]) -> Vec<ExpectedSpan> {
	spans
		.iter()
		.map(|span| ExpectedSpan {
			text: source.slice(ByteRange::new(span.start, span.end)).to_owned(),
			highlight: span.highlight,
		})
		.collect()
}

/// Returns `<dir>/<grammar>/<sample>.json`.
pub fn expectation_path(dir: &Path, grammar: &str, sample: &Path) -> PathBuf {
	let mut name = sample.as_os_str().to_owned();
	name.push(".json");
	dir.join(grammar).join(name)
}

fn sample_key(sample: &Path) -> String {
	sample
		.components()
		.map(|c| c.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}
