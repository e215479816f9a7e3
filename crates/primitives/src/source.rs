//! Immutable source text plus a line-start offset table.

use std::sync::Arc;

use thiserror::Error;

use crate::range::{ByteRange, LineCol};

/// Errors raised while loading source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
	#[error("source is not valid UTF-8 (first invalid byte at offset {offset})")]
	InvalidUtf8 { offset: usize },

	#[error("source is {len} bytes, larger than the 4 GiB byte-offset limit")]
	TooLarge { len: usize },
}

/// Raw source text with derived line indexing.
///
/// Cloning is cheap: the text and the line table are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
	text: Arc<str>,
	/// Byte offset of the first byte of every line. Always starts with `0`.
	line_starts: Arc<[u32]>,
}

impl SourceBuffer {
	/// Creates a buffer from owned text.
	pub fn new(text: impl Into<String>) -> Result<Self, SourceError> {
		let text: String = text.into();
		if text.len() > u32::MAX as usize {
			return Err(SourceError::TooLarge { len: text.len() });
		}
		let line_starts = line_start_offsets(text.as_bytes());
		Ok(Self {
			text: text.into(),
			line_starts: line_starts.into(),
		})
	}

	/// Creates a buffer from raw bytes, validating UTF-8.
	pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SourceError> {
		let text = String::from_utf8(bytes).map_err(|e| SourceError::InvalidUtf8 {
			offset: e.utf8_error().valid_up_to(),
		})?;
		Self::new(text)
	}

	/// Returns the full text.
	#[inline]
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Returns the text as bytes.
	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		self.text.as_bytes()
	}

	/// Returns the length in bytes.
	#[inline]
	pub fn len(&self) -> u32 {
		self.text.len() as u32
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.text.is_empty()
	}

	/// Returns the byte offsets at which each line starts.
	pub fn line_starts(&self) -> &[u32] {
		&self.line_starts
	}

	/// Returns the text covered by `range`.
	///
	/// Ranges that end past the buffer are clamped. Ranges that split a UTF-8
	/// sequence are widened to the surrounding character boundaries.
	pub fn slice(&self, range: ByteRange) -> &str {
		let len = self.text.len();
		let mut start = (range.start as usize).min(len);
		let mut end = (range.end as usize).min(len).max(start);
		while !self.text.is_char_boundary(start) {
			start -= 1;
		}
		while !self.text.is_char_boundary(end) {
			end += 1;
		}
		&self.text[start..end]
	}

	/// Maps a byte offset to a zero-based line and byte column.
	///
	/// Offsets past the end map to the end of the last line.
	pub fn line_col(&self, offset: u32) -> LineCol {
		let offset = offset.min(self.len());
		let line = match self.line_starts.binary_search(&offset) {
			Ok(line) => line,
			Err(next) => next - 1,
		};
		LineCol::new(line as u32, offset - self.line_starts[line])
	}

	/// Returns a stable 64-bit content hash rendered as 16 hex digits.
	pub fn content_hash(&self) -> String {
		content_hash(self.as_bytes())
	}
}

/// Hashes arbitrary bytes with xxh3 and renders the digest as hex.
pub fn content_hash(bytes: &[u8]) -> String {
	format!("{:016x}", xxhash_rust::xxh3::xxh3_64(bytes))
}

/// Computes line start offsets. `\n`, `\r\n`, and a lone `\r` each end a line.
fn line_start_offsets(bytes: &[u8]) -> Vec<u32> {
	let mut starts = vec![0];
	let mut i = 0;
	while i < bytes.len() {
		match bytes[i] {
			b'\n' => starts.push(i as u32 + 1),
			b'\r' => {
				if bytes.get(i + 1) == Some(&b'\n') {
					i += 1;
				}
				starts.push(i as u32 + 1);
			}
			_ => {}
		}
		i += 1;
	}
	starts
}
