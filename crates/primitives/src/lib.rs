//! Core types shared by the grammar, query and verification layers.

/// Per-fixture time budgets.
pub mod deadline;
/// The closed highlight vocabulary.
pub mod highlight;
/// Byte ranges and line/column positions.
pub mod range;
/// Immutable source text with a line-start index.
pub mod source;

pub use deadline::{Deadline, DeadlineExceeded};
pub use highlight::{HighlightName, UnknownHighlight};
pub use range::{ByteRange, LineCol};
pub use source::{SourceBuffer, SourceError};
