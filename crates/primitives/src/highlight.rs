use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// A highlight category from the closed vocabulary.
///
/// Query capture names map onto these by their first dotted component, so
/// `@function.method` and `@function` both resolve to [`HighlightName::Function`].
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HighlightName {
	Keyword,
	Function,
	Type,
	Constant,
	Variable,
	Property,
	Attribute,
	Number,
	String,
	Escape,
	Character,
	Comment,
	Operator,
	Punctuation,
	Identifier,
	Label,
	Namespace,
}

/// A capture name that does not belong to the vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown highlight name `{0}`")]
pub struct UnknownHighlight(pub std::string::String);

impl HighlightName {
	/// Returns the canonical lowercase name.
	pub fn as_str(self) -> &'static str {
		self.into()
	}

	/// Resolves a capture name such as `function.method` to its vocabulary entry.
	pub fn from_capture(name: &str) -> Result<Self, UnknownHighlight> {
		let base = name.split('.').next().unwrap_or(name);
		base.parse().map_err(|_| UnknownHighlight(name.to_owned()))
	}
}

impl std::fmt::Display for HighlightName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
