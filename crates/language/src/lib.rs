// Output goes through tracing; the binary owns stdout and stderr.
#![deny(clippy::print_stderr, clippy::print_stdout)]

//! Grammar-driven highlighting.
//!
//! # Architecture
//!
//! * [`grammar`]: the grammar adapter contract and library search paths
//! * [`tree`]: immutable arena parse trees and their builder
//! * [`rules`]: data-defined grammars read from TOML
//! * `treesitter`: grammars loaded from tree-sitter shared libraries
//! * [`registry`]: process-wide, load-once grammar cache
//! * [`query`]: highlight query compilation and evaluation
//! * [`highlight`]: resolution of overlapping captures into final spans

pub mod grammar;
pub mod highlight;
pub mod query;
pub mod registry;
pub mod rules;
pub mod tree;
#[cfg(feature = "tree-sitter")]
pub mod treesitter;

pub use grammar::{Grammar, GrammarError, GrammarSource, ParseError, grammar_search_paths};
pub use highlight::{HighlightSpan, resolve};
pub use query::{Capture, DEFAULT_PRIORITY, HighlightQuery, QueryDefinitionError, QueryErrorKind};
pub use registry::GrammarRegistry;
pub use rules::RulesGrammar;
pub use tree::{ERROR_KIND, Node, NodeId, ParseTree, TreeBuilder};
#[cfg(feature = "tree-sitter")]
pub use treesitter::TreeSitterGrammar;
