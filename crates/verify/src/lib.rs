//! Snapshot verification for highlight output.
//!
//! A [`Suite`] names grammars, their query files and fixture directories.
//! [`Runner::new`] validates all of it up front; [`Runner::run`] then pushes
//! every sample through parse, query and resolve, and compares the rendering
//! with the stored [`Expectation`].

#![deny(clippy::print_stderr, clippy::print_stdout)]

pub mod compare;
pub mod config;
pub mod expectation;
pub mod fixture;
pub mod runner;

pub use compare::{MismatchError, compare};
pub use config::{ConfigError, DEFAULT_TIMEOUT, GrammarEntry, Suite, SuiteFile, SuiteGrammar};
pub use expectation::{Expectation, ExpectationError, ExpectedSpan, expectation_path, render};
pub use fixture::{Fixture, FixtureContext, FixtureOutcome, Stage, Status, VerifyError, parse_sample, run_fixture};
pub use runner::{RunError, RunOptions, RunReport, Runner, compile_queries};
