//! `glint` command-line entry point.
//!
//! Exit status: 0 when every fixture passes (or was updated), 1 when any
//! fixture fails, 2 when the suite itself is broken.

mod cli;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use glint_verify::{RunOptions, Runner, Suite};

use crate::cli::Cli;

fn main() -> ExitCode {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	match run(cli) {
		Ok(code) => code,
		Err(err) => {
			eprintln!("error: {err:#}");
			ExitCode::from(2)
		}
	}
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
	let mut suite = Suite::load(&cli.config)?;
	if let Some(jobs) = cli.jobs {
		suite.jobs = Some(jobs);
	}
	if let Some(ms) = cli.timeout_ms {
		suite.timeout = (ms > 0).then(|| Duration::from_millis(ms));
	}
	tracing::debug!(
		config = %cli.config.display(),
		grammars = suite.grammars.len(),
		timeout = ?suite.timeout,
		"loaded suite"
	);

	let root = cli.config.parent().unwrap_or(Path::new(""));
	let options = RunOptions {
		update: cli.update,
		grammar: cli.grammar,
		paths: cli.paths.iter().map(|p| resolve_path(root, p)).collect(),
	};
	let runner = Runner::new(&suite, &options)?;

	if cli.print_tree {
		return print_trees(&runner);
	}

	let report = runner.run()?;
	eprint!("{}", report::render(&report));
	Ok(if report.is_success() {
		ExitCode::SUCCESS
	} else {
		ExitCode::from(1)
	})
}

fn print_trees(runner: &Runner) -> anyhow::Result<ExitCode> {
	let mut failed = false;
	for fixture in runner.fixtures() {
		match runner.parse(fixture)? {
			Ok((source, tree)) => {
				let mut out = String::new();
				tree.pretty_print(&source, &mut out)
					.with_context(|| format!("printing tree of {}", fixture.path.display()))?;
				println!("{} {}", fixture.grammar, fixture.sample.display());
				print!("{out}");
			}
			Err((stage, error)) => {
				eprintln!("{} {} [{stage}]: {error}", fixture.grammar, fixture.sample.display());
				failed = true;
			}
		}
	}
	Ok(if failed { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

/// Paths on the command line may be relative to the working directory or to
/// the suite root.
fn resolve_path(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() || path.exists() {
		path.to_owned()
	} else {
		root.join(path)
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("glint=debug,glint_verify=debug,glint_language=debug")
		} else {
			EnvFilter::new("warn")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}
