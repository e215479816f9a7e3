use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "glint")]
#[command(about = "Verify grammar highlighting against stored snapshots")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Samples (or directories of samples) to run; all fixtures when omitted
	#[arg(value_name = "PATHS")]
	pub paths: Vec<PathBuf>,

	/// Suite file
	#[arg(long, short = 'c', value_name = "FILE", default_value = "glint.toml")]
	pub config: PathBuf,

	/// Only run fixtures of this grammar
	#[arg(long, short = 'g', value_name = "ID")]
	pub grammar: Option<String>,

	/// Rewrite expectations from current output instead of comparing
	#[arg(long)]
	pub update: bool,

	/// Worker threads (defaults to the suite setting, then the CPU count)
	#[arg(long, short = 'j', value_name = "N")]
	pub jobs: Option<usize>,

	/// Per-fixture time budget in milliseconds; 0 disables it
	#[arg(long, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// Print each sample's parse tree instead of verifying
	#[arg(long, conflicts_with = "update")]
	pub print_tree: bool,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}
