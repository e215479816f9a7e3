//! Human-readable run summary.

use std::fmt::Write as _;

use glint_verify::{FixtureOutcome, RunReport, Status, VerifyError};

/// Renders failures (with diffs), notes and the final tally.
pub fn render(report: &RunReport) -> String {
	let mut out = String::new();
	for outcome in &report.outcomes {
		write_outcome(&mut out, outcome);
	}
	let _ = writeln!(
		out,
		"{} passed, {} failed, {} updated ({:.2?})",
		report.passed, report.failed, report.updated, report.elapsed
	);
	out
}

fn write_outcome(out: &mut String, outcome: &FixtureOutcome) {
	let fixture = &outcome.fixture;
	let name = format!("{} {}", fixture.grammar, fixture.sample.display());
	match &outcome.status {
		Status::Pass | Status::Updated => {}
		Status::Fail { stage, error } => {
			let _ = writeln!(out, "FAIL {name} [{stage}]: {error}");
			let _ = writeln!(out, "     {}", fixture.path.display());
			if let VerifyError::Mismatch(mismatch) = error {
				for line in mismatch.report().lines() {
					let _ = writeln!(out, "     {line}");
				}
			}
		}
	}
	for note in &outcome.notes {
		let _ = writeln!(out, "note: {name}: {note}");
	}
}
