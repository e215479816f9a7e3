use std::time::{Duration, Instant};

use thiserror::Error;

/// The time budget of a single fixture run has been used up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("exceeded time budget of {budget:?}")]
pub struct DeadlineExceeded {
	pub budget: Duration,
}

/// A point in time after which cooperative work must stop.
///
/// Checked by grammars and the query engine at node granularity, so a
/// pathological grammar/query interaction ends in an error instead of a hang.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
	at: Option<Instant>,
	budget: Duration,
}

impl Deadline {
	/// A deadline that never expires.
	pub fn none() -> Self {
		Self {
			at: None,
			budget: Duration::MAX,
		}
	}

	/// A deadline `budget` from now.
	pub fn after(budget: Duration) -> Self {
		Self {
			at: Instant::now().checked_add(budget),
			budget,
		}
	}

	/// Returns the time left, or `None` for an unbounded deadline.
	pub fn remaining(&self) -> Option<Duration> {
		self.at.map(|at| at.saturating_duration_since(Instant::now()))
	}

	/// Returns true once the deadline has passed.
	#[inline]
	pub fn is_expired(&self) -> bool {
		self.at.is_some_and(|at| Instant::now() >= at)
	}

	/// Fails with [`DeadlineExceeded`] once the deadline has passed.
	#[inline]
	pub fn check(&self) -> Result<(), DeadlineExceeded> {
		if self.is_expired() {
			Err(DeadlineExceeded {
				budget: self.budget,
			})
		} else {
			Ok(())
		}
	}
}

impl Default for Deadline {
	fn default() -> Self {
		Self::none()
	}
}
