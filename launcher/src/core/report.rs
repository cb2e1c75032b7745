//! Outcome → user-visible text, as a pure mapping.

use crate::core::outcome::{Outcome, Value};

/// Which injected stream a report is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    Output,
    Error,
    /// Nothing is printed.
    Silent,
}

/// What to print and whether the run counts as a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub target: ReportTarget,
    pub text: String,
    pub success: bool,
}

impl Report {
    fn silent() -> Self {
        Self {
            target: ReportTarget::Silent,
            text: String::new(),
            success: true,
        }
    }
}

/// Map every outcome variant to a fixed report. Never fails.
pub fn report(outcome: &Outcome) -> Report {
    match outcome {
        Outcome::Failure { message, .. } => Report {
            target: ReportTarget::Error,
            text: message.clone(),
            success: false,
        },
        Outcome::ExceptionRaised(ex) => Report {
            target: ReportTarget::Error,
            text: ex.render(ex.user_frames()),
            success: false,
        },
        Outcome::Success(Value::NoValue) => Report::silent(),
        Outcome::Success(value) => Report {
            target: ReportTarget::Output,
            text: value.pretty(),
            success: true,
        },
        Outcome::Skipped => Report::silent(),
    }
}
