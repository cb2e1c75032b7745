//! Writes an outcome's report to the injected streams.

use std::io;

use tracing::warn;

use crate::core::outcome::Outcome;
use crate::core::report::{Report, ReportTarget, report};
use crate::io::streams::Streams;

/// Perform the report's single print, if it has one.
pub fn print_report(report: &Report, streams: &Streams) -> io::Result<()> {
    match report.target {
        ReportTarget::Output => streams.output.write_line(&report.text),
        ReportTarget::Error => streams.error.write_line(&report.text),
        ReportTarget::Silent => Ok(()),
    }
}

/// Report `outcome` and return whether it counts as a success.
///
/// A failed write is logged and does not change the result.
pub fn report_outcome(outcome: &Outcome, streams: &Streams) -> bool {
    let report = report(outcome);
    if let Err(err) = print_report(&report, streams) {
        warn!(err = %err, stream = ?report.target, "failed to print result");
    }
    report.success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::{Exception, Frame, Value};
    use crate::test_support::CapturedStreams;

    #[test]
    fn each_variant_prints_to_one_stream_at_most() {
        let cases = [
            (Outcome::failure("boom"), "", "boom\n", false),
            (Outcome::Success(Value::Str("hi".to_string())), "\"hi\"\n", "", true),
            (Outcome::Success(Value::NoValue), "", "", true),
            (Outcome::Skipped, "", "", true),
        ];
        for (outcome, out, err, success) in cases {
            let captured = CapturedStreams::new("");
            assert_eq!(report_outcome(&outcome, &captured.streams), success, "{outcome:?}");
            assert_eq!(captured.output.contents(), out, "{outcome:?}");
            assert_eq!(captured.error.contents(), err, "{outcome:?}");
            assert!(captured.info.contents().is_empty());
        }
    }

    #[test]
    fn exception_trace_stops_at_entry_marker() {
        let captured = CapturedStreams::new("");
        let ex = Exception::new(
            "ScriptError",
            "bad",
            vec![
                Frame::user("<top-level>", "s.sc", 3),
                Frame::entry("s.sc"),
                Frame::host("launcher::script::run_script"),
            ],
        );
        assert!(!report_outcome(&Outcome::ExceptionRaised(ex), &captured.streams));
        assert_eq!(
            captured.error.contents(),
            "ScriptError: bad\n  at <top-level>(s.sc:3)\n  at <script-entry>(s.sc)\n"
        );
    }
}
