//! Interactive sessions.

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::exit_codes;
use crate::io::streams::Streams;
use crate::lifecycle::LoggingHandle;
use crate::reporter::report_outcome;
use crate::script::run_code;

const PROMPT: &str = "@ ";

/// A long-running session driven by the launcher.
pub trait Session {
    /// Run until the session ends; returns its exit code.
    fn run(&mut self) -> i32;

    /// Called once after [`Session::run`] and before the logger is closed.
    fn before_exit(&mut self, code: i32);
}

/// Line-at-a-time read-eval-print loop over the injected streams.
///
/// Each non-empty line is evaluated as code and reported like `--code`.
/// End of input or a line reading `exit` ends the session.
pub struct ReplSession {
    engine: Engine,
    streams: Streams,
    banner: Option<String>,
    logging: LoggingHandle,
}

impl ReplSession {
    pub fn new(
        engine: Engine,
        streams: Streams,
        banner: Option<String>,
        logging: LoggingHandle,
    ) -> Self {
        Self {
            engine,
            streams,
            banner,
            logging,
        }
    }

    fn log(&self, event: &str) {
        if let Some(logger) = &self.logging {
            logger.apply(event);
        }
    }
}

impl Session for ReplSession {
    fn run(&mut self) -> i32 {
        if let Some(banner) = &self.banner
            && let Err(err) = self.streams.info.write_line(banner)
        {
            warn!(err = %err, "failed to print banner");
        }

        loop {
            if let Err(err) = self.streams.info.write_str(PROMPT) {
                warn!(err = %err, "failed to print prompt");
            }
            let line = match self.streams.input.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => return exit_codes::OK,
                Err(err) => {
                    warn!(err = %err, "failed to read input");
                    return exit_codes::FAILURE;
                }
            };
            match line.trim() {
                "" => continue,
                "exit" => return exit_codes::OK,
                _ => {}
            }
            self.log("eval");
            let outcome = run_code(&mut self.engine, &line);
            report_outcome(&outcome, &self.streams);
        }
    }

    fn before_exit(&mut self, code: i32) {
        debug!(code, "session ending");
        self.log("exit");
        if let Err(err) = self.streams.output.flush() {
            warn!(err = %err, "failed to flush output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::instantiate_session;
    use crate::core::outcome::Value;
    use crate::env::ExecutionEnvironment;
    use crate::test_support::{CapturedStreams, CountingLogger};
    use std::sync::Arc;

    #[test]
    fn evaluates_lines_until_end_of_input() {
        let captured = CapturedStreams::new("x = answer + 1\n\nx\nprint \"done\"\n");
        let env = ExecutionEnvironment {
            banner: Some("welcome".to_string()),
            ..ExecutionEnvironment::in_memory(captured.streams.clone())
        };
        let mut session = instantiate_session(
            &env,
            vec![("answer".to_string(), Value::Int(41))],
            None,
        );
        assert_eq!(session.run(), exit_codes::OK);
        assert_eq!(captured.output.contents(), "42\ndone\n");
        assert!(captured.info.contents().starts_with("welcome\n@ "));
    }

    #[test]
    fn errors_are_reported_and_the_session_continues() {
        let captured = CapturedStreams::new("nope\n1 + 1\nexit\nprint 3\n");
        let env = ExecutionEnvironment::in_memory(captured.streams.clone());
        let mut session = instantiate_session(&env, Vec::new(), None);
        assert_eq!(session.run(), exit_codes::OK);
        assert!(captured.error.contents().starts_with("NameError: not found: value nope"));
        assert_eq!(captured.output.contents(), "2\n");
    }

    #[test]
    fn events_go_to_the_handle() {
        let logger = CountingLogger::default();
        let captured = CapturedStreams::new("1\n");
        let env = ExecutionEnvironment::in_memory(captured.streams.clone());
        let mut session = instantiate_session(&env, Vec::new(), Some(Arc::new(logger.clone())));
        let code = session.run();
        session.before_exit(code);
        assert_eq!(logger.events(), vec!["eval".to_string(), "exit".to_string()]);
        assert_eq!(logger.close_count(), 0);
    }
}
