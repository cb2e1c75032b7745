//! Top-level runs. Each one owns the logging scope for its invocation and
//! reports success as a boolean; exit codes are left to the caller.

use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::builder::{instantiate_executor, instantiate_session};
use crate::core::outcome::Value;
use crate::env::ExecutionEnvironment;
use crate::exit_codes;
use crate::io::remote_log::RemoteLogger;
use crate::lifecycle::{LoggingHandle, LoggingScope};
use crate::reporter::report_outcome;
use crate::script::{self, ScriptInvocation};
use crate::session::Session;
use crate::watch::{ChangeDetector, watch_loop};

/// How a script run behaves beyond its arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptOptions {
    pub watch: bool,
    pub repl_api: bool,
}

/// Run a session built from the logging handle. The logger is created
/// before the session and closed after `before_exit`, whatever happens.
pub fn run_session<S, F, B>(env: &ExecutionEnvironment, factory: F, build: B) -> bool
where
    S: Session,
    F: FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>>,
    B: FnOnce(LoggingHandle) -> S,
{
    let scope = LoggingScope::open(env, factory);
    let mut session = build(scope.handle());
    let code = session.run();
    session.before_exit(code);
    code == exit_codes::OK
}

/// Interactive session with `extra_bindings` in scope.
#[instrument(skip_all)]
pub fn run_repl<F>(env: &ExecutionEnvironment, extra_bindings: Vec<(String, Value)>, factory: F) -> bool
where
    F: FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>>,
{
    run_session(env, factory, |logging| {
        instantiate_session(env, extra_bindings, logging)
    })
}

/// Run `code` once and report it.
#[instrument(skip_all, fields(len = code.len()))]
pub fn run_code<F>(env: &ExecutionEnvironment, code: &str, repl_api: bool, factory: F) -> bool
where
    F: FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>>,
{
    let scope = LoggingScope::open(env, factory);
    scope.apply("code");
    let mut executor = instantiate_executor(env, repl_api);
    let outcome = script::run_code(&mut executor, code);
    report_outcome(&outcome, &env.streams)
}

/// Run a script, re-running it on changes when watching.
#[instrument(skip_all, fields(path = %invocation.path.display()))]
pub fn run_script<F, D>(
    env: &ExecutionEnvironment,
    invocation: &ScriptInvocation,
    options: ScriptOptions,
    factory: F,
    detector: &mut D,
) -> bool
where
    F: FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>>,
    D: ChangeDetector + ?Sized,
{
    let scope = LoggingScope::open(env, factory);
    scope.apply("script");
    watch_loop(
        env,
        invocation,
        options.watch,
        || instantiate_executor(env, options.repl_api),
        detector,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CapturedStreams, CountingLogger};
    use std::fs;
    use std::ops::ControlFlow;
    use std::panic::{self, AssertUnwindSafe};
    use std::path::PathBuf;

    use crate::core::watched::WatchedFile;

    struct FixedSession {
        code: i32,
        panic_in_run: bool,
        logging: LoggingHandle,
    }

    impl Session for FixedSession {
        fn run(&mut self) -> i32 {
            if self.panic_in_run {
                panic!("session crashed");
            }
            self.code
        }

        fn before_exit(&mut self, _code: i32) {
            if let Some(logger) = &self.logging {
                logger.apply("exit");
            }
        }
    }

    struct NeverCalled;

    impl ChangeDetector for NeverCalled {
        fn wait_for_change(&mut self, _files: &[WatchedFile]) -> ControlFlow<()> {
            panic!("detector must not run without watch");
        }
    }

    fn logging_env(captured: &CapturedStreams) -> ExecutionEnvironment {
        ExecutionEnvironment {
            remote_logging: true,
            ..ExecutionEnvironment::in_memory(captured.streams.clone())
        }
    }

    fn factory(
        logger: &CountingLogger,
    ) -> impl FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>> + use<> {
        let logger = logger.clone();
        move |_: &ExecutionEnvironment| -> Result<Arc<dyn RemoteLogger>> { Ok(Arc::new(logger)) }
    }

    #[test]
    fn session_exit_codes_map_to_success() {
        let captured = CapturedStreams::new("");
        for (code, expected) in [(exit_codes::OK, true), (exit_codes::FAILURE, false)] {
            let logger = CountingLogger::default();
            let ok = run_session(&logging_env(&captured), factory(&logger), |logging| {
                assert!(logging.is_some());
                FixedSession {
                    code,
                    panic_in_run: false,
                    logging,
                }
            });
            assert_eq!(ok, expected);
            assert_eq!(logger.close_count(), 1);
            assert_eq!(logger.events(), vec!["boot".to_string(), "exit".to_string()]);
        }
    }

    #[test]
    fn logger_closes_once_when_session_panics() {
        let captured = CapturedStreams::new("");
        let logger = CountingLogger::default();
        let env = logging_env(&captured);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_session(&env, factory(&logger), |logging| FixedSession {
                code: exit_codes::OK,
                panic_in_run: true,
                logging,
            })
        }));
        assert!(result.is_err());
        assert_eq!(logger.close_count(), 1);
    }

    #[test]
    fn failing_code_still_closes_the_logger() {
        let captured = CapturedStreams::new("");
        let logger = CountingLogger::default();
        assert!(!run_code(&logging_env(&captured), "fail \"nope\"", false, factory(&logger)));
        assert_eq!(captured.error.contents(), "nope\n");
        assert_eq!(logger.close_count(), 1);
        assert_eq!(logger.events(), vec!["boot".to_string(), "code".to_string()]);
    }

    #[test]
    fn script_without_watch_runs_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("s.sc"), "print 6 * 7\n").expect("write");
        let captured = CapturedStreams::new("");
        let env = ExecutionEnvironment {
            wd: temp.path().to_path_buf(),
            ..logging_env(&captured)
        };
        let logger = CountingLogger::default();
        let invocation = ScriptInvocation {
            path: PathBuf::from("s.sc"),
            ..ScriptInvocation::default()
        };
        let ok = run_script(
            &env,
            &invocation,
            ScriptOptions::default(),
            factory(&logger),
            &mut NeverCalled,
        );
        assert!(ok);
        assert_eq!(captured.output.contents(), "42\n");
        assert!(captured.info.contents().is_empty());
        assert_eq!(logger.close_count(), 1);
    }
}
