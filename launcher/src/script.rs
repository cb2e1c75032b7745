//! One script or code execution, with the consulted files read back.
//!
//! Both entry points always return: a panic inside the executor is caught and
//! turned into [`Outcome::ExceptionRaised`].

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::core::outcome::{Exception, Outcome};
use crate::core::watched::{WatchedFile, collapse_watched};
use crate::executor::Executor;

/// A script path plus the arguments bound into its scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub path: PathBuf,
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, Option<String>>,
}

/// Run a script and capture every file the run consulted, first seen first.
#[instrument(skip_all, fields(path = %invocation.path.display()))]
pub fn run_script<E>(executor: &mut E, invocation: &ScriptInvocation) -> (Outcome, Vec<WatchedFile>)
where
    E: Executor + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        executor.run_script_file(&invocation.path, &invocation.positional, &invocation.keyword)
    }))
    .unwrap_or_else(|payload| {
        warn!("executor panicked while running script");
        Outcome::ExceptionRaised(Exception::from_panic(payload, "launcher::script::run_script"))
    });

    let consulted = panic::catch_unwind(AssertUnwindSafe(|| executor.watched_files()))
        .unwrap_or_else(|_| {
            warn!("executor panicked while listing consulted files");
            Vec::new()
        });
    let watched = collapse_watched(consulted);
    debug!(watched = watched.len(), success = outcome.is_success(), "script finished");
    (outcome, watched)
}

/// Run a code snippet.
#[instrument(skip_all, fields(len = code.len()))]
pub fn run_code<E>(executor: &mut E, code: &str) -> Outcome
where
    E: Executor + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| executor.load_code(code))).unwrap_or_else(|payload| {
        warn!("executor panicked while running code");
        Outcome::ExceptionRaised(Exception::from_panic(payload, "launcher::script::run_code"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::Value;
    use crate::test_support::{ScriptedExecutor, ScriptedRun, at};

    fn invocation() -> ScriptInvocation {
        let mut keyword = BTreeMap::new();
        keyword.insert("n".to_string(), Some("3".to_string()));
        ScriptInvocation {
            path: PathBuf::from("main.sc"),
            positional: vec!["a".to_string()],
            keyword,
        }
    }

    #[test]
    fn arguments_reach_the_executor() {
        let mut executor = ScriptedExecutor::new(ScriptedRun::new(Outcome::Skipped));
        let (outcome, _) = run_script(&mut executor, &invocation());
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(executor.scripts.len(), 1);
        let (path, positional, keyword) = &executor.scripts[0];
        assert_eq!(path, &PathBuf::from("main.sc"));
        assert_eq!(positional, &vec!["a".to_string()]);
        assert_eq!(keyword.get("n"), Some(&Some("3".to_string())));
    }

    #[test]
    fn code_reaches_the_executor_verbatim() {
        let mut executor = ScriptedExecutor::new(ScriptedRun::new(Outcome::Success(Value::Int(3))));
        assert_eq!(run_code(&mut executor, "1 + 2"), Outcome::Success(Value::Int(3)));
        assert_eq!(executor.code, vec!["1 + 2".to_string()]);
        assert!(executor.scripts.is_empty());
    }

    #[test]
    fn watched_files_keep_first_seen_order_without_duplicates() {
        let run = ScriptedRun::new(Outcome::Success(Value::NoValue))
            .watching("main.sc", at(1))
            .watching("lib.sc", at(2))
            .watching("main.sc", at(9))
            .watching("gone.sc", None);
        let mut executor = ScriptedExecutor::new(run);
        let (_, watched) = run_script(&mut executor, &invocation());
        let seen: Vec<(PathBuf, _)> = watched.into_iter().map(|w| (w.path, w.modified)).collect();
        assert_eq!(
            seen,
            vec![
                (PathBuf::from("main.sc"), at(1)),
                (PathBuf::from("lib.sc"), at(2)),
                (PathBuf::from("gone.sc"), None),
            ]
        );
    }

    #[test]
    fn panicking_executor_becomes_exception_outcome() {
        let mut executor = ScriptedExecutor::new(ScriptedRun::panicking("kaboom"));
        let (outcome, watched) = run_script(&mut executor, &invocation());
        let Outcome::ExceptionRaised(ex) = outcome else {
            panic!("expected exception, got {outcome:?}");
        };
        assert_eq!(ex.message, "kaboom");
        assert!(watched.is_empty());

        let mut executor = ScriptedExecutor::new(ScriptedRun::panicking("again"));
        assert!(matches!(run_code(&mut executor, "1"), Outcome::ExceptionRaised(_)));
    }
}
