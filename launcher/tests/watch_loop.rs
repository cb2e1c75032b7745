//! Reload-loop behavior against scripted executors and a fake clock, plus one
//! run over real files with the bundled engine.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use launcher::builder::instantiate_executor;
use launcher::core::outcome::{Outcome, Value};
use launcher::env::ExecutionEnvironment;
use launcher::script::ScriptInvocation;
use launcher::test_support::{CapturedStreams, FakeFs, ScriptedExecutor, ScriptedRun, at};
use launcher::watch::{PollingDetector, stat_modified, watch_loop};

fn invocation(path: &str) -> ScriptInvocation {
    ScriptInvocation {
        path: PathBuf::from(path),
        ..ScriptInvocation::default()
    }
}

fn ok() -> Outcome {
    Outcome::Success(Value::NoValue)
}

#[test]
fn watch_off_runs_once_without_polling() {
    let captured = CapturedStreams::new("");
    let env = ExecutionEnvironment::in_memory(captured.streams.clone());
    let disk = FakeFs::default();
    let mut detector = PollingDetector::new(
        Duration::from_millis(300),
        |p: &Path| disk.stat(p),
        disk.sleep(|_| ControlFlow::Continue(())),
    );

    let mut builds = 0;
    let success = watch_loop(
        &env,
        &invocation("s.sc"),
        false,
        || {
            builds += 1;
            ScriptedExecutor::new(ScriptedRun::new(Outcome::failure("bad")).watching("s.sc", at(1)))
        },
        &mut detector,
    );

    assert!(!success);
    assert_eq!(builds, 1);
    assert_eq!(disk.sleep_count(), 0);
    assert!(disk.take_stats().is_empty());
    assert!(captured.info.contents().is_empty());
    assert_eq!(captured.error.contents(), "bad\n");
}

#[test]
fn unchanged_files_never_trigger_a_rerun() {
    const POLLS: usize = 25;
    let captured = CapturedStreams::new("");
    let env = ExecutionEnvironment::in_memory(captured.streams.clone());
    let disk = FakeFs::default();
    disk.set("a.sc", at(1));
    disk.set("b.sc", at(1));
    let mut detector = PollingDetector::new(
        Duration::from_millis(300),
        |p: &Path| disk.stat(p),
        disk.sleep(|n| {
            if n < POLLS {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        }),
    );

    let mut builds = 0;
    let success = watch_loop(
        &env,
        &invocation("a.sc"),
        true,
        || {
            builds += 1;
            ScriptedExecutor::new(
                ScriptedRun::new(ok())
                    .watching("a.sc", at(1))
                    .watching("b.sc", at(1))
                    .watching("missing.sc", None),
            )
        },
        &mut detector,
    );

    assert!(success);
    assert_eq!(builds, 1);
    assert_eq!(disk.sleep_count(), POLLS);
    assert_eq!(
        captured.info.contents(),
        "Watching for changes to 3 files... (Ctrl-C to exit)\n"
    );
}

#[test]
fn change_reruns_once_and_rewatches_the_new_set() {
    let captured = CapturedStreams::new("");
    let env = ExecutionEnvironment::in_memory(captured.streams.clone());
    let disk = FakeFs::default();
    for name in ["a.sc", "b.sc", "c.sc"] {
        disk.set(name, at(1));
    }

    // First run reads {a, b}; after `a` changes the script reads {a, c}.
    let mut plan = VecDeque::from([
        ScriptedRun::new(ok())
            .watching("a.sc", at(1))
            .watching("b.sc", at(1)),
        ScriptedRun::new(Outcome::failure("second run failed"))
            .watching("a.sc", at(2))
            .watching("c.sc", at(1)),
    ]);

    let on_sleep = {
        let disk = disk.clone();
        move |n: usize| match n {
            3 => {
                disk.set("a.sc", at(2));
                disk.take_stats();
                ControlFlow::Continue(())
            }
            6 => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    };
    let mut detector = PollingDetector::new(
        Duration::from_millis(300),
        |p: &Path| disk.stat(p),
        disk.sleep(on_sleep),
    );

    let mut builds = 0;
    let success = watch_loop(
        &env,
        &invocation("a.sc"),
        true,
        || {
            builds += 1;
            ScriptedExecutor::new(plan.pop_front().expect("no more planned runs"))
        },
        &mut detector,
    );

    assert_eq!(builds, 2);
    assert!(!success, "the last run's result is returned");
    assert_eq!(captured.error.contents(), "second run failed\n");

    let checked = disk.take_stats();
    assert!(checked.contains(&PathBuf::from("c.sc")));
    assert!(
        !checked.contains(&PathBuf::from("b.sc")),
        "stale watch entry polled: {checked:?}"
    );
    assert_eq!(
        captured.info.contents().lines().count(),
        2,
        "one announcement per run"
    );
}

fn touch(path: &Path, content: &str, bump: u64) {
    fs::write(path, content).expect("write");
    let when = SystemTime::now() + Duration::from_secs(bump);
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(when))
        .expect("set mtime");
}

#[test]
fn engine_rerun_follows_a_changed_import() {
    let temp = tempfile::tempdir().expect("tempdir");
    let main = temp.path().join("main.sc");
    touch(&temp.path().join("b.sc"), "word = \"bee\"\n", 0);
    touch(&temp.path().join("c.sc"), "word = \"sea\"\n", 0);
    touch(&main, "import \"b.sc\"\nprint word\n", 0);

    let captured = CapturedStreams::new("");
    let env = ExecutionEnvironment {
        wd: temp.path().to_path_buf(),
        ..ExecutionEnvironment::in_memory(captured.streams.clone())
    };

    let mut sleeps = 0;
    let rewrite = main.clone();
    let mut detector = PollingDetector::new(Duration::from_millis(1), stat_modified, |_| {
        sleeps += 1;
        match sleeps {
            1 => {
                touch(&rewrite, "import \"c.sc\"\nprint word\n", 60);
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Break(()),
        }
    });

    let success = watch_loop(
        &env,
        &invocation("main.sc"),
        true,
        || instantiate_executor(&env, false),
        &mut detector,
    );

    assert!(success);
    assert_eq!(captured.output.contents(), "bee\nsea\n");
    let notices: Vec<String> = captured.info.contents().lines().map(str::to_string).collect();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.starts_with("Watching for changes to 2 files")));
}
