//! The reload loop and its change detectors.
//!
//! Every pass builds a fresh executor, runs the script, reports the outcome,
//! and then waits on exactly the files that pass consulted. The previous
//! watched set is discarded, so dependencies added or dropped by conditional
//! code are picked up on the next pass.

use std::fs;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, SystemTime};

use notify::{Event as NotifyEvent, RecursiveMode, Watcher};
use tracing::{debug, info, instrument, warn};

use crate::core::watched::{WatchedFile, first_changed};
use crate::env::ExecutionEnvironment;
use crate::executor::Executor;
use crate::reporter::report_outcome;
use crate::script::{ScriptInvocation, run_script};

/// Blocks until a watched file changes.
pub trait ChangeDetector {
    /// `Continue` once any of `files` differs from its captured state;
    /// `Break` when watching should stop.
    fn wait_for_change(&mut self, files: &[WatchedFile]) -> ControlFlow<()>;
}

/// Modification time of `path`, or `None` if it cannot be read.
pub fn stat_modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn sleep_for(interval: Duration) -> ControlFlow<()> {
    thread::sleep(interval);
    ControlFlow::Continue(())
}

/// Checks every watched file, then sleeps, until one has changed.
pub struct PollingDetector<S, W> {
    interval: Duration,
    stat: S,
    sleep: W,
}

/// Poller over the real filesystem and clock.
pub type SystemPoller =
    PollingDetector<fn(&Path) -> Option<SystemTime>, fn(Duration) -> ControlFlow<()>>;

impl<S, W> PollingDetector<S, W>
where
    S: FnMut(&Path) -> Option<SystemTime>,
    W: FnMut(Duration) -> ControlFlow<()>,
{
    pub fn new(interval: Duration, stat: S, sleep: W) -> Self {
        Self {
            interval,
            stat,
            sleep,
        }
    }
}

impl SystemPoller {
    pub fn system(interval: Duration) -> Self {
        Self {
            interval,
            stat: stat_modified,
            sleep: sleep_for,
        }
    }
}

impl<S, W> ChangeDetector for PollingDetector<S, W>
where
    S: FnMut(&Path) -> Option<SystemTime>,
    W: FnMut(Duration) -> ControlFlow<()>,
{
    fn wait_for_change(&mut self, files: &[WatchedFile]) -> ControlFlow<()> {
        loop {
            if let Some(changed) = first_changed(files, &mut self.stat) {
                info!(path = %changed.path.display(), "change detected");
                return ControlFlow::Continue(());
            }
            if (self.sleep)(self.interval).is_break() {
                return ControlFlow::Break(());
            }
        }
    }
}

/// Subscribes to the watched files' directories and confirms each event
/// against the captured modification times. Without a working subscription
/// it falls back to rechecking on a timer, so it never stops watching.
pub struct NotifyDetector {
    recheck: Duration,
}

impl NotifyDetector {
    /// `recheck` bounds how long a dropped event can delay detection.
    pub fn new(recheck: Duration) -> Self {
        Self { recheck }
    }

    /// Recheck `files` after every event, or every `recheck` interval when
    /// there is no event source, until one has changed.
    fn wait_on(&self, files: &[WatchedFile], mut events: Option<Receiver<NotifyEvent>>) {
        loop {
            if let Some(changed) = first_changed(files, stat_modified) {
                info!(path = %changed.path.display(), "change detected");
                return;
            }
            let disconnected = match &events {
                Some(rx) => matches!(
                    rx.recv_timeout(self.recheck),
                    Err(RecvTimeoutError::Disconnected)
                ),
                None => {
                    thread::sleep(self.recheck);
                    false
                }
            };
            if disconnected {
                warn!("file watcher stopped; rechecking on a timer");
                events = None;
            }
        }
    }
}

impl ChangeDetector for NotifyDetector {
    fn wait_for_change(&mut self, files: &[WatchedFile]) -> ControlFlow<()> {
        let (tx, rx) = mpsc::channel::<NotifyEvent>();
        let watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        });
        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!(err = %err, "file watcher unavailable; rechecking on a timer");
                self.wait_on(files, None);
                return ControlFlow::Continue(());
            }
        };

        let mut dirs: Vec<&Path> = files
            .iter()
            .filter_map(|f| f.path.parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        dirs.sort();
        dirs.dedup();
        for dir in dirs {
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => debug!(path = %dir.display(), "watching directory"),
                // Missing directories are still covered by the timed recheck.
                Err(err) => debug!(path = %dir.display(), err = %err, "cannot watch directory"),
            }
        }

        self.wait_on(files, Some(rx));
        ControlFlow::Continue(())
    }
}

/// Run the script, then, when `watch` is set, re-run it from a freshly built
/// executor after every detected change.
///
/// Returns the success of the last run. With `watch` off there is exactly one
/// run and the detector is never consulted.
#[instrument(skip_all, fields(path = %invocation.path.display(), watch = watch))]
pub fn watch_loop<E, B, D>(
    env: &ExecutionEnvironment,
    invocation: &ScriptInvocation,
    watch: bool,
    mut build: B,
    detector: &mut D,
) -> bool
where
    E: Executor,
    B: FnMut() -> E,
    D: ChangeDetector + ?Sized,
{
    let mut runs = 0usize;
    loop {
        let mut executor = build();
        let (outcome, watched) = run_script(&mut executor, invocation);
        let success = report_outcome(&outcome, &env.streams);
        runs += 1;
        if !watch {
            return success;
        }

        let notice = format!(
            "Watching for changes to {} files... (Ctrl-C to exit)",
            watched.len()
        );
        if let Err(err) = env.streams.info.write_line(&notice) {
            warn!(err = %err, "failed to announce watch");
        }
        if detector.wait_for_change(&watched).is_break() {
            debug!(runs, "watching stopped");
            return success;
        }
        info!(runs, "re-running script");
    }
}
