//! Test doubles: in-memory streams, a scripted executor, a counting logger,
//! and a fake filesystem clock for the reload loop.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::core::outcome::Outcome;
use crate::executor::Executor;
use crate::io::remote_log::RemoteLogger;
use crate::io::streams::{InputHandle, OutputHandle, Streams};

/// Shared byte buffer usable as an output stream.
#[derive(Clone, Default)]
pub struct MemoryBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streams backed by memory buffers, with the buffers kept for assertions.
pub struct CapturedStreams {
    pub streams: Streams,
    pub output: MemoryBuffer,
    pub error: MemoryBuffer,
    pub info: MemoryBuffer,
}

impl CapturedStreams {
    pub fn new(input: &str) -> Self {
        let output = MemoryBuffer::default();
        let error = MemoryBuffer::default();
        let info = MemoryBuffer::default();
        let streams = Streams {
            input: InputHandle::new(Cursor::new(input.to_string())),
            output: OutputHandle::new(output.clone()),
            error: OutputHandle::new(error.clone()),
            info: OutputHandle::new(info.clone()),
        };
        Self {
            streams,
            output,
            error,
            info,
        }
    }
}

/// What one scripted executor does when asked to run.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub outcome: Outcome,
    pub watched: Vec<(PathBuf, Option<SystemTime>)>,
    pub panic_with: Option<&'static str>,
}

impl ScriptedRun {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            watched: Vec::new(),
            panic_with: None,
        }
    }

    pub fn watching(mut self, path: impl Into<PathBuf>, modified: Option<SystemTime>) -> Self {
        self.watched.push((path.into(), modified));
        self
    }

    pub fn panicking(message: &'static str) -> Self {
        Self {
            panic_with: Some(message),
            ..Self::new(Outcome::Skipped)
        }
    }
}

/// Executor that returns a predetermined outcome and watched list.
pub struct ScriptedExecutor {
    run: ScriptedRun,
    ran: bool,
    pub code: Vec<String>,
    pub scripts: Vec<(PathBuf, Vec<String>, BTreeMap<String, Option<String>>)>,
}

impl ScriptedExecutor {
    pub fn new(run: ScriptedRun) -> Self {
        Self {
            run,
            ran: false,
            code: Vec::new(),
            scripts: Vec::new(),
        }
    }

    fn execute(&mut self) -> Outcome {
        self.ran = true;
        if let Some(message) = self.run.panic_with {
            panic!("{message}");
        }
        self.run.outcome.clone()
    }
}

impl Executor for ScriptedExecutor {
    fn load_code(&mut self, code: &str) -> Outcome {
        self.code.push(code.to_string());
        self.execute()
    }

    fn run_script_file(
        &mut self,
        path: &Path,
        positional: &[String],
        keyword: &BTreeMap<String, Option<String>>,
    ) -> Outcome {
        self.scripts
            .push((path.to_path_buf(), positional.to_vec(), keyword.clone()));
        self.execute()
    }

    fn watched_files(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        if self.ran {
            self.run.watched.clone()
        } else {
            Vec::new()
        }
    }
}

/// Logger that counts what it receives. Clones share the counts.
#[derive(Clone, Default)]
pub struct CountingLogger {
    events: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<usize>>,
}

impl CountingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteLogger for CountingLogger {
    fn apply(&self, event: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.to_string());
    }

    fn close(&self) {
        *self.closes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

/// Deterministic timestamp `secs` after the epoch.
pub fn at(secs: u64) -> Option<SystemTime> {
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

/// In-memory modification times plus a log of every stat and sleep.
#[derive(Clone, Default)]
pub struct FakeFs {
    times: Arc<Mutex<HashMap<PathBuf, SystemTime>>>,
    stats: Arc<Mutex<Vec<PathBuf>>>,
    sleeps: Arc<Mutex<usize>>,
}

impl FakeFs {
    /// Set (or with `None`, remove) a file's modification time.
    pub fn set(&self, path: impl Into<PathBuf>, modified: Option<SystemTime>) {
        let mut times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        let path = path.into();
        match modified {
            Some(t) => times.insert(path, t),
            None => times.remove(&path),
        };
    }

    pub fn stat(&self, path: &Path) -> Option<SystemTime> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        self.times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }

    /// Paths stat'ed since the last call, in order.
    pub fn take_stats(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.stats.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn sleep_count(&self) -> usize {
        *self.sleeps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a sleep, then let `on_sleep` decide whether polling goes on.
    /// It receives the 1-based sleep number.
    pub fn sleep<F>(&self, mut on_sleep: F) -> impl FnMut(Duration) -> ControlFlow<()> + use<F>
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        let sleeps = Arc::clone(&self.sleeps);
        move |_| {
            let n = {
                let mut count = sleeps.lock().unwrap_or_else(PoisonError::into_inner);
                *count += 1;
                *count
            };
            on_sleep(n)
        }
    }
}

/// A temp directory holding `files` (name, contents).
pub fn script_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents).expect("write fixture");
    }
    dir
}
