//! Injected I/O handles shared by sessions, executors, and the reporter.
//!
//! Handles are created once at startup and cloned cheaply; every clone writes
//! to (or reads from) the same underlying stream.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared writable stream.
#[derive(Clone)]
pub struct OutputHandle {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputHandle {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Write `text` followed by a newline and flush.
    pub fn write_line(&self, text: &str) -> io::Result<()> {
        let mut w = self.lock();
        w.write_all(text.as_bytes())?;
        w.write_all(b"\n")?;
        w.flush()
    }

    /// Write `text` as-is and flush (prompts).
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut w = self.lock();
        w.write_all(text.as_bytes())?;
        w.flush()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock().flush()
    }

    // A panic caught mid-write must not make the stream unusable.
    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared line-oriented input stream.
#[derive(Clone)]
pub struct InputHandle {
    inner: Arc<Mutex<Box<dyn BufRead + Send>>>,
}

impl InputHandle {
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        let n = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_line(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = buf.trim_end_matches(['\n', '\r']).len();
        buf.truncate(trimmed);
        Ok(Some(buf))
    }
}

/// The four streams an environment injects.
#[derive(Clone)]
pub struct Streams {
    pub input: InputHandle,
    /// Results and `print` output.
    pub output: OutputHandle,
    /// Failures and traces.
    pub error: OutputHandle,
    /// Banners, prompts, and watch notices.
    pub info: OutputHandle,
}

impl Streams {
    pub fn stdio() -> Self {
        Self {
            input: InputHandle::stdin(),
            output: OutputHandle::stdout(),
            error: OutputHandle::stderr(),
            info: OutputHandle::stderr(),
        }
    }
}
