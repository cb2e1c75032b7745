//! The closed result taxonomy for executed code.
//!
//! Every execution yields exactly one [`Outcome`]. Failures are data, not
//! control flow: executors return them and the reporter maps them to output.

use std::any::Any;
use std::fmt;

/// Function name of the synthetic frame that marks where a script or code
/// body was entered. Frames below it belong to the host, not the user.
pub const ENTRY_MARKER: &str = "<script-entry>";

/// Result of executing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Explicit, message-carrying failure (syntax errors, `fail`, missing script).
    Failure {
        message: String,
        cause: Option<Exception>,
    },
    /// An unplanned raise with its stack trace.
    ExceptionRaised(Exception),
    /// Execution completed; `Value::NoValue` when nothing was produced.
    Success(Value),
    /// Execution explicitly declined to do anything.
    Skipped,
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            cause: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Skipped)
    }
}

/// Values produced by executed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Sentinel for "no value"; never printed.
    NoValue,
    Int(i64),
    Str(String),
}

impl Value {
    /// Render for `print`: strings are written raw.
    pub fn display(&self) -> String {
        match self {
            Self::NoValue => String::new(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s.clone(),
        }
    }

    /// Render for result echoing: strings are quoted and escaped.
    pub fn pretty(&self) -> String {
        match self {
            Self::NoValue => String::new(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => format!("{s:?}"),
        }
    }
}

/// A raised exception with its frames, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub kind: String,
    pub message: String,
    pub frames: Vec<Frame>,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frames,
        }
    }

    /// Convert a caught panic payload. The resulting trace has no entry
    /// marker, so it is always reported in full.
    pub fn from_panic(payload: Box<dyn Any + Send>, origin: &str) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "executor panicked".to_string()
        };
        Self::new("Panic", message, vec![Frame::host(origin)])
    }

    /// Frames at or above the first entry marker, or every frame when the
    /// trace never reached a script body.
    pub fn user_frames(&self) -> &[Frame] {
        match self.frames.iter().position(Frame::is_entry_marker) {
            Some(idx) => &self.frames[..=idx],
            None => &self.frames,
        }
    }

    /// Render the header plus the given frames, one `at` line each.
    pub fn render(&self, frames: &[Frame]) -> String {
        let mut buf = format!("{}: {}", self.kind, self.message);
        for frame in frames {
            buf.push_str("\n  at ");
            buf.push_str(&frame.to_string());
        }
        buf
    }
}

/// One stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<usize>,
}

impl Frame {
    pub fn user(function: impl Into<String>, file: impl Into<String>, line: usize) -> Self {
        Self {
            function: function.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// The synthetic frame placed between a body's frames and the host's.
    pub fn entry(file: impl Into<String>) -> Self {
        Self {
            function: ENTRY_MARKER.to_string(),
            file: Some(file.into()),
            line: None,
        }
    }

    pub fn host(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
        }
    }

    pub fn is_entry_marker(&self) -> bool {
        self.function == ENTRY_MARKER
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({}:{})", self.function, file, line),
            (Some(file), None) => write!(f, "{}({})", self.function, file),
            _ => f.write_str(&self.function),
        }
    }
}
