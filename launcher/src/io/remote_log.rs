//! Optional session event log.
//!
//! Events are appended as JSON lines to a file under the storage home, from
//! where a separate shipper may forward them. The record layout is internal.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Event log file name under the storage home.
pub const EVENT_LOG_FILE: &str = "events.jsonl";

/// Event sink collaborator.
pub trait RemoteLogger: Send + Sync {
    fn apply(&self, event: &str);
    fn close(&self);
}

#[derive(Serialize)]
struct EventRecord<'a> {
    session_id: &'a str,
    event: &'a str,
    at_ms: u128,
}

/// Appends events to a JSON-lines file.
pub struct EventLogger {
    session_id: String,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl EventLogger {
    pub fn open(path: &Path, session_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create event log dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open event log {}", path.display()))?;
        debug!(path = %path.display(), session_id, "event log opened");
        Ok(Self {
            session_id: session_id.to_string(),
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    fn write_event(writer: &mut BufWriter<File>, record: &EventRecord<'_>) -> Result<()> {
        serde_json::to_writer(&mut *writer, record).context("serialize event")?;
        writer.write_all(b"\n").context("write event")?;
        Ok(())
    }
}

impl RemoteLogger for EventLogger {
    fn apply(&self, event: &str) {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Events after close are dropped.
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let record = EventRecord {
            session_id: &self.session_id,
            event,
            at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
        };
        if let Err(err) = Self::write_event(writer, &record) {
            warn!(err = %err, event, "failed to write event");
        }
    }

    fn close(&self) {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut writer) = guard.take()
            && let Err(err) = writer.flush()
        {
            warn!(err = %err, "failed to flush event log");
        }
    }
}
