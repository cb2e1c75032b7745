//! Watched-file bookkeeping for the reload loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file a run consulted, with the modification time seen when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    /// `None` when the file was absent at read time.
    pub modified: Option<SystemTime>,
}

/// Collapse consulted files to first-seen order, dropping later duplicates.
pub fn collapse_watched<I>(consulted: I) -> Vec<WatchedFile>
where
    I: IntoIterator<Item = (PathBuf, Option<SystemTime>)>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (path, modified) in consulted {
        if seen.insert(path.clone()) {
            out.push(WatchedFile { path, modified });
        }
    }
    out
}

/// Same time, or absent both then and now.
pub fn is_unchanged(captured: Option<SystemTime>, current: Option<SystemTime>) -> bool {
    captured == current
}

/// First watched file whose current state differs from the captured one.
pub fn first_changed<'a, S>(watched: &'a [WatchedFile], mut stat: S) -> Option<&'a WatchedFile>
where
    S: FnMut(&Path) -> Option<SystemTime>,
{
    watched
        .iter()
        .find(|file| !is_unchanged(file.modified, stat(&file.path)))
}
