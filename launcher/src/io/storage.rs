//! Storage backends: predef files and the session id.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Predef file loaded for interactive sessions.
pub const REPL_PREDEF_FILE: &str = "predef.sc";
/// Predef file loaded for scripts and `--code`.
pub const SCRIPT_PREDEF_FILE: &str = "predefScript.sc";
const SESSION_ID_FILE: &str = "session_id";

/// Persistence collaborator. Operations are synchronous and single-process.
pub trait StorageBackend: Send + Sync {
    /// Predef code and the file it came from. A missing file yields `("", None)`.
    fn load_predef(&self) -> (String, Option<PathBuf>);

    /// Opaque identifier, used only for the event log.
    fn session_id(&self) -> String;
}

/// Storage rooted at a home directory (`$HOME/.launcher` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderStorage {
    dir: PathBuf,
    repl: bool,
    predef_file: Option<PathBuf>,
}

impl FolderStorage {
    /// Script-flavored storage: loads `predefScript.sc`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            repl: false,
            predef_file: None,
        }
    }

    /// Copy of this storage that loads the interactive predef instead.
    pub fn for_repl(&self) -> Self {
        Self {
            repl: true,
            ..self.clone()
        }
    }

    /// Load predef code from `path` instead of the home directory file.
    pub fn with_predef_file(self, path: Option<PathBuf>) -> Self {
        Self {
            predef_file: path,
            ..self
        }
    }

    pub fn predef_path(&self) -> PathBuf {
        if let Some(path) = &self.predef_file {
            return path.clone();
        }
        let name = if self.repl {
            REPL_PREDEF_FILE
        } else {
            SCRIPT_PREDEF_FILE
        };
        self.dir.join(name)
    }
}

impl StorageBackend for FolderStorage {
    fn load_predef(&self) -> (String, Option<PathBuf>) {
        let path = self.predef_path();
        match fs::read_to_string(&path) {
            Ok(code) => {
                debug!(path = %path.display(), "loaded predef");
                (code, Some(path))
            }
            Err(err) => {
                debug!(path = %path.display(), err = %err, "no predef loaded");
                (String::new(), None)
            }
        }
    }

    fn session_id(&self) -> String {
        let path = self.dir.join(SESSION_ID_FILE);
        if let Ok(existing) = fs::read_to_string(&path) {
            let id = existing.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
        let id = fresh_session_id();
        let written = fs::create_dir_all(&self.dir).and_then(|()| fs::write(&path, &id));
        if let Err(err) = written {
            warn!(path = %path.display(), err = %err, "could not persist session id");
        }
        id
    }
}

/// Storage that never touches the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryStorage {
    pub predef: String,
    pub session_id: String,
}

impl StorageBackend for InMemoryStorage {
    fn load_predef(&self) -> (String, Option<PathBuf>) {
        (self.predef.clone(), None)
    }

    fn session_id(&self) -> String {
        self.session_id.clone()
    }
}

fn fresh_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}-{:x}", nanos, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_predef_file_is_empty_without_source() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage =
            FolderStorage::new(temp.path()).with_predef_file(Some(temp.path().join("nope.sc")));
        assert_eq!(storage.load_predef(), (String::new(), None));
    }

    #[test]
    fn repl_and_script_flavors_read_different_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(REPL_PREDEF_FILE), "r = 1").expect("write");
        fs::write(temp.path().join(SCRIPT_PREDEF_FILE), "s = 1").expect("write");
        let scripts = FolderStorage::new(temp.path());
        let repl = scripts.for_repl();

        assert_eq!(scripts.load_predef().0, "s = 1");
        let (code, source) = repl.load_predef();
        assert_eq!(code, "r = 1");
        assert_eq!(source, Some(temp.path().join(REPL_PREDEF_FILE)));
    }

    #[test]
    fn session_id_is_persisted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FolderStorage::new(temp.path().join("home"));
        let first = storage.session_id();
        assert!(!first.is_empty());
        assert_eq!(storage.session_id(), first);
    }
}
