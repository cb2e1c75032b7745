//! The immutable configuration of one invocation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::io::config::LauncherConfig;
use crate::io::storage::{InMemoryStorage, StorageBackend};
use crate::io::streams::Streams;

/// Everything a session or executor is built from.
///
/// One instance per invocation. Variants (e.g. the interactive storage
/// flavor) are copies with fields overridden, never mutations.
#[derive(Clone)]
pub struct ExecutionEnvironment {
    /// User predef code.
    pub predef: String,
    /// Include the builtin default predef.
    pub default_predef: bool,
    pub storage: Arc<dyn StorageBackend>,
    /// Relative script and import paths resolve against this directory.
    pub wd: PathBuf,
    pub banner: Option<String>,
    pub streams: Streams,
    pub verbose: bool,
    pub remote_logging: bool,
}

impl ExecutionEnvironment {
    pub fn from_config(
        cfg: &LauncherConfig,
        storage: Arc<dyn StorageBackend>,
        wd: PathBuf,
        streams: Streams,
    ) -> Self {
        Self {
            predef: cfg.predef.clone(),
            default_predef: cfg.default_predef,
            storage,
            wd,
            banner: cfg.banner.clone(),
            streams,
            verbose: cfg.verbose,
            remote_logging: cfg.remote_logging,
        }
    }

    /// Defaults from [`LauncherConfig::default`] with in-memory storage and
    /// the current directory (falling back to `.`).
    pub fn in_memory(streams: Streams) -> Self {
        let wd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_config(
            &LauncherConfig::default(),
            Arc::new(InMemoryStorage::default()),
            wd,
            streams,
        )
    }

    /// Copy of this environment backed by another storage.
    pub fn with_storage(&self, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            ..self.clone()
        }
    }
}
