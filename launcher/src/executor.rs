//! Executor abstraction for batch code execution.
//!
//! The [`Executor`] trait decouples orchestration from the code compiler and
//! runtime. The bundled [`crate::engine::Engine`] implements it; tests use
//! scripted executors that return predetermined outcomes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::outcome::Outcome;

/// Abstraction over code execution backends.
pub trait Executor {
    /// Execute a code snippet.
    fn load_code(&mut self, code: &str) -> Outcome;

    /// Execute a script file with its arguments bound into scope.
    fn run_script_file(
        &mut self,
        path: &Path,
        positional: &[String],
        keyword: &BTreeMap<String, Option<String>>,
    ) -> Outcome;

    /// Every file consulted so far, in read order, with the modification time
    /// observed when it was read (`None` if it was absent).
    fn watched_files(&self) -> Vec<(PathBuf, Option<SystemTime>)>;
}
