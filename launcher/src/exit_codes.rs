//! Stable exit codes for the launcher CLI.

/// The run (or help/version output) succeeded.
pub const OK: i32 = 0;
/// The run failed, arguments were invalid, or setup errored.
pub const FAILURE: i32 = 1;

/// Map a run's success flag to its process exit code.
pub fn from_success(success: bool) -> i32 {
    if success { OK } else { FAILURE }
}
