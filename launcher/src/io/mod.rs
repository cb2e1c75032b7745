//! I/O collaborators: configuration, injected streams, storage, event log.

pub mod config;
pub mod remote_log;
pub mod storage;
pub mod streams;
