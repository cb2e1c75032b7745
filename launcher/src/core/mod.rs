//! Deterministic, pure logic shared by the launcher.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod args;
pub mod outcome;
pub mod predef;
pub mod report;
pub mod watched;
