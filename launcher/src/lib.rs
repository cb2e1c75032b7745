//! Execution orchestration for scripts, one-off code, and interactive sessions.
//!
//! A configuration ([`env::ExecutionEnvironment`]) turns into one of three runs:
//! an interactive session, a one-shot code execution, or a script run that can
//! re-run itself whenever a file it consulted changes. The crate keeps the same
//! split as the rest of the workspace:
//!
//! - **[`core`]**: Pure, deterministic logic (predef layering, the outcome
//!   taxonomy, reporting, watched-file bookkeeping). No I/O.
//! - **[`io`]**: Side-effecting collaborators (config, streams, storage, the
//!   event log).
//!
//! Orchestration modules ([`builder`], [`script`], [`reporter`], [`watch`],
//! [`launch`]) wire the collaborators together for the CLI.

pub mod builder;
pub mod core;
pub mod engine;
pub mod env;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod lifecycle;
pub mod logging;
pub mod reporter;
pub mod script;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
