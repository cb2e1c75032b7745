//! Scoped ownership of the optional event logger.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::env::ExecutionEnvironment;
use crate::io::remote_log::RemoteLogger;

/// What sessions receive: a shared logger, or `None` when logging is off.
pub type LoggingHandle = Option<Arc<dyn RemoteLogger>>;

/// Owns the logger for one invocation and closes it exactly once on drop,
/// including during unwinding.
pub struct LoggingScope {
    logger: LoggingHandle,
}

impl LoggingScope {
    /// Create the logger (when enabled) and emit `boot`.
    ///
    /// A logger that cannot be created is reported and treated as disabled.
    pub fn open<F>(env: &ExecutionEnvironment, factory: F) -> Self
    where
        F: FnOnce(&ExecutionEnvironment) -> Result<Arc<dyn RemoteLogger>>,
    {
        if !env.remote_logging {
            debug!("remote logging disabled");
            return Self::disabled();
        }
        let logger = match factory(env) {
            Ok(logger) => logger,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "remote logging unavailable");
                return Self::disabled();
            }
        };
        logger.apply("boot");
        Self {
            logger: Some(logger),
        }
    }

    pub fn disabled() -> Self {
        Self { logger: None }
    }

    /// A handle for sessions; it does not own the close.
    pub fn handle(&self) -> LoggingHandle {
        self.logger.clone()
    }

    /// Emit an event; a no-op when disabled.
    pub fn apply(&self, event: &str) {
        if let Some(logger) = &self.logger {
            logger.apply(event);
        }
    }
}

impl Drop for LoggingScope {
    fn drop(&mut self) {
        if let Some(logger) = self.logger.take() {
            logger.close();
            debug!("remote logger closed");
        }
    }
}
