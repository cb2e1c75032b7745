//! Wires executors and sessions from an environment. Construction only:
//! nothing is parsed or run here.

use crate::core::outcome::Value;
use crate::core::predef::build_predef_layers;
use crate::engine::Engine;
use crate::env::ExecutionEnvironment;
use crate::lifecycle::LoggingHandle;
use crate::session::ReplSession;

/// An interactive session with `extra_bindings` in scope.
///
/// The logging handle is passed through; closing it stays with the caller.
pub fn instantiate_session(
    env: &ExecutionEnvironment,
    extra_bindings: Vec<(String, Value)>,
    logging: LoggingHandle,
) -> ReplSession {
    let mut engine = instantiate_executor(env, true);
    for (name, value) in extra_bindings {
        engine.bind(name, value);
    }
    ReplSession::new(engine, env.streams.clone(), env.banner.clone(), logging)
}

/// A batch executor. `repl_api` injects the introspection binding.
pub fn instantiate_executor(env: &ExecutionEnvironment, repl_api: bool) -> Engine {
    Engine::new(
        build_predef_layers(env),
        env.storage.clone(),
        env.streams.clone(),
        env.wd.clone(),
        repl_api,
    )
}
