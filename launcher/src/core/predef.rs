//! Predef layering: code that runs before any session or script code.

use crate::env::ExecutionEnvironment;

/// Bindings every session gets unless the default predef is disabled.
pub const DEFAULT_PREDEF: &str = concat!(
    "# launcher default predef\n",
    "launcher_version = \"",
    env!("CARGO_PKG_VERSION"),
    "\"\n",
    "true = 1\n",
    "false = 0\n",
);

pub const DEFAULT_PREDEF_NAME: &str = "DefaultPredef";
pub const USER_PREDEF_NAME: &str = "ArgsPredef";

/// One named layer of predef code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredefLayer {
    pub name: String,
    pub code: String,
    /// `false` means the layer is recompiled on every run.
    pub cacheable: bool,
}

/// The builtin text verbatim when enabled, empty text otherwise.
pub fn compose_default_predef(enabled: bool, builtin: &str) -> String {
    if enabled {
        builtin.to_string()
    } else {
        String::new()
    }
}

/// Default predef first, then the user's predef. The order is fixed.
pub fn build_predef_layers(env: &ExecutionEnvironment) -> Vec<PredefLayer> {
    vec![
        PredefLayer {
            name: DEFAULT_PREDEF_NAME.to_string(),
            code: compose_default_predef(env.default_predef, DEFAULT_PREDEF),
            cacheable: false,
        },
        PredefLayer {
            name: USER_PREDEF_NAME.to_string(),
            code: env.predef.clone(),
            cacheable: false,
        },
    ]
}
