//! Script argument parsing: positional values and `--flag [value]` pairs.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Result, bail};

/// Arguments passed through to a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptArgs {
    pub positional: Vec<String>,
    /// Flag name → payload; `None` when the flag was given without one.
    pub keyword: BTreeMap<String, Option<String>>,
}

/// Split script arguments.
///
/// `--name value` and `--name=value` carry a payload; `--name` followed by
/// another flag (or nothing) does not. A bare `--` makes every later token
/// positional. Flag names must be unique once `-` and `_` are treated as
/// the same character, since both spellings bind to one name.
pub fn parse_script_args(tokens: &[String]) -> Result<ScriptArgs> {
    let mut args = ScriptArgs::default();
    let mut bound = HashSet::new();
    let mut iter = tokens.iter().peekable();
    let mut only_positional = false;

    while let Some(token) = iter.next() {
        if only_positional {
            args.positional.push(token.clone());
            continue;
        }
        if token == "--" {
            only_positional = true;
            continue;
        }
        let Some(flag) = token.strip_prefix("--") else {
            args.positional.push(token.clone());
            continue;
        };

        let (name, payload) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => {
                let takes_next = iter.peek().is_some_and(|next| !next.starts_with("--"));
                let payload = if takes_next { iter.next().cloned() } else { None };
                (flag, payload)
            }
        };
        if name.is_empty() {
            bail!("invalid script argument '{token}': missing flag name");
        }
        if !bound.insert(name.replace('-', "_")) {
            bail!("duplicate script argument '--{name}'");
        }
        args.keyword.insert(name.to_string(), payload);
    }

    Ok(args)
}
