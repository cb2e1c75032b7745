//! Script and REPL launcher.
//!
//! Runs a script file (optionally re-running it whenever a file it read
//! changes), a one-off code snippet, or an interactive session. Predef code,
//! the event log, and watch settings come from `<home>/config.toml`, with
//! command-line flags taking precedence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::debug;

use launcher::core::args::parse_script_args;
use launcher::env::ExecutionEnvironment;
use launcher::io::config::{DetectorKind, LauncherConfig, WatchConfig, load_config, write_config};
use launcher::io::remote_log::{EVENT_LOG_FILE, EventLogger, RemoteLogger};
use launcher::io::storage::FolderStorage;
use launcher::io::streams::Streams;
use launcher::launch::{self, ScriptOptions};
use launcher::script::ScriptInvocation;
use launcher::watch::{ChangeDetector, NotifyDetector, SystemPoller};
use launcher::{exit_codes, logging};

const CONFIG_FILE: &str = "config.toml";
const HOME_DIR: &str = ".launcher";

#[derive(Parser, Debug)]
#[command(
    name = "launcher",
    version,
    about = "Run scripts, one-off code, or an interactive session"
)]
struct Cli {
    /// Run this code and exit.
    #[arg(short, long, conflicts_with = "script")]
    code: Option<String>,

    /// Predef code run before anything else (after the default predef).
    #[arg(short = 'p', long = "predef-code", value_name = "CODE")]
    predef_code: Option<String>,

    /// Load the storage predef from this file instead of the home directory.
    /// A missing file counts as an empty predef.
    #[arg(long, value_name = "FILE")]
    predef: Option<PathBuf>,

    /// Do not run the builtin default predef.
    #[arg(long)]
    no_default_predef: bool,

    /// Re-run SCRIPT whenever a file it read changes.
    #[arg(short, long, requires = "script")]
    watch: bool,

    /// Storage directory. Default `$HOME/.launcher`.
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Text printed when an interactive session starts.
    #[arg(long)]
    banner: Option<String>,

    /// Do not write the session event log.
    #[arg(long)]
    no_remote_logging: bool,

    /// Expose the introspection binding to scripts and code.
    #[arg(long)]
    repl_api: bool,

    /// Config file. Default `<home>/config.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save the effective configuration (config file plus flags) to the
    /// config path and exit.
    #[arg(long)]
    write_config: bool,

    /// Debug-level tracing on stderr (RUST_LOG still wins).
    #[arg(short, long)]
    verbose: bool,

    /// Script path followed by its arguments. Everything after the path is
    /// passed to the script.
    #[arg(
        id = "script",
        value_name = "SCRIPT [ARGS]",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    script: Vec<String>,
}

impl Cli {
    /// Flags given on the command line replace config values.
    fn apply_overrides(&self, cfg: &mut LauncherConfig) {
        if let Some(code) = &self.predef_code {
            cfg.predef = code.clone();
        }
        if self.no_default_predef {
            cfg.default_predef = false;
        }
        if let Some(banner) = &self.banner {
            cfg.banner = Some(banner.clone());
        }
        if self.no_remote_logging {
            cfg.remote_logging = false;
        }
        if self.verbose {
            cfg.verbose = true;
        }
    }
}

fn main() {
    let success = match run() {
        Ok(success) => success,
        Err(err) => {
            eprintln!("{:#}", err);
            false
        }
    };
    std::process::exit(exit_codes::from_success(success));
}

fn run() -> Result<bool> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version print to stdout and count as success.
        Err(err) => {
            err.print().context("print usage")?;
            return Ok(!err.use_stderr());
        }
    };

    let (script, script_tokens) = match cli.script.split_first() {
        Some((path, rest)) => (Some(PathBuf::from(path)), rest),
        None => (None, &[][..]),
    };
    let script_args = match parse_script_args(script_tokens) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{:#}", err);
            eprintln!("{}", Cli::command().render_usage());
            return Ok(false);
        }
    };

    let home = resolve_home(cli.home.as_deref())?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| home.join(CONFIG_FILE));
    let mut cfg = load_config(&config_path)?;
    cli.apply_overrides(&mut cfg);
    logging::init(cfg.verbose);
    debug!(home = %home.display(), config = %config_path.display(), "configuration loaded");
    if cli.write_config {
        write_config(&config_path, &cfg)?;
        println!("{}", config_path.display());
        return Ok(true);
    }

    let storage = FolderStorage::new(&home).with_predef_file(cli.predef.clone());
    let wd = std::env::current_dir().context("resolve working directory")?;
    let env = ExecutionEnvironment::from_config(
        &cfg,
        Arc::new(storage.clone()),
        wd,
        Streams::stdio(),
    );
    let event_log = home.join(EVENT_LOG_FILE);
    let factory = |env: &ExecutionEnvironment| -> Result<Arc<dyn RemoteLogger>> {
        let logger = EventLogger::open(&event_log, &env.storage.session_id())?;
        Ok(Arc::new(logger))
    };

    let success = match (cli.code.as_deref(), script) {
        (Some(code), _) => launch::run_code(&env, code, cli.repl_api, factory),
        (None, Some(path)) => {
            let invocation = ScriptInvocation {
                path,
                positional: script_args.positional,
                keyword: script_args.keyword,
            };
            let options = ScriptOptions {
                watch: cli.watch,
                repl_api: cli.repl_api,
            };
            let mut detector = detector_for(&cfg.watch);
            launch::run_script(&env, &invocation, options, factory, detector.as_mut())
        }
        (None, None) => {
            let env = env.with_storage(Arc::new(storage.for_repl()));
            launch::run_repl(&env, Vec::new(), factory)
        }
    };
    Ok(success)
}

fn resolve_home(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(home) = flag {
        return Ok(home.to_path_buf());
    }
    let user_home = std::env::var_os("HOME").context("HOME is not set; pass --home")?;
    Ok(PathBuf::from(user_home).join(HOME_DIR))
}

fn detector_for(watch: &WatchConfig) -> Box<dyn ChangeDetector> {
    match watch.detector {
        DetectorKind::Poll => Box::new(SystemPoller::system(watch.poll_interval())),
        DetectorKind::Notify => Box::new(NotifyDetector::new(watch.poll_interval())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("launcher").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_after_the_script_belong_to_the_script() {
        let cli = parse(&["-w", "s.sc", "--n", "3", "-v", "pos"]);
        assert!(cli.watch);
        assert!(!cli.verbose);
        assert_eq!(cli.script, vec!["s.sc", "--n", "3", "-v", "pos"]);
    }

    #[test]
    fn watch_requires_a_script() {
        let err = Cli::try_parse_from(["launcher", "--watch"]).expect_err("should fail");
        assert!(err.use_stderr());
    }

    #[test]
    fn help_is_not_an_error() {
        let err = Cli::try_parse_from(["launcher", "--help"]).expect_err("help");
        assert!(!err.use_stderr());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--no-default-predef",
            "-p",
            "x = 1",
            "--no-remote-logging",
            "--banner",
            "hi",
        ]);
        let mut cfg = LauncherConfig::default();
        cli.apply_overrides(&mut cfg);
        assert!(!cfg.default_predef);
        assert_eq!(cfg.predef, "x = 1");
        assert!(!cfg.remote_logging);
        assert_eq!(cfg.banner.as_deref(), Some("hi"));
        assert!(!cfg.verbose);
    }

    #[test]
    fn explicit_home_wins() {
        let home = resolve_home(Some(Path::new("/tmp/h"))).expect("home");
        assert_eq!(home, PathBuf::from("/tmp/h"));
    }
}
