//! Launcher configuration stored under `<home>/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Launcher configuration (TOML).
///
/// Missing fields default to the values documented on each field. Command-line
/// flags override whatever is loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherConfig {
    /// Run the builtin default predef before the user's predef. Default `true`.
    pub default_predef: bool,

    /// User predef code, run after the default predef. Default empty.
    pub predef: String,

    /// Text printed when an interactive session starts. Default none.
    pub banner: Option<String>,

    /// Write session events to `<home>/events.jsonl`. Default `true`.
    pub remote_logging: bool,

    /// Raise the tracing default from `warn` to `debug`. Default `false`.
    pub verbose: bool,

    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    /// How often watched files are re-checked, in milliseconds. Default 300.
    pub poll_interval_ms: u64,

    /// Change detection backend. Default `poll`.
    pub detector: DetectorKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Stat every watched file each interval.
    Poll,
    /// Filesystem notifications, re-checked each interval.
    Notify,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            detector: DetectorKind::Poll,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            default_predef: true,
            predef: String::new(),
            banner: None,
            remote_logging: true,
            verbose: false,
            watch: WatchConfig::default(),
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.watch.poll_interval_ms == 0 {
            return Err(anyhow!("watch.poll_interval_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LauncherConfig::default()`.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        let cfg = LauncherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LauncherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LauncherConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
