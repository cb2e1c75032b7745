//! Reference executor: a small line-oriented statement language.
//!
//! Each line is one statement: `name = expr`, `print expr`, `import "path"`,
//! `raise expr`, `fail expr`, `skip`, or a bare expression. Expressions cover
//! integers, strings, names, `+ - * /`, unary minus, and parentheses. A body
//! evaluates to the value of its last statement.
//!
//! Every file the engine reads is recorded with the modification time observed
//! at read time, so the reload loop can watch exactly what a run consulted.

mod parse;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, instrument};

use crate::core::outcome::{Exception, Frame, Outcome, Value};
use crate::core::predef::PredefLayer;
use crate::executor::Executor;
use crate::io::storage::StorageBackend;
use crate::io::streams::Streams;
use parse::{BinOp, Expr, Stmt, parse_line};

/// Name of the introspection binding injected when the REPL API is enabled.
/// It evaluates to the currently bound names.
pub const REPL_API_BINDING: &str = "repl_bindings";

const TOP_LEVEL: &str = "<top-level>";
const MAX_IMPORT_DEPTH: usize = 32;

const SCRIPT_HOST: &[&str] = &[
    "launcher::engine::Engine::run_script_file",
    "launcher::script::run_script",
];
const CODE_HOST: &[&str] = &["launcher::engine::Engine::load_code", "launcher::script::run_code"];
const PREDEF_HOST: &[&str] = &["launcher::engine::Engine::load_predef"];

/// Why a body stopped early.
enum Halt {
    Raise(Exception),
    Fail(String),
    Skip,
    Syntax(String),
}

/// In-process executor with a persistent scope.
pub struct Engine {
    layers: Vec<PredefLayer>,
    storage: Arc<dyn StorageBackend>,
    streams: Streams,
    wd: PathBuf,
    repl_api: bool,
    scope: BTreeMap<String, Value>,
    predef_loaded: bool,
    consulted: Vec<(PathBuf, Option<SystemTime>)>,
}

impl Engine {
    /// Construction only; predef layers run on first use.
    pub fn new(
        layers: Vec<PredefLayer>,
        storage: Arc<dyn StorageBackend>,
        streams: Streams,
        wd: PathBuf,
        repl_api: bool,
    ) -> Self {
        Self {
            layers,
            storage,
            streams,
            wd,
            repl_api,
            scope: BTreeMap::new(),
            predef_loaded: false,
            consulted: Vec::new(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.scope.insert(name.into(), value);
    }

    /// Bound names in sorted order, including the introspection binding.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scope.keys().cloned().collect();
        if self.repl_api && !self.scope.contains_key(REPL_API_BINDING) {
            names.push(REPL_API_BINDING.to_string());
            names.sort();
        }
        names
    }

    /// Run predef layers, then the storage predef, once per engine.
    /// Returns the outcome that stopped them, if any did.
    fn load_predef(&mut self) -> Option<Outcome> {
        if self.predef_loaded {
            return None;
        }
        self.predef_loaded = true;

        for layer in self.layers.clone() {
            if layer.code.trim().is_empty() {
                continue;
            }
            debug!(layer = %layer.name, cacheable = layer.cacheable, "running predef layer");
            let label = format!("<{}>", layer.name);
            let wd = self.wd.clone();
            let outcome = self.run_body(&layer.code, &label, &wd, false, PREDEF_HOST);
            if !outcome.is_success() {
                return Some(outcome);
            }
        }

        let (code, source) = self.storage.load_predef();
        if let Some(path) = &source {
            self.consulted.push((path.clone(), modified(path)));
        }
        if code.trim().is_empty() {
            return None;
        }
        let label = source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<predef>".to_string());
        let base = source
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.wd.clone());
        let outcome = self.run_body(&code, &label, &base, false, PREDEF_HOST);
        (!outcome.is_success()).then_some(outcome)
    }

    fn run_body(
        &mut self,
        source: &str,
        label: &str,
        base: &Path,
        entry: bool,
        host: &[&str],
    ) -> Outcome {
        let mut stack = Vec::new();
        match self.exec(source, label, base, &mut stack, 0) {
            Ok(value) => Outcome::Success(value),
            Err(Halt::Skip) => Outcome::Skipped,
            Err(Halt::Fail(message)) => Outcome::failure(message),
            Err(Halt::Syntax(message)) => Outcome::failure(format!("Compilation failed: {message}")),
            Err(Halt::Raise(mut ex)) => {
                if entry {
                    ex.frames.push(Frame::entry(label));
                }
                ex.frames.extend(host.iter().map(|h| Frame::host(*h)));
                Outcome::ExceptionRaised(ex)
            }
        }
    }

    /// Parse the whole body first so a syntax error runs nothing.
    fn exec(
        &mut self,
        source: &str,
        label: &str,
        base: &Path,
        stack: &mut Vec<Frame>,
        depth: usize,
    ) -> Result<Value, Halt> {
        let mut program = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(stmt)) => program.push((idx + 1, stmt)),
                Ok(None) => {}
                Err(msg) => return Err(Halt::Syntax(format!("{label}:{}: {msg}", idx + 1))),
            }
        }

        let mut last = Value::NoValue;
        for (line, stmt) in program {
            stack.push(Frame::user(TOP_LEVEL, label, line));
            let result = self.exec_stmt(stmt, base, stack, depth);
            stack.pop();
            last = result?;
        }
        Ok(last)
    }

    fn exec_stmt(
        &mut self,
        stmt: Stmt,
        base: &Path,
        stack: &mut Vec<Frame>,
        depth: usize,
    ) -> Result<Value, Halt> {
        match stmt {
            Stmt::Assign(name, expr) => {
                let value = self.eval(&expr, stack)?;
                self.scope.insert(name, value);
                Ok(Value::NoValue)
            }
            Stmt::Print(expr) => {
                let value = self.eval(&expr, stack)?;
                self.streams
                    .output
                    .write_line(&value.display())
                    .map_err(|err| raise(stack, "IOError", err.to_string()))?;
                Ok(Value::NoValue)
            }
            Stmt::Expr(expr) => self.eval(&expr, stack),
            Stmt::Raise(expr) => {
                let value = self.eval(&expr, stack)?;
                Err(raise(stack, "ScriptError", value.display()))
            }
            Stmt::Fail(expr) => Err(Halt::Fail(self.eval(&expr, stack)?.display())),
            Stmt::Skip => Err(Halt::Skip),
            Stmt::Import(rel) => {
                if depth >= MAX_IMPORT_DEPTH {
                    return Err(raise(stack, "ImportError", format!("import depth exceeded at {rel}")));
                }
                let path = base.join(&rel);
                let source = self
                    .read_source(&path)
                    .map_err(|_| raise(stack, "ImportError", format!("file not found: {rel}")))?;
                let label = path.display().to_string();
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
                self.exec(&source, &label, &dir, stack, depth + 1)?;
                Ok(Value::NoValue)
            }
        }
    }

    fn eval(&self, expr: &Expr, stack: &[Frame]) -> Result<Value, Halt> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.lookup(name).ok_or_else(|| {
                raise(stack, "NameError", format!("not found: value {name}"))
            }),
            Expr::Neg(inner) => match self.eval(inner, stack)? {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| raise(stack, "ArithmeticError", "integer overflow")),
                other => Err(type_error(stack, "-", &other)),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, stack)?;
                let rhs = self.eval(rhs, stack)?;
                binary(*op, lhs, rhs, stack)
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.scope.get(name) {
            return Some(value.clone());
        }
        if self.repl_api && name == REPL_API_BINDING {
            return Some(Value::Str(self.names().join(", ")));
        }
        None
    }

    /// Read a file, recording it as consulted whether or not it exists.
    fn read_source(&mut self, path: &Path) -> std::io::Result<String> {
        self.consulted.push((path.to_path_buf(), modified(path)));
        fs::read_to_string(path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.wd.join(path)
        }
    }
}

impl Executor for Engine {
    #[instrument(skip_all, fields(len = code.len()))]
    fn load_code(&mut self, code: &str) -> Outcome {
        if let Some(outcome) = self.load_predef() {
            return outcome;
        }
        let wd = self.wd.clone();
        self.run_body(code, "<code>", &wd, true, CODE_HOST)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn run_script_file(
        &mut self,
        path: &Path,
        positional: &[String],
        keyword: &BTreeMap<String, Option<String>>,
    ) -> Outcome {
        if let Some(outcome) = self.load_predef() {
            return outcome;
        }
        let resolved = self.resolve(path);
        let Ok(source) = self.read_source(&resolved) else {
            return Outcome::failure(format!("Script file not found: {}", resolved.display()));
        };

        self.bind("argc", Value::Int(positional.len() as i64));
        for (idx, value) in positional.iter().enumerate() {
            self.bind(format!("arg{idx}"), Value::Str(value.clone()));
        }
        for (name, payload) in keyword {
            // Flags without a payload bind as `1`.
            let value = payload
                .as_ref()
                .map_or(Value::Int(1), |v| Value::Str(v.clone()));
            self.bind(name.replace('-', "_"), value);
        }

        let base = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.wd.clone());
        let label = resolved.display().to_string();
        debug!(script = %label, "running script body");
        self.run_body(&source, &label, &base, true, SCRIPT_HOST)
    }

    fn watched_files(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.consulted.clone()
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Frames innermost first, taken from the statement stack at raise time.
fn raise(stack: &[Frame], kind: &str, message: impl Into<String>) -> Halt {
    let frames = stack.iter().rev().cloned().collect();
    Halt::Raise(Exception::new(kind, message, frames))
}

fn type_error(stack: &[Frame], op: &str, value: &Value) -> Halt {
    raise(
        stack,
        "TypeError",
        format!("unsupported operand for '{op}': {}", value.pretty()),
    )
}

fn binary(op: BinOp, lhs: Value, rhs: Value, stack: &[Frame]) -> Result<Value, Halt> {
    let overflow = || raise(stack, "ArithmeticError", "integer overflow");
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        (BinOp::Add, Value::Str(a), b @ (Value::Str(_) | Value::Int(_))) => {
            Ok(Value::Str(a + &b.display()))
        }
        (BinOp::Add, a @ Value::Int(_), Value::Str(b)) => Ok(Value::Str(a.display() + &b)),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        (BinOp::Div, Value::Int(_), Value::Int(0)) => Err(raise(stack, "ArithmeticError", "/ by zero")),
        (BinOp::Div, Value::Int(a), Value::Int(b)) => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
        (op, a, b) => {
            let symbol = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
            };
            let culprit = if matches!(a, Value::Int(_)) { b } else { a };
            Err(type_error(stack, symbol, &culprit))
        }
    }
}
