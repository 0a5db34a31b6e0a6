//! Lua implementation of [`Sandbox`].
//!
//! Every run gets a fresh Lua 5.4 state with only the pure standard libraries
//! (`string`, `table`, `math`, `utf8`) and a trimmed base library. The tree is
//! converted into a Lua table, handed to the entry point, and converted back
//! once the entry point returns.
//!
//! The deadline is enforced by an instruction-count hook installed by the
//! host. Once the deadline has passed the hook raises on every check, and the
//! script has no `pcall`, `xpcall` or `coroutine` to catch it with. Library
//! functions that run outside the hook are bounded by [`guard`](crate::guard).
//!
//! Each run executes on its own worker thread. If the worker has not reported
//! back shortly after the deadline, the caller gets a timeout and the worker
//! is abandoned; the hook stops it the next time it reaches bytecode.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use cumulus_template::Template;
use mlua::{Function, HookTriggers, Lua, LuaOptions, LuaSerdeExt, StdLib, Value, Variadic, VmState};
use tracing::{debug, error, info};

use crate::config::SandboxConfig;
use crate::diagnostic::sanitize;
use crate::error::SandboxError;
use crate::guard;
use crate::sandbox::Sandbox;

/// How long past the deadline the caller waits for a worker to report.
const WATCHDOG_GRACE: Duration = Duration::from_millis(250);

/// Chunk name used in error locations (`override.lua:3: ...`).
const CHUNK_NAME: &str = "=override.lua";

/// Base-library globals removed from the script environment.
const REMOVED_GLOBALS: &[&str] = &[
  "collectgarbage",
  "coroutine",
  "debug",
  "dofile",
  "io",
  "load",
  "loadfile",
  "os",
  "package",
  "pcall",
  "require",
  "xpcall",
];

pub struct LuaSandbox {
  config: SandboxConfig,
}

impl LuaSandbox {
  pub fn new(config: SandboxConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SandboxConfig {
    &self.config
  }

  /// Create a fresh, capability-restricted Lua state.
  fn create_state(&self) -> Result<Lua, SandboxError> {
    let libs = StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8;
    let lua = Lua::new_with(libs, LuaOptions::new()).map_err(setup_error)?;

    if let Some(limit) = self.config.memory_limit {
      lua.set_memory_limit(limit).map_err(setup_error)?;
    }

    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
      globals.set(*name, Value::Nil).map_err(setup_error)?;
    }

    let print = lua
      .create_function(|lua, args: Variadic<Value>| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for arg in args.iter().cloned() {
          let part: mlua::String = tostring.call(arg)?;
          parts.push(part.to_string_lossy());
        }
        info!(target: "cumulus_override::script", "{}", parts.join("\t"));
        Ok(())
      })
      .map_err(setup_error)?;
    globals.set("print", print).map_err(setup_error)?;

    guard::install(&lua).map_err(setup_error)?;

    Ok(lua)
  }

  /// Install the deadline hook. The returned flag is set once it fires.
  fn arm_deadline(&self, lua: &Lua, timeout: Duration) -> Arc<AtomicBool> {
    let deadline = Instant::now() + timeout;
    let timed_out = Arc::new(AtomicBool::new(false));
    let flag = timed_out.clone();

    lua.set_hook(
      HookTriggers::new().every_nth_instruction(self.config.hook_interval.max(1)),
      move |_lua, _debug| {
        if Instant::now() >= deadline {
          flag.store(true, Ordering::SeqCst);
          return Err(mlua::Error::runtime("execution timed out"));
        }
        Ok(VmState::Continue)
      },
    );

    timed_out
  }

  fn invoke(
    &self,
    lua: &Lua,
    source: &str,
    entry: &str,
    target: &Template,
  ) -> Result<Template, Failure> {
    let chunk = lua
      .load(source)
      .set_name(CHUNK_NAME)
      .into_function()
      .map_err(Failure::Compile)?;

    // The chunk may return a module table, or just define a global.
    let exports: Value = chunk.call(()).map_err(Failure::Lua)?;

    let entry_fn = match find_entry(lua, &exports, entry).map_err(Failure::Lua)? {
      Some(f) => f,
      None => return Err(Failure::MissingEntryPoint),
    };

    let tree = lua.to_value(target).map_err(Failure::Lua)?;
    let returned: Value = entry_fn.call(tree.clone()).map_err(Failure::Lua)?;

    // A returned table replaces the tree; anything else keeps the mutated one.
    let result = match returned {
      Value::Table(_) => returned,
      _ => tree,
    };

    guard::check_tree(&result).map_err(Failure::InvalidTree)?;

    lua
      .from_value::<Template>(result)
      .map_err(Failure::InvalidTree)
  }

  /// One complete run on the current thread.
  fn run_here(
    &self,
    source: &str,
    entry: &str,
    target: &Template,
    timeout: Duration,
  ) -> Result<Template, SandboxError> {
    let lua = self.create_state()?;
    let timed_out = self.arm_deadline(&lua, timeout);

    match self.invoke(&lua, source, entry, target) {
      Ok(updated) => Ok(updated),
      Err(_) if timed_out.load(Ordering::SeqCst) => Err(SandboxError::Timeout {
        timeout_ms: timeout.as_millis() as u64,
      }),
      Err(failure) => Err(failure.into_sandbox_error(entry)),
    }
  }
}

impl Sandbox for LuaSandbox {
  fn compile(&self, source: &str) -> Result<(), SandboxError> {
    let lua = self.create_state()?;
    lua
      .load(source)
      .set_name(CHUNK_NAME)
      .into_function()
      .map(|_| ())
      .map_err(|e| SandboxError::Compile {
        message: sanitize(&e),
      })
  }

  fn run(
    &self,
    source: &str,
    entry: &str,
    target: &mut Template,
    timeout: Duration,
  ) -> Result<(), SandboxError> {
    let worker = LuaSandbox::new(self.config.clone());
    let source = source.to_string();
    let entry = entry.to_string();
    let tree = target.clone();
    let (sender, receiver) = mpsc::sync_channel(1);
    let span = tracing::Span::current();

    thread::Builder::new()
      .name("cumulus-override".to_string())
      .spawn(move || {
        let _entered = span.enter();
        // The receiver is gone once the watchdog has given up.
        let _ = sender.send(worker.run_here(&source, &entry, &tree, timeout));
      })
      .map_err(|e| SandboxError::Setup {
        message: format!("failed to start override worker: {e}"),
      })?;

    match receiver.recv_timeout(timeout + WATCHDOG_GRACE) {
      Ok(Ok(updated)) => {
        *target = updated;
        Ok(())
      }
      Ok(Err(e)) => Err(e),
      Err(RecvTimeoutError::Timeout) => {
        error!(
          timeout_ms = timeout.as_millis() as u64,
          "override worker missed its deadline, abandoning it"
        );
        Err(SandboxError::Timeout {
          timeout_ms: timeout.as_millis() as u64,
        })
      }
      Err(RecvTimeoutError::Disconnected) => Err(SandboxError::Runtime {
        message: "override worker stopped without a result".to_string(),
      }),
    }
  }
}

/// Look up the entry point on the chunk's return value, then on globals.
fn find_entry(lua: &Lua, exports: &Value, entry: &str) -> mlua::Result<Option<Function>> {
  if let Value::Table(module) = exports {
    let value: Value = module.get(entry)?;
    if let Value::Function(f) = value {
      return Ok(Some(f));
    }
  }

  let value: Value = lua.globals().get(entry)?;
  match value {
    Value::Function(f) => Ok(Some(f)),
    _ => Ok(None),
  }
}

/// Internal failure of one run, before classification.
enum Failure {
  Compile(mlua::Error),
  Lua(mlua::Error),
  MissingEntryPoint,
  InvalidTree(mlua::Error),
}

impl Failure {
  fn into_sandbox_error(self, entry: &str) -> SandboxError {
    match self {
      Failure::Compile(e) => {
        debug!(error = %e, "override compile failed");
        SandboxError::Compile {
          message: sanitize(&e),
        }
      }
      Failure::Lua(e) => {
        debug!(error = %e, "override raised");
        SandboxError::Runtime {
          message: sanitize(&e),
        }
      }
      Failure::MissingEntryPoint => SandboxError::MissingEntryPoint {
        entry: entry.to_string(),
      },
      Failure::InvalidTree(e) => SandboxError::InvalidTree {
        message: sanitize(&e),
      },
    }
  }
}

fn setup_error(e: mlua::Error) -> SandboxError {
  SandboxError::Setup {
    message: e.to_string(),
  }
}
