//! Error message sanitizing.
//!
//! Lua errors that cross the host boundary carry a `stack traceback:` section
//! and, when raised from a host callback, the callback wrapping. Neither is
//! meant for user-facing logs.

const TRACEBACK_MARKER: &str = "stack traceback:";

/// The user-facing message for a Lua error.
pub(crate) fn sanitize(err: &mlua::Error) -> String {
  let message = match root_cause(err) {
    mlua::Error::RuntimeError(message) | mlua::Error::MemoryError(message) => message.clone(),
    mlua::Error::SyntaxError { message, .. } => message.clone(),
    other => other.to_string(),
  };
  strip_traceback(&message)
}

fn root_cause(err: &mlua::Error) -> &mlua::Error {
  let mut current = err;
  loop {
    current = match current {
      mlua::Error::CallbackError { cause, .. } => cause.as_ref(),
      mlua::Error::WithContext { cause, .. } => cause.as_ref(),
      _ => return current,
    };
  }
}

fn strip_traceback(message: &str) -> String {
  let head = match message.find(TRACEBACK_MARKER) {
    Some(idx) => &message[..idx],
    None => message,
  };
  head.trim().to_string()
}
