//! Guards around library functions that run without the instruction hook.
//!
//! The deadline hook only fires while Lua bytecode executes. Library functions
//! written in C (pattern matching, `string.rep`, the `table` shifts) and
//! `__gc` finalizers run with no hook at all, so each of them gets a wrapper
//! that bounds its work before the original is called.
//!
//! [`check_tree`] bounds the tree handed back by a script before it is
//! deserialized on the host stack.

use mlua::{Function, Lua, MultiValue, Table, Value};

/// Upper bound on the estimated backtracking steps of one pattern call.
pub(crate) const PATTERN_WORK_LIMIT: f64 = 5e7;

/// Largest `n` accepted by `string.rep`.
pub(crate) const MAX_REPEAT_COUNT: f64 = (1u64 << 24) as f64;

/// Largest element span accepted by `table.move`.
pub(crate) const MAX_MOVE_SPAN: f64 = (1u64 << 24) as f64;

/// Deepest table nesting accepted in a returned tree.
pub(crate) const MAX_TREE_DEPTH: usize = 128;

/// Most values (keys included) visited in a returned tree.
pub(crate) const MAX_TREE_VALUES: usize = 1 << 20;

struct PatternFunction {
  name: &'static str,
  honors_anchor: bool,
  plain_arg: Option<usize>,
}

const PATTERN_FUNCTIONS: &[PatternFunction] = &[
  PatternFunction {
    name: "find",
    honors_anchor: true,
    plain_arg: Some(3),
  },
  PatternFunction {
    name: "match",
    honors_anchor: true,
    plain_arg: None,
  },
  PatternFunction {
    name: "gmatch",
    honors_anchor: false,
    plain_arg: None,
  },
  PatternFunction {
    name: "gsub",
    honors_anchor: true,
    plain_arg: None,
  },
];

/// `table` functions whose loop bound comes from `#t`.
const LENGTH_DRIVEN: &[&str] = &["concat", "insert", "remove", "sort", "unpack"];

/// Install every guard into `lua`'s globals.
pub(crate) fn install(lua: &Lua) -> mlua::Result<()> {
  let globals = lua.globals();

  let string: Table = globals.get("string")?;
  for function in PATTERN_FUNCTIONS {
    guard_pattern(lua, &string, function)?;
  }
  guard_repeat(lua, &string)?;

  let table: Table = globals.get("table")?;
  for name in LENGTH_DRIVEN {
    guard_length(lua, &table, *name)?;
  }
  guard_move(lua, &table)?;

  guard_setmetatable(lua, &globals)
}

fn guard_pattern(lua: &Lua, library: &Table, function: &'static PatternFunction) -> mlua::Result<()> {
  let original: Function = library.get(function.name)?;
  let guarded = lua.create_function(move |lua, args: MultiValue| {
    check_pattern(lua, function, &args)?;
    original.call::<MultiValue>(args)
  })?;
  library.set(function.name, guarded)
}

fn check_pattern(lua: &Lua, function: &PatternFunction, args: &MultiValue) -> mlua::Result<()> {
  let mut args = args.iter().cloned();
  let subject = args.next().unwrap_or(Value::Nil);
  let pattern = args.next().unwrap_or(Value::Nil);

  if let Some(index) = function.plain_arg {
    let plain = args.nth(index - 2).unwrap_or(Value::Nil);
    if is_truthy(&plain) {
      return Ok(());
    }
  }

  // Anything that does not coerce is left for the original to reject.
  let (Some(subject), Some(pattern)) = (lua.coerce_string(subject)?, lua.coerce_string(pattern)?)
  else {
    return Ok(());
  };

  let subject_len = subject.as_bytes().len();
  let pattern = pattern.as_bytes().to_vec();
  let shape = PatternShape::of(&pattern);
  if shape.cost(subject_len, function.honors_anchor) > PATTERN_WORK_LIMIT {
    return Err(mlua::Error::runtime(format!(
      "string.{}: pattern '{}' is too expensive for a {}-byte subject",
      function.name,
      String::from_utf8_lossy(&pattern),
      subject_len
    )));
  }
  Ok(())
}

fn guard_repeat(lua: &Lua, library: &Table) -> mlua::Result<()> {
  let original: Function = library.get("rep")?;
  let guarded = lua.create_function(move |lua, args: MultiValue| {
    let count = args.iter().nth(1).cloned().unwrap_or(Value::Nil);
    if let Some(count) = lua.coerce_number(count)? {
      if count > MAX_REPEAT_COUNT {
        return Err(mlua::Error::runtime(format!(
          "string.rep: count {count} exceeds {MAX_REPEAT_COUNT}"
        )));
      }
    }
    original.call::<MultiValue>(args)
  })?;
  library.set("rep", guarded)
}

fn guard_length(lua: &Lua, library: &Table, name: &'static str) -> mlua::Result<()> {
  let original: Function = library.get(name)?;
  let guarded = lua.create_function(move |_, args: MultiValue| {
    if let Some(Value::Table(table)) = args.iter().next() {
      if let Some(metatable) = table.metatable() {
        let len: Value = metatable.raw_get("__len")?;
        if !len.is_nil() {
          return Err(mlua::Error::runtime(format!(
            "table.{name}: tables with a __len metamethod are not supported"
          )));
        }
      }
    }
    original.call::<MultiValue>(args)
  })?;
  library.set(name, guarded)
}

fn guard_move(lua: &Lua, library: &Table) -> mlua::Result<()> {
  let original: Function = library.get("move")?;
  let guarded = lua.create_function(move |lua, args: MultiValue| {
    let mut bounds = args.iter().skip(1).cloned();
    let first = lua.coerce_number(bounds.next().unwrap_or(Value::Nil))?;
    let last = lua.coerce_number(bounds.next().unwrap_or(Value::Nil))?;
    if let (Some(first), Some(last)) = (first, last) {
      if last - first >= MAX_MOVE_SPAN {
        return Err(mlua::Error::runtime(format!(
          "table.move: span {first}..{last} exceeds {MAX_MOVE_SPAN} elements"
        )));
      }
    }
    original.call::<MultiValue>(args)
  })?;
  library.set("move", guarded)
}

fn guard_setmetatable(lua: &Lua, globals: &Table) -> mlua::Result<()> {
  let original: Function = globals.get("setmetatable")?;
  let guarded = lua.create_function(move |_, args: MultiValue| {
    if let Some(Value::Table(metatable)) = args.iter().nth(1) {
      let gc: Value = metatable.raw_get("__gc")?;
      if !gc.is_nil() {
        return Err(mlua::Error::runtime(
          "setmetatable: __gc finalizers are not supported",
        ));
      }
    }
    original.call::<MultiValue>(args)
  })?;
  globals.set("setmetatable", guarded)
}

fn is_truthy(value: &Value) -> bool {
  !matches!(value, Value::Nil | Value::Boolean(false))
}

/// The parts of a Lua pattern that drive backtracking.
#[derive(Debug, Default, PartialEq, Eq)]
struct PatternShape {
  anchored: bool,
  /// `*`, `+`, `-` and `%b` items.
  repeats: u32,
  /// `?` items.
  optionals: u32,
}

impl PatternShape {
  fn of(pattern: &[u8]) -> Self {
    let mut shape = PatternShape::default();
    let mut i = 0;
    if pattern.first() == Some(&b'^') {
      shape.anchored = true;
      i = 1;
    }

    while i < pattern.len() {
      match pattern[i] {
        b'%' if pattern.get(i + 1) == Some(&b'b') => {
          shape.repeats += 1;
          i += 4;
        }
        b'%' => i += 2,
        b'[' => i = skip_set(pattern, i),
        b'*' | b'+' | b'-' => {
          shape.repeats += 1;
          i += 1;
        }
        b'?' => {
          shape.optionals += 1;
          i += 1;
        }
        _ => i += 1,
      }
    }
    shape
  }

  /// Worst-case steps to run this pattern over `subject_len` bytes.
  fn cost(&self, subject_len: usize, honors_anchor: bool) -> f64 {
    let positions = subject_len as f64 + 1.0;
    let starts = if self.anchored && honors_anchor {
      1.0
    } else {
      positions
    };
    let repeats = self.repeats.min(64) as i32;
    let optionals = self.optionals.min(64) as i32;
    starts * positions.powi(repeats) * 2f64.powi(optionals)
  }
}

/// Index just past the `]` closing the set that opens at `start`.
fn skip_set(pattern: &[u8], start: usize) -> usize {
  let mut i = start + 1;
  if pattern.get(i) == Some(&b'^') {
    i += 1;
  }
  // A `]` right after the opening is a member, not the end.
  if pattern.get(i) == Some(&b']') {
    i += 1;
  }
  while i < pattern.len() {
    match pattern[i] {
      b'%' => i += 2,
      b']' => return i + 1,
      _ => i += 1,
    }
  }
  i
}

/// Reject trees too deep or too large to deserialize safely.
pub(crate) fn check_tree(value: &Value) -> mlua::Result<()> {
  let mut visited = 0;
  walk(value, 0, &mut visited)
}

fn walk(value: &Value, depth: usize, visited: &mut usize) -> mlua::Result<()> {
  *visited += 1;
  if *visited > MAX_TREE_VALUES {
    return Err(mlua::Error::runtime(format!(
      "tree holds more than {MAX_TREE_VALUES} values"
    )));
  }

  let Value::Table(table) = value else {
    return Ok(());
  };
  if depth >= MAX_TREE_DEPTH {
    return Err(mlua::Error::runtime(format!(
      "tree is nested deeper than {MAX_TREE_DEPTH} levels"
    )));
  }

  table.for_each(|key: Value, value: Value| {
    walk(&key, depth + 1, visited)?;
    walk(&value, depth + 1, visited)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_shape_counts_repeats_outside_sets() {
    let shape = PatternShape::of(b"^(.-)%-[a-z-]*x?$");
    assert_eq!(
      shape,
      PatternShape {
        anchored: true,
        repeats: 2,
        optionals: 1,
      }
    );
  }

  #[test]
  fn test_shape_treats_balance_as_repeat() {
    assert_eq!(PatternShape::of(b"%b()").repeats, 1);
    assert_eq!(PatternShape::of(b"[]%]]+").repeats, 1);
  }

  #[test]
  fn test_cost_of_literal_pattern_is_linear() {
    let shape = PatternShape::of(b"Admin");
    assert_eq!(shape.cost(99, true), 100.0);
  }

  #[test]
  fn test_nested_lazy_repeats_exceed_limit() {
    let shape = PatternShape::of(b".-.-.-.-b");
    assert!(shape.cost(3000, true) > PATTERN_WORK_LIMIT);
  }

  #[test]
  fn test_anchor_is_ignored_when_not_honored() {
    let shape = PatternShape::of(b"^a*");
    assert_eq!(shape.cost(9, true), 10.0);
    assert_eq!(shape.cost(9, false), 100.0);
  }

  #[test]
  fn test_check_tree_depth() {
    let lua = Lua::new();
    let shallow: Value = lua.load("return { a = { b = { 1, 2 } } }").eval().unwrap();
    assert!(check_tree(&shallow).is_ok());

    let deep: Value = lua
      .load("local x = {} for i = 1, 200 do x = { x } end return x")
      .eval()
      .unwrap();
    let err = check_tree(&deep).unwrap_err();
    assert!(err.to_string().contains("nested deeper than 128"));
  }

  #[test]
  fn test_check_tree_counts_shared_subtrees() {
    let lua = Lua::new();
    let shared: Value = lua
      .load("local x = {} for i = 1, 40 do x = { x, x } end return x")
      .eval()
      .unwrap();
    let err = check_tree(&shared).unwrap_err();
    assert!(err.to_string().contains("more than"));
  }
}
