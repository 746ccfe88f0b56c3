use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropertyError {
  #[error("properties must be a mapping, got {0}")]
  NotAMapping(&'static str),
}

/// Nested property mapping addressed by dotted paths (`a.b.c`).
///
/// Keys are kept sorted so serialization, and therefore fingerprints, never
/// depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTree(Map<String, Value>);

impl PropertyTree {
  pub fn new() -> Self {
    Self(Map::new())
  }

  /// Wrap a JSON value. `null` is the empty tree; anything else but an object
  /// is rejected.
  pub fn from_value(value: Value) -> Result<Self, PropertyError> {
    match value {
      Value::Object(map) => Ok(Self(map)),
      Value::Null => Ok(Self::new()),
      other => Err(PropertyError::NotAMapping(value_kind(&other))),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.0)
  }

  pub fn get(&self, path: &str) -> Option<&Value> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = self.0.get(first)?;
    for segment in segments {
      current = current.as_object()?.get(segment)?;
    }
    Some(current)
  }

  /// Set the value at `path`, creating intermediate mappings and replacing any
  /// scalar that sits where a mapping is needed.
  pub fn set(&mut self, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
      return;
    };

    let mut current = &mut self.0;
    for segment in parents {
      let slot = current
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
      if !slot.is_object() {
        *slot = Value::Object(Map::new());
      }
      let Value::Object(next) = slot else {
        unreachable!("slot was just made an object");
      };
      current = next;
    }
    current.insert(last.to_string(), value);
  }

  pub fn remove(&mut self, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = &mut self.0;
    for segment in parents {
      current = current.get_mut(*segment)?.as_object_mut()?;
    }
    current.remove(*last)
  }

  /// Deep-merge `overrides` into `self`; override leaves win.
  ///
  /// `null` override leaves fall through to whatever is already present.
  pub fn merge(&mut self, overrides: &PropertyTree) {
    merge_maps(&mut self.0, &overrides.0);
  }

  /// Dotted paths of every leaf, sorted.
  pub fn leaf_paths(&self) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaves(&self.0, "", &mut paths);
    paths
  }
}

impl From<Map<String, Value>> for PropertyTree {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

impl fmt::Display for PropertyTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", Value::Object(self.0.clone()))
  }
}

fn merge_maps(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
  for (key, value) in overrides {
    match (base.get_mut(key), value) {
      (_, Value::Null) => {}
      (Some(Value::Object(existing)), Value::Object(nested)) => merge_maps(existing, nested),
      _ => {
        base.insert(key.clone(), value.clone());
      }
    }
  }
}

fn collect_leaves(map: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
  for (key, value) in map {
    let path = if prefix.is_empty() {
      key.clone()
    } else {
      format!("{prefix}.{key}")
    };
    match value {
      Value::Object(nested) if !nested.is_empty() => collect_leaves(nested, &path, out),
      _ => out.push(path),
    }
  }
}

fn value_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a sequence",
    Value::Object(_) => "a mapping",
  }
}
