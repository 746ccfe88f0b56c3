//! Template placeholder parsing and substitution.
//!
//! # Syntax
//!
//! - `$${p:dotted.path}` - the resolved property at `dotted.path`
//!
//! A single `$` passes through unchanged, so shell variables such as `$HOME`
//! need no escaping in job scripts. `$$${` produces a literal `$${`.
//!
//! ```
//! use microdeploy_lib::render::template::{parse, Segment};
//!
//! let segments = parse("IP=\"$${p:network.ip}\" # $HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("IP=\"".to_string()),
//!     Segment::Property("network.ip".to_string()),
//!     Segment::Literal("\" # $HOME".to_string()),
//! ]);
//! ```

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::properties::PropertyTree;

const PROPERTY_KIND: &str = "p";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  /// Dotted property path.
  Property(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unresolved property '{0}'")]
  UnresolvedProperty(String),
}

/// Split template text into literals and property references.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    if !matches!(chars.peek(), Some((_, '$'))) {
      literal.push('$');
      continue;
    }
    chars.next();

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        if matches!(chars.peek(), Some((_, '{'))) {
          chars.next();
          literal.push_str("$${");
        } else {
          literal.push_str("$$$");
        }
      }
      Some((_, '{')) => {
        chars.next();
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut content = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            closed = true;
            break;
          }
          content.push(c);
        }
        if !closed {
          return Err(TemplateError::Unclosed(pos));
        }

        segments.push(Segment::Property(parse_reference(&content)?));
      }
      _ => literal.push_str("$$"),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }
  Ok(segments)
}

fn parse_reference(content: &str) -> Result<String, TemplateError> {
  let Some((kind, path)) = content.split_once(':') else {
    return Err(TemplateError::Malformed(content.to_string()));
  };
  if kind != PROPERTY_KIND {
    return Err(TemplateError::UnknownType(kind.to_string()));
  }

  let path = path.trim();
  if path.is_empty() || path.split('.').any(str::is_empty) {
    return Err(TemplateError::Malformed(content.to_string()));
  }
  Ok(path.to_string())
}

/// Every property path referenced by `segments`.
pub fn referenced_properties(segments: &[Segment]) -> BTreeSet<String> {
  segments
    .iter()
    .filter_map(|s| match s {
      Segment::Property(path) => Some(path.clone()),
      Segment::Literal(_) => None,
    })
    .collect()
}

/// Render `segments` against `properties`.
///
/// An absent or null property is an error.
pub fn substitute_segments(segments: &[Segment], properties: &PropertyTree) -> Result<String, TemplateError> {
  let mut out = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Property(path) => {
        let value = lookup(properties, path)?;
        out.push_str(&render_value(value));
      }
    }
  }
  Ok(out)
}

pub(crate) fn lookup<'a>(properties: &'a PropertyTree, path: &str) -> Result<&'a Value, TemplateError> {
  match properties.get(path) {
    None | Some(Value::Null) => Err(TemplateError::UnresolvedProperty(path.to_string())),
    Some(value) => Ok(value),
  }
}

fn render_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}
