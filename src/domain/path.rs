//! Reference path resolution
//!
//! Paths are dotted key sequences. A leading `.` is relative to the current
//! node, each extra leading `.` climbs one parent, and a path without a
//! leading dot starts at the root. Once a segment hits a value that is not a
//! mapping, the remaining segments are attribute lookups on that value.

use tracing::trace;

use crate::domain::arena::NodeId;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tree::Configuration;
use crate::domain::value::Value;

/// Where a reference path ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A key of a mapping node (which may or may not exist yet)
    Slot { node: NodeId, key: String },
    /// A value reached through attribute access
    Value(Value),
    /// The walk stopped at a placeholder that must be resolved first
    Unresolved { node: NodeId, key: String },
}

impl Configuration {
    pub fn locate(&self, from: NodeId, path: &str) -> DomainResult<Target> {
        let invalid = |reason: &str| DomainError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if path.is_empty() || path == "." {
            return Err(invalid("empty path"));
        }

        let mut node = from;
        let mut current = if path.starts_with('.') {
            path.to_string()
        } else {
            node = self.root_of(from)?;
            format!(".{}", path)
        };

        loop {
            trace!(path = %current, "locating");
            if let Some(tail) = current.strip_prefix("..") {
                node = self
                    .parent(node)?
                    .ok_or_else(|| invalid("climbs above the root"))?;
                current = format!(".{}", tail);
                continue;
            }
            let tail = &current[1..];
            match tail.split_once('.') {
                Some((head, rest)) => {
                    if head.is_empty() {
                        return Err(invalid("empty segment"));
                    }
                    match self.get(node, head)? {
                        Value::Node(child) => {
                            node = child;
                            current = format!(".{}", rest);
                        }
                        Value::Placeholder(_) => {
                            return Ok(Target::Unresolved {
                                node,
                                key: head.to_string(),
                            })
                        }
                        value => return walk_attributes(&value, rest).map(Target::Value),
                    }
                }
                None if tail.is_empty() => return Err(invalid("empty segment")),
                None => {
                    return Ok(Target::Slot {
                        node,
                        key: tail.to_string(),
                    })
                }
            }
        }
    }

    /// Read the value a path points to.
    pub fn read_ref(&self, from: NodeId, path: &str) -> DomainResult<Value> {
        match self.locate(from, path)? {
            Target::Slot { node, key } => self.get(node, &key),
            Target::Value(value) => Ok(value),
            Target::Unresolved { key, .. } => Err(DomainError::UnresolvedPath {
                path: path.to_string(),
                key,
            }),
        }
    }

    /// Read (`value == None`) or write through a reference path.
    ///
    /// Writes go to the addressed slot and return what was stored.
    pub fn by_ref(&mut self, from: NodeId, path: &str, value: Option<Value>) -> DomainResult<Value> {
        let Some(value) = value else {
            return self.read_ref(from, path);
        };
        match self.locate(from, path)? {
            Target::Slot { node, key } => {
                self.set(node, &key, value)?;
                Ok(self.raw(node, &key)?.clone())
            }
            Target::Value(_) => Err(DomainError::InvalidPath {
                path: path.to_string(),
                reason: "cannot assign through an attribute".to_string(),
            }),
            Target::Unresolved { key, .. } => Err(DomainError::UnresolvedPath {
                path: path.to_string(),
                key,
            }),
        }
    }
}

/// Follow dotted attribute names on a value that is not a tree node.
pub fn walk_attributes(value: &Value, path: &str) -> DomainResult<Value> {
    let mut current = value.clone();
    for segment in path.split('.') {
        let next = match &current {
            Value::Object(obj) => obj.attr(segment),
            Value::Map(map) => map.get(segment).cloned(),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            _ => None,
        };
        current = next.ok_or_else(|| DomainError::MissingAttribute {
            attribute: segment.to_string(),
            target: current.type_label(),
        })?;
    }
    Ok(current)
}
