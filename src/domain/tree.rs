//! Configuration trees
//!
//! A [`Configuration`] owns an arena of mapping nodes. Nested mappings are
//! children in the arena; every child knows its parent by index, so reference
//! paths can climb (`..key`) and jump to the root (`key`) without the tree
//! holding owning back-pointers.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use itertools::Itertools;
use tracing::instrument;

use crate::domain::arena::{Backing, ConfigArena, ConfigNode, Interpolation, NodeData, NodeId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::interpolate::interpolate;
use crate::domain::placeholder::Extends;
use crate::domain::value::{Mapping, Value};

#[derive(Debug)]
pub struct Configuration {
    arena: ConfigArena,
    root: NodeId,
}

impl Configuration {
    pub fn new(mapping: Mapping, context: Interpolation, pwd: impl Into<PathBuf>) -> Self {
        Self::with_backing(Some(Backing::Mapping(mapping)), context, pwd.into())
    }

    /// Configuration without a backing; every access fails until configured.
    pub fn unconfigured(context: Interpolation, pwd: impl Into<PathBuf>) -> Self {
        Self::with_backing(None, context, pwd.into())
    }

    /// Whole-document inheritance, resolved when the tree is configured.
    pub fn pending(extends: Extends, context: Interpolation, pwd: impl Into<PathBuf>) -> Self {
        Self::with_backing(Some(Backing::Pending(extends)), context, pwd.into())
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self::new(mapping, Interpolation::new(), ".")
    }

    fn with_backing(backing: Option<Backing>, context: Interpolation, pwd: PathBuf) -> Self {
        let mut arena = ConfigArena::new();
        let root = arena.insert_node(NodeData::new(pwd, Rc::new(context)), None);
        let mut cfg = Self { arena, root };
        cfg.install(root, backing);
        cfg
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { config: self, id }
    }

    pub fn root_ref(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    fn entry(&self, id: NodeId) -> DomainResult<&ConfigNode> {
        self.arena.get_node(id).ok_or(DomainError::StaleNode)
    }

    fn entry_mut(&mut self, id: NodeId) -> DomainResult<&mut ConfigNode> {
        self.arena.get_node_mut(id).ok_or(DomainError::StaleNode)
    }

    fn backing(&self, id: NodeId) -> DomainResult<&Backing> {
        self.entry(id)?
            .data
            .entries
            .as_ref()
            .ok_or(DomainError::Unconfigured)
    }

    // ---------------------------------------------------------------
    // Node metadata
    // ---------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> DomainResult<Option<NodeId>> {
        Ok(self.entry(id)?.parent)
    }

    pub fn root_of(&self, id: NodeId) -> DomainResult<NodeId> {
        self.entry(id)?;
        Ok(self.arena.root_of(id))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.arena.ancestors(id)
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.arena.ancestors(id).any(|a| a == ancestor)
    }

    pub fn pwd(&self, id: NodeId) -> DomainResult<&Path> {
        Ok(&self.entry(id)?.data.pwd)
    }

    pub fn context(&self, id: NodeId) -> DomainResult<Rc<Interpolation>> {
        Ok(Rc::clone(&self.entry(id)?.data.context))
    }

    pub fn origin(&self, id: NodeId) -> DomainResult<Option<&Path>> {
        Ok(self.entry(id)?.data.origin.as_deref())
    }

    pub fn set_origin(&mut self, id: NodeId, origin: PathBuf) -> DomainResult<()> {
        self.entry_mut(id)?.data.origin = Some(origin);
        Ok(())
    }

    /// Replace the interpolation context of every node.
    pub fn share_context(&mut self, context: Rc<Interpolation>) {
        for id in self.arena.ids() {
            if let Some(node) = self.arena.get_node_mut(id) {
                node.data.context = Rc::clone(&context);
            }
        }
    }

    pub fn is_configured(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.entry(id)?.data.entries.is_some())
    }

    /// Inheritance still waiting to be resolved at `id`, if any.
    pub fn pending_extends(&self, id: NodeId) -> DomainResult<Option<&Extends>> {
        match &self.entry(id)?.data.entries {
            Some(Backing::Pending(extends)) => Ok(Some(extends)),
            _ => Ok(None),
        }
    }

    /// Dotted location of `key` below `id`, for diagnostics.
    pub fn path_of(&self, id: NodeId, key: &str) -> String {
        let mut segments = vec![key.to_string()];
        let mut current = id;
        while let Some(parent) = self.arena.get_node(current).and_then(|n| n.parent) {
            let name = match self.arena.get_node(parent).and_then(|n| n.data.entries.as_ref()) {
                Some(Backing::Mapping(map)) => map
                    .iter()
                    .find(|(_, v)| **v == Value::Node(current))
                    .map(|(k, _)| k.clone()),
                _ => None,
            };
            segments.push(name.unwrap_or_else(|| "?".to_string()));
            current = parent;
        }
        segments.reverse();
        format!(".{}", segments.join("."))
    }

    // ---------------------------------------------------------------
    // Mapping operations
    // ---------------------------------------------------------------

    /// Stored value without interpolation.
    pub fn raw(&self, id: NodeId, key: &str) -> DomainResult<&Value> {
        let found = match self.backing(id)? {
            Backing::Mapping(map) => map.get(key),
            Backing::Pending(extends) => extends.get(key),
        };
        found.ok_or_else(|| DomainError::MissingKey(key.to_string()))
    }

    /// Value at `key`; strings come back interpolated.
    pub fn get(&self, id: NodeId, key: &str) -> DomainResult<Value> {
        match self.raw(id, key)? {
            Value::String(s) => Ok(Value::String(self.interpolate(id, s)?)),
            other => Ok(other.clone()),
        }
    }

    pub fn interpolate(&self, id: NodeId, template: &str) -> DomainResult<String> {
        let data = &self.entry(id)?.data;
        interpolate(template, |key| {
            if key == "pwd" {
                Some(data.pwd.display().to_string())
            } else {
                data.context.get(key).cloned()
            }
        })
    }

    /// Store `value` at `key`.
    ///
    /// A detached mapping becomes a child node; an attached node is moved
    /// under `id`.
    #[instrument(level = "trace", skip(self, value))]
    pub fn set(&mut self, id: NodeId, key: &str, value: Value) -> DomainResult<()> {
        self.materialize(id)?;
        let value = match value {
            Value::Node(child) => {
                if self.is_ancestor_or_self(child, id) {
                    return Err(DomainError::CyclicAssignment(self.path_of(id, key)));
                }
                self.entry_mut(child)?.parent = Some(id);
                Value::Node(child)
            }
            other => self.attach(id, other),
        };
        self.mapping_mut(id)?.insert(key.to_string(), value);
        Ok(())
    }

    /// Store a node handle without taking ownership of the node.
    pub(crate) fn alias(&mut self, id: NodeId, key: &str, target: NodeId) -> DomainResult<()> {
        self.entry(target)?;
        self.materialize(id)?;
        self.mapping_mut(id)?
            .insert(key.to_string(), Value::Node(target));
        Ok(())
    }

    pub fn delete(&mut self, id: NodeId, key: &str) -> DomainResult<Value> {
        self.materialize(id)?;
        self.mapping_mut(id)?
            .shift_remove(key)
            .ok_or_else(|| DomainError::MissingKey(key.to_string()))
    }

    pub fn contains(&self, id: NodeId, key: &str) -> DomainResult<bool> {
        Ok(match self.backing(id)? {
            Backing::Mapping(map) => map.contains_key(key),
            Backing::Pending(extends) => extends.contains(key),
        })
    }

    pub fn keys(&self, id: NodeId) -> DomainResult<Vec<String>> {
        Ok(match self.backing(id)? {
            Backing::Mapping(map) => map.keys().cloned().collect(),
            Backing::Pending(extends) => extends.keys().cloned().collect(),
        })
    }

    pub fn len(&self, id: NodeId) -> DomainResult<usize> {
        Ok(match self.backing(id)? {
            Backing::Mapping(map) => map.len(),
            Backing::Pending(extends) => extends.len(),
        })
    }

    pub fn is_empty(&self, id: NodeId) -> DomainResult<bool> {
        Ok(self.len(id)? == 0)
    }

    /// Convenience read of a reference path starting at the root.
    pub fn lookup(&self, path: &str) -> DomainResult<Value> {
        self.read_ref(self.root, path)
    }

    // ---------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------

    /// Give `id` a new backing, attaching nested mappings as children.
    pub fn replace_backing(&mut self, id: NodeId, mapping: Mapping) -> DomainResult<()> {
        self.entry(id)?;
        self.install(id, Some(Backing::Mapping(mapping)));
        Ok(())
    }

    fn install(&mut self, id: NodeId, backing: Option<Backing>) {
        let backing = match backing {
            Some(Backing::Mapping(map)) => Some(Backing::Mapping(self.attach_entries(id, map))),
            other => other,
        };
        if let Some(node) = self.arena.get_node_mut(id) {
            node.data.entries = backing;
        }
    }

    fn attach_entries(&mut self, parent: NodeId, map: Mapping) -> Mapping {
        map.into_iter()
            .map(|(k, v)| {
                let v = self.attach(parent, v);
                (k, v)
            })
            .collect()
    }

    fn attach(&mut self, parent: NodeId, value: Value) -> Value {
        match value {
            Value::Map(map) => {
                let Some(data) = self.arena.get_node(parent).map(|n| &n.data) else {
                    return Value::Map(map);
                };
                let child_data = NodeData::new(data.pwd.clone(), Rc::clone(&data.context));
                let child = self.arena.insert_node(child_data, Some(parent));
                let entries = self.attach_entries(child, map);
                if let Some(node) = self.arena.get_node_mut(child) {
                    node.data.entries = Some(Backing::Mapping(entries));
                }
                Value::Node(child)
            }
            other => other,
        }
    }

    /// Turn a pending override payload into a real mapping backing.
    fn materialize(&mut self, id: NodeId) -> DomainResult<()> {
        let node = self.entry_mut(id)?;
        match node.data.entries.take() {
            None => Err(DomainError::Unconfigured),
            Some(Backing::Pending(extends)) => {
                self.install(id, Some(Backing::Mapping(extends.overrides)));
                Ok(())
            }
            Some(backing) => {
                node.data.entries = Some(backing);
                Ok(())
            }
        }
    }

    fn mapping_mut(&mut self, id: NodeId) -> DomainResult<&mut Mapping> {
        match self.entry_mut(id)?.data.entries.as_mut() {
            Some(Backing::Mapping(map)) => Ok(map),
            Some(Backing::Pending(_)) | None => Err(DomainError::Unconfigured),
        }
    }

    /// Deep, detached copy of the subtree at `id`.
    pub fn to_mapping(&self, id: NodeId) -> DomainResult<Mapping> {
        self.detach_entries(id, &mut Vec::new())
    }

    fn detach_entries(&self, id: NodeId, trail: &mut Vec<NodeId>) -> DomainResult<Mapping> {
        if trail.contains(&id) {
            return Err(DomainError::CyclicAssignment(self.path_of(id, "")));
        }
        trail.push(id);
        let source = match self.backing(id)? {
            Backing::Mapping(map) => map,
            Backing::Pending(extends) => &extends.overrides,
        };
        let mut out = Mapping::with_capacity(source.len());
        for (key, value) in source {
            let value = match value {
                Value::Node(child) => Value::Map(self.detach_entries(*child, trail)?),
                other => other.clone(),
            };
            out.insert(key.clone(), value);
        }
        trail.pop();
        Ok(out)
    }

    /// Copy the subtree at `id` of `other` into this arena as a detached node.
    #[instrument(level = "trace", skip(self, other))]
    pub fn graft(&mut self, other: &Configuration, id: NodeId) -> DomainResult<NodeId> {
        self.graft_node(other, id, None, &mut Vec::new())
    }

    fn graft_node(
        &mut self,
        other: &Configuration,
        id: NodeId,
        parent: Option<NodeId>,
        trail: &mut Vec<NodeId>,
    ) -> DomainResult<NodeId> {
        if trail.contains(&id) {
            return Err(DomainError::CyclicAssignment(other.path_of(id, "")));
        }
        trail.push(id);
        let source = &other.entry(id)?.data;
        let mut data = NodeData::new(source.pwd.clone(), Rc::clone(&source.context));
        data.origin = source.origin.clone();
        let copy = self.arena.insert_node(data, parent);
        let entries = match &source.entries {
            Some(Backing::Mapping(map)) => {
                let mut out = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    let value = match value {
                        Value::Node(child) => {
                            Value::Node(self.graft_node(other, *child, Some(copy), trail)?)
                        }
                        v => v.clone(),
                    };
                    out.insert(key.clone(), value);
                }
                Some(Backing::Mapping(out))
            }
            other_backing => other_backing.clone(),
        };
        self.entry_mut(copy)?.data.entries = entries;
        trail.pop();
        Ok(copy)
    }

    /// Move the entries of detached `source` into `target` and drop `source`.
    pub fn adopt(&mut self, target: NodeId, source: NodeId) -> DomainResult<()> {
        self.entry(target)?;
        let removed = self.arena.remove(source).ok_or(DomainError::StaleNode)?;
        if let Some(Backing::Mapping(map)) = &removed.data.entries {
            for value in map.values() {
                if let Value::Node(child) = value {
                    if let Some(node) = self.arena.get_node_mut(*child) {
                        if node.parent == Some(source) {
                            node.parent = Some(target);
                        }
                    }
                }
            }
        }
        self.entry_mut(target)?.data.entries = removed.data.entries;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Display
    // ---------------------------------------------------------------

    /// Indented listing with keys sorted at every level.
    pub fn format(&self) -> DomainResult<String> {
        self.format_node(self.root)
    }

    pub fn format_node(&self, id: NodeId) -> DomainResult<String> {
        let mut out = String::new();
        self.format_into(id, 0, &mut out, &mut Vec::new())?;
        Ok(out)
    }

    fn format_into(
        &self,
        id: NodeId,
        level: usize,
        out: &mut String,
        trail: &mut Vec<NodeId>,
    ) -> DomainResult<()> {
        if trail.contains(&id) {
            let _ = writeln!(out, "{}<cycle>", "  ".repeat(level));
            return Ok(());
        }
        trail.push(id);
        let indent = "  ".repeat(level);
        for key in self.keys(id)?.into_iter().sorted() {
            let _ = writeln!(out, "{}{}:", indent, key);
            match self.get(id, &key)? {
                Value::Node(child) => self.format_into(child, level + 1, out, trail)?,
                Value::Map(map) => {
                    for (k, v) in map.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
                        let _ = writeln!(out, "{}  {}: {}", indent, k, v);
                    }
                }
                value => {
                    let _ = writeln!(out, "{}  {}", indent, value);
                }
            }
        }
        trail.pop();
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_mapping(Mapping::new())
    }
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    config: &'a Configuration,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn get(&self, key: &str) -> DomainResult<Value> {
        self.config.get(self.id, key)
    }

    /// Attribute-style access, same as [`NodeRef::get`].
    pub fn attr(&self, name: &str) -> DomainResult<Value> {
        self.get(name)
    }

    /// Nested mapping at `key` as another view.
    pub fn child(&self, key: &str) -> DomainResult<NodeRef<'a>> {
        match self.config.raw(self.id, key)? {
            Value::Node(id) => Ok(self.config.node(*id)),
            _ => Err(DomainError::NotAMapping(self.config.path_of(self.id, key))),
        }
    }

    pub fn parent(&self) -> DomainResult<Option<NodeRef<'a>>> {
        Ok(self.config.parent(self.id)?.map(|id| self.config.node(id)))
    }

    pub fn contains(&self, key: &str) -> DomainResult<bool> {
        self.config.contains(self.id, key)
    }

    pub fn keys(&self) -> DomainResult<Vec<String>> {
        self.config.keys(self.id)
    }

    pub fn len(&self) -> DomainResult<usize> {
        self.config.len(self.id)
    }

    pub fn is_empty(&self) -> DomainResult<bool> {
        self.config.is_empty(self.id)
    }

    pub fn pwd(&self) -> DomainResult<&'a Path> {
        self.config.pwd(self.id)
    }
}
