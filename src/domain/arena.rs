use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::placeholder::Extends;
use crate::domain::value::Mapping;

/// Interpolation variables available to `%(name)s` substitution.
pub type Interpolation = BTreeMap<String, String>;

/// Handle of a node inside one configuration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

/// What a node is backed by.
#[derive(Debug, Clone)]
pub enum Backing {
    Mapping(Mapping),
    /// Whole-document inheritance not yet resolved; reads see the overrides.
    Pending(Extends),
}

/// Data payload for configuration nodes.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// `None` until the node has been given a backing
    pub entries: Option<Backing>,
    /// Directory relative file names are resolved against
    pub pwd: PathBuf,
    /// Interpolation variables, shared by the nodes of one document
    pub context: Rc<Interpolation>,
    /// Canonical path of the document this node is the root of
    pub origin: Option<PathBuf>,
}

impl NodeData {
    pub fn new(pwd: PathBuf, context: Rc<Interpolation>) -> Self {
        Self {
            entries: None,
            pwd,
            context,
            origin: None,
        }
    }
}

#[derive(Debug)]
pub struct ConfigNode {
    pub data: NodeData,
    /// Index of parent node in the arena, None for roots and detached nodes
    pub parent: Option<NodeId>,
}

/// Arena storage for configuration nodes.
///
/// Parent links are plain indices, so a child never owns its parent and
/// aliases to foreign subtrees are just copied ids.
#[derive(Debug, Default)]
pub struct ConfigArena {
    arena: Arena<ConfigNode>,
}

impl ConfigArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        NodeId(self.arena.insert(ConfigNode { data, parent }))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&ConfigNode> {
        self.arena.get(id.0)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut ConfigNode> {
        self.arena.get_mut(id.0)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<ConfigNode> {
        self.arena.remove(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.arena.iter().map(|(idx, _)| NodeId(idx)).collect()
    }

    /// Walk from `id` up to its root, starting with `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get_node(id).map(|_| id),
            remaining: self.arena.len(),
        }
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }
}

/// Iterator over a node and its ancestors.
///
/// Bounded by the arena size so a corrupted parent chain cannot spin forever.
pub struct Ancestors<'a> {
    arena: &'a ConfigArena,
    next: Option<NodeId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next?;
        self.next = self.arena.get_node(current).and_then(|n| n.parent);
        Some(current)
    }
}
