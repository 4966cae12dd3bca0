//! Placeholder resolution and the configure walk
//!
//! `configure` walks a tree depth-first and replaces every placeholder with
//! its value, writing results back into the slot they came from. A reference
//! to a slot that still holds a placeholder resolves that slot first, so each
//! factory runs once and every reference sees the same instance.

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::application::registry::Registry;
use crate::application::services::loader::{expand_filename, LoaderService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::factory::{Args, Passing};
use crate::domain::placeholder::{compile_regex, parse_duration};
use crate::domain::{
    ConcatPart, Configuration, DomainError, Extends, Factory, FactoryTarget, Mapping, NodeId,
    Placeholder, Target, Value,
};
use crate::infrastructure::traits::Environment;

pub struct ResolverService {
    loader: Rc<LoaderService>,
    registry: Rc<Registry>,
    env: Arc<dyn Environment>,
    settings: Arc<Settings>,
}

impl ResolverService {
    pub fn new(
        loader: Rc<LoaderService>,
        registry: Rc<Registry>,
        env: Arc<dyn Environment>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            loader,
            registry,
            env,
            settings,
        }
    }

    /// Resolve every placeholder in `cfg`, in place.
    #[instrument(level = "debug", skip_all)]
    pub fn configure(&self, cfg: &mut Configuration) -> ApplicationResult<()> {
        Walk::new(self, cfg).configure_root()
    }

    /// Replace the root backing with `mapping`, then configure.
    pub fn configure_with(&self, cfg: &mut Configuration, mapping: Mapping) -> ApplicationResult<()> {
        let root = cfg.root();
        cfg.replace_backing(root, mapping)?;
        self.configure(cfg)
    }

    /// Resolve a single placeholder in the scope of `node`.
    pub fn resolve(
        &self,
        cfg: &mut Configuration,
        node: NodeId,
        placeholder: &Placeholder,
    ) -> ApplicationResult<Value> {
        Walk::new(self, cfg).resolve_placeholder(node, placeholder)
    }
}

/// State of one configure call.
struct Walk<'a> {
    service: &'a ResolverService,
    cfg: &'a mut Configuration,
    /// Slots whose resolution is in progress, innermost last
    in_progress: Vec<(NodeId, String)>,
    visited: HashSet<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(service: &'a ResolverService, cfg: &'a mut Configuration) -> Self {
        Self {
            service,
            cfg,
            in_progress: Vec::new(),
            visited: HashSet::new(),
        }
    }

    fn configure_root(&mut self) -> ApplicationResult<()> {
        let root = self.cfg.root();
        if let Some(extends) = self.cfg.pending_extends(root)?.cloned() {
            debug!("configure: root extends {}", extends.filename);
            let merged = self.extended(root, &extends)?;
            let grafted = self.cfg.graft(&merged, merged.root())?;
            self.cfg.adopt(root, grafted)?;
        }
        self.configure_node(root)
    }

    fn configure_node(&mut self, node: NodeId) -> ApplicationResult<()> {
        if !self.visited.insert(node) {
            return Ok(());
        }
        for key in self.cfg.keys(node)? {
            let step = match self.cfg.raw(node, &key) {
                Ok(Value::Placeholder(_)) => Step::Resolve,
                Ok(Value::Node(child)) => Step::Descend(*child),
                Ok(value) if value.has_placeholder() => Step::Resolve,
                Ok(_) | Err(DomainError::MissingKey(_)) => Step::Skip,
                Err(e) => return Err(e.into()),
            };
            match step {
                Step::Resolve => {
                    self.resolve_slot(node, &key)?;
                }
                Step::Descend(child) => self.configure_node(child)?,
                Step::Skip => {}
            }
        }
        Ok(())
    }

    /// Resolve whatever `node[key]` holds and store the result there.
    fn resolve_slot(&mut self, node: NodeId, key: &str) -> ApplicationResult<Value> {
        let slot = (node, key.to_string());
        if self.in_progress.contains(&slot) {
            return Err(DomainError::ReferenceCycle(self.cfg.path_of(node, key)).into());
        }
        if self.in_progress.len() >= self.service.settings.max_depth {
            return Err(DomainError::ResolutionDepthExceeded(self.service.settings.max_depth).into());
        }
        trace!(path = %self.cfg.path_of(node, key), "resolving");

        // stays on the stack while the stored result is configured
        self.in_progress.push(slot);
        let stored = self.store_resolved(node, key);
        self.in_progress.pop();
        stored
    }

    fn store_resolved(&mut self, node: NodeId, key: &str) -> ApplicationResult<Value> {
        let pending = self.cfg.raw(node, key)?.clone();
        match self.resolve_value(node, pending)? {
            Value::Node(target) if self.cfg.parent(target)?.is_some() || target == self.cfg.root() => {
                if self.cfg.is_ancestor_or_self(target, node) {
                    return Err(DomainError::ReferenceCycle(self.cfg.path_of(node, key)).into());
                }
                self.cfg.alias(node, key, target)?;
            }
            value => self.cfg.set(node, key, value)?,
        }

        let stored = self.cfg.raw(node, key)?.clone();
        if let Value::Node(child) = stored {
            self.configure_node(child)?;
        }
        Ok(stored)
    }

    /// Resolve placeholders in `value`, including inside lists and maps.
    fn resolve_value(&mut self, node: NodeId, value: Value) -> ApplicationResult<Value> {
        match value {
            Value::Placeholder(p) => self.resolve_placeholder(node, &p),
            Value::List(items) => items
                .into_iter()
                .map(|item| self.resolve_value(node, item))
                .collect::<ApplicationResult<Vec<_>>>()
                .map(Value::List),
            Value::Map(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.resolve_value(node, v)?);
                }
                Ok(Value::Map(out))
            }
            other => Ok(other),
        }
    }

    fn resolve_placeholder(&mut self, node: NodeId, placeholder: &Placeholder) -> ApplicationResult<Value> {
        match placeholder {
            Placeholder::Reference(path) => self.reference(node, path),
            Placeholder::Factory(factory) => self.construct(node, factory),
            Placeholder::ObjectImport(path) => Ok(self.service.registry.import(path)?),
            Placeholder::Include(filename) => self.include(node, filename),
            Placeholder::Extends(extends) => {
                let merged = self.extended(node, extends)?;
                Ok(Value::Node(self.cfg.graft(&merged, merged.root())?))
            }
            Placeholder::Concatenation(parts) => self.concatenate(parts),
            Placeholder::EnvironmentLookup(lookup) => {
                Ok(lookup.resolve(self.service.env.var(&lookup.name))?)
            }
            Placeholder::Duration(text) => Ok(Value::Duration(parse_duration(text)?)),
            Placeholder::Regex(text) => Ok(Value::Regex(compile_regex(text)?)),
        }
    }

    /// Follow a reference path, resolving unresolved values on the way.
    fn reference(&mut self, node: NodeId, path: &str) -> ApplicationResult<Value> {
        let mut forced: Option<(NodeId, String)> = None;
        loop {
            match self.cfg.locate(node, path)? {
                Target::Slot { node: owner, key } => {
                    if self.cfg.raw(owner, &key)?.has_placeholder() {
                        self.resolve_slot(owner, &key)?;
                    }
                    let value = self.cfg.get(owner, &key)?;
                    if let Value::Node(child) = value {
                        self.configure_node(child)?;
                    }
                    return Ok(value);
                }
                Target::Value(value) => return Ok(value),
                Target::Unresolved { node: owner, key } => {
                    let slot = (owner, key.clone());
                    if forced.as_ref() == Some(&slot) {
                        return Err(DomainError::UnresolvedPath {
                            path: path.to_string(),
                            key,
                        }
                        .into());
                    }
                    self.resolve_slot(owner, &key)?;
                    forced = Some(slot);
                }
            }
        }
    }

    fn construct(&mut self, node: NodeId, factory: &Factory) -> ApplicationResult<Value> {
        let spec = match &factory.target {
            FactoryTarget::Named(name) => self.service.registry.factory(name)?,
            FactoryTarget::Direct(spec) => Rc::clone(spec),
        };
        let plan = spec.plan(&factory.args)?;

        let mut args = Args::new();
        for binding in plan {
            let Some(raw) = factory.args.get(&binding.name).cloned() else {
                continue;
            };
            let value = self.argument(node, raw)?;
            match binding.passing {
                Passing::Positional => args.push_positional(binding.name, value),
                Passing::Keyword => args.insert_keyword(binding.name, value),
            }
        }
        debug!(factory = spec.name(), "constructing");
        Ok(spec.invoke(args)?)
    }

    /// Fully resolved factory argument; tree nodes are handed over as maps.
    fn argument(&mut self, node: NodeId, raw: Value) -> ApplicationResult<Value> {
        Ok(match self.resolve_value(node, raw)? {
            Value::Node(id) => Value::Map(self.cfg.to_mapping(id)?),
            other => other,
        })
    }

    fn include(&mut self, node: NodeId, filename: &str) -> ApplicationResult<Value> {
        let path = self.cfg.pwd(node)?.join(expand_filename(filename));
        let canonical = self.service.loader.canonicalize(&path)?;
        if self.includes_in_scope(node).contains(&canonical) {
            return Err(DomainError::InclusionCycle(canonical).into());
        }
        debug!("include: {}", path.display());
        let context = (*self.cfg.context(node)?).clone();
        let included = self.service.loader.load_flattened(&path, context)?;
        Ok(Value::Node(self.cfg.graft(&included, included.root())?))
    }

    /// Documents `node` was loaded from, innermost first.
    fn includes_in_scope(&self, node: NodeId) -> Vec<PathBuf> {
        self.cfg
            .ancestors(node)
            .filter_map(|id| self.cfg.origin(id).ok().flatten().map(|p| p.to_path_buf()))
            .collect()
    }

    fn extended(&mut self, node: NodeId, extends: &Extends) -> ApplicationResult<Configuration> {
        let pwd = self.cfg.pwd(node)?.to_path_buf();
        let base = self
            .service
            .loader
            .canonicalize(&pwd.join(expand_filename(&extends.filename)))?;
        if self.includes_in_scope(node).contains(&base) {
            return Err(DomainError::InheritanceCycle(base).into());
        }
        let context = self.cfg.context(node)?;
        self.service.loader.resolve_extends(extends, context, &pwd)
    }

    fn concatenate(&self, parts: &[ConcatPart]) -> ApplicationResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                ConcatPart::Literal(text) => out.push_str(text),
                ConcatPart::Symbol(path) => {
                    let value = self.service.registry.import(path)?;
                    let text = value.scalar_text().ok_or_else(|| DomainError::InvalidConcatenation {
                        text: path.clone(),
                        reason: format!("symbol is a {}, not a scalar", value.type_label()),
                    })?;
                    out.push_str(&text);
                }
                ConcatPart::Env(lookup) => {
                    if let Value::String(text) = lookup.resolve(self.service.env.var(&lookup.name))? {
                        out.push_str(&text);
                    }
                }
            }
        }
        Ok(Value::String(out))
    }
}

enum Step {
    Resolve,
    Descend(NodeId),
    Skip,
}
