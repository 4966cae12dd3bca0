//! Document loading
//!
//! Turns files, text and in-memory mappings into [`Configuration`] trees.
//! Inheritance of whole files (`--- !extends:base.yaml` documents and the
//! older `extends: base.yaml` root key) is flattened here, base first.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{Configuration, DomainError, DomainResult, Extends, Interpolation, Mapping, Placeholder, Value};
use crate::infrastructure::parser::{parse_document, ParseOptions};
use crate::infrastructure::traits::FileSystem;

pub use crate::infrastructure::parser::{TagHandler, TagHandlers};

/// Name of the root key that pulls in a base file when legacy inheritance is on.
const LEGACY_EXTENDS_KEY: &str = "extends";

pub struct LoaderService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    tags: TagHandlers,
}

/// Expand `~` and `$VAR` in a file name from a document.
pub(crate) fn expand_filename(name: &str) -> PathBuf {
    match shellexpand::full(name) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(name),
    }
}

impl LoaderService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self {
            fs,
            settings,
            tags: TagHandlers::new(),
        }
    }

    pub fn with_tags(mut self, tags: TagHandlers) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Register a constructor for `!name`; it takes precedence over built-ins.
    pub fn register_tag<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> DomainResult<Value> + 'static,
    {
        self.tags.insert(name.into(), Rc::new(handler));
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn options<'a>(&'a self, origin: &'a str) -> ParseOptions<'a> {
        ParseOptions {
            tags: &self.tags,
            implicit_env: self.settings.implicit_env,
            implicit_concat: self.settings.implicit_concat,
            origin,
        }
    }

    pub fn canonicalize(&self, path: &Path) -> ApplicationResult<PathBuf> {
        self.fs
            .canonicalize(path)
            .with_path_context("resolve document path", path)
    }

    /// Load a file. The configuration's pwd is the file's directory.
    ///
    /// A whole-document `!extends:` stays pending until the tree is configured.
    pub fn load_from_file(&self, path: &Path, context: Interpolation) -> ApplicationResult<Configuration> {
        self.load_file(path, context, false, &mut Vec::new())
    }

    /// Load a file and resolve any whole-document inheritance right away.
    ///
    /// Empty documents load as empty mappings.
    pub fn load_flattened(&self, path: &Path, context: Interpolation) -> ApplicationResult<Configuration> {
        let cfg = self.load_file(path, context, true, &mut Vec::new())?;
        if cfg.is_configured(cfg.root())? {
            return Ok(cfg);
        }
        let root = cfg.root();
        Ok(Configuration::new(
            Mapping::new(),
            (*cfg.context(root)?).clone(),
            cfg.pwd(root)?.to_path_buf(),
        ))
    }

    pub fn load_from_text(
        &self,
        text: &str,
        context: Interpolation,
        pwd: impl Into<PathBuf>,
    ) -> ApplicationResult<Configuration> {
        let value = parse_document(text, self.options("<string>"))?;
        from_root_value(value, context, pwd.into(), "<string>")
    }

    /// Wrap an in-memory mapping. No parsing, no I/O.
    pub fn load_from_mapping(
        &self,
        mapping: Mapping,
        context: Interpolation,
        pwd: impl Into<PathBuf>,
    ) -> Configuration {
        Configuration::new(mapping, context, pwd)
    }

    #[instrument(level = "debug", skip(self, context, chain))]
    fn load_file(
        &self,
        path: &Path,
        context: Interpolation,
        flatten: bool,
        chain: &mut Vec<PathBuf>,
    ) -> ApplicationResult<Configuration> {
        let canonical = self.canonicalize(path)?;
        if chain.contains(&canonical) {
            return Err(DomainError::InheritanceCycle(canonical).into());
        }
        chain.push(canonical.clone());
        let result = self.load_file_inner(path, &canonical, context, flatten, chain);
        chain.pop();
        result
    }

    fn load_file_inner(
        &self,
        path: &Path,
        canonical: &Path,
        context: Interpolation,
        flatten: bool,
        chain: &mut Vec<PathBuf>,
    ) -> ApplicationResult<Configuration> {
        let text = self
            .fs
            .read_to_string(path)
            .with_path_context("read document", path)?;
        let pwd = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let origin = path.display().to_string();
        debug!("load_file: {} (pwd={})", origin, pwd.display());

        let value = parse_document(&text, self.options(&origin))?;
        let mut cfg = from_root_value(value, context, pwd.clone(), &origin)?;

        if self.settings.legacy_extends_key {
            cfg = self.apply_legacy_extends(cfg, &pwd, chain)?;
        }

        if flatten {
            let root = cfg.root();
            if let Some(extends) = cfg.pending_extends(root)?.cloned() {
                let context = cfg.context(root)?;
                cfg = self.extend(&extends, context, &pwd, chain)?;
            }
        }

        let root = cfg.root();
        cfg.set_origin(root, canonical.to_path_buf())?;
        Ok(cfg)
    }

    /// Merge a document with a root `extends: file` key over that file.
    fn apply_legacy_extends(
        &self,
        mut cfg: Configuration,
        pwd: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> ApplicationResult<Configuration> {
        let root = cfg.root();
        if !cfg.is_configured(root)? || cfg.pending_extends(root)?.is_some() {
            return Ok(cfg);
        }
        let base_name = match cfg.raw(root, LEGACY_EXTENDS_KEY) {
            Ok(Value::String(name)) => name.clone(),
            _ => return Ok(cfg),
        };
        cfg.delete(root, LEGACY_EXTENDS_KEY)?;
        debug!("legacy extends: {}", base_name);

        let base = self.load_file(
            &pwd.join(expand_filename(&base_name)),
            Interpolation::new(),
            true,
            chain,
        )?;
        let mut merged = base.merge(&cfg)?;
        merged.share_context(cfg.context(root)?);
        Ok(merged)
    }

    /// Resolve an [`Extends`] relative to `pwd`: the base file with the
    /// override payload merged on top.
    pub fn resolve_extends(
        &self,
        extends: &Extends,
        context: Rc<Interpolation>,
        pwd: &Path,
    ) -> ApplicationResult<Configuration> {
        self.extend(extends, context, pwd, &mut Vec::new())
    }

    fn extend(
        &self,
        extends: &Extends,
        context: Rc<Interpolation>,
        pwd: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> ApplicationResult<Configuration> {
        let base_path = pwd.join(expand_filename(&extends.filename));
        debug!("extend: base {}", base_path.display());
        let base = self.load_file(&base_path, Interpolation::new(), true, chain)?;
        if !base.is_configured(base.root())? {
            return Err(DomainError::Unconfigured.into());
        }
        let overrides = Configuration::new(extends.overrides.clone(), (*context).clone(), pwd);
        let mut merged = base.merge(&overrides)?;
        merged.share_context(context);
        let root = merged.root();
        merged.set_origin(root, self.canonicalize(&base_path)?)?;
        Ok(merged)
    }
}

/// Build a configuration from a parsed document root.
fn from_root_value(
    value: Value,
    context: Interpolation,
    pwd: PathBuf,
    origin: &str,
) -> ApplicationResult<Configuration> {
    match value {
        Value::Null => Ok(Configuration::unconfigured(context, pwd)),
        Value::Map(map) => Ok(Configuration::new(map, context, pwd)),
        Value::Placeholder(Placeholder::Extends(extends)) => {
            Ok(Configuration::pending(extends, context, pwd))
        }
        other => Err(ApplicationError::Parse {
            origin: origin.to_string(),
            message: format!("document root must be a mapping, got {}", other.type_label()),
        }),
    }
}
