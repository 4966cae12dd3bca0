//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::application::services::{LoaderService, ResolverService, TagHandlers};
use crate::application::{ApplicationResult, Registry};
use crate::config::Settings;
use crate::domain::{Configuration, Interpolation};
use crate::infrastructure::traits::{Environment, FileSystem, ProcessEnvironment, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Engine settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Process environment abstraction
    pub env: Arc<dyn Environment>,

    /// Factories and objects documents may refer to
    pub registry: Rc<Registry>,

    pub loader: Rc<LoaderService>,
    pub resolver: ResolverService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings, registry: Registry) -> Self {
        Self::with_deps(
            settings,
            registry,
            Arc::new(RealFileSystem),
            Arc::new(ProcessEnvironment),
            TagHandlers::new(),
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        registry: Registry,
        fs: Arc<dyn FileSystem>,
        env: Arc<dyn Environment>,
        tags: TagHandlers,
    ) -> Self {
        let settings = Arc::new(settings);
        let registry = Rc::new(registry);
        let loader = Rc::new(LoaderService::new(Arc::clone(&fs), Arc::clone(&settings)).with_tags(tags));
        let resolver = ResolverService::new(
            Rc::clone(&loader),
            Rc::clone(&registry),
            Arc::clone(&env),
            Arc::clone(&settings),
        );

        Self {
            settings,
            fs,
            env,
            registry,
            loader,
            resolver,
        }
    }

    /// Load a file and resolve every placeholder in it.
    pub fn configure_file(&self, path: &Path, context: Interpolation) -> ApplicationResult<Configuration> {
        let mut cfg = self.loader.load_from_file(path, context)?;
        self.resolver.configure(&mut cfg)?;
        Ok(cfg)
    }

    /// Parse text and resolve every placeholder in it.
    pub fn configure_text(
        &self,
        text: &str,
        context: Interpolation,
        pwd: &Path,
    ) -> ApplicationResult<Configuration> {
        let mut cfg = self.loader.load_from_text(text, context, pwd)?;
        self.resolver.configure(&mut cfg)?;
        Ok(cfg)
    }
}
