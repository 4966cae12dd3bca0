//! Symbol registry
//!
//! Documents name factories and objects by dotted paths (`app.db.connect`,
//! or `app.db:connect`). The host registers them up front; lookups fail with
//! an import trail showing how far the path could be followed.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::domain::{DomainResult, FactorySpec, ImportError, Object, Value};

#[derive(Debug, Default)]
pub struct Registry {
    factories: IndexMap<String, Rc<FactorySpec>>,
    objects: IndexMap<String, Value>,
}

fn normalize(path: &str) -> String {
    path.trim().replace(':', ".")
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its own name.
    pub fn register_factory(&mut self, spec: FactorySpec) -> Rc<FactorySpec> {
        let spec = Rc::new(spec);
        let name = normalize(spec.name());
        debug!(%name, "registering factory");
        self.factories.insert(name, Rc::clone(&spec));
        spec
    }

    /// Register a ready-made value (object, constant, string) under `path`.
    pub fn register_object(&mut self, path: &str, value: impl Into<Value>) {
        let name = normalize(path);
        debug!(%name, "registering object");
        self.objects.insert(name, value.into());
    }

    pub fn with_factory(mut self, spec: FactorySpec) -> Self {
        self.register_factory(spec);
        self
    }

    pub fn with_object(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.register_object(path, value);
        self
    }

    /// Factory for a `!factory:` target.
    ///
    /// Objects that wrap a [`FactorySpec`] count as factories too.
    #[instrument(level = "trace", skip(self))]
    pub fn factory(&self, path: &str) -> DomainResult<Rc<FactorySpec>> {
        let name = normalize(path);
        if let Some(spec) = self.factories.get(&name) {
            return Ok(Rc::clone(spec));
        }
        if let Some(spec) = self.objects.get(&name).and_then(Value::downcast_rc::<FactorySpec>) {
            return Ok(spec);
        }
        Err(self.trail(path).into())
    }

    /// Value for an `!obj:` path. Registered factories import as objects.
    #[instrument(level = "trace", skip(self))]
    pub fn import(&self, path: &str) -> DomainResult<Value> {
        let name = normalize(path);
        if let Some(value) = self.objects.get(&name) {
            return Ok(value.clone());
        }
        if let Some(spec) = self.factories.get(&name) {
            return Ok(Value::Object(Object::from_rc(Rc::clone(spec))));
        }
        Err(self.trail(path).into())
    }

    pub fn contains(&self, path: &str) -> bool {
        let name = normalize(path);
        self.objects.contains_key(&name) || self.factories.contains_key(&name)
    }

    fn is_known_prefix(&self, prefix: &str) -> bool {
        let nested = format!("{}.", prefix);
        self.objects
            .keys()
            .chain(self.factories.keys())
            .any(|name| name == prefix || name.starts_with(&nested))
    }

    fn trail(&self, path: &str) -> ImportError {
        let name = normalize(path);
        let mut found = Vec::new();
        let mut prefix = String::new();
        for segment in name.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            if !self.is_known_prefix(&prefix) {
                break;
            }
            found.push(prefix.clone());
        }
        ImportError {
            import_name: path.to_string(),
            found,
            missing: prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    fn registry() -> Registry {
        Registry::new()
            .with_factory(FactorySpec::builder("app.db.connect").build(|_| Ok(Value::Null)))
            .with_object("app.settings.name", "demo")
    }

    #[test]
    fn given_colon_path_when_imported_then_normalized() {
        let registry = registry();

        assert_eq!(registry.import("app.settings:name").unwrap(), Value::from("demo"));
        assert!(registry.factory("app.db:connect").is_ok());
    }

    #[test]
    fn given_unknown_symbol_when_imported_then_trail_reported() {
        let registry = registry();

        let err = registry.import("app.db.disconnect").unwrap_err();

        match err {
            DomainError::Import(trail) => {
                assert_eq!(trail.found, vec!["app".to_string(), "app.db".to_string()]);
                assert_eq!(trail.missing, "app.db.disconnect");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn given_factory_when_imported_as_object_then_same_spec() {
        let registry = registry();

        let value = registry.import("app.db.connect").unwrap();
        let spec = value.downcast_rc::<FactorySpec>().unwrap();

        assert!(Rc::ptr_eq(&spec, &registry.factory("app.db.connect").unwrap()));
    }
}
