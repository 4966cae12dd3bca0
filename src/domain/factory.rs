//! Factory signatures and argument binding
//!
//! A [`FactorySpec`] is the typed stand-in for a callable: a name, an
//! ordered parameter list and a builder closure. The resolver asks for a
//! binding plan before resolving any argument value, so signature mistakes
//! surface before side effects happen.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::value::{Component, Mapping, Value};

/// Error type returned by factory builders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type BuildFn = dyn Fn(Args) -> Result<Value, BoxError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub required: bool,
}

/// How a bound argument is handed to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passing {
    Positional,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub passing: Passing,
}

pub struct FactorySpec {
    name: String,
    params: Vec<Param>,
    extra_keywords: bool,
    build: Box<BuildFn>,
}

impl fmt::Debug for FactorySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorySpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("extra_keywords", &self.extra_keywords)
            .finish()
    }
}

impl Component for FactorySpec {}

impl FactorySpec {
    pub fn builder(name: impl Into<String>) -> FactoryBuilder {
        FactoryBuilder {
            name: name.into(),
            params: Vec::new(),
            extra_keywords: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn accepts_extra_keywords(&self) -> bool {
        self.extra_keywords
    }

    /// Decide how each payload key binds to the signature.
    ///
    /// Missing required parameters are reported first (in declaration
    /// order), then keys matching no parameter. Required parameters come
    /// out first in declaration order, followed by keywords in payload order.
    pub fn plan(&self, payload: &Mapping) -> DomainResult<Vec<Binding>> {
        if let Some(missing) = self
            .params
            .iter()
            .find(|p| p.required && !payload.contains_key(&p.name))
        {
            return Err(DomainError::MissingArgument {
                param: missing.name.clone(),
                target: self.name.clone(),
            });
        }

        let extras: Vec<String> = payload
            .keys()
            .filter(|key| !self.params.iter().any(|p| &p.name == *key))
            .cloned()
            .collect();
        if !extras.is_empty() && !self.extra_keywords {
            return Err(DomainError::ExtraArgument {
                args: extras,
                target: self.name.clone(),
            });
        }

        let positional = self.params.iter().filter(|p| p.required).map(|p| Binding {
            name: p.name.clone(),
            passing: Passing::Positional,
        });
        let keywords = payload
            .keys()
            .filter(|key| {
                !self
                    .params
                    .iter()
                    .any(|p| p.required && &p.name == *key)
            })
            .map(|key| Binding {
                name: key.clone(),
                passing: Passing::Keyword,
            });
        Ok(positional.chain(keywords).collect())
    }

    pub fn invoke(&self, args: Args) -> DomainResult<Value> {
        (self.build)(args).map_err(|source| DomainError::Construction {
            target: self.name.clone(),
            source,
        })
    }
}

pub struct FactoryBuilder {
    name: String,
    params: Vec<Param>,
    extra_keywords: bool,
}

impl FactoryBuilder {
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: false,
        });
        self
    }

    /// Accept keys that match no declared parameter.
    pub fn extra_keywords(mut self) -> Self {
        self.extra_keywords = true;
        self
    }

    pub fn build<F>(self, build: F) -> FactorySpec
    where
        F: Fn(Args) -> Result<Value, BoxError> + 'static,
    {
        FactorySpec {
            name: self.name,
            params: self.params,
            extra_keywords: self.extra_keywords,
            build: Box::new(build),
        }
    }
}

/// Resolved arguments handed to a builder.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<(String, Value)>,
    keywords: Mapping,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_positional(&mut self, name: impl Into<String>, value: Value) {
        self.positional.push((name.into(), value));
    }

    pub fn insert_keyword(&mut self, name: impl Into<String>, value: Value) {
        self.keywords.insert(name.into(), value);
    }

    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.positional.iter().map(|(_, v)| v)
    }

    pub fn keywords(&self) -> &Mapping {
        &self.keywords
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.positional
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.keywords.get(name))
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        if let Some(pos) = self.positional.iter().position(|(n, _)| n == name) {
            return Some(self.positional.remove(pos).1);
        }
        self.keywords.shift_remove(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, BoxError> {
        self.get(name)
            .ok_or_else(|| format!("argument '{}' not supplied", name).into())
    }

    pub fn str(&self, name: &str) -> Result<&str, BoxError> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| format!("argument '{}' must be a string, got {}", name, value.type_label()).into())
    }

    pub fn int(&self, name: &str) -> Result<i64, BoxError> {
        let value = self.require(name)?;
        value
            .as_i64()
            .ok_or_else(|| format!("argument '{}' must be an int, got {}", name, value.type_label()).into())
    }

    pub fn object<T: Any>(&self, name: &str) -> Result<Rc<T>, BoxError> {
        let value = self.require(name)?;
        value.downcast_rc::<T>().ok_or_else(|| {
            format!(
                "argument '{}' must be {}, got {}",
                name,
                std::any::type_name::<T>(),
                value.type_label()
            )
            .into()
        })
    }

    /// All arguments as one mapping, positional ones first.
    pub fn into_mapping(self) -> Mapping {
        self.positional.into_iter().chain(self.keywords).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value::mapping;

    fn connect() -> FactorySpec {
        FactorySpec::builder("db.connect")
            .required("host")
            .required("port")
            .optional("timeout")
            .build(|args| Ok(Value::Map(args.into_mapping())))
    }

    #[test]
    fn given_complete_payload_when_planned_then_required_are_positional() {
        let payload = mapping([
            ("timeout", Value::Int(5)),
            ("port", Value::Int(5432)),
            ("host", Value::from("localhost")),
        ]);

        let plan = connect().plan(&payload).unwrap();

        assert_eq!(
            plan,
            vec![
                Binding { name: "host".into(), passing: Passing::Positional },
                Binding { name: "port".into(), passing: Passing::Positional },
                Binding { name: "timeout".into(), passing: Passing::Keyword },
            ]
        );
    }

    #[test]
    fn given_missing_required_when_planned_then_first_missing_reported() {
        let payload = mapping([("timeout", Value::Int(5))]);

        let err = connect().plan(&payload).unwrap_err();

        assert!(matches!(
            err,
            DomainError::MissingArgument { ref param, ref target }
                if param == "host" && target == "db.connect"
        ));
    }

    #[test]
    fn given_unknown_key_when_planned_then_extra_argument() {
        let payload = mapping([
            ("host", Value::from("h")),
            ("port", Value::Int(1)),
            ("retries", Value::Int(3)),
        ]);

        let err = connect().plan(&payload).unwrap_err();

        assert!(matches!(
            err,
            DomainError::ExtraArgument { ref args, .. } if args == &vec!["retries".to_string()]
        ));
    }

    #[test]
    fn given_extra_keywords_accepted_when_planned_then_passed_as_keywords() {
        let spec = FactorySpec::builder("dict")
            .extra_keywords()
            .build(|args| Ok(Value::Map(args.into_mapping())));
        let payload = mapping([("a", 1), ("b", 2)]);

        let plan = spec.plan(&payload).unwrap();

        assert!(plan.iter().all(|b| b.passing == Passing::Keyword));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn given_failing_builder_when_invoked_then_construction_error() {
        let spec = FactorySpec::builder("broken").build(|_| Err("boom".into()));

        let err = spec.invoke(Args::new()).unwrap_err();

        assert_eq!(err.to_string(), "factory broken failed: boom");
    }

    #[test]
    fn given_args_when_taking_then_positional_then_keyword() {
        let mut args = Args::new();
        args.push_positional("host", Value::from("h"));
        args.insert_keyword("timeout", Value::Int(3));

        assert_eq!(args.str("host").unwrap(), "h");
        assert_eq!(args.int("timeout").unwrap(), 3);
        assert!(args.int("host").is_err());
        assert_eq!(args.take("timeout"), Some(Value::Int(3)));
        assert!(args.get("timeout").is_none());
    }
}
