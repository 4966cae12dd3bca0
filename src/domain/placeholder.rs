//! Deferred values recorded at parse time
//!
//! A placeholder sits in a configuration slot until the resolver replaces it
//! with a concrete value. The helpers in this module are pure parsers for the
//! textual forms (durations, `ENV:` lookups, concatenation tokens).

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::factory::FactorySpec;
use crate::domain::value::{Mapping, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    /// Path to another value in the same tree
    Reference(String),
    Factory(Factory),
    /// Dotted or colon path of a registered symbol
    ObjectImport(String),
    /// File embedded at this position
    Include(String),
    Extends(Extends),
    Concatenation(Vec<ConcatPart>),
    EnvironmentLookup(EnvLookup),
    Duration(String),
    Regex(String),
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Reference(path) => write!(f, "Reference({})", path),
            Placeholder::Factory(factory) => write!(f, "Factory({})", factory.target),
            Placeholder::ObjectImport(path) => write!(f, "Obj({})", path),
            Placeholder::Include(filename) => write!(f, "Include({})", filename),
            Placeholder::Extends(extends) => write!(f, "Extends({})", extends.filename),
            Placeholder::Concatenation(parts) => {
                write!(f, "Concat(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, ")")
            }
            Placeholder::EnvironmentLookup(lookup) => write!(f, "Env({})", lookup),
            Placeholder::Duration(text) => write!(f, "Duration({})", text),
            Placeholder::Regex(text) => write!(f, "Regex({})", text),
        }
    }
}

/// What a factory placeholder constructs with.
#[derive(Debug, Clone)]
pub enum FactoryTarget {
    /// Looked up in the registry at resolution time
    Named(String),
    Direct(Rc<FactorySpec>),
}

impl PartialEq for FactoryTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FactoryTarget::Named(a), FactoryTarget::Named(b)) => a == b,
            (FactoryTarget::Direct(a), FactoryTarget::Direct(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for FactoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryTarget::Named(name) => write!(f, "{}", name),
            FactoryTarget::Direct(spec) => write!(f, "{}", spec.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factory {
    pub target: FactoryTarget,
    pub args: Mapping,
}

impl Factory {
    pub fn named(name: impl Into<String>, args: Mapping) -> Self {
        Self {
            target: FactoryTarget::Named(name.into()),
            args,
        }
    }

    pub fn direct(spec: Rc<FactorySpec>, args: Mapping) -> Self {
        Self {
            target: FactoryTarget::Direct(spec),
            args,
        }
    }
}

/// Inheritance from a base document with an override payload.
///
/// Until resolved, mapping reads fall through to the overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Extends {
    pub filename: String,
    pub overrides: Mapping,
}

impl Extends {
    pub fn new(filename: impl Into<String>, overrides: Mapping) -> Self {
        Self {
            filename: filename.into(),
            overrides,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.overrides.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.overrides.keys()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Fallback of an environment lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvDefault {
    /// No default: the variable must be set
    Required,
    /// `NAME?=` yields null
    Null,
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLookup {
    pub name: String,
    pub default: EnvDefault,
}

impl EnvLookup {
    /// Parse `NAME`, `NAME?=value`, `NAME?=` or `NAME?="quoted value"`.
    pub fn parse(spec: &str) -> DomainResult<Self> {
        let spec = spec.trim();
        let (name, default) = match spec.split_once("?=") {
            None => (spec, EnvDefault::Required),
            Some((name, "")) => (name, EnvDefault::Null),
            Some((name, raw)) => (name, EnvDefault::Value(unquote(raw).to_string())),
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomainError::InvalidEnvironmentLookup(spec.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            default,
        })
    }

    /// Turn the variable's value (if set) into the resolved value.
    pub fn resolve(&self, found: Option<String>) -> DomainResult<Value> {
        match (found, &self.default) {
            (Some(value), _) => Ok(Value::String(value)),
            (None, EnvDefault::Value(default)) => Ok(Value::String(default.clone())),
            (None, EnvDefault::Null) => Ok(Value::Null),
            (None, EnvDefault::Required) => {
                Err(DomainError::MissingEnvironmentVariable(self.name.clone()))
            }
        }
    }
}

impl fmt::Display for EnvLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            EnvDefault::Required => write!(f, "{}", self.name),
            EnvDefault::Null => write!(f, "{}?=", self.name),
            EnvDefault::Value(v) => write!(f, "{}?=\"{}\"", self.name, v),
        }
    }
}

fn unquote(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if raw.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[raw.len() - 1] == bytes[0]
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// One piece of a concatenation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    Literal(String),
    /// Dotted path of a registered symbol
    Symbol(String),
    Env(EnvLookup),
}

impl fmt::Display for ConcatPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcatPart::Literal(s) => write!(f, "{:?}", s),
            ConcatPart::Symbol(s) => write!(f, "{}", s),
            ConcatPart::Env(lookup) => write!(f, "ENV:{}", lookup),
        }
    }
}

/// Split a concatenation into whitespace separated tokens.
///
/// Quotes protect whitespace, both as whole tokens (`"a b"`) and inside an
/// `ENV:` default (`ENV:X?="a b"`).
fn tokenize(text: &str) -> DomainResult<Vec<(String, bool)>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        let quoted = c == '"' || c == '\'';
        let mut quote: Option<char> = None;
        while let Some(&c) = chars.peek() {
            let open = quote;
            match open {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c.is_whitespace() => break,
                None if c == '"' || c == '\'' => quote = Some(c),
                None => {}
            }
            token.push(c);
            chars.next();
            if quoted && quote.is_none() && token.len() > 1 {
                break;
            }
        }
        if quote.is_some() {
            return Err(DomainError::InvalidConcatenation {
                text: text.to_string(),
                reason: "unterminated quote".to_string(),
            });
        }
        tokens.push((token, quoted));
    }
    Ok(tokens)
}

fn is_symbol_path(token: &str) -> bool {
    !token.is_empty()
        && token.split(['.', ':']).all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}

/// Parse the payload of a `!concat` scalar.
pub fn parse_concatenation(text: &str) -> DomainResult<Vec<ConcatPart>> {
    tokenize(text)?
        .into_iter()
        .map(|(token, quoted)| {
            if quoted {
                Ok(ConcatPart::Literal(unquote(&token).to_string()))
            } else if let Some(spec) = token.strip_prefix("ENV:") {
                EnvLookup::parse(spec).map(ConcatPart::Env)
            } else if is_symbol_path(&token) {
                Ok(ConcatPart::Symbol(token))
            } else {
                Err(DomainError::InvalidConcatenation {
                    text: text.to_string(),
                    reason: format!("'{}' is neither quoted, ENV: nor a symbol path", token),
                })
            }
        })
        .collect()
}

/// Recognize an untagged plain scalar of the form `ENV:NAME[?=default]`.
pub fn recognize_env(text: &str) -> Option<EnvLookup> {
    let spec = text.strip_prefix("ENV:")?;
    match tokenize(spec) {
        Ok(tokens) if tokens.len() == 1 => EnvLookup::parse(spec).ok(),
        _ => None,
    }
}

/// Recognize an untagged plain scalar made of juxtaposed tokens.
///
/// At least two tokens, at least one of them quoted or `ENV:`, and every bare
/// token a dotted symbol path. Anything else stays a plain string.
pub fn recognize_concatenation(text: &str) -> Option<Vec<ConcatPart>> {
    let tokens = tokenize(text).ok()?;
    if tokens.len() < 2 {
        return None;
    }
    let anchored = tokens
        .iter()
        .any(|(token, quoted)| *quoted || token.starts_with("ENV:"));
    let symbols_dotted = tokens
        .iter()
        .filter(|(token, quoted)| !*quoted && !token.starts_with("ENV:"))
        .all(|(token, _)| token.contains(['.', ':']));
    if !anchored || !symbols_dotted {
        return None;
    }
    parse_concatenation(text).ok()
}

/// Parse `<digits><unit>` with unit one of d, h, w, m, s (any case).
pub fn parse_duration(text: &str) -> DomainResult<chrono::Duration> {
    let invalid = || DomainError::InvalidDuration(text.to_string());
    let trimmed = text.trim();
    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let digits = &trimmed[..trimmed.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: i64 = digits.parse().map_err(|_| invalid())?;
    let duration = match unit.to_ascii_lowercase() {
        'd' => chrono::Duration::try_days(amount),
        'h' => chrono::Duration::try_hours(amount),
        'w' => chrono::Duration::try_weeks(amount),
        'm' => chrono::Duration::try_minutes(amount),
        's' => chrono::Duration::try_seconds(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

pub fn compile_regex(pattern: &str) -> DomainResult<Regex> {
    Regex::new(pattern).map_err(|e| DomainError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
