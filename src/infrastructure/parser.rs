//! YAML document parser
//!
//! Drives the yaml-rust2 event parser and builds [`Value`] trees directly,
//! turning tagged nodes into placeholders on the way. Plain untagged scalars
//! are typed (int, float, bool, null) and, when enabled, checked for the
//! implicit `ENV:` and concatenation forms.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::placeholder::{
    parse_concatenation, recognize_concatenation, recognize_env, EnvLookup,
};
use crate::domain::{DomainError, DomainResult, Extends, Factory, Mapping, Placeholder, Value};

/// Custom constructor for a tag, given the scalar text or the built collection.
pub type TagHandler = Rc<dyn Fn(Value) -> DomainResult<Value>>;

/// Tag name (without the leading `!`) to handler.
pub type TagHandlers = HashMap<String, TagHandler>;

const CORE_SCHEMA: &str = "tag:yaml.org,2002:";

/// How plain scalars and tags are interpreted.
#[derive(Clone, Copy)]
pub struct ParseOptions<'a> {
    pub tags: &'a TagHandlers,
    pub implicit_env: bool,
    pub implicit_concat: bool,
    /// File name or description used in error messages
    pub origin: &'a str,
}

/// Parse one YAML document. An empty document yields [`Value::Null`].
pub fn parse_document(text: &str, options: ParseOptions<'_>) -> ApplicationResult<Value> {
    let mut parser = Parser::new_from_str(text);
    let mut builder = DocumentBuilder::new(options);

    parser
        .load(&mut builder, false)
        .map_err(|e| ApplicationError::Parse {
            origin: options.origin.to_string(),
            message: e.to_string(),
        })?;

    builder.finish()
}

enum Frame {
    Sequence {
        anchor: usize,
        tag: Option<Tag>,
        items: Vec<Value>,
    },
    Mapping {
        anchor: usize,
        tag: Option<Tag>,
        entries: Mapping,
        key: Option<String>,
    },
}

/// Tag after handle resolution.
enum TagName<'t> {
    Core(&'t str),
    Local(String),
}

fn tag_name(tag: &Tag) -> TagName<'_> {
    match tag.handle.as_str() {
        "!!" | CORE_SCHEMA => TagName::Core(&tag.suffix),
        "!" => TagName::Local(tag.suffix.clone()),
        "" => match tag.suffix.strip_prefix(CORE_SCHEMA) {
            Some(core) => TagName::Core(core),
            None => TagName::Local(tag.suffix.trim_start_matches('!').to_string()),
        },
        handle => TagName::Local(format!("{}{}", handle, tag.suffix)),
    }
}

struct DocumentBuilder<'a> {
    options: ParseOptions<'a>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
    error: Option<ApplicationError>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(options: ParseOptions<'a>) -> Self {
        Self {
            options,
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            error: None,
        }
    }

    fn finish(self) -> ApplicationResult<Value> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.root.unwrap_or(Value::Null)),
        }
    }

    fn fail(&mut self, marker: &Marker, message: impl std::fmt::Display) {
        if self.error.is_none() {
            self.error = Some(ApplicationError::Parse {
                origin: self.options.origin.to_string(),
                message: format!("line {} column {}: {}", marker.line(), marker.col() + 1, message),
            });
        }
    }

    fn remember(&mut self, anchor: usize, value: &Value) {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
    }

    fn push_complete(&mut self, value: Value, marker: &Marker) {
        let rejected = match self.stack.last_mut() {
            None => {
                self.root = Some(value);
                None
            }
            Some(Frame::Sequence { items, .. }) => {
                items.push(value);
                None
            }
            Some(Frame::Mapping { entries, key, .. }) => match key.take() {
                Some(k) => {
                    entries.insert(k, value);
                    None
                }
                None => match mapping_key(&value) {
                    Some(k) => {
                        *key = Some(k);
                        None
                    }
                    None => Some(value.type_label()),
                },
            },
        };
        if let Some(label) = rejected {
            self.fail(marker, format!("unsupported mapping key of type {}", label));
        }
    }

    fn scalar(&self, text: String, style: TScalarStyle, tag: Option<Tag>) -> DomainResult<Value> {
        let Some(tag) = tag else {
            return Ok(if matches!(style, TScalarStyle::Plain) {
                self.plain_scalar(text)
            } else {
                Value::String(text)
            });
        };
        match tag_name(&tag) {
            TagName::Core(core) => Ok(core_scalar(core, text)),
            TagName::Local(name) => {
                if let Some(handler) = self.options.tags.get(&name) {
                    return handler(Value::String(text));
                }
                builtin_scalar(&name, text)
            }
        }
    }

    fn plain_scalar(&self, text: String) -> Value {
        if self.options.implicit_env {
            if let Some(lookup) = recognize_env(&text) {
                return Value::Placeholder(Placeholder::EnvironmentLookup(lookup));
            }
        }
        if self.options.implicit_concat {
            if let Some(parts) = recognize_concatenation(&text) {
                return Value::Placeholder(Placeholder::Concatenation(parts));
            }
        }
        typed_scalar(text)
    }

    fn collection(&self, value: Value, tag: Option<Tag>) -> DomainResult<Value> {
        let Some(tag) = tag else {
            return Ok(value);
        };
        match tag_name(&tag) {
            TagName::Core(_) => Ok(value),
            TagName::Local(name) => {
                if let Some(handler) = self.options.tags.get(&name) {
                    return handler(value);
                }
                builtin_collection(&name, value)
            }
        }
    }
}

impl MarkedEventReceiver for DocumentBuilder<'_> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Scalar(text, style, anchor, tag) => {
                trace!(%text, "scalar");
                match self.scalar(text, style, tag) {
                    Ok(value) => {
                        self.remember(anchor, &value);
                        self.push_complete(value, &marker);
                    }
                    Err(e) => self.fail(&marker, e),
                }
            }

            Event::SequenceStart(anchor, tag) => self.stack.push(Frame::Sequence {
                anchor,
                tag,
                items: Vec::new(),
            }),

            Event::MappingStart(anchor, tag) => self.stack.push(Frame::Mapping {
                anchor,
                tag,
                entries: Mapping::new(),
                key: None,
            }),

            Event::SequenceEnd | Event::MappingEnd => {
                let (anchor, tag, value) = match self.stack.pop() {
                    Some(Frame::Sequence { anchor, tag, items }) => (anchor, tag, Value::List(items)),
                    Some(Frame::Mapping {
                        anchor,
                        tag,
                        entries,
                        ..
                    }) => (anchor, tag, Value::Map(entries)),
                    None => {
                        self.fail(&marker, "collection end without start");
                        return;
                    }
                };
                match self.collection(value, tag) {
                    Ok(value) => {
                        self.remember(anchor, &value);
                        self.push_complete(value, &marker);
                    }
                    Err(e) => self.fail(&marker, e),
                }
            }

            Event::Alias(id) => match self.anchors.get(&id).cloned() {
                Some(value) => self.push_complete(value, &marker),
                None => self.fail(&marker, format!("unknown anchor {}", id)),
            },
        }
    }
}

fn mapping_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Null => value.scalar_text(),
        _ => None,
    }
}

/// Type an untagged plain scalar the way YAML 1.1 readers do.
fn typed_scalar(text: String) -> Value {
    match text.as_str() {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" => {
            return Value::Bool(true)
        }
        "false" | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => {
            return Value::Bool(false)
        }
        ".inf" | ".Inf" | ".INF" | "+.inf" => return Value::Float(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Value::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Value::Float(f64::NAN),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Some(hex) = text.strip_prefix("0x") {
        if let Ok(i) = i64::from_str_radix(hex, 16) {
            return Value::Int(i);
        }
    }
    if let Some(oct) = text.strip_prefix("0o") {
        if let Ok(i) = i64::from_str_radix(oct, 8) {
            return Value::Int(i);
        }
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::String(text)
}

fn core_scalar(core: &str, text: String) -> Value {
    match core {
        "str" => Value::String(text),
        "int" | "float" | "bool" | "null" => match typed_scalar(text.clone()) {
            Value::String(_) => Value::String(text),
            typed => typed,
        },
        _ => typed_scalar(text),
    }
}

fn builtin_scalar(name: &str, text: String) -> DomainResult<Value> {
    let placeholder = match name {
        "timedelta" => Placeholder::Duration(text),
        "re" => Placeholder::Regex(text),
        "envvar" => Placeholder::EnvironmentLookup(EnvLookup::parse(&text)?),
        "concat" => Placeholder::Concatenation(parse_concatenation(&text)?),
        _ => return prefixed(name, Scalar(text)),
    };
    Ok(Value::Placeholder(placeholder))
}

fn builtin_collection(name: &str, value: Value) -> DomainResult<Value> {
    match value {
        Value::Map(map) => prefixed(name, Collection(map)),
        other => Err(unsupported(name, &other.type_label())),
    }
}

/// Payload of a prefixed tag (`!ref:path`, `!factory:name`, ...).
enum Payload {
    Scalar(String),
    Collection(Mapping),
}
use Payload::{Collection, Scalar};

fn prefixed(name: &str, payload: Payload) -> DomainResult<Value> {
    let Some((kind, target)) = name.split_once(':') else {
        return Err(unsupported(name, "any node"));
    };
    let placeholder = match (kind, payload) {
        ("ref", Scalar(_)) => Placeholder::Reference(target.to_string()),
        ("obj", Scalar(_)) => Placeholder::ObjectImport(target.to_string()),
        ("include", Scalar(_)) => Placeholder::Include(target.to_string()),
        ("include" | "extends", Collection(map)) => {
            Placeholder::Extends(Extends::new(target, map))
        }
        ("extends", Scalar(text)) if text.is_empty() => {
            Placeholder::Extends(Extends::new(target, Mapping::new()))
        }
        ("factory", Collection(map)) => Placeholder::Factory(Factory::named(target, map)),
        ("factory", Scalar(text)) if text.is_empty() => {
            Placeholder::Factory(Factory::named(target, Mapping::new()))
        }
        (_, Scalar(_)) => return Err(unsupported(name, "a scalar")),
        (_, Collection(_)) => return Err(unsupported(name, "a mapping")),
    };
    Ok(Value::Placeholder(placeholder))
}

fn unsupported(name: &str, node: &str) -> DomainError {
    DomainError::InvalidTag {
        tag: name.to_string(),
        reason: format!("cannot be applied to {}", node),
    }
}
