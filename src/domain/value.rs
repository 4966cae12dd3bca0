//! Values stored in configuration trees

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;

use crate::domain::arena::NodeId;
use crate::domain::placeholder::Placeholder;

/// Detached, insertion-ordered mapping.
pub type Mapping = IndexMap<String, Value>;

/// Build a [`Mapping`] from key/value pairs.
pub fn mapping<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Mapping
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Runtime instance exposing attributes to reference paths.
///
/// `!ref:service.client.timeout` walks into `service` once it has been
/// constructed; every segment after the node boundary is looked up here.
pub trait Component: Any {
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }
}

type AttrFn = fn(&dyn Any, &str) -> Option<Value>;

fn attr_of<T: Component>(inner: &dyn Any, name: &str) -> Option<Value> {
    inner.downcast_ref::<T>().and_then(|t| t.attr(name))
}

/// Shared handle to a constructed or registered object.
///
/// Cloning shares the instance; equality is identity.
#[derive(Clone)]
pub struct Object {
    inner: Rc<dyn Any>,
    type_name: &'static str,
    attr: AttrFn,
}

impl Object {
    pub fn new<T: Component>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    pub fn from_rc<T: Component>(value: Rc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
            attr: attr_of::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn attr(&self, name: &str) -> Option<Value> {
        (self.attr)(self.inner.as_ref(), name)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_rc<T: Any>(&self) -> Option<Rc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object<{}>", self.type_name)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Duration(chrono::Duration),
    Regex(Regex),
    List(Vec<Value>),
    /// Mapping not (yet) attached to a configuration
    Map(Mapping),
    /// Mapping attached to a configuration arena
    Node(NodeId),
    Object(Object),
    Placeholder(Placeholder),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Placeholder(_))
    }

    /// True if a placeholder is stored here or anywhere inside lists and maps.
    pub fn has_placeholder(&self) -> bool {
        match self {
            Value::Placeholder(_) => true,
            Value::List(items) => items.iter().any(Value::has_placeholder),
            Value::Map(map) => map.values().any(Value::has_placeholder),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<chrono::Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Value::Regex(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Value::Placeholder(p) => Some(p),
            _ => None,
        }
    }

    /// Downcast an object value to its concrete type.
    pub fn downcast_rc<T: Any>(&self) -> Option<Rc<T>> {
        self.as_object().and_then(Object::downcast_rc::<T>)
    }

    /// Plain text form of scalar values, used when strings are glued together.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Short name of the value kind, for diagnostics.
    pub fn type_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Duration(_) => "duration".to_string(),
            Value::Regex(_) => "regex".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) | Value::Node(_) => "mapping".to_string(),
            Value::Object(obj) => obj.type_name().to_string(),
            Value::Placeholder(p) => p.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Placeholder(a), Value::Placeholder(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Regex(r) => write!(f, "{}", r.as_str()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Node(_) => write!(f, "<mapping>"),
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
            Value::Placeholder(p) => write!(f, "{}", p),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<chrono::Duration> for Value {
    fn from(d: chrono::Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<Regex> for Value {
    fn from(r: Regex) -> Self {
        Value::Regex(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Map(map)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Placeholder> for Value {
    fn from(p: Placeholder) -> Self {
        Value::Placeholder(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Endpoint {
        port: i64,
    }

    impl Component for Endpoint {
        fn attr(&self, name: &str) -> Option<Value> {
            match name {
                "port" => Some(Value::Int(self.port)),
                _ => None,
            }
        }
    }

    #[test]
    fn given_object_when_cloned_then_identity_is_shared() {
        let obj = Object::new(Endpoint { port: 80 });
        let other = Object::new(Endpoint { port: 80 });

        assert_eq!(Value::Object(obj.clone()), Value::Object(obj.clone()));
        assert_ne!(Value::Object(obj), Value::Object(other));
    }

    #[test]
    fn given_component_when_attr_requested_then_exposed() {
        let obj = Object::new(Endpoint { port: 8080 });

        assert_eq!(obj.attr("port"), Some(Value::Int(8080)));
        assert_eq!(obj.attr("host"), None);
        assert_eq!(obj.downcast_rc::<Endpoint>().map(|e| e.port), Some(8080));
    }

    #[test]
    fn given_nested_list_when_checked_then_finds_placeholder() {
        let value = Value::List(vec![
            Value::Int(1),
            Value::Map(mapping([(
                "inner",
                Value::Placeholder(Placeholder::Reference("a".into())),
            )])),
        ]);

        assert!(value.has_placeholder());
        assert!(!Value::List(vec![Value::Int(1)]).has_placeholder());
    }
}
