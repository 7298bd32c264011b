//! Core types for amara-core.
//!
//! These types define the contract between compiled component output and the
//! reconciler: dynamic property values, component descriptors, and the child
//! shapes a retained element can hold. Everything else builds on them.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::element::ElementRef;
use crate::error::RuntimeError;
use crate::reactive::ReactiveCell;
use crate::runtime::RenderCtx;

// =============================================================================
// Value - dynamic property payload
// =============================================================================

/// A dynamically typed property value.
///
/// Compiled output has no static schema for props, so values flow through the
/// engine as a closed variant instead of `Box<dyn Any>`. Structured values
/// (`List`, `Map`) are the "struct" kind of a reactive cell; everything else
/// except `Callback` is "scalar".
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Callback(Callback),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Build a map value from key/value pairs.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether this value is structurally shaped (list or map).
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Look up an entry of a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Items of a list value, or an error for any other shape.
    pub fn as_list(&self) -> Result<&[Value], RuntimeError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(RuntimeError::InvalidCall(format!(
                "expected a list value, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(_) => f.write_str("[object]"),
            Self::Callback(_) => f.write_str("[function]"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

// =============================================================================
// Callback - event handlers and callable cell payloads
// =============================================================================

/// A host-invokable function value (event handler, callable cell payload).
///
/// Compared by pointer identity: two callbacks are equal only when they are
/// the same allocation. A re-render that rebuilds a closure therefore produces
/// an unequal value, matching the observable behavior of fresh function
/// objects per render in the source engine.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

// =============================================================================
// Key - list identity
// =============================================================================

/// Identity key for keyed children.
///
/// Explicit keys come from the compiler (`key` prop); positional keys are the
/// fallback when no key was declared.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Properties attached to an element or component.
///
/// `children` rides along with the attribute map because host fibers
/// reconcile `props.children`; attribute equality (`attrs_eq`) deliberately
/// ignores children since child changes surface through the child fibers'
/// own effect flags, not through a parent `Update`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attrs: HashMap<String, Value>,
    pub children: Vec<ChildNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> &HashMap<String, Value> {
        &self.attrs
    }

    /// Attribute-only equality. See the type-level docs for why children are
    /// excluded.
    pub fn attrs_eq(&self, other: &Props) -> bool {
        self.attrs == other.attrs
    }

    /// Shallow-merge a map value into the `style` attribute, preserving
    /// entries the new style does not mention.
    pub fn merge_style(&mut self, style: HashMap<String, Value>) {
        match self.attrs.get_mut("style") {
            Some(Value::Map(existing)) => existing.extend(style),
            _ => {
                self.attrs.insert("style".to_string(), Value::Map(style));
            }
        }
    }
}

// =============================================================================
// Component descriptors
// =============================================================================

/// A component function: receives an explicit render context (hook calls
/// thread through it) and its props, and returns the retained element it
/// rendered.
pub type ComponentFn = Rc<dyn Fn(&mut RenderCtx, &Props) -> Result<ElementRef, RuntimeError>>;

/// What a descriptor resolves to: a host primitive tag or a user component.
#[derive(Clone)]
pub enum ComponentKind {
    Host(String),
    Function(ComponentFn),
}

impl ComponentKind {
    /// Same-type check used by child reconciliation to decide reuse.
    pub fn same_as(&self, other: &ComponentKind) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for ComponentKind {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(tag) => write!(f, "Host({tag})"),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

/// A component descriptor, the unit the compiler hands to `insert_child`,
/// `add_static_child` and list reconciliation.
///
/// `internal = true` marks host/static primitives that take the bailout-first
/// `StaticComponent` path; `false` marks user components requiring the full
/// fiber lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDescriptor {
    pub internal: bool,
    pub component: ComponentKind,
    pub props: Props,
    pub id: Option<String>,
    pub key: Option<Key>,
}

impl ComponentDescriptor {
    /// Descriptor for a host primitive (`internal = true`).
    pub fn host(tag: impl Into<String>, props: Props) -> Self {
        Self {
            internal: true,
            component: ComponentKind::Host(tag.into()),
            props,
            id: None,
            key: None,
        }
    }

    /// Descriptor for a user component (`internal = false`).
    pub fn function(f: ComponentFn, props: Props) -> Self {
        Self {
            internal: false,
            component: ComponentKind::Function(f),
            props,
            id: None,
            key: None,
        }
    }

    /// Descriptor for an internal (static) component function.
    pub fn static_function(f: ComponentFn, props: Props) -> Self {
        Self {
            internal: true,
            component: ComponentKind::Function(f),
            props,
            id: None,
            key: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

// =============================================================================
// ChildNode - what a retained element's children array can hold
// =============================================================================

/// One slot of a children collection.
///
/// Ordered and possibly mixed: opaque sub-elements, component descriptors,
/// plain strings, and reactive cells (rendered as text).
#[derive(Clone, Debug, PartialEq)]
pub enum ChildNode {
    Element(ElementRef),
    Descriptor(ComponentDescriptor),
    Text(String),
    Cell(ReactiveCell),
}

impl ChildNode {
    /// The stable id of this slot, when it carries one.
    pub fn slot_id(&self) -> Option<String> {
        match self {
            Self::Element(el) => el.id(),
            Self::Descriptor(d) => d.id.clone(),
            _ => None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

// =============================================================================
// Tests
// =============================================================================
