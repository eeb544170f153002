//! Dynamic values observed at call sites.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::object::type_obj::HostType;
use crate::types::function::Callable;
use crate::types::result::MultiResult;

// =============================================================================
// Value
// =============================================================================

/// A runtime value flowing through dynamic operations.
#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(Arc<str>),
    Result(MultiResult),
    Callable(Arc<Callable>),
    Object(HostObject),
}

impl Value {
    /// Build a text value.
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Value::Text(s.into())
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Concrete runtime type of this value. Nil reports `object`.
    pub fn host_type(&self) -> HostType {
        match self {
            Value::Nil => HostType::object(),
            Value::Boolean(_) => HostType::boolean(),
            Value::Integer(_) => HostType::integer(),
            Value::Number(_) => HostType::number(),
            Value::Text(_) => HostType::text(),
            Value::Result(_) => HostType::result(),
            Value::Callable(c) => c.delegate_type().clone(),
            Value::Object(o) => o.host_type().clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&MultiResult> {
        match self {
            Value::Result(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Arc<Callable>> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Result(a), Value::Result(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Result(r) => write!(f, "{r:?}"),
            Value::Callable(c) => write!(f, "<function {}>", c.name()),
            Value::Object(o) => write!(f, "<{} object>", o.host_type()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<MultiResult> for Value {
    fn from(r: MultiResult) -> Self {
        Value::Result(r)
    }
}

// =============================================================================
// Host Object
// =============================================================================

/// An opaque host object: a type handle plus shared host data.
///
/// The dispatch core never looks inside `data`; resolver-produced fragments
/// downcast it.
#[derive(Clone)]
pub struct HostObject {
    ty: HostType,
    data: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(ty: HostType, data: T) -> Self {
        Self {
            ty,
            data: Arc::new(data),
        }
    }

    #[inline]
    pub fn host_type(&self) -> &HostType {
        &self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Identity comparison of the shared data.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject").field("ty", &self.ty).finish_non_exhaustive()
    }
}
