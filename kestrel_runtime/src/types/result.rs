//! Multi-value results.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::types::value::Value;

/// Immutable list of values returned by an invocation.
///
/// Cloning shares the underlying storage, which makes a single empty
/// instance usable as a canonical "no results" value.
#[derive(Clone)]
pub struct MultiResult(Arc<[Value]>);

impl MultiResult {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values.into())
    }

    /// A fresh empty result. Runtimes keep one of these as their canonical
    /// empty result; compare with [`ptr_eq`](Self::ptr_eq).
    pub fn empty() -> Self {
        Self(Arc::from(Vec::<Value>::new()))
    }

    /// First value, or nil.
    pub fn first(&self) -> Value {
        self.0.first().cloned().unwrap_or(Value::Nil)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Whether both handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for MultiResult {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl PartialEq for MultiResult {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0[..] == other.0[..]
    }
}

impl fmt::Debug for MultiResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl From<Vec<Value>> for MultiResult {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
