//! Host function values.
//!
//! A [`Callable`] pairs a native body with two parameter views:
//!
//! - the **declared** signature of its delegate type (what callers see), and
//! - the **reflected** parameter list of the underlying method, which may
//!   carry extra leading parameters that were bound when the value was
//!   created (closure environments, bound receivers).
//!
//! The invoke binder reconciles the two; see `kestrel_vm::binder::invoke`.

use std::fmt;
use std::sync::Arc;

use crate::error::RuntimeResult;
use crate::object::type_obj::{HostType, Parameter};
use crate::types::value::Value;

/// Native body of a host function. Receives the visible arguments only.
pub type NativeFn = dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync;

/// An invocable host function value.
pub struct Callable {
    name: Arc<str>,
    delegate: HostType,
    parameters: Vec<Parameter>,
    return_type: HostType,
    body: Arc<NativeFn>,
}

impl Callable {
    /// Create a callable whose reflected parameters match its declared ones.
    pub fn new<F>(
        name: impl Into<Arc<str>>,
        delegate: HostType,
        return_type: HostType,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        let parameters = delegate.invoke_signature().map(<[_]>::to_vec).unwrap_or_default();
        Self::with_parameters(name, delegate, parameters, return_type, body)
    }

    /// Create a callable with an explicit reflected parameter list.
    pub fn with_parameters<F>(
        name: impl Into<Arc<str>>,
        delegate: HostType,
        parameters: Vec<Parameter>,
        return_type: HostType,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            delegate,
            parameters,
            return_type,
            body: Arc::new(body),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The delegate type this value is an instance of.
    #[inline]
    pub fn delegate_type(&self) -> &HostType {
        &self.delegate
    }

    /// Reflected parameters of the underlying method.
    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn return_type(&self) -> &HostType {
        &self.return_type
    }

    /// Run the native body.
    pub fn call(&self, args: &[Value]) -> RuntimeResult<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("delegate", &self.delegate)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}
