//! Operand descriptors.
//!
//! A descriptor is what a binder sees of one operand at a call site: the
//! static type the compiler knew, plus the concrete value once it exists.
//!
//! ```text
//!   unknown(static)      known(value)          known(nil)
//!   ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!   │ limit=static│      │ limit=value │      │ limit=static│
//!   │ value=None  │      │ value=Some  │      │ value=Nil   │
//!   └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! Binders must check [`OperandDescriptor::is_known`] on every operand they
//! need before reading any value.

use crate::fragment::Fragment;
use crate::object::type_obj::HostType;
use crate::types::value::Value;

/// Runtime-observed view of one call-site operand.
#[derive(Debug, Clone)]
pub struct OperandDescriptor {
    static_type: HostType,
    value: Option<Value>,
}

impl OperandDescriptor {
    /// An operand whose value is not available yet.
    pub fn unknown(static_type: HostType) -> Self {
        Self {
            static_type,
            value: None,
        }
    }

    /// An operand with a concrete value and no static type information.
    pub fn known(value: Value) -> Self {
        Self::known_as(value, HostType::object())
    }

    /// An operand with a concrete value observed through `static_type`.
    pub fn known_as(value: Value, static_type: HostType) -> Self {
        Self {
            static_type,
            value: Some(value),
        }
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the operand is known to be nil.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self.value, Some(Value::Nil))
    }

    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[inline]
    pub fn static_type(&self) -> &HostType {
        &self.static_type
    }

    /// The most specific type known for the operand: the value's runtime
    /// type when a non-nil value is present, otherwise the static type.
    pub fn limit_type(&self) -> HostType {
        match &self.value {
            Some(value) if !value.is_nil() => value.host_type(),
            _ => self.static_type.clone(),
        }
    }

    /// Fragment reading this operand from `position` of the operand vector.
    pub fn fragment(&self, position: usize) -> Fragment {
        Fragment::operand(position, self.limit_type())
    }
}
