//! Host object model for the Kestrel dynamic-dispatch core.
//!
//! This crate provides:
//! - Host type handles and the type registry
//! - Dynamic values (scalars, text, multi-value results, callables, host objects)
//! - Operand descriptors observed at call sites
//! - Executable fragments and the guards that protect them
//! - Language-level runtime errors raised by fragments

pub mod error;
pub mod fragment;
pub mod guard;
pub mod object;
pub mod operand;
pub mod types;

// Re-export commonly used items
pub use error::{RuntimeError, RuntimeResult};
pub use fragment::{Fragment, HostFn};
pub use guard::{Check, Guard, GuardedFragment};
pub use object::registry::TypeRegistry;
pub use object::type_obj::{HostType, Parameter, TypeId, TypeKind};
pub use operand::OperandDescriptor;
pub use types::{Callable, HostObject, MultiResult, NativeFn, Value};
