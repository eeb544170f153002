//! Host object model: type handles and the type registry.

pub mod registry;
pub mod type_obj;

pub use registry::TypeRegistry;
pub use type_obj::{HostType, Parameter, TypeId, TypeKind};
