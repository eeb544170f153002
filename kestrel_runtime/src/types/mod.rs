//! Dynamic values and the value types the dispatch core knows about.

pub mod function;
pub mod result;
pub mod value;

pub use function::{Callable, NativeFn};
pub use result::MultiResult;
pub use value::{HostObject, Value};
