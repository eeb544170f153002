//! The resolver contract.
//!
//! The resolver is the host type system's half of dynamic dispatch: given
//! operand types and an operation it produces a fragment implementing the
//! operation, or reports why it cannot. Binders own everything around it
//! (deferral, nil handling, guards, error synthesis); the resolver only
//! matches members, overloads, operators and conversions.
//!
//! # Operand Layout
//!
//! Fragments read operands by position. Every operation uses the same layout
//! for its operand vector:
//!
//! ```text
//!   [ target | index or argument operands ... | value ]
//!     0        1 ..= n                           n + 1
//! ```
//!
//! Binary operators use `[left, right]`. A resolver builds operand reads with
//! [`OperandDescriptor::fragment`] or [`Fragment::operand`] at these positions.
//!
//! # Errors
//!
//! Failures are returned as [`ResolveError`] values. They never escape a
//! binder: each is converted into a guarded fragment raising a language error
//! with the error's message.

use kestrel_runtime::{Fragment, HostType, OperandDescriptor, Parameter};
use thiserror::Error;

use crate::operator::{BinaryOperator, UnaryOperator};
use crate::shape::CallShape;

// =============================================================================
// Resolution Errors
// =============================================================================

/// Why the resolver could not produce a fragment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("operator '{operator}' is not supported for '{left}' and '{right}'")]
    UnsupportedOperator {
        operator: String,
        left: String,
        right: String,
    },

    #[error("no indexer on '{target}' accepts ({indexes})")]
    NoIndexer { target: String, indexes: String },

    #[error("ambiguous call to '{member}' on '{target}'")]
    AmbiguousOverload { target: String, member: String },

    #[error("no overload of '{member}' accepts {argument_count} argument(s)")]
    ParameterMismatch {
        member: String,
        argument_count: usize,
    },

    #[error("cannot convert '{from}' to '{to}'")]
    NoConversion { from: String, to: String },

    #[error("{0}")]
    Other(String),
}

/// Result type for resolver primitives.
pub type ResolveResult<T> = Result<T, ResolveError>;

// =============================================================================
// Outcomes
// =============================================================================

/// Outcome of a member read lookup.
#[derive(Debug, Clone)]
pub enum MemberRead {
    /// Fragment reading the member from operand 0.
    Resolved(Fragment),
    /// The member exists but cannot be read.
    NotReadable,
    /// No member of that name.
    NotFound,
}

/// Outcome of a member write lookup.
#[derive(Debug, Clone)]
pub enum MemberWrite {
    /// Fragment storing the converted value into the member of operand 0.
    Resolved(Fragment),
    /// The member exists but cannot be written.
    NotWritable,
    /// No member of that name.
    NotFound,
}

/// Callback building a fragment that converts the assigned value (operand 1)
/// to the member's declared type.
pub type ValueConverter<'a> = dyn Fn(&HostType) -> ResolveResult<Fragment> + 'a;

/// Callback building the invocation of the target (operand 0) from bound
/// argument fragments.
pub type InvokeBuilder<'a> = dyn Fn(Vec<Fragment>) -> Fragment + 'a;

// =============================================================================
// Resolver
// =============================================================================

/// Host type-resolution subsystem consumed by the binders.
///
/// Implementations must be deterministic for equal inputs and must not
/// mutate shared state: binders may resolve the same shape concurrently and
/// keep whichever result they computed.
pub trait Resolver: Send + Sync {
    /// Read member `name` of a value of type `target`.
    fn try_get_member(&self, target: &HostType, name: &str, ignore_case: bool) -> MemberRead;

    /// Write member `name` of a value of type `target`. `convert_value`
    /// coerces the assigned value to the member's type.
    fn try_set_member(
        &self,
        target: &HostType,
        name: &str,
        ignore_case: bool,
        convert_value: &ValueConverter<'_>,
    ) -> MemberWrite;

    /// Indexed read: `target[indexes...]`.
    fn get_index(
        &self,
        target: &OperandDescriptor,
        indexes: &[OperandDescriptor],
    ) -> ResolveResult<Fragment>;

    /// Indexed write: `target[indexes...] = value`.
    fn set_index(
        &self,
        target: &OperandDescriptor,
        indexes: &[OperandDescriptor],
        value: &OperandDescriptor,
    ) -> ResolveResult<Fragment>;

    /// Call member `name` on `target`, resolving overloads against the
    /// type identity `identity`. `Ok(None)` means no member matched.
    fn try_invoke_member(
        &self,
        identity: &HostType,
        call: &CallShape,
        target: &OperandDescriptor,
        args: &[OperandDescriptor],
        name: &str,
        ignore_case: bool,
    ) -> ResolveResult<Option<Fragment>>;

    /// Match `args` against the formal parameters of a callable and build the
    /// call through `invoke`.
    fn bind_parameters(
        &self,
        formal: &[Parameter],
        call: &CallShape,
        args: &[OperandDescriptor],
        invoke: &InvokeBuilder<'_>,
    ) -> ResolveResult<Fragment>;

    /// Resolve `left op right`.
    fn binary_operation(
        &self,
        operator: BinaryOperator,
        left: &OperandDescriptor,
        right: &OperandDescriptor,
    ) -> ResolveResult<Fragment>;

    /// Resolve `op operand`.
    fn unary_operation(
        &self,
        operator: UnaryOperator,
        operand: &OperandDescriptor,
    ) -> ResolveResult<Fragment>;

    /// Convert the value produced by `source` to `destination`.
    fn try_convert(&self, source: &Fragment, destination: &HostType) -> ResolveResult<Fragment>;
}
