//! Error fragment synthesis.
//!
//! Binders never let a failure escape: nil targets, unresolvable members and
//! resolver errors all become guarded fragments that raise a language error
//! when the call site runs them. This module owns the message texts.

use kestrel_runtime::{Fragment, Guard, GuardedFragment, HostType};

use crate::resolver::ResolveError;

pub const NULL_REFERENCE: &str = "attempt to index a nil value";
pub const NIL_NOT_CALLABLE: &str = "attempt to call a nil value";
pub const NIL_OPERATOR: &str = "attempt to perform arithmetic on a nil value";

pub fn cannot_read_member(type_name: &str, member: &str) -> String {
    format!("cannot read member '{member}' of type '{type_name}'")
}

pub fn cannot_write_member(type_name: &str, member: &str) -> String {
    format!("cannot write member '{member}' of type '{type_name}'")
}

pub fn member_not_found(type_name: &str, member: &str) -> String {
    format!("member '{member}' not found on type '{type_name}'")
}

pub fn member_not_resolved(type_name: &str, member: &str) -> String {
    format!("member '{member}' not resolved on type '{type_name}'")
}

pub fn not_callable(type_name: &str) -> String {
    format!("type '{type_name}' is not callable")
}

/// Fragment raising `message`, typed as `return_type`.
pub fn raise(message: impl Into<String>, return_type: &HostType) -> Fragment {
    let message = message.into();
    tracing::trace!(%message, "error fragment synthesized");
    Fragment::raise(message, return_type.clone())
}

/// The caller's fallback if any, otherwise a raising rule under `guard`.
pub fn fallback_or_raise(
    fallback: Option<GuardedFragment>,
    message: impl Into<String>,
    return_type: &HostType,
    guard: Guard,
) -> GuardedFragment {
    match fallback {
        Some(rule) => rule,
        None => GuardedFragment::new(raise(message, return_type), guard),
    }
}

/// The caller's fallback if any, otherwise a rule raising the resolver's
/// message verbatim.
pub fn from_resolve_error(
    error: ResolveError,
    fallback: Option<GuardedFragment>,
    return_type: &HostType,
    guard: Guard,
) -> GuardedFragment {
    tracing::debug!(%error, fallback = fallback.is_some(), "resolution failed");
    fallback_or_raise(fallback, error.to_string(), return_type, guard)
}
