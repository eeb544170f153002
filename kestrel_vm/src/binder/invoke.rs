//! Invoke and invoke-member binders.
//!
//! # Hidden Parameters
//!
//! A callable value exposes two parameter lists: the declared invoke
//! signature of its delegate type and the reflected parameters of the method
//! behind it. When their lengths differ, the extra leading reflected
//! parameters were bound when the value was created (a closure environment or
//! receiver) and are not supplied by the caller:
//!
//! ```text
//!   declared : (a, b)
//!   reflected: (env, a, b)   ──►  formal: (a, b)
//! ```
//!
//! This is a heuristic. A reflected list shorter than the declared one is
//! passed through unchanged.

use std::iter;
use std::sync::Arc;

use kestrel_runtime::{Callable, Fragment, Guard, GuardedFragment, HostType, OperandDescriptor, Parameter, Value};

use super::{Binding, BinderStats, Deferral, TARGET, ensure_result, signature_guard};
use crate::context::RuntimeContext;
use crate::error_fragment;
use crate::shape::{CallShape, InvokeMemberKey};

/// Formal parameters a caller must supply to `callable`.
pub fn formal_parameters(callable: &Callable) -> &[Parameter] {
    let reflected = callable.parameters();
    match callable.delegate_type().invoke_signature() {
        Some(declared) if declared.len() != reflected.len() => {
            let hidden = reflected.len().saturating_sub(declared.len());
            if hidden > 0 {
                tracing::trace!(callable = callable.name(), hidden, "stripping hidden parameters");
            }
            &reflected[hidden..]
        }
        _ => reflected,
    }
}

/// What a bound call depends on beyond the delegate type: the return type
/// when the formal list is the declared signature, otherwise the value itself.
fn callable_guard(callable: &Arc<Callable>, formal: &[Parameter]) -> Guard {
    match callable.delegate_type().invoke_signature() {
        Some(declared) if declared == formal => Guard::returns(TARGET, callable.return_type().clone()),
        _ => Guard::same_callable(TARGET, callable),
    }
}

// =============================================================================
// Invoke
// =============================================================================

/// Binds `target(args...)`. Operands are `[target, args...]`.
#[derive(Debug)]
pub struct InvokeBinder {
    context: Arc<RuntimeContext>,
    call: CallShape,
    return_type: HostType,
    stats: BinderStats,
}

impl InvokeBinder {
    pub fn new(context: Arc<RuntimeContext>, call: CallShape) -> Self {
        Self {
            context,
            call,
            return_type: HostType::result(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn call(&self) -> &CallShape {
        &self.call
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(
        &self,
        target: &OperandDescriptor,
        args: &[OperandDescriptor],
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        if let Some(deferral) = Deferral::collect(iter::once(target).chain(args)) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::NIL_NOT_CALLABLE,
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        let guard = signature_guard(target, args);
        let Some(callable) = target.value().and_then(Value::as_callable) else {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::not_callable(target.limit_type().name()),
                &self.return_type,
                guard,
            ));
        };

        let formal = formal_parameters(callable);
        let guard = guard.merge(callable_guard(callable, formal));
        let callee = target.fragment(TARGET);
        let call_type = callable.return_type().clone();
        let invoke = move |bound: Vec<Fragment>| Fragment::invoke(callee.clone(), bound, call_type.clone());

        let rule = match self.context.resolver().bind_parameters(formal, &self.call, args, &invoke) {
            Ok(fragment) => GuardedFragment::new(ensure_result(fragment, &self.context), guard),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}

// =============================================================================
// Invoke Member
// =============================================================================

/// Binds `target:name(args...)`. Operands are `[target, args...]`.
///
/// A target that is itself a callable value is redirected to the direct
/// invoke binder of the same call shape.
#[derive(Debug)]
pub struct InvokeMemberBinder {
    context: Arc<RuntimeContext>,
    key: InvokeMemberKey,
    fallback_invoke: Arc<InvokeBinder>,
    return_type: HostType,
    stats: BinderStats,
}

impl InvokeMemberBinder {
    /// `fallback_invoke` must be the cache's invoke binder for `key.call`.
    pub fn new(context: Arc<RuntimeContext>, key: InvokeMemberKey, fallback_invoke: Arc<InvokeBinder>) -> Self {
        debug_assert_eq!(fallback_invoke.call(), &key.call);
        Self {
            context,
            key,
            fallback_invoke,
            return_type: HostType::result(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn key(&self) -> &InvokeMemberKey {
        &self.key
    }

    #[inline]
    pub fn call(&self) -> &CallShape {
        &self.key.call
    }

    /// The direct invoke binder used for callable targets.
    #[inline]
    pub fn fallback_invoke(&self) -> &Arc<InvokeBinder> {
        &self.fallback_invoke
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(
        &self,
        target: &OperandDescriptor,
        args: &[OperandDescriptor],
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        if let Some(deferral) = Deferral::collect(iter::once(target).chain(args)) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::NIL_NOT_CALLABLE,
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        if target.value().is_some_and(|v| v.as_callable().is_some()) {
            tracing::trace!(member = %self.key, "redirecting callable target to invoke binder");
            return self.fallback_invoke.bind(target, args, fallback);
        }

        let member = &self.key.member;
        let identity = self.context.types().identity(&target.limit_type());
        let guard = signature_guard(target, args);
        let resolved = self.context.resolver().try_invoke_member(
            &identity,
            &self.key.call,
            target,
            args,
            &member.name,
            member.ignore_case,
        );

        let rule = match resolved {
            Ok(Some(fragment)) => GuardedFragment::new(ensure_result(fragment, &self.context), guard),
            Ok(None) => error_fragment::fallback_or_raise(
                fallback,
                error_fragment::member_not_resolved(identity.full_name(), &member.name),
                &self.return_type,
                guard,
            ),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}
