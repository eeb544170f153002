//! Get-index and set-index binders.

use std::iter;
use std::sync::Arc;

use kestrel_runtime::{Guard, GuardedFragment, HostType, OperandDescriptor};

use super::{Binding, BinderStats, Deferral, TARGET, ensure_type, signature_guard};
use crate::context::RuntimeContext;
use crate::error_fragment;
use crate::shape::CallShape;

/// Binds `target[indexes...]` reads. Operands are `[target, indexes...]`.
#[derive(Debug)]
pub struct GetIndexBinder {
    context: Arc<RuntimeContext>,
    call: CallShape,
    return_type: HostType,
    stats: BinderStats,
}

impl GetIndexBinder {
    pub fn new(context: Arc<RuntimeContext>, call: CallShape) -> Self {
        Self {
            context,
            call,
            return_type: HostType::object(),
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
        indexes: &[OperandDescriptor],
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        if let Some(deferral) = Deferral::collect(iter::once(target).chain(indexes)) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::NULL_REFERENCE,
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        let guard = signature_guard(target, indexes);
        let rule = match self.context.resolver().get_index(target, indexes) {
            Ok(fragment) => GuardedFragment::new(ensure_type(fragment, &self.return_type), guard),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}

/// Binds `target[indexes...] = value` writes. Operands are
/// `[target, indexes..., value]`.
#[derive(Debug)]
pub struct SetIndexBinder {
    context: Arc<RuntimeContext>,
    call: CallShape,
    return_type: HostType,
    stats: BinderStats,
}

impl SetIndexBinder {
    pub fn new(context: Arc<RuntimeContext>, call: CallShape) -> Self {
        Self {
            context,
            call,
            return_type: HostType::object(),
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
        indexes: &[OperandDescriptor],
        value: &OperandDescriptor,
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        let operands = iter::once(target).chain(indexes).chain(iter::once(value));
        if let Some(deferral) = Deferral::collect(operands) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::NULL_REFERENCE,
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        let guard = signature_guard(target, indexes).merge(Guard::simple(indexes.len() + 1, value));
        let rule = match self.context.resolver().set_index(target, indexes, value) {
            Ok(fragment) => GuardedFragment::new(ensure_type(fragment, &self.return_type), guard),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}
