//! Get-member and set-member binders.

use std::sync::Arc;

use kestrel_runtime::{Fragment, Guard, GuardedFragment, HostType, OperandDescriptor};

use super::{Binding, BinderStats, Deferral, TARGET, ensure_type};
use crate::context::RuntimeContext;
use crate::error_fragment;
use crate::resolver::{MemberRead, MemberWrite, ResolveResult};
use crate::shape::MemberKey;

const VALUE: usize = 1;

// =============================================================================
// Get Member
// =============================================================================

/// Binds `target.name` reads.
#[derive(Debug)]
pub struct GetMemberBinder {
    context: Arc<RuntimeContext>,
    key: MemberKey,
    return_type: HostType,
    stats: BinderStats,
}

impl GetMemberBinder {
    pub fn new(context: Arc<RuntimeContext>, key: MemberKey) -> Self {
        Self {
            context,
            key,
            return_type: HostType::object(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    #[inline]
    pub fn return_type(&self) -> &HostType {
        &self.return_type
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(&self, target: &OperandDescriptor, fallback: Option<GuardedFragment>) -> Binding {
        if let Some(deferral) = Deferral::collect([target]) {
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

        let ty = target.limit_type();
        let guard = Guard::type_is(TARGET, ty.clone());
        let rule = match self
            .context
            .resolver()
            .try_get_member(&ty, &self.key.name, self.key.ignore_case)
        {
            MemberRead::Resolved(fragment) => {
                GuardedFragment::new(ensure_type(fragment, &self.return_type), guard)
            }
            MemberRead::NotReadable => error_fragment::fallback_or_raise(
                fallback,
                error_fragment::cannot_read_member(ty.name(), &self.key.name),
                &self.return_type,
                guard,
            ),
            MemberRead::NotFound => fallback
                .unwrap_or_else(|| GuardedFragment::new(Fragment::default(self.return_type.clone()), guard)),
        };
        self.stats.bound(rule)
    }
}

// =============================================================================
// Set Member
// =============================================================================

/// Binds `target.name = value` writes. Operands are `[target, value]`.
#[derive(Debug)]
pub struct SetMemberBinder {
    context: Arc<RuntimeContext>,
    key: MemberKey,
    return_type: HostType,
    stats: BinderStats,
}

impl SetMemberBinder {
    pub fn new(context: Arc<RuntimeContext>, key: MemberKey) -> Self {
        Self {
            context,
            key,
            return_type: HostType::object(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(
        &self,
        target: &OperandDescriptor,
        value: &OperandDescriptor,
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        if let Some(deferral) = Deferral::collect([target, value]) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::member_not_resolved(target.static_type().name(), &self.key.name),
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        let ty = target.limit_type();
        let resolver = self.context.resolver();
        let convert_value = |member_type: &HostType| -> ResolveResult<Fragment> {
            let source = value.fragment(VALUE);
            if member_type.is_object() || source.result_type() == member_type {
                Ok(source)
            } else {
                resolver.try_convert(&source, member_type)
            }
        };

        let target_guard = Guard::type_is(TARGET, ty.clone());
        let rule = match resolver.try_set_member(&ty, &self.key.name, self.key.ignore_case, &convert_value) {
            MemberWrite::Resolved(fragment) => GuardedFragment::new(
                ensure_type(fragment, &self.return_type),
                target_guard.merge(Guard::simple(VALUE, value)),
            ),
            MemberWrite::NotWritable => error_fragment::fallback_or_raise(
                fallback,
                error_fragment::cannot_write_member(ty.name(), &self.key.name),
                &self.return_type,
                target_guard,
            ),
            MemberWrite::NotFound => error_fragment::fallback_or_raise(
                fallback,
                error_fragment::member_not_found(ty.name(), &self.key.name),
                &self.return_type,
                target_guard,
            ),
        };
        self.stats.bound(rule)
    }
}
