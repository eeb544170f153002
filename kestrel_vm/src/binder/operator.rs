//! Binary and unary operator binders.

use std::sync::Arc;

use kestrel_runtime::{Guard, GuardedFragment, HostType, OperandDescriptor};

use super::{Binding, BinderStats, Deferral, TARGET, ensure_type};
use crate::context::RuntimeContext;
use crate::error_fragment;
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::shape::BinaryKey;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// Binds `left op right`. Operands are `[left, right]`.
///
/// Nil operands are not special-cased: the resolver decides whether an
/// operator accepts nil (equality does, arithmetic does not).
#[derive(Debug)]
pub struct BinaryOperationBinder {
    context: Arc<RuntimeContext>,
    key: BinaryKey,
    return_type: HostType,
    stats: BinderStats,
}

impl BinaryOperationBinder {
    pub fn new(context: Arc<RuntimeContext>, key: BinaryKey) -> Self {
        Self {
            context,
            key,
            return_type: HostType::object(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn key(&self) -> BinaryKey {
        self.key
    }

    /// Operator requested from the resolver: `Divide` on an integer-division
    /// binder becomes `IntegerDivide`.
    pub fn resolved_operator(&self) -> BinaryOperator {
        match self.key.operator {
            BinaryOperator::Divide if self.key.integer_division => BinaryOperator::IntegerDivide,
            operator => operator,
        }
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(
        &self,
        left: &OperandDescriptor,
        right: &OperandDescriptor,
        fallback: Option<GuardedFragment>,
    ) -> Binding {
        if let Some(deferral) = Deferral::collect([left, right]) {
            return self.stats.deferred(deferral);
        }

        let guard = Guard::simple(LEFT, left).merge(Guard::simple(RIGHT, right));
        let rule = match self
            .context
            .resolver()
            .binary_operation(self.resolved_operator(), left, right)
        {
            Ok(fragment) => GuardedFragment::new(ensure_type(fragment, &self.return_type), guard),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}

/// Binds `op operand`.
#[derive(Debug)]
pub struct UnaryOperationBinder {
    context: Arc<RuntimeContext>,
    operator: UnaryOperator,
    return_type: HostType,
    stats: BinderStats,
}

impl UnaryOperationBinder {
    pub fn new(context: Arc<RuntimeContext>, operator: UnaryOperator) -> Self {
        Self {
            context,
            operator,
            return_type: HostType::object(),
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn operator(&self) -> UnaryOperator {
        self.operator
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(&self, operand: &OperandDescriptor, fallback: Option<GuardedFragment>) -> Binding {
        if let Some(deferral) = Deferral::collect([operand]) {
            return self.stats.deferred(deferral);
        }

        if operand.is_nil() {
            return self.stats.bound(error_fragment::fallback_or_raise(
                fallback,
                error_fragment::NIL_OPERATOR,
                &self.return_type,
                Guard::is_nil(TARGET),
            ));
        }

        let guard = Guard::type_is(TARGET, operand.limit_type());
        let rule = match self.context.resolver().unary_operation(self.operator, operand) {
            Ok(fragment) => GuardedFragment::new(ensure_type(fragment, &self.return_type), guard),
            Err(error) => error_fragment::from_resolve_error(error, fallback, &self.return_type, guard),
        };
        self.stats.bound(rule)
    }
}
