//! Binders: one per dynamic operation kind.
//!
//! A binder turns the operand descriptors of one call into a guarded rule.
//! Every binder follows the same protocol:
//!
//! ```text
//!   operands ──► any unknown? ── yes ──► Binding::Deferred
//!                     │ no
//!                     ▼
//!               nil target? ── yes ──► fallback | error rule (guard: $0 is nil)
//!                     │ no
//!                     ▼
//!               Resolver ── ok ──► success rule (guard: operand types)
//!                     │ err
//!                     ▼
//!               fallback | error rule carrying the resolver's message
//! ```
//!
//! Binders are immutable after construction and shared across threads and
//! call sites. The only state they touch is [`BinderStats`], read by the
//! diagnostic dump.
//!
//! [`Binder`] is the tagged union over all kinds; [`Binder::bind`] dispatches
//! an operand vector laid out as `[target, operands..., value]`.

pub mod convert;
pub mod index;
pub mod invoke;
pub mod member;
pub mod operator;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_runtime::{Fragment, Guard, GuardedFragment, HostType, MultiResult, OperandDescriptor, Value};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::context::RuntimeContext;

pub use convert::ConvertBinder;
pub use index::{GetIndexBinder, SetIndexBinder};
pub use invoke::{InvokeBinder, InvokeMemberBinder};
pub use member::{GetMemberBinder, SetMemberBinder};
pub use operator::{BinaryOperationBinder, UnaryOperationBinder};

/// Position of the target operand in every operand vector.
pub const TARGET: usize = 0;

// =============================================================================
// Binding Result
// =============================================================================

/// Operands a binder is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferral {
    pending: SmallVec<[usize; 4]>,
}

impl Deferral {
    /// Collect the positions of unknown operands, or `None` if all are known.
    pub fn collect<'a>(operands: impl IntoIterator<Item = &'a OperandDescriptor>) -> Option<Self> {
        let pending: SmallVec<[usize; 4]> = operands
            .into_iter()
            .enumerate()
            .filter(|(_, op)| !op.is_known())
            .map(|(position, _)| position)
            .collect();
        if pending.is_empty() {
            None
        } else {
            Some(Self { pending })
        }
    }

    /// Positions of the operands whose values are still unknown.
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }
}

/// Output of a bind request.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Re-invoke once the listed operands have values. No rule was produced.
    Deferred(Deferral),
    /// A rule valid while its guard holds.
    Bound(GuardedFragment),
}

impl Binding {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Binding::Deferred(_))
    }

    pub fn rule(&self) -> Option<&GuardedFragment> {
        match self {
            Binding::Bound(rule) => Some(rule),
            Binding::Deferred(_) => None,
        }
    }

    pub fn into_rule(self) -> Option<GuardedFragment> {
        match self {
            Binding::Bound(rule) => Some(rule),
            Binding::Deferred(_) => None,
        }
    }
}

// =============================================================================
// Operation Kind
// =============================================================================

/// The nine dynamic operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetMember,
    SetMember,
    GetIndex,
    SetIndex,
    Invoke,
    InvokeMember,
    BinaryOperation,
    UnaryOperation,
    Convert,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        Self::BinaryOperation,
        Self::UnaryOperation,
        Self::GetMember,
        Self::SetMember,
        Self::GetIndex,
        Self::SetIndex,
        Self::Invoke,
        Self::InvokeMember,
        Self::Convert,
    ];

    /// Heading used by the rule-cache dump.
    pub const fn label(self) -> &'static str {
        match self {
            Self::GetMember => "GetMember Binders",
            Self::SetMember => "SetMember Binders",
            Self::GetIndex => "Get Index Binders",
            Self::SetIndex => "Set Index Binders",
            Self::Invoke => "Invoke Binders",
            Self::InvokeMember => "Invoke Member Binders",
            Self::BinaryOperation => "Binary Operation Binders",
            Self::UnaryOperation => "Unary Operation Binders",
            Self::Convert => "Convert Binders",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetMember => "get_member",
            Self::SetMember => "set_member",
            Self::GetIndex => "get_index",
            Self::SetIndex => "set_index",
            Self::Invoke => "invoke",
            Self::InvokeMember => "invoke_member",
            Self::BinaryOperation => "binary_operation",
            Self::UnaryOperation => "unary_operation",
            Self::Convert => "convert",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Binder
// =============================================================================

/// Tagged union over every binder kind.
#[derive(Debug, Clone)]
pub enum Binder {
    GetMember(Arc<GetMemberBinder>),
    SetMember(Arc<SetMemberBinder>),
    GetIndex(Arc<GetIndexBinder>),
    SetIndex(Arc<SetIndexBinder>),
    Invoke(Arc<InvokeBinder>),
    InvokeMember(Arc<InvokeMemberBinder>),
    BinaryOperation(Arc<BinaryOperationBinder>),
    UnaryOperation(Arc<UnaryOperationBinder>),
    Convert(Arc<ConvertBinder>),
}

impl Binder {
    pub fn kind(&self) -> OperationKind {
        match self {
            Binder::GetMember(_) => OperationKind::GetMember,
            Binder::SetMember(_) => OperationKind::SetMember,
            Binder::GetIndex(_) => OperationKind::GetIndex,
            Binder::SetIndex(_) => OperationKind::SetIndex,
            Binder::Invoke(_) => OperationKind::Invoke,
            Binder::InvokeMember(_) => OperationKind::InvokeMember,
            Binder::BinaryOperation(_) => OperationKind::BinaryOperation,
            Binder::UnaryOperation(_) => OperationKind::UnaryOperation,
            Binder::Convert(_) => OperationKind::Convert,
        }
    }

    /// Number of operands the binder expects in its operand vector.
    pub fn operand_count(&self) -> usize {
        match self {
            Binder::GetMember(_) | Binder::UnaryOperation(_) | Binder::Convert(_) => 1,
            Binder::SetMember(_) | Binder::BinaryOperation(_) => 2,
            Binder::GetIndex(b) => 1 + b.call().argument_count(),
            Binder::SetIndex(b) => 2 + b.call().argument_count(),
            Binder::Invoke(b) => 1 + b.call().argument_count(),
            Binder::InvokeMember(b) => 1 + b.call().argument_count(),
        }
    }

    /// Bind an operand vector laid out as `[target, operands..., value]`.
    ///
    /// # Panics
    ///
    /// Panics if `operands.len()` differs from [`operand_count`](Self::operand_count);
    /// a call site wired to the wrong binder is a programming error.
    pub fn bind(&self, operands: &[OperandDescriptor], fallback: Option<GuardedFragment>) -> Binding {
        assert_eq!(
            operands.len(),
            self.operand_count(),
            "{} binder received {} operands",
            self.kind(),
            operands.len()
        );
        match self {
            Binder::GetMember(b) => b.bind(&operands[0], fallback),
            Binder::SetMember(b) => b.bind(&operands[0], &operands[1], fallback),
            Binder::GetIndex(b) => b.bind(&operands[0], &operands[1..], fallback),
            Binder::SetIndex(b) => {
                let last = operands.len() - 1;
                b.bind(&operands[0], &operands[1..last], &operands[last], fallback)
            }
            Binder::Invoke(b) => b.bind(&operands[0], &operands[1..], fallback),
            Binder::InvokeMember(b) => b.bind(&operands[0], &operands[1..], fallback),
            Binder::BinaryOperation(b) => b.bind(&operands[0], &operands[1], fallback),
            Binder::UnaryOperation(b) => b.bind(&operands[0], fallback),
            Binder::Convert(b) => b.bind(&operands[0], fallback),
        }
    }

    fn stats(&self) -> &BinderStats {
        match self {
            Binder::GetMember(b) => b.stats(),
            Binder::SetMember(b) => b.stats(),
            Binder::GetIndex(b) => b.stats(),
            Binder::SetIndex(b) => b.stats(),
            Binder::Invoke(b) => b.stats(),
            Binder::InvokeMember(b) => b.stats(),
            Binder::BinaryOperation(b) => b.stats(),
            Binder::UnaryOperation(b) => b.stats(),
            Binder::Convert(b) => b.stats(),
        }
    }

    /// Rules this binder has produced so far, repeats included.
    pub fn rules_produced(&self) -> u64 {
        self.stats().rules()
    }

    /// Distinct guards among the rules this binder has produced.
    pub fn guard_variants(&self) -> usize {
        self.stats().guard_variants()
    }
}

macro_rules! impl_from_binder {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<Arc<$ty>> for Binder {
                fn from(binder: Arc<$ty>) -> Self {
                    Binder::$variant(binder)
                }
            }
        )*
    };
}

impl_from_binder! {
    GetMember => GetMemberBinder,
    SetMember => SetMemberBinder,
    GetIndex => GetIndexBinder,
    SetIndex => SetIndexBinder,
    Invoke => InvokeBinder,
    InvokeMember => InvokeMemberBinder,
    BinaryOperation => BinaryOperationBinder,
    UnaryOperation => UnaryOperationBinder,
    Convert => ConvertBinder,
}

// =============================================================================
// Binder Statistics
// =============================================================================

/// Distinct guards a binder remembers before it stops tracking new ones.
pub const GUARD_VARIANT_LIMIT: usize = 128;

/// Counters kept by every binder.
#[derive(Debug, Default)]
pub struct BinderStats {
    rules: AtomicU64,
    deferrals: AtomicU64,
    variants: Mutex<Vec<Guard>>,
}

impl BinderStats {
    /// Rules (success, error or fallback) returned to call sites.
    pub fn rules(&self) -> u64 {
        self.rules.load(Ordering::Relaxed)
    }

    /// Bind requests answered with a deferral.
    pub fn deferrals(&self) -> u64 {
        self.deferrals.load(Ordering::Relaxed)
    }

    /// Distinct rule guards seen so far, saturating at [`GUARD_VARIANT_LIMIT`].
    pub fn guard_variants(&self) -> usize {
        self.variants.lock().len()
    }

    pub(crate) fn bound(&self, rule: GuardedFragment) -> Binding {
        self.rules.fetch_add(1, Ordering::Relaxed);
        let mut variants = self.variants.lock();
        if variants.len() < GUARD_VARIANT_LIMIT && !variants.contains(&rule.guard) {
            variants.push(rule.guard.clone());
        }
        drop(variants);
        Binding::Bound(rule)
    }

    pub(crate) fn deferred(&self, deferral: Deferral) -> Binding {
        self.deferrals.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(pending = ?deferral.pending(), "binding deferred");
        Binding::Deferred(deferral)
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Normalize a resolved fragment to the binder's return type.
///
/// - same type, or an `object` return type: unchanged
/// - `void`: evaluate for effect, then yield the return type's default
/// - otherwise: coerce, checked at runtime
pub(crate) fn ensure_type(fragment: Fragment, return_type: &HostType) -> Fragment {
    let produced = fragment.result_type();
    if produced == return_type || (return_type.is_object() && !produced.is_void()) {
        fragment
    } else if produced.is_void() {
        fragment.then(Fragment::default(return_type.clone()))
    } else {
        fragment.coerce(return_type.clone())
    }
}

/// Normalize an invocation to the multi-value result type: `void` calls
/// yield the runtime's canonical empty result, single values are wrapped.
pub(crate) fn ensure_result(fragment: Fragment, context: &RuntimeContext) -> Fragment {
    let produced = fragment.result_type();
    if *produced == HostType::result() {
        fragment
    } else if produced.is_void() {
        fragment.then(context.empty_result_fragment())
    } else {
        Fragment::host("result", HostType::result(), vec![fragment], |args| {
            Ok(match args.first() {
                Some(Value::Result(values)) => Value::Result(values.clone()),
                Some(value) => Value::Result(MultiResult::new(vec![value.clone()])),
                None => Value::Result(MultiResult::empty()),
            })
        })
    }
}

/// Guard on the target and every argument: nil check for nil operands,
/// exact type otherwise. Arguments start at position 1.
pub(crate) fn signature_guard(target: &OperandDescriptor, args: &[OperandDescriptor]) -> Guard {
    args.iter()
        .enumerate()
        .fold(Guard::simple(TARGET, target), |guard, (i, arg)| {
            guard.merge(Guard::simple(i + 1, arg))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferral_collects_unknown_positions() {
        let ops = [
            OperandDescriptor::known(Value::Integer(1)),
            OperandDescriptor::unknown(HostType::object()),
            OperandDescriptor::known(Value::Nil),
            OperandDescriptor::unknown(HostType::integer()),
        ];
        let deferral = Deferral::collect(&ops).unwrap();
        assert_eq!(deferral.pending(), &[1, 3]);
        assert!(Deferral::collect(&ops[..1]).is_none());
    }

    #[test]
    fn test_ensure_type_void_yields_default() {
        let f = ensure_type(
            Fragment::typed_constant(Value::Nil, HostType::void()),
            &HostType::integer(),
        );
        assert_eq!(f.result_type(), &HostType::integer());
        assert_eq!(f.evaluate(&[]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_signature_guard_positions() {
        let target = OperandDescriptor::known(Value::from("s"));
        let args = [
            OperandDescriptor::known(Value::Integer(1)),
            OperandDescriptor::known(Value::Nil),
        ];
        let guard = signature_guard(&target, &args);
        assert_eq!(guard.to_string(), "$0 is string && $1 is integer && $2 is nil");
    }
}
