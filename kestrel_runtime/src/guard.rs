//! Guards and guarded fragments.
//!
//! A guard is the condition under which a bound fragment may be replayed
//! without asking the binder again. Guards test operand types, nil-ness and,
//! for callables, the function value itself, so checking one is a handful of
//! id comparisons:
//!
//! ```text
//!     operands ──► Guard::check ──► true  ──► fragment.evaluate
//!                                └► false ──► re-bind
//! ```
//!
//! # Guard Semantics
//!
//! - **TypeIs**: the operand is non-nil and its runtime type is exactly the
//!   expected type (no subtyping).
//! - **IsNil**: the operand is nil.
//! - **Returns**: the operand is a callable with exactly this return type.
//! - **SameCallable**: the operand is this very callable (pointer identity).
//! - **All**: every member check holds. Built by [`Guard::merge`], which
//!   flattens conjunctions and drops `Always`, so a conjunction only ever
//!   holds leaf [`Check`]s.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::RuntimeResult;
use crate::fragment::Fragment;
use crate::object::type_obj::HostType;
use crate::operand::OperandDescriptor;
use crate::types::function::Callable;
use crate::types::value::Value;

// =============================================================================
// Check
// =============================================================================

/// A primitive test on one operand.
#[derive(Clone)]
pub enum Check {
    TypeIs { operand: usize, ty: HostType },
    IsNil { operand: usize },
    Returns { operand: usize, ty: HostType },
    SameCallable { operand: usize, callable: Arc<Callable> },
}

impl Check {
    fn test(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Check::TypeIs { ty, .. } => !value.is_nil() && value.host_type() == *ty,
            Check::IsNil { .. } => value.is_nil(),
            Check::Returns { ty, .. } => value.as_callable().is_some_and(|c| c.return_type() == ty),
            Check::SameCallable { callable, .. } => value.as_callable().is_some_and(|c| Arc::ptr_eq(c, callable)),
        }
    }

    #[inline]
    pub fn operand(&self) -> usize {
        match self {
            Check::TypeIs { operand, .. }
            | Check::IsNil { operand }
            | Check::Returns { operand, .. }
            | Check::SameCallable { operand, .. } => *operand,
        }
    }
}

impl PartialEq for Check {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Check::TypeIs { operand: a, ty: x }, Check::TypeIs { operand: b, ty: y })
            | (Check::Returns { operand: a, ty: x }, Check::Returns { operand: b, ty: y }) => a == b && x == y,
            (Check::IsNil { operand: a }, Check::IsNil { operand: b }) => a == b,
            (
                Check::SameCallable { operand: a, callable: x },
                Check::SameCallable { operand: b, callable: y },
            ) => a == b && Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl Eq for Check {}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::TypeIs { operand, ty } => write!(f, "${operand} is {ty}"),
            Check::IsNil { operand } => write!(f, "${operand} is nil"),
            Check::Returns { operand, ty } => write!(f, "${operand} returns {ty}"),
            Check::SameCallable { operand, callable } => write!(f, "${operand} is fn {}", callable.name()),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Check({self})")
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Predicate over a call site's operand vector.
#[derive(Clone, PartialEq, Eq)]
pub enum Guard {
    /// Holds for any operands.
    Always,
    /// A single check.
    One(Check),
    /// Conjunction of two or more distinct checks.
    All(SmallVec<[Check; 4]>),
}

impl Guard {
    #[inline]
    pub fn type_is(operand: usize, ty: HostType) -> Self {
        Guard::One(Check::TypeIs { operand, ty })
    }

    #[inline]
    pub fn is_nil(operand: usize) -> Self {
        Guard::One(Check::IsNil { operand })
    }

    /// Operand is a callable whose return type is exactly `ty`.
    #[inline]
    pub fn returns(operand: usize, ty: HostType) -> Self {
        Guard::One(Check::Returns { operand, ty })
    }

    /// Operand is this callable instance.
    #[inline]
    pub fn same_callable(operand: usize, callable: &Arc<Callable>) -> Self {
        Guard::One(Check::SameCallable {
            operand,
            callable: Arc::clone(callable),
        })
    }

    /// The simplest guard describing a known operand: nil check for nil
    /// values, exact type check otherwise.
    pub fn simple(operand: usize, descriptor: &OperandDescriptor) -> Self {
        if descriptor.is_nil() {
            Guard::is_nil(operand)
        } else {
            Guard::type_is(operand, descriptor.limit_type())
        }
    }

    /// Conjunction of `self` and `other`.
    pub fn merge(self, other: Guard) -> Self {
        let mut parts: SmallVec<[Check; 4]> = SmallVec::new();
        for check in self.into_checks().chain(other.into_checks()) {
            if !parts.contains(&check) {
                parts.push(check);
            }
        }
        match parts.len() {
            0 => Guard::Always,
            1 => parts.pop().map_or(Guard::Always, Guard::One),
            _ => Guard::All(parts),
        }
    }

    fn into_checks(self) -> impl Iterator<Item = Check> {
        let parts: SmallVec<[Check; 4]> = match self {
            Guard::Always => SmallVec::new(),
            Guard::One(check) => smallvec::smallvec![check],
            Guard::All(parts) => parts,
        };
        parts.into_iter()
    }

    /// The primitive checks, in order.
    pub fn checks(&self) -> &[Check] {
        match self {
            Guard::Always => &[],
            Guard::One(check) => std::slice::from_ref(check),
            Guard::All(parts) => parts,
        }
    }

    /// Evaluate against concrete operand values. Missing operands fail.
    pub fn check(&self, operands: &[Value]) -> bool {
        self.checks().iter().all(|c| c.test(operands.get(c.operand())))
    }

    /// Evaluate against a descriptor snapshot. Unknown operands fail.
    pub fn holds_for(&self, descriptors: &[OperandDescriptor]) -> bool {
        self.checks().iter().all(|c| {
            descriptors
                .get(c.operand())
                .and_then(OperandDescriptor::value)
                .is_some_and(|v| c.test(Some(v)))
        })
    }

    /// Number of primitive checks.
    pub fn len(&self) -> usize {
        self.checks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("true");
        }
        for (i, check) in self.checks().iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{check}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({self})")
    }
}

// =============================================================================
// Guarded Fragment
// =============================================================================

/// A bound rule: fragment plus the guard under which it stays valid.
#[derive(Clone, Debug)]
pub struct GuardedFragment {
    pub fragment: Fragment,
    pub guard: Guard,
}

impl GuardedFragment {
    pub fn new(fragment: Fragment, guard: Guard) -> Self {
        Self { fragment, guard }
    }

    /// Whether this rule raises a language error instead of producing a value.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.fragment.is_raise()
    }

    #[inline]
    pub fn matches(&self, operands: &[Value]) -> bool {
        self.guard.check(operands)
    }

    pub fn execute(&self, operands: &[Value]) -> RuntimeResult<Value> {
        self.fragment.evaluate(operands)
    }
}
