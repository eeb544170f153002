//! Call sites with a local polymorphic rule cache.
//!
//! A call site owns one binder and replays the rules it produced while their
//! guards keep holding. The site cache moves through the usual inline-cache
//! states:
//!
//! ```text
//!   Empty ──► Monomorphic ──► Polymorphic (≤ max rules) ──► Megamorphic
//! ```
//!
//! A megamorphic site stops caching and binds on every execution; it never
//! recovers. Rules whose guard does not hold on the operands that produced
//! them are executed once and never cached.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_runtime::{Guard, GuardedFragment, OperandDescriptor, RuntimeResult, Value};
use parking_lot::Mutex;

use crate::binder::{Binder, Binding};

/// Default number of rules a site keeps before going megamorphic.
pub const POLY_RULE_LIMIT: usize = 4;

// =============================================================================
// Site State
// =============================================================================

#[derive(Debug)]
enum SiteState {
    Empty,
    Monomorphic(GuardedFragment),
    Polymorphic(Vec<GuardedFragment>),
    Megamorphic,
}

impl SiteState {
    fn lookup(&self, operands: &[Value]) -> Option<&GuardedFragment> {
        match self {
            SiteState::Monomorphic(rule) => Some(rule).filter(|r| r.matches(operands)),
            SiteState::Polymorphic(rules) => rules.iter().find(|r| r.matches(operands)),
            SiteState::Empty | SiteState::Megamorphic => None,
        }
    }

    /// Whether a rule with an identical guard is already cached.
    fn covers(&self, guard: &Guard) -> bool {
        match self {
            SiteState::Monomorphic(rule) => rule.guard == *guard,
            SiteState::Polymorphic(rules) => rules.iter().any(|r| r.guard == *guard),
            SiteState::Empty | SiteState::Megamorphic => false,
        }
    }

    fn record(&mut self, rule: GuardedFragment, max_rules: usize) {
        if self.covers(&rule.guard) {
            return;
        }
        match self {
            SiteState::Empty => {
                *self = if max_rules == 0 {
                    SiteState::Megamorphic
                } else {
                    SiteState::Monomorphic(rule)
                };
            }
            SiteState::Monomorphic(first) => {
                if max_rules < 2 {
                    *self = SiteState::Megamorphic;
                } else {
                    let first = first.clone();
                    *self = SiteState::Polymorphic(vec![first, rule]);
                }
            }
            SiteState::Polymorphic(rules) => {
                if rules.len() < max_rules {
                    rules.push(rule);
                } else {
                    *self = SiteState::Megamorphic;
                }
            }
            SiteState::Megamorphic => {}
        }
    }

    fn rule_count(&self) -> usize {
        match self {
            SiteState::Empty | SiteState::Megamorphic => 0,
            SiteState::Monomorphic(_) => 1,
            SiteState::Polymorphic(rules) => rules.len(),
        }
    }

    fn classification(&self) -> SiteClassification {
        match self {
            SiteState::Empty => SiteClassification::Uninitialized,
            SiteState::Monomorphic(_) => SiteClassification::Monomorphic,
            SiteState::Polymorphic(rules) if rules.len() <= 2 => SiteClassification::Bimorphic,
            SiteState::Polymorphic(_) => SiteClassification::Polymorphic,
            SiteState::Megamorphic => SiteClassification::Megamorphic,
        }
    }
}

/// Observable state of a call site's rule cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteClassification {
    /// Never executed.
    Uninitialized,
    /// One rule.
    Monomorphic,
    /// Two rules.
    Bimorphic,
    /// Three up to the rule limit.
    Polymorphic,
    /// Over the limit; no caching.
    Megamorphic,
}

// =============================================================================
// Call Site
// =============================================================================

/// A dynamic operation site bound to one binder.
pub struct CallSite {
    binder: Binder,
    fallback: Option<GuardedFragment>,
    max_rules: usize,
    state: Mutex<SiteState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CallSite {
    pub fn new(binder: Binder, max_rules: usize) -> Self {
        Self {
            binder,
            fallback: None,
            max_rules,
            state: Mutex::new(SiteState::Empty),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Rule the binder returns instead of an error rule.
    pub fn with_fallback(mut self, fallback: GuardedFragment) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[inline]
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Run the operation on `operands`, laid out as the binder expects.
    ///
    /// # Panics
    ///
    /// Panics if the operand count does not match the binder's shape.
    pub fn execute(&self, operands: &[Value]) -> RuntimeResult<Value> {
        let cached = self.state.lock().lookup(operands).cloned();
        if let Some(rule) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return rule.execute(operands);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let rule = self.bind(operands);
        if rule.matches(operands) {
            self.record(rule.clone());
        } else {
            tracing::trace!(
                kind = %self.binder.kind(),
                guard = %rule.guard,
                "rule not cached, guard fails on its own operands"
            );
        }
        rule.execute(operands)
    }

    fn bind(&self, operands: &[Value]) -> GuardedFragment {
        let descriptors: Vec<OperandDescriptor> = operands.iter().cloned().map(OperandDescriptor::known).collect();
        match self.binder.bind(&descriptors, self.fallback.clone()) {
            Binding::Bound(rule) => rule,
            Binding::Deferred(deferral) => unreachable!(
                "{} binder deferred on known operands {:?}",
                self.binder.kind(),
                deferral.pending()
            ),
        }
    }

    fn record(&self, rule: GuardedFragment) {
        let mut state = self.state.lock();
        let before = state.classification();
        state.record(rule, self.max_rules);
        let after = state.classification();
        if before != after {
            tracing::trace!(kind = %self.binder.kind(), from = ?before, to = ?after, "call site transition");
        }
    }

    /// Drop all cached rules and return to the empty state.
    pub fn reset(&self) {
        *self.state.lock() = SiteState::Empty;
    }

    pub fn classification(&self) -> SiteClassification {
        self.state.lock().classification()
    }

    /// Rules currently cached.
    pub fn rule_count(&self) -> usize {
        self.state.lock().rule_count()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage (0.0-100.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("kind", &self.binder.kind())
            .field("classification", &self.classification())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
