//! Shared binder cache.
//!
//! Binders are keyed by operation shape so every call site with the same
//! shape reuses one instance. The cache sits between call sites and binder
//! construction:
//!
//! 1. **Call-site rule cache** - per site, replays guarded rules
//! 2. **Dispatch cache (this)** - per runtime, one binder per shape
//! 3. **Binder + resolver** - builds new rules
//!
//! # Locking
//!
//! Each operation kind has its own map behind its own `parking_lot::Mutex`,
//! held only for a lookup or an insert. Binders are constructed outside the
//! lock; when two threads race on the same shape the later insert adopts the
//! instance already present and drops its own.
//!
//! # Invalidation
//!
//! [`DispatchCache::clear`] empties each map under that map's lock. It is not
//! atomic across kinds. Binders already handed out stay valid.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_runtime::HostType;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::binder::{
    Binder, BinaryOperationBinder, ConvertBinder, GetIndexBinder, GetMemberBinder, InvokeBinder,
    InvokeMemberBinder, OperationKind, SetIndexBinder, SetMemberBinder, UnaryOperationBinder,
};
use crate::context::RuntimeContext;
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::shape::{BinaryKey, CallShape, InvokeMemberKey, MemberKey, UnaryKey};

/// Width of the underline under each heading of the dump.
const DUMP_RULE_WIDTH: usize = 66;

// =============================================================================
// Binder Map
// =============================================================================

/// One operation kind's shape-to-binder map.
struct BinderMap<K, B> {
    map: Mutex<FxHashMap<K, Arc<B>>>,
}

impl<K, B> BinderMap<K, B>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            map: Mutex::new(FxHashMap::default()),
        }
    }

    /// Double-checked get-or-create. `create` runs without the lock held.
    fn get_or_create(&self, key: K, stats: &CacheStats, create: impl FnOnce(&K) -> B) -> Arc<B> {
        if let Some(binder) = self.map.lock().get(&key) {
            stats.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(binder);
        }

        stats.misses.fetch_add(1, Ordering::Relaxed);
        let created = Arc::new(create(&key));
        let mut map = self.map.lock();
        Arc::clone(map.entry(key).or_insert(created))
    }

    fn clear(&self) -> usize {
        let mut map = self.map.lock();
        let dropped = map.len();
        map.clear();
        dropped
    }

    fn len(&self) -> usize {
        self.map.lock().len()
    }

    fn snapshot(&self) -> Vec<(K, Arc<B>)> {
        self.map
            .lock()
            .iter()
            .map(|(k, b)| (k.clone(), Arc::clone(b)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    clears: AtomicU64,
}

// =============================================================================
// Dispatch Cache
// =============================================================================

/// Per-runtime binder cache with one locked map per operation kind.
pub struct DispatchCache {
    context: Arc<RuntimeContext>,
    get_member: BinderMap<MemberKey, GetMemberBinder>,
    set_member: BinderMap<MemberKey, SetMemberBinder>,
    get_index: BinderMap<CallShape, GetIndexBinder>,
    set_index: BinderMap<CallShape, SetIndexBinder>,
    invoke: BinderMap<CallShape, InvokeBinder>,
    invoke_member: BinderMap<InvokeMemberKey, InvokeMemberBinder>,
    binary: BinderMap<BinaryKey, BinaryOperationBinder>,
    unary: BinderMap<UnaryKey, UnaryOperationBinder>,
    convert: BinderMap<HostType, ConvertBinder>,
    stats: CacheStats,
}

impl DispatchCache {
    /// Create an empty cache whose binders share `context`.
    pub fn new(context: Arc<RuntimeContext>) -> Self {
        Self {
            context,
            get_member: BinderMap::new(),
            set_member: BinderMap::new(),
            get_index: BinderMap::new(),
            set_index: BinderMap::new(),
            invoke: BinderMap::new(),
            invoke_member: BinderMap::new(),
            binary: BinderMap::new(),
            unary: BinderMap::new(),
            convert: BinderMap::new(),
            stats: CacheStats::default(),
        }
    }

    #[inline]
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    // =========================================================================
    // Get-or-create
    // =========================================================================

    pub fn get_member(&self, name: &str, ignore_case: bool) -> Arc<GetMemberBinder> {
        self.get_member
            .get_or_create(MemberKey::new(name, ignore_case), &self.stats, |key| {
                tracing::debug!(kind = %OperationKind::GetMember, shape = %key, "creating binder");
                GetMemberBinder::new(Arc::clone(&self.context), key.clone())
            })
    }

    pub fn set_member(&self, name: &str, ignore_case: bool) -> Arc<SetMemberBinder> {
        self.set_member
            .get_or_create(MemberKey::new(name, ignore_case), &self.stats, |key| {
                tracing::debug!(kind = %OperationKind::SetMember, shape = %key, "creating binder");
                SetMemberBinder::new(Arc::clone(&self.context), key.clone())
            })
    }

    pub fn get_index(&self, call: CallShape) -> Arc<GetIndexBinder> {
        self.get_index.get_or_create(call, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::GetIndex, shape = %key, "creating binder");
            GetIndexBinder::new(Arc::clone(&self.context), key.clone())
        })
    }

    pub fn set_index(&self, call: CallShape) -> Arc<SetIndexBinder> {
        self.set_index.get_or_create(call, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::SetIndex, shape = %key, "creating binder");
            SetIndexBinder::new(Arc::clone(&self.context), key.clone())
        })
    }

    pub fn invoke(&self, call: CallShape) -> Arc<InvokeBinder> {
        self.invoke.get_or_create(call, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::Invoke, shape = %key, "creating binder");
            InvokeBinder::new(Arc::clone(&self.context), key.clone())
        })
    }

    /// The returned binder redirects callable targets to
    /// [`invoke`](Self::invoke) for the same call shape.
    pub fn invoke_member(&self, name: &str, ignore_case: bool, call: CallShape) -> Arc<InvokeMemberBinder> {
        let key = InvokeMemberKey {
            member: MemberKey::new(name, ignore_case),
            call,
        };
        self.invoke_member.get_or_create(key, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::InvokeMember, shape = %key, "creating binder");
            let fallback_invoke = self.invoke(key.call.clone());
            InvokeMemberBinder::new(Arc::clone(&self.context), key.clone(), fallback_invoke)
        })
    }

    /// `IntegerDivide` is cached as `Divide` with `integer_division` set.
    pub fn binary_operation(&self, operator: BinaryOperator, integer_division: bool) -> Arc<BinaryOperationBinder> {
        self.binary
            .get_or_create(BinaryKey::new(operator, integer_division), &self.stats, |key| {
                tracing::debug!(kind = %OperationKind::BinaryOperation, shape = %key, "creating binder");
                BinaryOperationBinder::new(Arc::clone(&self.context), *key)
            })
    }

    pub fn unary_operation(&self, operator: UnaryOperator) -> Arc<UnaryOperationBinder> {
        self.unary.get_or_create(operator, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::UnaryOperation, shape = %key, "creating binder");
            UnaryOperationBinder::new(Arc::clone(&self.context), *key)
        })
    }

    pub fn convert(&self, destination: HostType) -> Arc<ConvertBinder> {
        self.convert.get_or_create(destination, &self.stats, |key| {
            tracing::debug!(kind = %OperationKind::Convert, shape = %key, "creating binder");
            ConvertBinder::new(Arc::clone(&self.context), key.clone())
        })
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Drop every cached binder, one kind at a time.
    pub fn clear(&self) {
        let dropped = self.get_member.clear()
            + self.set_member.clear()
            + self.get_index.clear()
            + self.set_index.clear()
            + self.invoke.clear()
            + self.invoke_member.clear()
            + self.binary.clear()
            + self.unary.clear()
            + self.convert.clear();
        self.stats.clears.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(dropped, "dispatch cache cleared");
    }

    /// Cached binders of one kind.
    pub fn len_of(&self, kind: OperationKind) -> usize {
        match kind {
            OperationKind::GetMember => self.get_member.len(),
            OperationKind::SetMember => self.set_member.len(),
            OperationKind::GetIndex => self.get_index.len(),
            OperationKind::SetIndex => self.set_index.len(),
            OperationKind::Invoke => self.invoke.len(),
            OperationKind::InvokeMember => self.invoke_member.len(),
            OperationKind::BinaryOperation => self.binary.len(),
            OperationKind::UnaryOperation => self.unary.len(),
            OperationKind::Convert => self.convert.len(),
        }
    }

    /// Cached binders across all kinds.
    pub fn len(&self) -> usize {
        OperationKind::ALL.iter().map(|kind| self.len_of(*kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shapes cached for one kind with their binders, sorted by shape.
    pub fn cached_shapes(&self, kind: OperationKind) -> Vec<(String, Binder)> {
        fn collect<K: Eq + Hash + Clone + fmt::Display, B>(map: &BinderMap<K, B>) -> Vec<(String, Binder)>
        where
            Arc<B>: Into<Binder>,
        {
            map.snapshot()
                .into_iter()
                .map(|(key, binder)| (key.to_string(), binder.into()))
                .collect()
        }

        let mut shapes = match kind {
            OperationKind::GetMember => collect(&self.get_member),
            OperationKind::SetMember => collect(&self.set_member),
            OperationKind::GetIndex => collect(&self.get_index),
            OperationKind::SetIndex => collect(&self.set_index),
            OperationKind::Invoke => collect(&self.invoke),
            OperationKind::InvokeMember => collect(&self.invoke_member),
            OperationKind::BinaryOperation => collect(&self.binary),
            OperationKind::UnaryOperation => collect(&self.unary),
            OperationKind::Convert => collect(&self.convert),
        };
        shapes.sort_by(|a, b| a.0.cmp(&b.0));
        shapes
    }

    /// Write every cached shape and the number of distinct guards among the
    /// rules its binder produced.
    ///
    /// ```text
    /// Binary Operation Binders
    /// ==================================================================
    /// +: 3
    /// ```
    pub fn dump_rule_caches(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for kind in OperationKind::ALL {
            writeln!(out, "{}", kind.label())?;
            writeln!(out, "{}", "=".repeat(DUMP_RULE_WIDTH))?;
            for (shape, binder) in self.cached_shapes(kind) {
                writeln!(out, "{shape}: {}", binder.guard_variants())?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Returns (hits, misses, clears).
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.misses.load(Ordering::Relaxed),
            self.stats.clears.load(Ordering::Relaxed),
        )
    }
}

impl fmt::Debug for DispatchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hits, misses, clears) = self.stats();
        f.debug_struct("DispatchCache")
            .field("binders", &self.len())
            .field("hits", &hits)
            .field("misses", &misses)
            .field("clears", &clears)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::resolver::{
        InvokeBuilder, MemberRead, MemberWrite, ResolveError, ResolveResult, Resolver, ValueConverter,
    };
    use kestrel_runtime::{Fragment, OperandDescriptor, Parameter, TypeRegistry};

    struct NullResolver;

    impl Resolver for NullResolver {
        fn try_get_member(&self, _: &HostType, _: &str, _: bool) -> MemberRead {
            MemberRead::NotFound
        }

        fn try_set_member(&self, _: &HostType, _: &str, _: bool, _: &ValueConverter<'_>) -> MemberWrite {
            MemberWrite::NotFound
        }

        fn get_index(&self, _: &OperandDescriptor, _: &[OperandDescriptor]) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no index".into()))
        }

        fn set_index(
            &self,
            _: &OperandDescriptor,
            _: &[OperandDescriptor],
            _: &OperandDescriptor,
        ) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no index".into()))
        }

        fn try_invoke_member(
            &self,
            _: &HostType,
            _: &CallShape,
            _: &OperandDescriptor,
            _: &[OperandDescriptor],
            _: &str,
            _: bool,
        ) -> ResolveResult<Option<Fragment>> {
            Ok(None)
        }

        fn bind_parameters(
            &self,
            _: &[Parameter],
            _: &CallShape,
            _: &[OperandDescriptor],
            _: &InvokeBuilder<'_>,
        ) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no call".into()))
        }

        fn binary_operation(
            &self,
            _: BinaryOperator,
            _: &OperandDescriptor,
            _: &OperandDescriptor,
        ) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no operator".into()))
        }

        fn unary_operation(&self, _: UnaryOperator, _: &OperandDescriptor) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no operator".into()))
        }

        fn try_convert(&self, _: &Fragment, _: &HostType) -> ResolveResult<Fragment> {
            Err(ResolveError::Other("no conversion".into()))
        }
    }

    fn cache() -> DispatchCache {
        let context = RuntimeContext::new(Arc::new(NullResolver), TypeRegistry::new(), RuntimeConfig::default());
        DispatchCache::new(Arc::new(context))
    }

    #[test]
    fn test_empty_on_creation() {
        let cache = cache();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0, 0));
    }

    #[test]
    fn test_same_shape_same_instance() {
        let cache = cache();
        let a = cache.get_member("x", false);
        let b = cache.get_member("x", false);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats(), (1, 1, 0));
    }

    #[test]
    fn test_case_sensitivity_is_part_of_shape() {
        let cache = cache();
        assert!(!Arc::ptr_eq(&cache.get_member("x", false), &cache.get_member("x", true)));
        assert_eq!(cache.len_of(OperationKind::GetMember), 2);
    }

    #[test]
    fn test_invoke_member_shares_invoke_binder() {
        let cache = cache();
        let member = cache.invoke_member("Add", false, CallShape::positional(1));
        let invoke = cache.invoke(CallShape::positional(1));
        assert!(Arc::ptr_eq(member.fallback_invoke(), &invoke));
        assert_eq!(cache.len_of(OperationKind::Invoke), 1);
    }

    #[test]
    fn test_clear_then_recreate() {
        let cache = cache();
        let before = cache.unary_operation(UnaryOperator::Negate);
        cache.convert(HostType::integer());
        cache.clear();
        assert!(cache.is_empty());
        let after = cache.unary_operation(UnaryOperator::Negate);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(cache.stats().2, 1);
    }

    #[test]
    fn test_dump_lists_shapes() {
        let cache = cache();
        cache.binary_operation(BinaryOperator::Add, false);
        cache.binary_operation(BinaryOperator::Divide, true);
        let mut out = String::new();
        cache.dump_rule_caches(&mut out).unwrap();
        assert!(out.contains("Binary Operation Binders\n"));
        assert!(out.contains(&"=".repeat(DUMP_RULE_WIDTH)));
        assert!(out.contains("+: 0"));
        assert!(out.contains("/ (integer): 0"));
    }
}
