//! Runtime facade.
//!
//! Owns the shared context and the dispatch cache. Compilers ask it for
//! binders or ready-made call sites; member lookups use the configured case
//! sensitivity unless a `*_with_case` variant is called.

use std::fmt;
use std::sync::Arc;

use kestrel_runtime::{HostType, TypeRegistry};

use crate::binder::{
    Binder, BinaryOperationBinder, ConvertBinder, GetIndexBinder, GetMemberBinder, InvokeBinder,
    InvokeMemberBinder, SetIndexBinder, SetMemberBinder, UnaryOperationBinder,
};
use crate::call_site::CallSite;
use crate::config::RuntimeConfig;
use crate::context::RuntimeContext;
use crate::dispatch_cache::DispatchCache;
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::resolver::Resolver;
use crate::shape::CallShape;

/// An embedded runtime's dispatch core.
#[derive(Debug)]
pub struct Runtime {
    context: Arc<RuntimeContext>,
    binders: DispatchCache,
}

impl Runtime {
    /// Runtime with configuration read from the environment.
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_config(resolver, RuntimeConfig::from_env())
    }

    pub fn with_config(resolver: Arc<dyn Resolver>, config: RuntimeConfig) -> Self {
        Self::with_types(resolver, TypeRegistry::new(), config)
    }

    /// Runtime over an existing type registry, for hosts that define their
    /// types before the runtime exists.
    pub fn with_types(resolver: Arc<dyn Resolver>, types: TypeRegistry, config: RuntimeConfig) -> Self {
        tracing::debug!(
            ignore_case = config.ignore_case,
            max_rules_per_site = config.max_rules_per_site,
            "runtime created"
        );
        let context = Arc::new(RuntimeContext::new(resolver, types, config));
        let binders = DispatchCache::new(Arc::clone(&context));
        Self { context, binders }
    }

    #[inline]
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        self.context.types()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        self.context.config()
    }

    #[inline]
    pub fn binders(&self) -> &DispatchCache {
        &self.binders
    }

    // =========================================================================
    // Binders
    // =========================================================================

    pub fn get_member(&self, name: &str) -> Arc<GetMemberBinder> {
        self.binders.get_member(name, self.config().ignore_case)
    }

    pub fn get_member_with_case(&self, name: &str, ignore_case: bool) -> Arc<GetMemberBinder> {
        self.binders.get_member(name, ignore_case)
    }

    pub fn set_member(&self, name: &str) -> Arc<SetMemberBinder> {
        self.binders.set_member(name, self.config().ignore_case)
    }

    pub fn set_member_with_case(&self, name: &str, ignore_case: bool) -> Arc<SetMemberBinder> {
        self.binders.set_member(name, ignore_case)
    }

    pub fn get_index(&self, call: CallShape) -> Arc<GetIndexBinder> {
        self.binders.get_index(call)
    }

    pub fn set_index(&self, call: CallShape) -> Arc<SetIndexBinder> {
        self.binders.set_index(call)
    }

    pub fn invoke(&self, call: CallShape) -> Arc<InvokeBinder> {
        self.binders.invoke(call)
    }

    pub fn invoke_member(&self, name: &str, call: CallShape) -> Arc<InvokeMemberBinder> {
        self.binders.invoke_member(name, self.config().ignore_case, call)
    }

    pub fn invoke_member_with_case(&self, name: &str, ignore_case: bool, call: CallShape) -> Arc<InvokeMemberBinder> {
        self.binders.invoke_member(name, ignore_case, call)
    }

    pub fn binary_operation(&self, operator: BinaryOperator, integer_division: bool) -> Arc<BinaryOperationBinder> {
        self.binders.binary_operation(operator, integer_division)
    }

    pub fn unary_operation(&self, operator: UnaryOperator) -> Arc<UnaryOperationBinder> {
        self.binders.unary_operation(operator)
    }

    pub fn convert(&self, destination: HostType) -> Arc<ConvertBinder> {
        self.binders.convert(destination)
    }

    // =========================================================================
    // Call Sites
    // =========================================================================

    /// A call site over `binder` using the configured rule limit.
    pub fn call_site(&self, binder: impl Into<Binder>) -> CallSite {
        CallSite::new(binder.into(), self.config().max_rules_per_site)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Drop every cached binder. Existing call sites keep theirs.
    pub fn clear_binder_cache(&self) {
        self.binders.clear();
    }

    /// Write the cached shapes of every operation kind.
    pub fn dump_rule_caches(&self, out: &mut impl fmt::Write) -> fmt::Result {
        self.binders.dump_rule_caches(out)
    }
}
