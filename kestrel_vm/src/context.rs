//! Shared runtime context.
//!
//! Every binder holds an `Arc<RuntimeContext>`: the resolver, the type
//! registry, configuration, and the canonical values nil conversions and void
//! calls produce. The context never refers back to the dispatch cache, so
//! binders stay free of reference cycles.

use std::fmt;
use std::sync::Arc;

use kestrel_runtime::{Fragment, HostType, MultiResult, TypeRegistry, Value};

use crate::config::RuntimeConfig;
use crate::resolver::Resolver;

/// State shared by all binders of one runtime. Immutable after construction.
pub struct RuntimeContext {
    resolver: Arc<dyn Resolver>,
    types: TypeRegistry,
    config: RuntimeConfig,
    empty_result: MultiResult,
    empty_text: Value,
}

impl RuntimeContext {
    pub fn new(resolver: Arc<dyn Resolver>, types: TypeRegistry, config: RuntimeConfig) -> Self {
        Self {
            resolver,
            types,
            config,
            empty_result: MultiResult::empty(),
            empty_text: Value::text(""),
        }
    }

    #[inline]
    pub fn resolver(&self) -> &dyn Resolver {
        &*self.resolver
    }

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The canonical empty multi-value result of this runtime.
    #[inline]
    pub fn empty_result(&self) -> &MultiResult {
        &self.empty_result
    }

    /// The canonical empty text value of this runtime.
    #[inline]
    pub fn empty_text(&self) -> &Value {
        &self.empty_text
    }

    /// Fragment yielding the canonical empty result.
    pub fn empty_result_fragment(&self) -> Fragment {
        Fragment::typed_constant(Value::Result(self.empty_result.clone()), HostType::result())
    }

    /// Fragment yielding the canonical empty text.
    pub fn empty_text_fragment(&self) -> Fragment {
        Fragment::typed_constant(self.empty_text.clone(), HostType::text())
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("types", &self.types)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
