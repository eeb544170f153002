//! Type registry for mapping TypeId to HostType.
//!
//! Provides O(1) lookup of type handles by TypeId and resolves a call site's
//! limit type to the canonical type identity used for member dispatch.

use crate::object::type_obj::{HostType, Parameter, TypeId, TypeKind};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Runtime type registry.
///
/// Built-in types are registered at construction; user types are added
/// dynamically through [`define_class`](Self::define_class) and
/// [`define_delegate`](Self::define_delegate).
pub struct TypeRegistry {
    /// Map from TypeId to its canonical handle.
    types: RwLock<FxHashMap<TypeId, HostType>>,
    /// Counter for generating new TypeIds.
    next_id: AtomicU32,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types.
    pub fn new() -> Self {
        let types = HostType::builtin_types()
            .into_iter()
            .map(|ty| (ty.id(), ty))
            .collect();
        Self {
            types: RwLock::new(types),
            next_id: AtomicU32::new(TypeId::FIRST_USER_TYPE),
        }
    }

    /// Allocate a new TypeId for a user-defined type.
    pub fn allocate_type_id(&self) -> TypeId {
        TypeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a type handle, replacing any previous handle with the same id.
    pub fn register(&self, ty: HostType) {
        self.types.write().insert(ty.id(), ty);
    }

    /// Allocate and register a class type.
    pub fn define_class(
        &self,
        name: impl Into<Arc<str>>,
        full_name: impl Into<Arc<str>>,
    ) -> HostType {
        let ty = HostType::new(self.allocate_type_id(), name, full_name, TypeKind::Class);
        self.register(ty.clone());
        ty
    }

    /// Allocate and register a delegate type with a declared invoke signature.
    pub fn define_delegate(
        &self,
        name: impl Into<Arc<str>>,
        full_name: impl Into<Arc<str>>,
        invoke: Vec<Parameter>,
    ) -> HostType {
        let ty = HostType::delegate(self.allocate_type_id(), name, full_name, invoke);
        self.register(ty.clone());
        ty
    }

    /// Look up a type by ID.
    #[inline]
    pub fn get(&self, type_id: TypeId) -> Option<HostType> {
        self.types.read().get(&type_id).cloned()
    }

    /// Resolve a limit type to its registered identity.
    ///
    /// Falls back to the limit type itself when the id was never registered.
    pub fn identity(&self, limit_type: &HostType) -> HostType {
        self.get(limit_type.id())
            .unwrap_or_else(|| limit_type.clone())
    }

    /// Check if a type is registered.
    #[inline]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.types.read().contains_key(&type_id)
    }

    /// Get the number of registered types.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}
