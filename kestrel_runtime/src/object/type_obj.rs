//! Host type handles.
//!
//! A [`HostType`] is the runtime's view of a type in the host object model.
//! Binders key guards and cache entries on it, so equality and hashing go by
//! [`TypeId`] alone: two handles naming the same id are the same type no
//! matter which registry produced them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::types::value::Value;

// =============================================================================
// Type Identifier
// =============================================================================

/// Numeric identity of a host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Root reference type. Nil values report this type.
    pub const OBJECT: Self = Self(0);
    /// Result type of fragments evaluated only for their effect.
    pub const VOID: Self = Self(1);
    pub const BOOLEAN: Self = Self(2);
    pub const INTEGER: Self = Self(3);
    pub const NUMBER: Self = Self(4);
    pub const TEXT: Self = Self(5);
    /// Multi-value result returned by invocations.
    pub const RESULT: Self = Self(6);
    pub const TABLE: Self = Self(7);
    /// Untyped host function (no declared invoke signature).
    pub const FUNCTION: Self = Self(8);

    /// First id handed out to user-defined types.
    pub const FIRST_USER_TYPE: u32 = 256;

    /// Raw numeric value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this id belongs to a built-in type.
    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER_TYPE
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Type Kind
// =============================================================================

/// Broad classification of a host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Void,
    Boolean,
    Integer,
    Number,
    Text,
    Result,
    Table,
    /// Delegate-like type whose values can be invoked.
    Callable,
    /// User-defined class exposing members through the resolver.
    Class,
}

impl TypeKind {
    /// Whether values of this kind may be nil.
    #[inline]
    pub const fn is_reference(self) -> bool {
        !matches!(self, Self::Boolean | Self::Integer | Self::Number)
    }
}

// =============================================================================
// Parameter
// =============================================================================

/// A formal parameter of a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Arc<str>,
    pub ty: HostType,
}

impl Parameter {
    pub fn new(name: impl Into<Arc<str>>, ty: HostType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

// =============================================================================
// Host Type
// =============================================================================

#[derive(Debug)]
struct TypeInfo {
    id: TypeId,
    name: Arc<str>,
    full_name: Arc<str>,
    kind: TypeKind,
    /// Declared invoke signature for callable types.
    invoke: Option<Arc<[Parameter]>>,
}

/// Shared handle to a host type.
#[derive(Clone)]
pub struct HostType(Arc<TypeInfo>);

impl HostType {
    /// Create a type handle. Prefer [`TypeRegistry`](crate::TypeRegistry)
    /// for user types so ids stay unique.
    pub fn new(
        id: TypeId,
        name: impl Into<Arc<str>>,
        full_name: impl Into<Arc<str>>,
        kind: TypeKind,
    ) -> Self {
        Self(Arc::new(TypeInfo {
            id,
            name: name.into(),
            full_name: full_name.into(),
            kind,
            invoke: None,
        }))
    }

    /// Create a callable type with a declared invoke signature.
    pub fn delegate(
        id: TypeId,
        name: impl Into<Arc<str>>,
        full_name: impl Into<Arc<str>>,
        invoke: Vec<Parameter>,
    ) -> Self {
        Self(Arc::new(TypeInfo {
            id,
            name: name.into(),
            full_name: full_name.into(),
            kind: TypeKind::Callable,
            invoke: Some(invoke.into()),
        }))
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    /// Declared invoke signature, present only for delegate types.
    #[inline]
    pub fn invoke_signature(&self) -> Option<&[Parameter]> {
        self.0.invoke.as_deref()
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.0.id == TypeId::VOID
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        self.0.id == TypeId::OBJECT
    }

    /// The zero/default value of this type.
    pub fn default_value(&self) -> Value {
        match self.0.kind {
            TypeKind::Boolean => Value::Boolean(false),
            TypeKind::Integer => Value::Integer(0),
            TypeKind::Number => Value::Number(0.0),
            _ => Value::Nil,
        }
    }

    /// Whether `value` may be stored in a slot of this type without conversion.
    pub fn accepts(&self, value: &Value) -> bool {
        if self.is_object() {
            return true;
        }
        if value.is_nil() {
            return self.0.kind.is_reference();
        }
        value.host_type() == *self
    }

    // =========================================================================
    // Built-in Types
    // =========================================================================

    pub fn object() -> Self {
        builtins().object.clone()
    }

    pub fn void() -> Self {
        builtins().void.clone()
    }

    pub fn boolean() -> Self {
        builtins().boolean.clone()
    }

    pub fn integer() -> Self {
        builtins().integer.clone()
    }

    pub fn number() -> Self {
        builtins().number.clone()
    }

    pub fn text() -> Self {
        builtins().text.clone()
    }

    pub fn result() -> Self {
        builtins().result.clone()
    }

    pub fn table() -> Self {
        builtins().table.clone()
    }

    pub fn function() -> Self {
        builtins().function.clone()
    }

    /// All built-in types, in id order.
    pub fn builtin_types() -> [Self; 9] {
        let b = builtins();
        [
            b.object.clone(),
            b.void.clone(),
            b.boolean.clone(),
            b.integer.clone(),
            b.number.clone(),
            b.text.clone(),
            b.result.clone(),
            b.table.clone(),
            b.function.clone(),
        ]
    }
}

impl PartialEq for HostType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for HostType {}

impl Hash for HostType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0.name, self.0.id)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

// =============================================================================
// Built-in Singletons
// =============================================================================

struct Builtins {
    object: HostType,
    void: HostType,
    boolean: HostType,
    integer: HostType,
    number: HostType,
    text: HostType,
    result: HostType,
    table: HostType,
    function: HostType,
}

static BUILTINS: OnceLock<Builtins> = OnceLock::new();

fn builtins() -> &'static Builtins {
    BUILTINS.get_or_init(|| Builtins {
        object: HostType::new(TypeId::OBJECT, "object", "System.Object", TypeKind::Object),
        void: HostType::new(TypeId::VOID, "void", "System.Void", TypeKind::Void),
        boolean: HostType::new(TypeId::BOOLEAN, "boolean", "System.Boolean", TypeKind::Boolean),
        integer: HostType::new(TypeId::INTEGER, "integer", "System.Int64", TypeKind::Integer),
        number: HostType::new(TypeId::NUMBER, "number", "System.Double", TypeKind::Number),
        text: HostType::new(TypeId::TEXT, "string", "System.String", TypeKind::Text),
        result: HostType::new(TypeId::RESULT, "result", "Kestrel.Result", TypeKind::Result),
        table: HostType::new(TypeId::TABLE, "table", "Kestrel.Table", TypeKind::Table),
        function: HostType::new(TypeId::FUNCTION, "function", "Kestrel.Function", TypeKind::Callable),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_id() {
        let a = HostType::new(TypeId(300), "Point", "Geo.Point", TypeKind::Class);
        let b = HostType::new(TypeId(300), "Other", "Geo.Other", TypeKind::Class);
        assert_eq!(a, b);
        assert_ne!(a, HostType::object());
    }

    #[test]
    fn test_builtin_ids() {
        for (i, ty) in HostType::builtin_types().iter().enumerate() {
            assert_eq!(ty.id().raw(), i as u32);
            assert!(ty.id().is_builtin());
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(HostType::integer().default_value(), Value::Integer(0));
        assert_eq!(HostType::boolean().default_value(), Value::Boolean(false));
        assert_eq!(HostType::number().default_value(), Value::Number(0.0));
        assert!(HostType::text().default_value().is_nil());
    }

    #[test]
    fn test_accepts() {
        assert!(HostType::object().accepts(&Value::Integer(1)));
        assert!(HostType::text().accepts(&Value::Nil));
        assert!(!HostType::integer().accepts(&Value::Nil));
        assert!(!HostType::integer().accepts(&Value::Number(1.0)));
        assert!(HostType::integer().accepts(&Value::Integer(7)));
    }
}
