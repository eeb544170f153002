//! Executable fragments.
//!
//! A fragment is the code half of a bound rule: a small immutable tree that
//! reads call-site operands by position and produces a value or raises a
//! language error. Resolvers build fragments; binders wrap, coerce and guard
//! them; call sites evaluate them.
//!
//! ```text
//!   coerce : integer
//!   └── host "point.x" : integer
//!       └── operand 0 : Point
//! ```
//!
//! Every fragment carries a declared result type. `void` fragments are
//! evaluated only for their effect and yield nil.

use std::fmt;
use std::sync::Arc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::type_obj::HostType;
use crate::types::value::Value;

/// Native operation embedded in a fragment. Receives its evaluated arguments.
pub type HostFn = dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync;

enum Node {
    Constant(Value),
    Default,
    Operand(usize),
    Raise(Arc<str>),
    Host {
        name: Arc<str>,
        args: Vec<Fragment>,
        body: Arc<HostFn>,
    },
    Invoke {
        callee: Fragment,
        args: Vec<Fragment>,
    },
    Coerce(Fragment),
    Sequence(Fragment, Fragment),
}

/// Immutable, cheaply clonable executable unit.
#[derive(Clone)]
pub struct Fragment {
    node: Arc<Node>,
    ty: HostType,
}

impl Fragment {
    fn from_node(node: Node, ty: HostType) -> Self {
        Self {
            node: Arc::new(node),
            ty,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// A constant typed by its value.
    pub fn constant(value: Value) -> Self {
        let ty = value.host_type();
        Self::from_node(Node::Constant(value), ty)
    }

    /// A constant with an explicit declared type.
    pub fn typed_constant(value: Value, ty: HostType) -> Self {
        Self::from_node(Node::Constant(value), ty)
    }

    /// The zero/default value of `ty`.
    pub fn default(ty: HostType) -> Self {
        Self::from_node(Node::Default, ty)
    }

    /// Read operand `position` of the call site's operand vector.
    pub fn operand(position: usize, ty: HostType) -> Self {
        Self::from_node(Node::Operand(position), ty)
    }

    /// Raise a language error with `message`.
    pub fn raise(message: impl Into<Arc<str>>, ty: HostType) -> Self {
        Self::from_node(Node::Raise(message.into()), ty)
    }

    /// Evaluate `args` and pass them to a native body.
    pub fn host<F>(name: impl Into<Arc<str>>, ty: HostType, args: Vec<Fragment>, body: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self::from_node(
            Node::Host {
                name: name.into(),
                args,
                body: Arc::new(body),
            },
            ty,
        )
    }

    /// Invoke the callable produced by `callee` with `args`.
    pub fn invoke(callee: Fragment, args: Vec<Fragment>, ty: HostType) -> Self {
        Self::from_node(Node::Invoke { callee, args }, ty)
    }

    /// Check the produced value against `ty` at runtime.
    pub fn coerce(self, ty: HostType) -> Self {
        if self.ty == ty {
            return self;
        }
        Self::from_node(Node::Coerce(self), ty)
    }

    /// Evaluate `self` for its effect, then yield `next`.
    pub fn then(self, next: Fragment) -> Self {
        let ty = next.ty.clone();
        Self::from_node(Node::Sequence(self, next), ty)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    #[inline]
    pub fn result_type(&self) -> &HostType {
        &self.ty
    }

    /// Whether this fragment unconditionally raises.
    pub fn is_raise(&self) -> bool {
        matches!(*self.node, Node::Raise(_))
    }

    /// Message of a raising fragment.
    pub fn raised_message(&self) -> Option<&str> {
        match &*self.node {
            Node::Raise(message) => Some(message),
            _ => None,
        }
    }

    /// Whether both handles share the same tree.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Run the fragment against the call site's operand values.
    pub fn evaluate(&self, operands: &[Value]) -> RuntimeResult<Value> {
        match &*self.node {
            Node::Constant(value) => Ok(value.clone()),
            Node::Default => Ok(self.ty.default_value()),
            Node::Operand(index) => operands
                .get(*index)
                .cloned()
                .ok_or(RuntimeError::MissingOperand { index: *index }),
            Node::Raise(message) => Err(RuntimeError::Raised {
                message: message.clone(),
            }),
            Node::Host { args, body, .. } => {
                let args = evaluate_all(args, operands)?;
                body(&args)
            }
            Node::Invoke { callee, args } => {
                let callee = callee.evaluate(operands)?;
                let args = evaluate_all(args, operands)?;
                match callee {
                    Value::Callable(callable) => callable.call(&args),
                    other => Err(RuntimeError::NotCallable {
                        type_name: other.host_type().name().to_string(),
                    }),
                }
            }
            Node::Coerce(inner) => {
                let value = inner.evaluate(operands)?;
                if self.ty.is_void() {
                    Ok(Value::Nil)
                } else if self.ty.accepts(&value) {
                    Ok(value)
                } else {
                    Err(RuntimeError::InvalidCast {
                        from: value.host_type().name().to_string(),
                        to: self.ty.name().to_string(),
                    })
                }
            }
            Node::Sequence(first, next) => {
                first.evaluate(operands)?;
                next.evaluate(operands)
            }
        }
    }
}

fn evaluate_all(fragments: &[Fragment], operands: &[Value]) -> RuntimeResult<Vec<Value>> {
    fragments.iter().map(|f| f.evaluate(operands)).collect()
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Constant(value) => write!(f, "{value:?}"),
            Node::Default => write!(f, "default({})", self.ty),
            Node::Operand(index) => write!(f, "${index}"),
            Node::Raise(message) => write!(f, "raise({message:?})"),
            Node::Host { name, args, .. } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Node::Invoke { callee, args } => {
                write!(f, "invoke {callee}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Node::Coerce(inner) => write!(f, "({inner} as {})", self.ty),
            Node::Sequence(first, next) => write!(f, "{{{first}; {next}}}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Fragment]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} : {}", self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::type_obj::{Parameter, TypeId};
    use crate::types::function::Callable;

    #[test]
    fn test_operand_and_constant() {
        let ops = [Value::Integer(5)];
        assert_eq!(Fragment::operand(0, HostType::integer()).evaluate(&ops).unwrap(), Value::Integer(5));
        assert_eq!(Fragment::constant(Value::from("x")).result_type(), &HostType::text());
        assert_eq!(
            Fragment::operand(3, HostType::object()).evaluate(&ops),
            Err(RuntimeError::MissingOperand { index: 3 })
        );
    }

    #[test]
    fn test_raise() {
        let f = Fragment::raise("boom", HostType::object());
        assert!(f.is_raise());
        assert_eq!(f.raised_message(), Some("boom"));
        assert_eq!(f.evaluate(&[]), Err(RuntimeError::raised("boom")));
    }

    #[test]
    fn test_host_evaluates_arguments() {
        let add = Fragment::host(
            "add",
            HostType::integer(),
            vec![
                Fragment::operand(0, HostType::integer()),
                Fragment::operand(1, HostType::integer()),
            ],
            |args| Ok(Value::Integer(args[0].as_integer().unwrap_or(0) + args[1].as_integer().unwrap_or(0))),
        );
        assert_eq!(add.evaluate(&[Value::Integer(2), Value::Integer(3)]).unwrap(), Value::Integer(5));
        assert_eq!(add.to_string(), "add($0, $1)");
    }

    #[test]
    fn test_coerce_checks_type() {
        let f = Fragment::operand(0, HostType::object()).coerce(HostType::integer());
        assert_eq!(f.evaluate(&[Value::Integer(1)]).unwrap(), Value::Integer(1));
        assert!(matches!(
            f.evaluate(&[Value::from("no")]),
            Err(RuntimeError::InvalidCast { .. })
        ));
    }

    #[test]
    fn test_coerce_to_same_type_is_identity() {
        let f = Fragment::operand(0, HostType::integer());
        assert!(f.clone().coerce(HostType::integer()).ptr_eq(&f));
    }

    #[test]
    fn test_sequence_yields_second() {
        let f = Fragment::typed_constant(Value::Nil, HostType::void()).then(Fragment::default(HostType::integer()));
        assert_eq!(f.result_type(), &HostType::integer());
        assert_eq!(f.evaluate(&[]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_invoke() {
        let delegate = HostType::delegate(
            TypeId(500),
            "Neg",
            "Neg",
            vec![Parameter::new("x", HostType::integer())],
        );
        let neg = Callable::new("neg", delegate, HostType::integer(), |args| {
            Ok(Value::Integer(-args[0].as_integer().unwrap_or(0)))
        });
        let f = Fragment::invoke(
            Fragment::operand(0, HostType::function()),
            vec![Fragment::operand(1, HostType::integer())],
            HostType::integer(),
        );
        let ops = [Value::Callable(Arc::new(neg)), Value::Integer(4)];
        assert_eq!(f.evaluate(&ops).unwrap(), Value::Integer(-4));

        let not_callable = [Value::Integer(1), Value::Integer(4)];
        assert!(matches!(
            f.evaluate(&not_callable),
            Err(RuntimeError::NotCallable { .. })
        ));
    }
}
