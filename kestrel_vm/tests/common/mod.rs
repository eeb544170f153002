//! Scripted resolver shared by the integration tests.
//!
//! Models a tiny host type system:
//! - `Point` class with readable/writable `x`/`y`, an unreadable `secret`,
//!   a read-only `id`, methods `Add(integer)` and `Reset()`, and integer
//!   indexing (`p[0]`, `p[1]`)
//! - string indexing by integer position
//! - arithmetic on integers and numbers, equality on anything
//! - conversions integer → number and anything → string
//!
//! Every resolver entry point bumps a call counter so tests can assert that
//! deferral and nil handling never reach the resolver.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use kestrel_runtime::{
    Fragment, HostObject, HostType, OperandDescriptor, Parameter, RuntimeError, TypeRegistry, Value,
};
use kestrel_vm::resolver::{InvokeBuilder, ValueConverter};
use kestrel_vm::{
    BinaryOperator, CallShape, MemberRead, MemberWrite, ResolveError, ResolveResult, Resolver, Runtime,
    RuntimeConfig, UnaryOperator,
};
use parking_lot::Mutex;

// =============================================================================
// Point
// =============================================================================

#[derive(Debug, Default)]
pub struct Point {
    pub x: AtomicI64,
    pub y: AtomicI64,
}

impl Point {
    fn field(&self, name: &str) -> Option<&AtomicI64> {
        match name {
            "x" => Some(&self.x),
            "y" => Some(&self.y),
            _ => None,
        }
    }

    fn slot(&self, index: i64) -> Option<&AtomicI64> {
        match index {
            0 => Some(&self.x),
            1 => Some(&self.y),
            _ => None,
        }
    }
}

fn point_of(value: &Value) -> Result<&Point, RuntimeError> {
    value
        .as_object()
        .and_then(|o| o.downcast_ref::<Point>())
        .ok_or_else(|| RuntimeError::Native("expected a Point".into()))
}

// =============================================================================
// Mock Resolver
// =============================================================================

pub struct MockResolver {
    pub point: HostType,
    calls: AtomicUsize,
    operators: Mutex<Vec<BinaryOperator>>,
}

impl MockResolver {
    pub fn new(types: &TypeRegistry) -> Self {
        Self {
            point: types.define_class("Point", "Geometry.Point"),
            calls: AtomicUsize::new(0),
            operators: Mutex::new(Vec::new()),
        }
    }

    /// Resolver entry points called so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Binary operators requested so far, in order.
    pub fn operators(&self) -> Vec<BinaryOperator> {
        self.operators.lock().clone()
    }

    pub fn new_point(&self, x: i64, y: i64) -> Value {
        Value::Object(HostObject::new(
            self.point.clone(),
            Point {
                x: AtomicI64::new(x),
                y: AtomicI64::new(y),
            },
        ))
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_point(&self, ty: &HostType) -> bool {
        *ty == self.point
    }

    fn matches(name: &str, candidate: &str, ignore_case: bool) -> bool {
        if ignore_case {
            name.eq_ignore_ascii_case(candidate)
        } else {
            name == candidate
        }
    }

    fn member_name<'a>(name: &str, ignore_case: bool, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| Self::matches(name, c, ignore_case))
    }
}

fn numeric(op: &OperandDescriptor) -> bool {
    matches!(op.value(), Some(Value::Integer(_) | Value::Number(_)))
}

fn both_integer(left: &OperandDescriptor, right: &OperandDescriptor) -> bool {
    matches!(
        (left.value(), right.value()),
        (Some(Value::Integer(_)), Some(Value::Integer(_)))
    )
}

fn arithmetic(
    operator: BinaryOperator,
    left: &OperandDescriptor,
    right: &OperandDescriptor,
) -> ResolveResult<Fragment> {
    let args = vec![left.fragment(0), right.fragment(1)];
    let integer = both_integer(left, right);
    let name = operator.symbol();
    let fragment = match operator {
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply if integer => {
            Fragment::host(name, HostType::integer(), args, move |v| {
                let (a, b) = (v[0].as_integer().unwrap_or(0), v[1].as_integer().unwrap_or(0));
                Ok(Value::Integer(match operator {
                    BinaryOperator::Add => a.wrapping_add(b),
                    BinaryOperator::Subtract => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                }))
            })
        }
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide => {
            Fragment::host(name, HostType::number(), args, move |v| {
                let (a, b) = (v[0].as_number().unwrap_or(0.0), v[1].as_number().unwrap_or(0.0));
                Ok(Value::Number(match operator {
                    BinaryOperator::Add => a + b,
                    BinaryOperator::Subtract => a - b,
                    BinaryOperator::Multiply => a * b,
                    _ => a / b,
                }))
            })
        }
        BinaryOperator::IntegerDivide => Fragment::host(name, HostType::integer(), args, |v| {
            let (a, b) = (v[0].as_number().unwrap_or(0.0), v[1].as_number().unwrap_or(0.0));
            if b == 0.0 {
                return Err(RuntimeError::Native("attempt to perform 'n//0'".into()));
            }
            Ok(Value::Integer((a / b).floor() as i64))
        }),
        _ => return Err(unsupported(operator, left, right)),
    };
    Ok(fragment)
}

fn unsupported(operator: BinaryOperator, left: &OperandDescriptor, right: &OperandDescriptor) -> ResolveError {
    ResolveError::UnsupportedOperator {
        operator: operator.symbol().to_string(),
        left: left.limit_type().name().to_string(),
        right: right.limit_type().name().to_string(),
    }
}

impl Resolver for MockResolver {
    fn try_get_member(&self, target: &HostType, name: &str, ignore_case: bool) -> MemberRead {
        self.hit();
        if !self.is_point(target) {
            return MemberRead::NotFound;
        }
        if Self::matches(name, "secret", ignore_case) {
            return MemberRead::NotReadable;
        }
        match Self::member_name(name, ignore_case, &["x", "y"]) {
            Some(field) => MemberRead::Resolved(Fragment::host(
                format!("point.{field}"),
                HostType::integer(),
                vec![Fragment::operand(0, target.clone())],
                move |v| {
                    let point = point_of(&v[0])?;
                    let slot = point.field(field).map_or(0, |s| s.load(Ordering::SeqCst));
                    Ok(Value::Integer(slot))
                },
            )),
            None => MemberRead::NotFound,
        }
    }

    fn try_set_member(
        &self,
        target: &HostType,
        name: &str,
        ignore_case: bool,
        convert_value: &ValueConverter<'_>,
    ) -> MemberWrite {
        self.hit();
        if !self.is_point(target) {
            return MemberWrite::NotFound;
        }
        if Self::matches(name, "id", ignore_case) {
            return MemberWrite::NotWritable;
        }
        let Some(field) = Self::member_name(name, ignore_case, &["x", "y"]) else {
            return MemberWrite::NotFound;
        };
        let Ok(value) = convert_value(&HostType::integer()) else {
            return MemberWrite::NotWritable;
        };
        MemberWrite::Resolved(Fragment::host(
            format!("point.{field}="),
            HostType::void(),
            vec![Fragment::operand(0, target.clone()), value],
            move |v| {
                let point = point_of(&v[0])?;
                if let Some(slot) = point.field(field) {
                    slot.store(v[1].as_integer().unwrap_or(0), Ordering::SeqCst);
                }
                Ok(Value::Nil)
            },
        ))
    }

    fn get_index(&self, target: &OperandDescriptor, indexes: &[OperandDescriptor]) -> ResolveResult<Fragment> {
        self.hit();
        let target_type = target.limit_type();
        let integer_index = indexes.len() == 1 && matches!(indexes[0].value(), Some(Value::Integer(_)));
        if target_type == HostType::text() && integer_index {
            return Ok(Fragment::host(
                "string.index",
                HostType::text(),
                vec![target.fragment(0), indexes[0].fragment(1)],
                |v| {
                    let text = v[0].as_text().unwrap_or_default();
                    let index = v[1].as_integer().unwrap_or(0);
                    let ch = usize::try_from(index - 1)
                        .ok()
                        .and_then(|i| text.chars().nth(i))
                        .map(String::from)
                        .unwrap_or_default();
                    Ok(Value::text(ch))
                },
            ));
        }
        if self.is_point(&target_type) && integer_index {
            return Ok(Fragment::host(
                "point.index",
                HostType::integer(),
                vec![target.fragment(0), indexes[0].fragment(1)],
                |v| {
                    let point = point_of(&v[0])?;
                    let slot = point
                        .slot(v[1].as_integer().unwrap_or(-1))
                        .ok_or_else(|| RuntimeError::Native("index out of range".into()))?;
                    Ok(Value::Integer(slot.load(Ordering::SeqCst)))
                },
            ));
        }
        Err(ResolveError::NoIndexer {
            target: target_type.name().to_string(),
            indexes: indexes
                .iter()
                .map(|i| i.limit_type().name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn set_index(
        &self,
        target: &OperandDescriptor,
        indexes: &[OperandDescriptor],
        value: &OperandDescriptor,
    ) -> ResolveResult<Fragment> {
        self.hit();
        let target_type = target.limit_type();
        let integer_index = indexes.len() == 1 && matches!(indexes[0].value(), Some(Value::Integer(_)));
        if self.is_point(&target_type) && integer_index && matches!(value.value(), Some(Value::Integer(_))) {
            return Ok(Fragment::host(
                "point.index=",
                HostType::void(),
                vec![target.fragment(0), indexes[0].fragment(1), value.fragment(2)],
                |v| {
                    let point = point_of(&v[0])?;
                    let slot = point
                        .slot(v[1].as_integer().unwrap_or(-1))
                        .ok_or_else(|| RuntimeError::Native("index out of range".into()))?;
                    slot.store(v[2].as_integer().unwrap_or(0), Ordering::SeqCst);
                    Ok(Value::Nil)
                },
            ));
        }
        Err(ResolveError::NoIndexer {
            target: target_type.name().to_string(),
            indexes: format!("{} index(es)", indexes.len()),
        })
    }

    fn try_invoke_member(
        &self,
        identity: &HostType,
        call: &CallShape,
        target: &OperandDescriptor,
        args: &[OperandDescriptor],
        name: &str,
        ignore_case: bool,
    ) -> ResolveResult<Option<Fragment>> {
        self.hit();
        if !self.is_point(identity) {
            return Ok(None);
        }
        if Self::matches(name, "Add", ignore_case) {
            if call.argument_count() != 1 || !matches!(args[0].value(), Some(Value::Integer(_))) {
                return Err(ResolveError::ParameterMismatch {
                    member: "Add".into(),
                    argument_count: call.argument_count(),
                });
            }
            return Ok(Some(Fragment::host(
                "Point.Add",
                HostType::integer(),
                vec![target.fragment(0), args[0].fragment(1)],
                |v| {
                    let point = point_of(&v[0])?;
                    Ok(Value::Integer(point.x.load(Ordering::SeqCst) + v[1].as_integer().unwrap_or(0)))
                },
            )));
        }
        if Self::matches(name, "Reset", ignore_case) && call.argument_count() == 0 {
            return Ok(Some(Fragment::host(
                "Point.Reset",
                HostType::void(),
                vec![target.fragment(0)],
                |v| {
                    let point = point_of(&v[0])?;
                    point.x.store(0, Ordering::SeqCst);
                    point.y.store(0, Ordering::SeqCst);
                    Ok(Value::Nil)
                },
            )));
        }
        Ok(None)
    }

    fn bind_parameters(
        &self,
        formal: &[Parameter],
        call: &CallShape,
        args: &[OperandDescriptor],
        invoke: &InvokeBuilder<'_>,
    ) -> ResolveResult<Fragment> {
        self.hit();
        if formal.len() != args.len() {
            return Err(ResolveError::ParameterMismatch {
                member: "invoke".into(),
                argument_count: call.argument_count(),
            });
        }
        let bound = formal
            .iter()
            .zip(args)
            .enumerate()
            .map(|(i, (parameter, arg))| arg.fragment(i + 1).coerce(parameter.ty.clone()))
            .collect();
        Ok(invoke(bound))
    }

    fn binary_operation(
        &self,
        operator: BinaryOperator,
        left: &OperandDescriptor,
        right: &OperandDescriptor,
    ) -> ResolveResult<Fragment> {
        self.hit();
        self.operators.lock().push(operator);
        match operator {
            BinaryOperator::Equal => Ok(Fragment::host(
                "==",
                HostType::boolean(),
                vec![left.fragment(0), right.fragment(1)],
                |v| Ok(Value::Boolean(v[0] == v[1])),
            )),
            _ if numeric(left) && numeric(right) => arithmetic(operator, left, right),
            _ => Err(unsupported(operator, left, right)),
        }
    }

    fn unary_operation(&self, operator: UnaryOperator, operand: &OperandDescriptor) -> ResolveResult<Fragment> {
        self.hit();
        let args = vec![operand.fragment(0)];
        match (operator, operand.value()) {
            (UnaryOperator::Negate, Some(Value::Integer(_))) => {
                Ok(Fragment::host("-", HostType::integer(), args, |v| {
                    Ok(Value::Integer(-v[0].as_integer().unwrap_or(0)))
                }))
            }
            (UnaryOperator::Negate, Some(Value::Number(_))) => {
                Ok(Fragment::host("-", HostType::number(), args, |v| {
                    Ok(Value::Number(-v[0].as_number().unwrap_or(0.0)))
                }))
            }
            (UnaryOperator::Length, Some(Value::Text(_))) => {
                Ok(Fragment::host("#", HostType::integer(), args, |v| {
                    Ok(Value::Integer(v[0].as_text().map_or(0, |s| s.chars().count() as i64)))
                }))
            }
            _ => Err(ResolveError::UnsupportedOperator {
                operator: operator.symbol().to_string(),
                left: operand.limit_type().name().to_string(),
                right: String::new(),
            }),
        }
    }

    fn try_convert(&self, source: &Fragment, destination: &HostType) -> ResolveResult<Fragment> {
        self.hit();
        let from = source.result_type().clone();
        if *destination == HostType::number() && from == HostType::integer() {
            return Ok(Fragment::host("tonumber", HostType::number(), vec![source.clone()], |v| {
                Ok(Value::Number(v[0].as_number().unwrap_or(0.0)))
            }));
        }
        if *destination == HostType::text() {
            return Ok(Fragment::host("tostring", HostType::text(), vec![source.clone()], |v| {
                Ok(Value::text(match &v[0] {
                    Value::Integer(i) => i.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Boolean(b) => b.to_string(),
                    other => format!("{other:?}"),
                }))
            }));
        }
        Err(ResolveError::NoConversion {
            from: from.name().to_string(),
            to: destination.name().to_string(),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A runtime over a fresh mock resolver with default configuration.
pub fn runtime() -> (Runtime, Arc<MockResolver>) {
    runtime_with(RuntimeConfig::default())
}

pub fn runtime_with(config: RuntimeConfig) -> (Runtime, Arc<MockResolver>) {
    let types = TypeRegistry::new();
    let resolver = Arc::new(MockResolver::new(&types));
    let runtime = Runtime::with_types(resolver.clone(), types, config);
    (runtime, resolver)
}

pub fn known(value: impl Into<Value>) -> OperandDescriptor {
    OperandDescriptor::known(value.into())
}

pub fn nil() -> OperandDescriptor {
    OperandDescriptor::known(Value::Nil)
}

pub fn unknown() -> OperandDescriptor {
    OperandDescriptor::unknown(HostType::object())
}
