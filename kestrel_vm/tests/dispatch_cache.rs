//! Dispatch cache identity, invalidation and concurrent convergence.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{known, runtime};
use kestrel_runtime::HostType;
use kestrel_vm::{BinaryOperator, Binder, CallShape, OperationKind, UnaryOperator};

const THREADS: usize = 8;

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_equal_shapes_share_one_binder() {
    let (rt, _) = runtime();
    assert!(Arc::ptr_eq(&rt.get_member("x"), &rt.get_member("x")));
    assert!(Arc::ptr_eq(&rt.set_member("x"), &rt.set_member("x")));
    assert!(Arc::ptr_eq(
        &rt.get_index(CallShape::positional(2)),
        &rt.get_index(CallShape::positional(2))
    ));
    assert!(Arc::ptr_eq(
        &rt.invoke_member("Add", CallShape::positional(1)),
        &rt.invoke_member("Add", CallShape::positional(1))
    ));
    assert!(Arc::ptr_eq(
        &rt.binary_operation(BinaryOperator::Add, false),
        &rt.binary_operation(BinaryOperator::Add, false)
    ));
    assert!(Arc::ptr_eq(&rt.convert(HostType::text()), &rt.convert(HostType::text())));
}

#[test]
fn test_differing_shape_fields_give_distinct_binders() {
    let (rt, resolver) = runtime();
    assert!(!Arc::ptr_eq(&rt.get_member("x"), &rt.get_member("y")));
    assert!(!Arc::ptr_eq(&rt.get_member_with_case("x", false), &rt.get_member_with_case("x", true)));
    assert!(!Arc::ptr_eq(
        &rt.invoke(CallShape::positional(1)),
        &rt.invoke(CallShape::positional(2))
    ));
    assert!(!Arc::ptr_eq(
        &rt.invoke(CallShape::positional(2)),
        &rt.invoke(CallShape::named(2, ["b"]))
    ));
    assert!(!Arc::ptr_eq(
        &rt.invoke_member("Add", CallShape::positional(1)),
        &rt.invoke_member("Sub", CallShape::positional(1))
    ));
    assert!(!Arc::ptr_eq(
        &rt.binary_operation(BinaryOperator::Add, false),
        &rt.binary_operation(BinaryOperator::Subtract, false)
    ));
    assert!(!Arc::ptr_eq(
        &rt.binary_operation(BinaryOperator::Divide, false),
        &rt.binary_operation(BinaryOperator::Divide, true)
    ));
    assert!(!Arc::ptr_eq(&rt.convert(HostType::text()), &rt.convert(resolver.point.clone())));
}

#[test]
fn test_integer_divide_token_shares_flagged_binder() {
    let (rt, _) = runtime();
    assert!(Arc::ptr_eq(
        &rt.binary_operation(BinaryOperator::IntegerDivide, false),
        &rt.binary_operation(BinaryOperator::Divide, true)
    ));
}

#[test]
fn test_integer_flag_only_splits_divide() {
    let (rt, _) = runtime();
    assert!(Arc::ptr_eq(
        &rt.binary_operation(BinaryOperator::Add, true),
        &rt.binary_operation(BinaryOperator::Add, false)
    ));
    assert_eq!(rt.binders().len_of(OperationKind::BinaryOperation), 1);
}

// =============================================================================
// Invalidation and Diagnostics
// =============================================================================

#[test]
fn test_clear_then_recreate_yields_new_instance() {
    let (rt, _) = runtime();
    let before = rt.get_member("x");
    rt.unary_operation(UnaryOperator::Not);
    assert_eq!(rt.binders().len(), 2);

    rt.clear_binder_cache();
    assert!(rt.binders().is_empty());

    let after = rt.get_member("x");
    assert!(!Arc::ptr_eq(&before, &after));

    // Binders handed out before the clear keep working.
    assert!(before.bind(&known(1i64), None).rule().is_some());
}

#[test]
fn test_dump_lists_shapes_and_rule_counts() {
    let (rt, resolver) = runtime();
    let binder = rt.get_member("x");
    binder.bind(&known(resolver.new_point(0, 0)), None);
    binder.bind(&known(1i64), None);
    rt.invoke_member("Add", CallShape::positional(1));

    let mut out = String::new();
    rt.dump_rule_caches(&mut out).unwrap();

    for kind in OperationKind::ALL {
        assert!(out.contains(kind.label()), "missing heading for {kind}");
    }
    assert!(out.contains("x: 2\n"));
    assert!(out.contains("Add#1: 0\n"));
    assert!(out.contains("Args1: 0\n"), "invoke-member should create its invoke binder");
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_requests_converge_on_one_instance() {
    let (rt, _) = runtime();
    let barrier = Barrier::new(THREADS);

    let binders: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    rt.invoke_member("Add", CallShape::positional(1))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &binders[0];
    assert!(binders.iter().all(|b| Arc::ptr_eq(b, first)));
    assert_eq!(rt.binders().len_of(OperationKind::InvokeMember), 1);
    assert_eq!(rt.binders().len_of(OperationKind::Invoke), 1);
    assert!(Arc::ptr_eq(first.fallback_invoke(), &rt.invoke(CallShape::positional(1))));
}

#[test]
fn test_concurrent_kinds_and_binding() {
    let (rt, resolver) = runtime();
    let barrier = Barrier::new(THREADS);
    let point = resolver.new_point(5, 6);

    thread::scope(|s| {
        for i in 0..THREADS {
            let (rt, barrier, point) = (&rt, &barrier, point.clone());
            s.spawn(move || {
                barrier.wait();
                let name = if i % 2 == 0 { "x" } else { "y" };
                let rule = rt
                    .get_member(name)
                    .bind(&known(point.clone()), None)
                    .into_rule()
                    .unwrap();
                let expected = if i % 2 == 0 { 5 } else { 6 };
                assert_eq!(rule.execute(&[point]).unwrap().as_integer(), Some(expected));
                rt.binary_operation(BinaryOperator::Divide, i % 3 == 0);
            });
        }
    });

    assert_eq!(rt.binders().len_of(OperationKind::GetMember), 2);
    assert_eq!(rt.binders().len_of(OperationKind::BinaryOperation), 2);
}

#[test]
fn test_dump_counts_distinct_guards_not_binds() {
    let (rt, resolver) = runtime();
    let binder = Binder::from(rt.get_member("y"));
    let point = resolver.new_point(0, 0);
    for _ in 0..5 {
        binder.bind(&[known(point.clone())], None);
    }
    assert_eq!(binder.rules_produced(), 5);
    assert_eq!(binder.guard_variants(), 1);

    let mut out = String::new();
    rt.dump_rule_caches(&mut out).unwrap();
    assert!(out.contains("y: 1\n"));
}
