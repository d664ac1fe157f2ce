//! Container semantics: arrays, hashes, iterators.

mod common;

use common::run_program;
use mint_core::ast::Command;

#[test]
fn hash_preserves_insertion_order_across_overwrite() {
    // h = {}; h["a"] = 1; h["b"] = 2; h["a"] = 3;
    // for k, v in h { print k, ":", v, "\n" }
    let (status, output) = run_program(|asm| {
        asm.declare("h");
        asm.assign("h", |asm| {
            asm.op(Command::AllocHash);
        });

        for (key, value) in [("a", 1.0), ("b", 2.0), ("a", 3.0)] {
            asm.op(Command::LoadSymbol).sym("h");
            asm.string(key);
            asm.number(value);
            asm.op(Command::SubscriptMoveOp);
            asm.op(Command::UnloadReference);
        }

        asm.op(Command::LoadSymbol).sym("h");
        asm.op(Command::RangeInit);
        let head = asm.offset();
        asm.op(Command::RangeCheck);
        let end = asm.placeholder();
        // Front is a {key, value} pair iterator.
        asm.op(Command::ReloadReference);
        asm.op(Command::InitMemberCall).sym("next");
        asm.op(Command::CallMember).param(0);
        asm.print();
        asm.print_text(" ");
        asm.print_text(":");
        asm.print_text(" ");
        asm.op(Command::InitMemberCall).sym("next");
        asm.op(Command::CallMember).param(0);
        asm.print();
        asm.print_text("\n");
        asm.op(Command::RangeNext);
        asm.op(Command::Jump).param(head as i32);
        asm.patch_here(end);
        asm.op(Command::UnloadReference);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "a : 3\nb : 2\n");
}

#[test]
fn hash_keys_with_equal_content_share_an_entry() {
    // Invariant: a == b implies hash(a) == hash(b) for keys.
    let (status, output) = run_program(|asm| {
        asm.declare("h");
        asm.assign("h", |asm| {
            asm.op(Command::AllocHash);
        });
        asm.op(Command::LoadSymbol).sym("h");
        asm.string("key");
        asm.number(1.0);
        asm.op(Command::SubscriptMoveOp);
        asm.op(Command::UnloadReference);
        // A second, content-equal key string overwrites the same entry.
        asm.op(Command::LoadSymbol).sym("h");
        asm.string("key");
        asm.number(2.0);
        asm.op(Command::SubscriptMoveOp);
        asm.op(Command::UnloadReference);

        asm.op(Command::LoadSymbol).sym("h");
        asm.op(Command::InitMemberCall).sym("size");
        asm.op(Command::CallMember).param(0);
        asm.print();
        asm.print_text(" ");
        asm.op(Command::LoadSymbol).sym("h");
        asm.string("key");
        asm.op(Command::SubscriptOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "1 2");
}

#[test]
fn array_construction_and_iteration() {
    let (status, output) = run_program(|asm| {
        asm.op(Command::AllocArray);
        asm.number(10.0);
        asm.number(20.0);
        asm.number(30.0);
        asm.op(Command::InitArray).param(3);

        asm.op(Command::RangeInit);
        let head = asm.offset();
        asm.op(Command::RangeCheck);
        let end = asm.placeholder();
        asm.print();
        asm.print_text(" ");
        asm.op(Command::RangeNext);
        asm.op(Command::Jump).param(head as i32);
        asm.patch_here(end);
        asm.op(Command::UnloadReference);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "10 20 30 ");
}

#[test]
fn array_methods_mutate_in_place() {
    let (status, output) = run_program(|asm| {
        asm.declare("a");
        asm.assign("a", |asm| {
            asm.op(Command::AllocArray);
        });
        asm.op(Command::LoadSymbol).sym("a");
        asm.op(Command::InitMemberCall).sym("push");
        asm.number(1.0);
        asm.op(Command::CallMember).param(1);
        asm.op(Command::UnloadReference);

        asm.op(Command::LoadSymbol).sym("a");
        asm.op(Command::InitMemberCall).sym("push");
        asm.number(2.0);
        asm.op(Command::CallMember).param(1);
        asm.op(Command::UnloadReference);

        asm.op(Command::LoadSymbol).sym("a");
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "[1, 2]");
}

#[test]
fn numeric_range_iterates_half_open_after_exclusive_op() {
    let (status, output) = run_program(|asm| {
        asm.number(0.0);
        asm.number(3.0);
        asm.op(Command::ExclusiveRangeOp);
        let head = asm.offset();
        asm.op(Command::RangeCheck);
        let end = asm.placeholder();
        asm.print();
        asm.op(Command::RangeNext);
        asm.op(Command::Jump).param(head as i32);
        asm.patch_here(end);
        asm.op(Command::UnloadReference);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "012");
}

#[test]
fn exhausted_iterator_yields_none_exactly_once_per_step() {
    let (status, output) = run_program(|asm| {
        asm.declare("it");
        asm.assign("it", |asm| {
            asm.op(Command::AllocIterator);
            asm.number(1.0);
            asm.op(Command::InitIterator).param(1);
        });
        for _ in 0..3 {
            asm.op(Command::LoadSymbol).sym("it");
            asm.op(Command::InitMemberCall).sym("next");
            asm.op(Command::CallMember).param(0);
            asm.print();
            asm.print_text(" ");
        }
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "1 none none ");
}

#[test]
fn in_operator_over_containers() {
    let (status, output) = run_program(|asm| {
        // 2 in [1, 2, 3]
        asm.number(2.0);
        asm.op(Command::AllocArray);
        asm.number(1.0);
        asm.number(2.0);
        asm.number(3.0);
        asm.op(Command::InitArray).param(3);
        asm.op(Command::InOp);
        asm.print();
        asm.print_text(" ");
        // "ës" in "tëst"
        asm.string("ës");
        asm.string("tëst");
        asm.op(Command::InOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "true true");
}

#[test]
fn find_check_searches_by_equality() {
    // 20 in [10, 20] via the FIND_* loop protocol.
    let (status, output) = run_program(|asm| {
        asm.number(20.0);
        asm.op(Command::AllocArray);
        asm.number(10.0);
        asm.number(20.0);
        asm.op(Command::InitArray).param(2);
        asm.op(Command::FindInit);
        let head = asm.offset();
        asm.op(Command::FindCheck);
        let end = asm.placeholder();
        asm.op(Command::FindNext);
        asm.op(Command::Jump).param(head as i32);
        asm.patch_here(end);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "true");
}
