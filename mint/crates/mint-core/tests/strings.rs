//! String semantics: code-point indexing and slicing.

mod common;

use common::run_program;
use mint_core::ast::Command;

#[test]
fn code_point_subscript() {
    // print "tëst"[1]
    let (status, output) = run_program(|asm| {
        asm.string("tëst");
        asm.number(1.0);
        asm.op(Command::SubscriptOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "ë");
}

#[test]
fn slicing_by_inclusive_range() {
    // print "tëst"[1..2]
    let (status, output) = run_program(|asm| {
        asm.string("tëst");
        asm.number(1.0);
        asm.number(2.0);
        asm.op(Command::InclusiveRangeOp);
        asm.op(Command::SubscriptOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "ës");
}

#[test]
fn negative_index_counts_from_the_end() {
    let (status, output) = run_program(|asm| {
        asm.string("tëst");
        asm.number(-1.0);
        asm.op(Command::SubscriptOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "t");
}

#[test]
fn iteration_is_by_code_points_not_bytes() {
    // for c in "tëst" { print c }: 4 iterations despite 5 bytes.
    let (status, output) = run_program(|asm| {
        asm.string("tëst");
        asm.op(Command::RangeInit);
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
    assert_eq!(output, "tëst");
}

#[test]
fn concatenation_and_comparison() {
    let (status, output) = run_program(|asm| {
        asm.string("ab");
        asm.string("cd");
        asm.op(Command::AddOp);
        asm.print();
        asm.print_text(" ");
        asm.string("abc");
        asm.string("abd");
        asm.op(Command::LtOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "abcd true");
}

#[test]
fn string_methods_count_code_points() {
    let (status, output) = run_program(|asm| {
        asm.string("tëst");
        asm.op(Command::InitMemberCall).sym("size");
        asm.op(Command::CallMember).param(0);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "4");
}

#[test]
fn regex_match_operator() {
    let (status, output) = run_program(|asm| {
        let regex = {
            let reference = mint_core::memory::builtin::regex::create_regex(
                &asm.rt.global,
                &mut asm.rt.gc,
                "^t.st$",
            )
            .unwrap();
            asm.rt
                .modules
                .module_mut(mint_core::ast::module::MAIN_ID)
                .make_constant(reference)
        };
        asm.string("tëst");
        asm.load_constant(regex);
        asm.op(Command::RegexMatch);
        asm.print();
        asm.print_text(" ");
        asm.string("toast");
        asm.load_constant(regex);
        asm.op(Command::RegexUnmatch);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "true true");
}
