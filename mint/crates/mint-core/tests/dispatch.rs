//! Dispatch-loop behavior: arithmetic, control flow, calls, exit status.

mod common;

use common::run_program;
use mint_core::ast::Command;

#[test]
fn arithmetic_with_precedence() {
    // print (1 + 2) * 3
    let (status, output) = run_program(|asm| {
        asm.number(1.0);
        asm.number(2.0);
        asm.op(Command::AddOp);
        asm.number(3.0);
        asm.op(Command::MulOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "9");
}

#[test]
fn division_follows_ieee() {
    let (status, output) = run_program(|asm| {
        asm.number(7.0);
        asm.number(2.0);
        asm.op(Command::DivOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "3.5");
}

#[test]
fn jump_zero_skips_the_then_branch() {
    let (status, output) = run_program(|asm| {
        asm.boolean(false);
        asm.op(Command::JumpZero);
        let else_branch = asm.placeholder();
        asm.print_text("then");
        asm.patch_here(else_branch);
        asm.print_text("done");
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "done");
}

#[test]
fn and_pre_check_short_circuits() {
    // false && <never evaluated>
    let (status, output) = run_program(|asm| {
        asm.boolean(false);
        asm.op(Command::AndPreCheck);
        let end = asm.placeholder();
        asm.op(Command::UnloadReference);
        asm.print_text("rhs evaluated");
        asm.boolean(true);
        asm.patch_here(end);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    // The left operand is the expression result.
    assert_eq!(output, "false");
}

#[test]
fn boolean_promotes_to_number_under_equality() {
    // print true == 1
    let (status, output) = run_program(|asm| {
        asm.boolean(true);
        asm.number(1.0);
        asm.op(Command::EqOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "true");
}

#[test]
fn strict_equality_distinguishes_formats() {
    let (status, output) = run_program(|asm| {
        asm.boolean(true);
        asm.number(1.0);
        asm.op(Command::StrictEqOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "false");
}

#[test]
fn assignment_through_symbols() {
    // x = 5; x = x + 1; print x
    let (status, output) = run_program(|asm| {
        asm.declare("x");
        asm.assign("x", |asm| {
            asm.number(5.0);
        });
        asm.assign("x", |asm| {
            asm.op(Command::LoadSymbol).sym("x");
            asm.number(1.0);
            asm.op(Command::AddOp);
        });
        asm.op(Command::LoadSymbol).sym("x");
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "6");
}

#[test]
fn function_call_binds_parameters() {
    // def double(n) { return n + n }; print double(21)
    let (status, output) = run_program(|asm| {
        let double = asm.function(1, false, |asm| {
            asm.op(Command::InitParam).sym("n").param(-1);
            asm.op(Command::LoadSymbol).sym("n");
            asm.op(Command::LoadSymbol).sym("n");
            asm.op(Command::AddOp);
            asm.op(Command::ExitCall);
        });
        asm.load_constant(double);
        asm.op(Command::InitCall);
        asm.number(21.0);
        asm.op(Command::Call).param(1);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "42");
}

#[test]
fn variadic_signature_collects_the_tail() {
    // def count(first, ...) { return extra tail size }  called with 4 args
    let (status, output) = run_program(|asm| {
        let count = asm.function(!1, false, |asm| {
            asm.op(Command::LoadExtraArguments);
            asm.op(Command::InitParam).sym("rest").param(-1);
            asm.op(Command::InitParam).sym("first").param(-1);
            asm.op(Command::LoadSymbol).sym("rest");
            asm.op(Command::InitMemberCall).sym("size");
            asm.op(Command::CallMember).param(0);
            asm.op(Command::ExitCall);
        });
        asm.load_constant(count);
        asm.op(Command::InitCall);
        asm.number(1.0);
        asm.number(2.0);
        asm.number(3.0);
        asm.number(4.0);
        asm.op(Command::Call).param(4);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "3");
}

#[test]
fn call_with_wrong_arity_raises() {
    let (status, output) = run_program(|asm| {
        let unary = asm.function(1, false, |asm| {
            asm.op(Command::InitParam).sym("n").param(-1);
            asm.op(Command::LoadSymbol).sym("n");
            asm.op(Command::ExitCall);
        });
        asm.load_constant(unary);
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.print();
        asm.exit_module();
    });
    assert_ne!(status, 0);
    assert_eq!(output, "");
}

#[test]
fn exit_exec_terminates_with_status() {
    let (status, output) = run_program(|asm| {
        asm.print_text("before");
        asm.number(7.0);
        asm.op(Command::ExitExec);
        asm.print_text("after");
        asm.exit_module();
    });
    assert_eq!(status, 7);
    assert_eq!(output, "before");
}

#[test]
fn case_jump_matches_labels() {
    // switch 2 { case 1: print "one"; case 2: print "two" }
    let (status, output) = run_program(|asm| {
        asm.number(2.0);

        asm.number(1.0);
        asm.op(Command::CaseJump);
        let one = asm.placeholder();
        asm.number(2.0);
        asm.op(Command::CaseJump);
        let two = asm.placeholder();
        // default: drop subject
        asm.op(Command::UnloadReference);
        asm.op(Command::Jump);
        let end_default = asm.placeholder();

        asm.patch_here(one);
        asm.print_text("one");
        asm.op(Command::Jump);
        let end_one = asm.placeholder();

        asm.patch_here(two);
        asm.print_text("two");

        asm.patch_here(end_one);
        asm.patch_here(end_default);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "two");
}

#[test]
fn typeof_names_builtin_kinds() {
    let (status, output) = run_program(|asm| {
        asm.number(1.0);
        asm.op(Command::TypeofOp);
        asm.print();
        asm.print_text(" ");
        asm.string("x");
        asm.op(Command::TypeofOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "number string");
}
