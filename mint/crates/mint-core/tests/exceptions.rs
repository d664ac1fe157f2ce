//! Raise, retrieve points, and escalation.

mod common;

use common::{run_program, Asm};
use mint_core::ast::Command;
use mint_core::memory::{ClassDescription, DescriptionId, ReferenceFlags};
use mint_util::Symbol;

/// class E { def show(self) { print "caught:", self.msg, "\n" }; msg = "oops" }
fn describe_exception_class(asm: &mut Asm) -> DescriptionId {
    let show = asm.function_value(1, false, |asm| {
        asm.op(Command::InitParam).sym("self").param(-1);
        asm.print_text("caught:");
        asm.print_text(" ");
        asm.op(Command::LoadSymbol).sym("self");
        asm.op(Command::LoadMember).sym("msg");
        asm.print();
        asm.print_text("\n");
        asm.string("");
        asm.op(Command::ExitCall);
    });
    let msg = mint_core::memory::builtin::string::create_string(
        &asm.rt.global,
        &mut asm.rt.gc,
        "oops",
    );
    asm.rt.gc.set_flags(&msg, ReferenceFlags::DEFAULT);

    let root = asm.rt.global.root();
    let mut description =
        ClassDescription::new(root, ReferenceFlags::DEFAULT, Symbol::intern("E"));
    assert!(description.create_member(Symbol::intern("show"), show));
    assert!(description.create_member(Symbol::intern("msg"), msg));
    asm.rt.global.add_description(description)
}

#[test]
fn try_catch_handles_a_raise() {
    // try { raise E() } catch e { print "handled\n" }
    let (status, output) = run_program(|asm| {
        let class_e = describe_exception_class(asm);
        asm.op(Command::RegisterClass).param(class_e.0 as i32);

        asm.op(Command::SetRetrievePoint);
        let handler = asm.placeholder();
        asm.op(Command::LoadSymbol).sym("E");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::Raise);
        // not reached
        asm.op(Command::UnsetRetrievePoint);
        asm.op(Command::Jump);
        let end = asm.placeholder();

        asm.patch_here(handler);
        asm.op(Command::UnloadReference); // drop the exception payload
        asm.print_text("handled\n");

        asm.patch_here(end);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "handled\n");
}

#[test]
fn unhandled_raise_runs_show_and_fails() {
    // raise E() with no try block: show prints, status is non-zero.
    let (status, output) = run_program(|asm| {
        let class_e = describe_exception_class(asm);
        asm.op(Command::RegisterClass).param(class_e.0 as i32);

        asm.op(Command::LoadSymbol).sym("E");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::Raise);
        asm.exit_module();
    });
    assert_ne!(status, 0);
    assert_eq!(output, "caught: oops\n");
}

#[test]
fn raise_truncates_stacks_to_the_retrieve_point() {
    // Values pushed inside the try block disappear; the one pushed before
    // survives.
    let (status, output) = run_program(|asm| {
        asm.number(111.0);

        asm.op(Command::SetRetrievePoint);
        let handler = asm.placeholder();
        asm.number(222.0); // dead temporary
        asm.string("boom");
        asm.op(Command::Raise);
        asm.op(Command::UnsetRetrievePoint);
        asm.op(Command::Jump);
        let end = asm.placeholder();

        asm.patch_here(handler);
        asm.print(); // prints the exception payload
        asm.print_text(" ");

        asm.patch_here(end);
        asm.print(); // prints 111, proving the truncation level
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "boom 111");
}

#[test]
fn raise_unwinds_nested_calls() {
    // The raise happens inside a callee; the handler sits in the caller.
    let (status, output) = run_program(|asm| {
        let thrower = asm.function(0, false, |asm| {
            asm.string("deep");
            asm.op(Command::Raise);
            asm.op(Command::ExitCall);
        });

        asm.op(Command::SetRetrievePoint);
        let handler = asm.placeholder();
        asm.load_constant(thrower);
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::UnloadReference);
        asm.op(Command::UnsetRetrievePoint);
        asm.op(Command::Jump);
        let end = asm.placeholder();

        asm.patch_here(handler);
        asm.print();

        asm.patch_here(end);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "deep");
}

#[test]
fn engine_errors_travel_the_raise_path() {
    // Modulo by zero raises a catchable language exception.
    let (status, output) = run_program(|asm| {
        asm.op(Command::SetRetrievePoint);
        let handler = asm.placeholder();
        asm.number(1.0);
        asm.number(0.0);
        asm.op(Command::ModOp);
        asm.op(Command::UnloadReference);
        asm.op(Command::UnsetRetrievePoint);
        asm.op(Command::Jump);
        let end = asm.placeholder();

        asm.patch_here(handler);
        asm.op(Command::UnloadReference);
        asm.print_text("caught division");

        asm.patch_here(end);
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "caught division");
}

#[test]
fn unhandled_string_raise_fails_without_show() {
    let (status, output) = run_program(|asm| {
        asm.string("plain failure");
        asm.op(Command::Raise);
        asm.exit_module();
    });
    assert_ne!(status, 0);
    assert_eq!(output, "");
}
