//! Class registration, instantiation, inheritance.

mod common;

use common::{run_program, Asm};
use mint_core::ast::Command;
use mint_core::memory::{ClassDescription, DescriptionId, ReferenceFlags};
use mint_util::Symbol;

/// Build a class description with plain value members.
fn describe(asm: &mut Asm, name: &str, bases: &[&str], members: &[(&str, f64)]) -> DescriptionId {
    let root = asm.rt.global.root();
    let mut description =
        ClassDescription::new(root, ReferenceFlags::DEFAULT, Symbol::intern(name));
    for base in bases {
        description.add_base(vec![Symbol::intern(base)]);
    }
    for (member, value) in members {
        let reference = asm
            .rt
            .gc
            .create(mint_core::memory::Data::Number(*value));
        // Plain members keep DEFAULT flags so they occupy instance slots.
        asm.rt.gc.set_flags(&reference, ReferenceFlags::DEFAULT);
        assert!(description.create_member(Symbol::intern(member), reference));
    }
    asm.rt.global.add_description(description)
}

#[test]
fn instantiation_reads_slot_defaults() {
    // class A { mbr = 1 }; print A().mbr
    let (status, output) = run_program(|asm| {
        let class_a = describe(asm, "A", &[], &[("mbr", 1.0)]);
        asm.op(Command::RegisterClass).param(class_a.0 as i32);
        asm.op(Command::LoadSymbol).sym("A");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::LoadMember).sym("mbr");
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "1");
}

#[test]
fn override_resolves_multiple_inheritance() {
    // class A { mbr = 1 }  class B { mbr = 2 }  class C : A, B { mbr = 3 }
    // print C().mbr
    let (status, output) = run_program(|asm| {
        let a = describe(asm, "A", &[], &[("mbr", 1.0)]);
        let b = describe(asm, "B", &[], &[("mbr", 2.0)]);
        let c = describe(asm, "C", &["A", "B"], &[("mbr", 3.0)]);

        asm.op(Command::RegisterClass).param(a.0 as i32);
        asm.op(Command::RegisterClass).param(b.0 as i32);
        asm.op(Command::RegisterClass).param(c.0 as i32);

        asm.op(Command::LoadSymbol).sym("C");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::LoadMember).sym("mbr");
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "3");
}

#[test]
fn ambiguous_inheritance_without_override_is_fatal() {
    let (status, output) = run_program(|asm| {
        let a = describe(asm, "A", &[], &[("mbr", 1.0)]);
        let b = describe(asm, "B", &[], &[("mbr", 2.0)]);
        let c = describe(asm, "C", &["A", "B"], &[]);

        asm.op(Command::RegisterClass).param(a.0 as i32);
        asm.op(Command::RegisterClass).param(b.0 as i32);
        asm.op(Command::RegisterClass).param(c.0 as i32);
        asm.print_text("unreachable");
        asm.exit_module();
    });
    assert_ne!(status, 0);
    assert_eq!(output, "");
}

#[test]
fn slot_mutation_is_per_instance() {
    // a = A(); b = A(); a.mbr = 9; print a.mbr, b.mbr
    let (status, output) = run_program(|asm| {
        let class_a = describe(asm, "A", &[], &[("mbr", 1.0)]);
        asm.op(Command::RegisterClass).param(class_a.0 as i32);

        asm.declare("a");
        asm.assign("a", |asm| {
            asm.op(Command::LoadSymbol).sym("A");
            asm.op(Command::InitCall);
            asm.op(Command::Call).param(0);
        });
        asm.declare("b");
        asm.assign("b", |asm| {
            asm.op(Command::LoadSymbol).sym("A");
            asm.op(Command::InitCall);
            asm.op(Command::Call).param(0);
        });

        asm.op(Command::LoadSymbol).sym("a");
        asm.op(Command::LoadMember).sym("mbr");
        asm.number(9.0);
        asm.op(Command::MoveOp);
        asm.op(Command::UnloadReference);

        asm.op(Command::LoadSymbol).sym("a");
        asm.op(Command::LoadMember).sym("mbr");
        asm.print();
        asm.print_text(" ");
        asm.op(Command::LoadSymbol).sym("b");
        asm.op(Command::LoadMember).sym("mbr");
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "9 1");
}

#[test]
fn methods_dispatch_through_members() {
    // class A { mbr = 5; def get(self) { return self.mbr } }
    let (status, output) = run_program(|asm| {
        let get = asm.function_value(1, false, |asm| {
            asm.op(Command::InitParam).sym("self").param(-1);
            asm.op(Command::LoadSymbol).sym("self");
            asm.op(Command::LoadMember).sym("mbr");
            asm.op(Command::ExitCall);
        });

        let class_a = describe(asm, "A", &[], &[("mbr", 5.0)]);
        assert!(asm
            .rt
            .global
            .description_mut(class_a)
            .create_member(Symbol::intern("get"), get));

        asm.op(Command::RegisterClass).param(class_a.0 as i32);
        asm.op(Command::LoadSymbol).sym("A");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::InitMemberCall).sym("get");
        asm.op(Command::CallMember).param(0);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "5");
}

#[test]
fn membersof_lists_class_members() {
    let (status, output) = run_program(|asm| {
        let class_a = describe(asm, "A", &[], &[("first", 1.0), ("second", 2.0)]);
        asm.op(Command::RegisterClass).param(class_a.0 as i32);
        asm.op(Command::LoadSymbol).sym("A");
        asm.op(Command::InitCall);
        asm.op(Command::Call).param(0);
        asm.op(Command::MembersofOp);
        asm.print();
        asm.exit_module();
    });
    assert_eq!(status, 0);
    assert_eq!(output, "[first, second]");
}
