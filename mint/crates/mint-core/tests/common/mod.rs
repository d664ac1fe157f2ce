//! Shared test support: a small bytecode assembler over the public
//! module-builder API, playing the compiler collaborator's role, plus a
//! captured-output runner.

// Each test binary includes this module and uses a different helper subset.
#![allow(dead_code)]

use mint_core::ast::module::{ConstantId, MAIN_ID};
use mint_core::ast::{BufferPrinter, Command, ModuleState, Node, Runtime};
use mint_core::memory::builtin::string::create_string;
use mint_core::memory::data::Data;
use mint_core::{RuntimeConfig, Scheduler};

/// Assembler over the main module.
pub struct Asm<'rt> {
    pub rt: &'rt mut Runtime,
}

impl Asm<'_> {
    pub fn op(&mut self, command: Command) -> &mut Self {
        self.rt
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Command(command));
        self
    }

    pub fn param(&mut self, value: i32) -> &mut Self {
        self.rt
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Parameter(value));
        self
    }

    pub fn sym(&mut self, name: &str) -> &mut Self {
        let symbol = self.rt.modules.module_mut(MAIN_ID).make_symbol(name);
        self.rt
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Symbol(symbol));
        self
    }

    /// Offset the next node will occupy.
    pub fn offset(&self) -> usize {
        self.rt.modules.module(MAIN_ID).next_node_offset()
    }

    /// Emit a parameter placeholder to patch later.
    pub fn placeholder(&mut self) -> usize {
        let at = self.offset();
        self.param(0);
        at
    }

    /// Patch a placeholder with the current offset.
    pub fn patch_here(&mut self, at: usize) {
        let target = self.offset() as i32;
        self.rt
            .modules
            .module_mut(MAIN_ID)
            .replace_node(at, Node::Parameter(target));
    }

    pub fn constant(&mut self, data: Data) -> ConstantId {
        let reference = self.rt.gc.create(data);
        self.rt.modules.module_mut(MAIN_ID).make_constant(reference)
    }

    pub fn string_constant(&mut self, text: &str) -> ConstantId {
        let reference = create_string(&self.rt.global, &mut self.rt.gc, text);
        self.rt.modules.module_mut(MAIN_ID).make_constant(reference)
    }

    pub fn load_constant(&mut self, constant: ConstantId) -> &mut Self {
        self.op(Command::LoadConstant);
        self.rt
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Constant(constant));
        self
    }

    /// `LOAD_CONSTANT` of a fresh number.
    pub fn number(&mut self, value: f64) -> &mut Self {
        let constant = self.constant(Data::Number(value));
        self.load_constant(constant)
    }

    pub fn boolean(&mut self, value: bool) -> &mut Self {
        let constant = self.constant(Data::Boolean(value));
        self.load_constant(constant)
    }

    /// `LOAD_CONSTANT` of a fresh string.
    pub fn string(&mut self, text: &str) -> &mut Self {
        let constant = self.string_constant(text);
        self.load_constant(constant)
    }

    /// Print the top of stack.
    pub fn print(&mut self) -> &mut Self {
        self.op(Command::Print)
    }

    /// Print a literal separator.
    pub fn print_text(&mut self, text: &str) -> &mut Self {
        self.string(text);
        self.print()
    }

    fn sym_flags(&mut self, name: &str, flags: i32) -> &mut Self {
        self.sym(name);
        self.param(flags)
    }

    /// `name = value_emitter()`: loads the target cell, runs the emitter to
    /// push the value, then moves and drops the result.
    pub fn assign(&mut self, name: &str, value: impl FnOnce(&mut Asm)) -> &mut Self {
        self.op(Command::LoadSymbol).sym(name);
        value(self);
        self.op(Command::MoveOp);
        self.op(Command::UnloadReference)
    }

    /// Declare a symbol with DEFAULT flags.
    pub fn declare(&mut self, name: &str) -> &mut Self {
        self.op(Command::DeclareSymbol).sym_flags(name, 0)
    }

    /// Emit a function body out of line, returning its constant.
    ///
    /// The body is skipped by a jump at emission point; the handle carries
    /// the generator flag. The body must end with `EXIT_CALL` (or a
    /// generator exit).
    pub fn function(
        &mut self,
        signature: i32,
        generator: bool,
        body: impl FnOnce(&mut Asm),
    ) -> ConstantId {
        self.op(Command::Jump);
        let skip = self.placeholder();
        let entry = self.offset();
        body(self);
        self.patch_here(skip);

        let root = self.rt.global.root();
        let handle = self
            .rt
            .modules
            .module_mut(MAIN_ID)
            .make_handle(root, entry, 0, generator, true);
        let reference =
            mint_core::memory::function_tool::create_function(&mut self.rt.gc, signature, handle);
        self.rt.modules.module_mut(MAIN_ID).make_constant(reference)
    }

    /// Emit a function body and yield an owned reference to its value, for
    /// installing as a class-description member.
    pub fn function_value(
        &mut self,
        signature: i32,
        generator: bool,
        body: impl FnOnce(&mut Asm),
    ) -> mint_core::memory::WeakReference {
        let constant = self.function(signature, generator, body);
        let reference = self.rt.modules.module(MAIN_ID).constant(constant);
        self.rt.gc.share(reference)
    }

    /// Member call `receiver.name(args…)` with the receiver and arguments
    /// already emitted in order.
    pub fn call_member(&mut self, name: &str, argument_count: i32) -> &mut Self {
        // The receiver must be on top when INIT_MEMBER_CALL runs, so this
        // helper only supports zero-argument calls.
        assert_eq!(argument_count, 0, "emit arguments after INIT_MEMBER_CALL");
        self.op(Command::InitMemberCall).sym(name);
        self.op(Command::CallMember).param(0)
    }

    pub fn exit_module(&mut self) -> &mut Self {
        self.op(Command::ExitModule)
    }
}

/// Assemble the main module and run it, capturing printed output.
pub fn run_program(build: impl FnOnce(&mut Asm)) -> (i32, String) {
    let scheduler = Scheduler::new(RuntimeConfig::default());
    let printer = BufferPrinter::new();
    {
        let mut runtime = scheduler.lock_processor();
        runtime.set_default_printer(Box::new(printer.clone()));
        let mut asm = Asm { rt: &mut *runtime };
        build(&mut asm);
        runtime.modules.entry_mut(MAIN_ID).state = ModuleState::Ready;
    }
    let status = scheduler.run_module(MAIN_ID);
    (status, printer.contents())
}
