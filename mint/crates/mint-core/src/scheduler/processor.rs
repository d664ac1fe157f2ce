//! The instruction dispatch loop.
//!
//! [`run_step`] reads one node from the cursor and dispatches on its
//! command. One call executes one instruction; the owning process strings
//! quanta of them together. All of it runs under the processor lock.

use crate::ast::cursor::{Cursor, ExecutionMode, RaiseResult};
use crate::ast::node::Command;
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::builtin::hash::create_hash;
use crate::memory::builtin::iterator::{
    close_generator, create_iterator, iterator_advance, iterator_front, payload_of,
    store_generator_state, take_generator_state, IteratorPayload,
};
use crate::memory::builtin::library::create_library;
use crate::memory::class::Operator;
use crate::memory::data::{Data, Format};
use crate::memory::memory_tool::{
    capture_all, capture_as, capture_symbol, create_fast_symbol, create_function_symbol,
    create_printer, create_symbol, get_object_member, init_call, init_capture, init_member_call,
    init_operator_call, init_parameter, load_extra_arguments, load_symbol, var_symbol,
};
use crate::memory::operator_tool::{
    add_operator, and_operator, band_operator, bor_operator, call_member_operator, call_operator,
    compl_operator, copy_operator, dec_operator, div_operator, eq_operator, eq_values,
    exclusive_range_operator, ge_operator, gt_operator, in_operator, inc_operator,
    inclusive_range_operator, iterator_init_value, le_operator, lt_operator, membersof_operator,
    mod_operator, move_operator, mul_operator, ne_operator, neg_operator, not_operator,
    or_operator, pos_operator, pow_operator, regex_match_operator, regex_unmatch_operator,
    shift_left_operator, shift_right_operator, strict_eq_operator, strict_ne_operator,
    sub_operator, subscript_move_operator, subscript_operator, typeof_operator, xor_operator,
};
use crate::memory::operator_tool::call_overload;
use crate::memory::reference::ReferenceFlags;
use crate::system::plugin::Plugin;
use mint_util::Symbol;
use std::collections::VecDeque;
use std::sync::Arc;

/// What one instruction told the owning process to do next.
#[derive(Debug)]
pub enum StepResult {
    /// Keep executing within the quantum.
    Continue,
    /// Voluntarily give up the rest of the quantum.
    Yield,
    /// The root frame exited, or the process was told to die.
    Done,
    /// `EXIT_EXEC` requested runtime shutdown.
    Exit,
    /// A raise found no retrieve point; the payload escalates to the
    /// scheduler.
    Unwound(crate::memory::reference::WeakReference),
}

/// Execute one instruction.
pub fn run_step(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<StepResult> {
    let command = cursor.next(&runtime.modules).command();

    match command {
        // ----------------------------------------------------------
        // Module / bootstrap
        Command::LoadModule => {
            let name = cursor.next(&runtime.modules).symbol();
            let module = runtime.load_module(name.as_str())?;
            let root = runtime.global.root();
            let handle = crate::ast::module::Handle {
                module,
                offset: 0,
                package: root,
                fast_count: 0,
                generator: false,
                symbols: true,
            };
            cursor.begin_call(&mut runtime.gc, &handle, None, None, 0, 0, false);
        }
        Command::ExitModule => {
            if !cursor.exit_call(&mut runtime.gc) {
                return Ok(StepResult::Done);
            }
        }

        // ----------------------------------------------------------
        // Load
        Command::LoadFast => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let index = cursor.next(&runtime.modules).parameter() as usize;
            let reference = cursor
                .symbols_mut()
                .get_fast(&mut runtime.gc, symbol, index);
            cursor.push(reference);
        }
        Command::LoadSymbol => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let reference = load_symbol(runtime, cursor, symbol);
            cursor.push(reference);
        }
        Command::LoadMember => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let object = pop(cursor)?;
            let lookup = get_object_member(runtime, cursor, &object, symbol);
            runtime.gc.discard(object);
            let (member, _) = lookup?;
            cursor.push(member);
        }
        Command::LoadOperator => {
            let index = cursor.next(&runtime.modules).parameter() as usize;
            let op = Operator::from_index(index)
                .ok_or_else(|| MintError::Internal(format!("unknown operator index {index}")))?;
            let object = pop(cursor)?;
            let lookup = get_object_member(runtime, cursor, &object, op.symbol());
            runtime.gc.discard(object);
            let (member, _) = lookup?;
            cursor.push(member);
        }
        Command::LoadConstant => {
            let constant = cursor.next(&runtime.modules).constant();
            let module = cursor.current().module;
            let reference = runtime
                .modules
                .module(module)
                .constant(constant)
                .raw_alias();
            let shared = runtime.gc.share(&reference);
            cursor.push(shared);
        }
        Command::LoadVarSymbol => {
            let symbol = var_symbol(runtime, cursor)?;
            let reference = load_symbol(runtime, cursor, symbol);
            cursor.push(reference);
        }
        Command::LoadVarMember => {
            let symbol = var_symbol(runtime, cursor)?;
            let object = pop(cursor)?;
            let lookup = get_object_member(runtime, cursor, &object, symbol);
            runtime.gc.discard(object);
            let (member, _) = lookup?;
            cursor.push(member);
        }
        Command::CloneReference => {
            let top = top(cursor)?;
            let cloned = runtime.gc.clone_reference(&top);
            cursor.push(cloned);
        }
        Command::ReloadReference => {
            let top = top(cursor)?;
            let shared = runtime.gc.share(&top);
            cursor.push(shared);
        }
        Command::UnloadReference => {
            let reference = pop(cursor)?;
            runtime.gc.discard(reference);
        }
        Command::LoadExtraArguments => {
            load_extra_arguments(runtime, cursor)?;
        }

        // ----------------------------------------------------------
        // Declare
        Command::DeclareFast => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let index = cursor.next(&runtime.modules).parameter() as usize;
            let flags = ReferenceFlags(cursor.next(&runtime.modules).parameter() as u16);
            create_fast_symbol(runtime, cursor, symbol, index, flags);
        }
        Command::DeclareSymbol => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let flags = ReferenceFlags(cursor.next(&runtime.modules).parameter() as u16);
            create_symbol(runtime, cursor, symbol, flags);
        }
        Command::DeclareFunction => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let flags = ReferenceFlags(cursor.next(&runtime.modules).parameter() as u16);
            create_function_symbol(runtime, cursor, symbol, flags)?;
        }
        Command::FunctionOverload => {
            let overload = pop(cursor)?;
            let target = top(cursor)?;
            let merged =
                crate::memory::function_tool::merge_functions(&mut runtime.gc, &target, &overload);
            runtime.gc.discard(overload);
            merged?;
        }
        Command::ResetSymbol => {
            let symbol = cursor.next(&runtime.modules).symbol();
            if let Some(removed) = cursor.symbols_mut().remove(symbol) {
                runtime.gc.discard(removed);
            }
        }
        Command::ResetFast => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let index = cursor.next(&runtime.modules).parameter() as usize;
            cursor
                .symbols_mut()
                .erase_fast(&mut runtime.gc, symbol, index);
        }

        // ----------------------------------------------------------
        // Collection construction
        Command::AllocIterator => {
            let iterator = create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(VecDeque::new()),
            );
            cursor.push(iterator);
        }
        Command::InitIterator => {
            let count = cursor.next(&runtime.modules).parameter() as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(pop(cursor)?);
            }
            let iterator = top(cursor)?;
            for value in values.into_iter().rev() {
                emplace_into_iterator(runtime, &iterator, value)?;
            }
        }
        Command::AllocArray => {
            let array = crate::memory::builtin::array::create_array(
                &runtime.global,
                &mut runtime.gc,
                Vec::new(),
            );
            cursor.push(array);
        }
        Command::InitArray => {
            let count = cursor.next(&runtime.modules).parameter() as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(pop(cursor)?);
            }
            let array = top(cursor)?;
            for value in values.into_iter().rev() {
                crate::memory::builtin::array::array_append(&mut runtime.gc, &array, value);
            }
        }
        Command::AllocHash => {
            let hash = create_hash(&runtime.global, &mut runtime.gc);
            cursor.push(hash);
        }
        Command::InitHash => {
            let pairs = cursor.next(&runtime.modules).parameter() as usize;
            let mut values = Vec::with_capacity(pairs);
            for _ in 0..pairs {
                let value = pop(cursor)?;
                let key = pop(cursor)?;
                values.push((key, value));
            }
            let hash = top(cursor)?;
            for (key, value) in values.into_iter().rev() {
                crate::memory::builtin::hash::hash_insert(&mut runtime.gc, &hash, key, value)?;
            }
        }
        Command::CreateLib => {
            let path = pop(cursor)?;
            let name =
                crate::memory::cast_tool::to_string(&runtime.gc, &runtime.global, &path);
            runtime.gc.discard(path);
            let plugin = Plugin::load(&name).map_err(|message| MintError::Compile {
                module: name.clone(),
                message,
            })?;
            let library = create_library(&runtime.global, &mut runtime.gc, Arc::new(plugin));
            cursor.push(library);
        }

        // ----------------------------------------------------------
        // Assignment, arithmetic, comparison
        Command::MoveOp => move_operator(runtime, cursor)?,
        Command::CopyOp => copy_operator(runtime, cursor)?,
        Command::AddOp => add_operator(runtime, cursor)?,
        Command::SubOp => sub_operator(runtime, cursor)?,
        Command::MulOp => mul_operator(runtime, cursor)?,
        Command::DivOp => div_operator(runtime, cursor)?,
        Command::ModOp => mod_operator(runtime, cursor)?,
        Command::PowOp => pow_operator(runtime, cursor)?,
        Command::NegOp => neg_operator(runtime, cursor)?,
        Command::PosOp => pos_operator(runtime, cursor)?,
        Command::IncOp => inc_operator(runtime, cursor)?,
        Command::DecOp => dec_operator(runtime, cursor)?,
        Command::EqOp => eq_operator(runtime, cursor)?,
        Command::NeOp => ne_operator(runtime, cursor)?,
        Command::LtOp => lt_operator(runtime, cursor)?,
        Command::GtOp => gt_operator(runtime, cursor)?,
        Command::LeOp => le_operator(runtime, cursor)?,
        Command::GeOp => ge_operator(runtime, cursor)?,
        Command::StrictEqOp => strict_eq_operator(runtime, cursor)?,
        Command::StrictNeOp => strict_ne_operator(runtime, cursor)?,
        Command::AndOp => and_operator(runtime, cursor)?,
        Command::OrOp => or_operator(runtime, cursor)?,
        Command::NotOp => not_operator(runtime, cursor)?,
        Command::BAndOp => band_operator(runtime, cursor)?,
        Command::BOrOp => bor_operator(runtime, cursor)?,
        Command::XOrOp => xor_operator(runtime, cursor)?,
        Command::ComplOp => compl_operator(runtime, cursor)?,
        Command::ShiftLeftOp => shift_left_operator(runtime, cursor)?,
        Command::ShiftRightOp => shift_right_operator(runtime, cursor)?,

        // Short-circuit pre-checks leave the left operand as the result
        // when they jump.
        Command::AndPreCheck => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            let operand = top(cursor)?;
            if !crate::memory::cast_tool::to_boolean(&runtime.gc, &operand) {
                cursor.jmp(target);
            }
        }
        Command::OrPreCheck => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            let operand = top(cursor)?;
            if crate::memory::cast_tool::to_boolean(&runtime.gc, &operand) {
                cursor.jmp(target);
            }
        }

        // ----------------------------------------------------------
        // Ranges and iteration
        Command::InclusiveRangeOp => inclusive_range_operator(runtime, cursor)?,
        Command::ExclusiveRangeOp => exclusive_range_operator(runtime, cursor)?,
        Command::InOp => in_operator(runtime, cursor)?,
        Command::RangeInit => {
            let value = pop(cursor)?;
            let iterator = iterator_init_value(runtime, value)?;
            cursor.push(iterator);
        }
        Command::RangeNext => {
            let iterator = top(cursor)?;
            iterator_advance(&mut runtime.gc, &iterator)?;
        }
        Command::RangeCheck | Command::RangeIteratorCheck => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            return range_check(runtime, cursor, target);
        }
        Command::FindInit => {
            let container = pop(cursor)?;
            let iterator = iterator_init_value(runtime, container)?;
            cursor.push(iterator);
        }
        Command::FindNext => {
            let iterator = top(cursor)?;
            iterator_advance(&mut runtime.gc, &iterator)?;
        }
        Command::FindCheck => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            find_check(runtime, cursor, target)?;
        }

        // ----------------------------------------------------------
        // Indexing, reflection
        Command::SubscriptOp => subscript_operator(runtime, cursor)?,
        Command::SubscriptMoveOp => subscript_move_operator(runtime, cursor)?,
        Command::TypeofOp => typeof_operator(runtime, cursor)?,
        Command::MembersofOp => membersof_operator(runtime, cursor)?,
        Command::FindDefinedSymbol => {
            let symbol = cursor.next(&runtime.modules).symbol();
            find_defined_symbol(runtime, cursor, symbol);
        }
        Command::FindDefinedMember => {
            let symbol = cursor.next(&runtime.modules).symbol();
            find_defined_member(runtime, cursor, symbol)?;
        }
        Command::FindDefinedVarSymbol => {
            let symbol = var_symbol(runtime, cursor)?;
            find_defined_symbol(runtime, cursor, symbol);
        }
        Command::FindDefinedVarMember => {
            let symbol = var_symbol(runtime, cursor)?;
            find_defined_member(runtime, cursor, symbol)?;
        }
        Command::CheckDefined => {
            let value = pop(cursor)?;
            let defined = runtime.gc.format_of(&value) != Format::None;
            runtime.gc.discard(value);
            let result = runtime.gc.create(Data::Boolean(defined));
            cursor.push(result);
        }

        // ----------------------------------------------------------
        // Control
        Command::Jump => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            cursor.jmp(target);
        }
        Command::JumpZero => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            let condition = pop(cursor)?;
            let truthy = crate::memory::cast_tool::to_boolean(&runtime.gc, &condition);
            runtime.gc.discard(condition);
            if !truthy {
                cursor.jmp(target);
            }
        }
        Command::CaseJump => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            let label = pop(cursor)?;
            let subject = top(cursor)?;
            let matched = eq_values(&runtime.gc, &label, &subject);
            runtime.gc.discard(label);
            if matched {
                let subject = pop(cursor)?;
                runtime.gc.discard(subject);
                cursor.jmp(target);
            }
        }
        Command::SetRetrievePoint => {
            let target = cursor.next(&runtime.modules).parameter() as usize;
            cursor.set_retrieve_point(target);
        }
        Command::UnsetRetrievePoint => {
            cursor.unset_retrieve_point();
        }
        Command::Raise => {
            let exception = pop(cursor)?;
            match cursor.raise(&mut runtime.gc, exception) {
                RaiseResult::Handled => {}
                RaiseResult::Unhandled(payload) => return Ok(StepResult::Unwound(payload)),
            }
        }

        // ----------------------------------------------------------
        // Invocation
        Command::InitCall => init_call(runtime, cursor)?,
        Command::InitMemberCall => {
            let symbol = cursor.next(&runtime.modules).symbol();
            init_member_call(runtime, cursor, symbol)?;
        }
        Command::InitOperatorCall => {
            let index = cursor.next(&runtime.modules).parameter() as usize;
            let op = Operator::from_index(index)
                .ok_or_else(|| MintError::Internal(format!("unknown operator index {index}")))?;
            init_operator_call(runtime, cursor, op)?;
        }
        Command::InitVarMemberCall => {
            let symbol = var_symbol(runtime, cursor)?;
            init_member_call(runtime, cursor, symbol)?;
        }
        Command::InitParam => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let index = cursor.next(&runtime.modules).parameter();
            let index = usize::try_from(index).ok();
            init_parameter(runtime, cursor, symbol, index)?;
        }
        Command::Call => {
            let signature = cursor.next(&runtime.modules).parameter();
            call_operator(runtime, cursor, signature)?;
        }
        Command::CallMember => {
            let signature = cursor.next(&runtime.modules).parameter();
            call_member_operator(runtime, cursor, signature)?;
        }
        Command::CallBuiltin => {
            let index = cursor.next(&runtime.modules).parameter() as usize;
            runtime.call_builtin(index, cursor)?;
        }
        Command::ExitCall => {
            let still_running = cursor.exit_call(&mut runtime.gc);
            debug_assert!(still_running, "EXIT_CALL popped the root frame");
        }

        // ----------------------------------------------------------
        // Generators
        Command::Yield => {
            yield_value(runtime, cursor)?;
        }
        Command::YieldExitGenerator => {
            let value = pop(cursor)?;
            let target = cursor.current_mut().generator.take();
            if let Some(target) = target {
                let stored = runtime.gc.share(&value);
                emplace_into_iterator(runtime, &target, stored)?;
                close_generator(&mut runtime.gc, &target)?;
                runtime.gc.discard(target);
            }
            runtime.gc.discard(value);
            exit_generator_frame(runtime, cursor);
        }
        Command::ExitGenerator => {
            let target = cursor.current_mut().generator.take();
            if let Some(target) = target {
                close_generator(&mut runtime.gc, &target)?;
                runtime.gc.discard(target);
            }
            exit_generator_frame(runtime, cursor);
        }
        Command::BeginGeneratorExpression => {
            let iterator = create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(VecDeque::new()),
            );
            cursor.current_mut().generator_expressions.push(iterator);
        }
        Command::YieldExpression => {
            let value = pop(cursor)?;
            let target = cursor
                .current()
                .generator_expressions
                .last()
                .map(|iterator| iterator.raw_alias())
                .ok_or_else(|| {
                    MintError::Internal("yield expression outside generator expression".to_string())
                })?;
            emplace_into_iterator(runtime, &target, value)?;
        }
        Command::EndGeneratorExpression => {
            let iterator = cursor
                .current_mut()
                .generator_expressions
                .pop()
                .ok_or_else(|| {
                    MintError::Internal("unbalanced generator expression".to_string())
                })?;
            cursor.push(iterator);
        }
        Command::InitCapture => init_capture(runtime, cursor)?,
        Command::CaptureSymbol => {
            let symbol = cursor.next(&runtime.modules).symbol();
            capture_symbol(runtime, cursor, symbol)?;
        }
        Command::CaptureAs => {
            let symbol = cursor.next(&runtime.modules).symbol();
            capture_as(runtime, cursor, symbol)?;
        }
        Command::CaptureAll => capture_all(runtime, cursor)?,
        Command::ExitThread => return Ok(StepResult::Done),
        Command::ExitExec => {
            let status = pop(cursor)?;
            let code = crate::memory::cast_tool::to_number(&runtime.gc, &status).unwrap_or(0.0);
            runtime.gc.discard(status);
            runtime.exit(code as i32);
            return Ok(StepResult::Exit);
        }

        // ----------------------------------------------------------
        // I/O redirection
        Command::OpenPrinter => {
            let designator = pop(cursor)?;
            let printer = create_printer(runtime, &designator);
            runtime.gc.discard(designator);
            cursor.open_printer(printer?);
        }
        Command::ClosePrinter => cursor.close_printer(),
        Command::Print => {
            let value = pop(cursor)?;
            let text = crate::memory::cast_tool::to_string(&runtime.gc, &runtime.global, &value);
            runtime.gc.discard(value);
            runtime.print(cursor, &text);
        }

        // ----------------------------------------------------------
        // OOP structure
        Command::OpenPackage => {
            let symbol = cursor.next(&runtime.modules).symbol();
            let parent = cursor
                .symbols()
                .package()
                .unwrap_or_else(|| runtime.global.root());
            let package = runtime.global.get_or_create_package(parent, symbol);
            cursor.symbols_mut().open_package(package);
        }
        Command::ClosePackage => cursor.symbols_mut().close_package(),
        Command::RegisterClass => {
            let index = cursor.next(&runtime.modules).parameter() as u32;
            let Runtime { gc, global, .. } = runtime;
            global.register_class(gc, crate::memory::class_register::DescriptionId(index))?;
        }

        // ----------------------------------------------------------
        // Regex
        Command::RegexMatch => regex_match_operator(runtime, cursor)?,
        Command::RegexUnmatch => regex_unmatch_operator(runtime, cursor)?,
    }

    Ok(StepResult::Continue)
}

// ----------------------------------------------------------------------
// Helpers

fn pop(cursor: &mut Cursor) -> MintResult<crate::memory::reference::WeakReference> {
    cursor
        .pop()
        .ok_or_else(|| MintError::Internal("value stack underflow".to_string()))
}

fn top(cursor: &Cursor) -> MintResult<crate::memory::reference::WeakReference> {
    Ok(cursor
        .top()
        .ok_or_else(|| MintError::Internal("value stack underflow".to_string()))?
        .raw_alias())
}

fn emplace_into_iterator(
    runtime: &mut Runtime,
    iterator: &crate::memory::reference::WeakReference,
    value: crate::memory::reference::WeakReference,
) -> MintResult<()> {
    match runtime.gc.data_of_mut(iterator) {
        Data::Object(object) => match &mut object.payload {
            crate::memory::data::Payload::Iterator(payload) => payload.emplace(value),
            _ => {
                let message = "emplace into non-iterator".to_string();
                runtime.gc.discard(value);
                Err(MintError::Internal(message))
            }
        },
        _ => {
            let message = "emplace into non-object".to_string();
            runtime.gc.discard(value);
            Err(MintError::Internal(message))
        }
    }
}

/// Loop head: jump out when the iterator on top of the stack is exhausted,
/// otherwise push the front value for the binding below.
///
/// A generator iterator with nothing materialized first resumes its frame,
/// rewinding so this check replays after the yield.
fn range_check(runtime: &mut Runtime, cursor: &mut Cursor, target: usize) -> MintResult<StepResult> {
    let iterator = top(cursor)?;

    let needs_drive = payload_of(&runtime.gc, &iterator)
        .map(|payload| payload.needs_drive())
        .unwrap_or(false);
    if needs_drive {
        let state = take_generator_state(&mut runtime.gc, &iterator)?
            .ok_or(MintError::GeneratorClosed)?;
        // Replay this RANGE_CHECK after the generator yields back.
        let replay = cursor.offset() - 2;
        cursor.jmp(replay);
        let generator_target = runtime.gc.share(&iterator);
        cursor.restore(state);
        cursor.current_mut().generator = Some(generator_target);
        return Ok(StepResult::Continue);
    }

    match iterator_front(&mut runtime.gc, &iterator)? {
        Some(front) => cursor.push(front),
        None => cursor.jmp(target),
    }
    Ok(StepResult::Continue)
}

/// `in`-search step: stack is `[needle, iterator]`.
fn find_check(runtime: &mut Runtime, cursor: &mut Cursor, target: usize) -> MintResult<()> {
    let iterator = top(cursor)?;

    let exhausted = payload_of(&runtime.gc, &iterator)
        .map(|payload| payload.exhausted())
        .unwrap_or(true);
    if exhausted {
        let iterator = pop(cursor)?;
        let needle = pop(cursor)?;
        runtime.gc.discard(iterator);
        runtime.gc.discard(needle);
        let result = runtime.gc.create(Data::Boolean(false));
        cursor.push(result);
        cursor.jmp(target);
        return Ok(());
    }

    let front = iterator_front(&mut runtime.gc, &iterator)?
        .ok_or_else(|| MintError::Internal("iterator front disappeared".to_string()))?;
    let needle = cursor
        .peek(1)
        .ok_or_else(|| MintError::Internal("find needle missing".to_string()))?
        .raw_alias();
    let matched = eq_values(&runtime.gc, &front, &needle);
    runtime.gc.discard(front);

    if matched {
        let iterator = pop(cursor)?;
        let needle = pop(cursor)?;
        runtime.gc.discard(iterator);
        runtime.gc.discard(needle);
        let result = runtime.gc.create(Data::Boolean(true));
        cursor.push(result);
        cursor.jmp(target);
    }
    Ok(())
}

fn find_defined_symbol(runtime: &mut Runtime, cursor: &mut Cursor, symbol: Symbol) {
    let found = cursor
        .symbols()
        .get(symbol)
        .map(|reference| reference.raw_alias())
        .or_else(|| {
            let mut package = cursor.symbols().package();
            while let Some(current) = package {
                if let Some(reference) = runtime.global.package(current).symbols().get(symbol) {
                    return Some(reference.raw_alias());
                }
                package = runtime.global.package(current).owner();
            }
            let root = runtime.global.root();
            runtime
                .global
                .package(root)
                .symbols()
                .get(symbol)
                .map(|reference| reference.raw_alias())
        });
    let result = match found {
        Some(reference) => runtime.gc.share(&reference),
        None => runtime.gc.none_reference(),
    };
    cursor.push(result);
}

fn find_defined_member(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
) -> MintResult<()> {
    let object = pop(cursor)?;
    let result = match get_object_member(runtime, cursor, &object, symbol) {
        Ok((member, _)) => member,
        Err(_) => runtime.gc.none_reference(),
    };
    runtime.gc.discard(object);
    cursor.push(result);
    Ok(())
}

/// `YIELD`: emplace the value into the frame's target iterator, then
/// suspend the frame back into it.
///
/// In single-pass mode (finalization) the value is dropped and execution
/// continues toward the generator's exit.
fn yield_value(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = pop(cursor)?;

    match cursor.current().mode {
        ExecutionMode::SinglePass => {
            runtime.gc.discard(value);
            Ok(())
        }
        ExecutionMode::Interruptible => {
            let target = cursor.current_mut().generator.take().ok_or_else(|| {
                MintError::Internal("yield outside a resumed generator".to_string())
            })?;
            emplace_into_iterator(runtime, &target, value)?;
            let state = cursor.interrupt();
            store_generator_state(&mut runtime.gc, &target, state)?;
            runtime.gc.discard(target);
            Ok(())
        }
    }
}

/// Unwind a finished generator frame: drop its temporaries and pop it.
fn exit_generator_frame(runtime: &mut Runtime, cursor: &mut Cursor) {
    let base = cursor.current().stack_base;
    while cursor.stack_len() > base {
        if let Some(reference) = cursor.pop() {
            runtime.gc.discard(reference);
        }
    }
    let still_running = cursor.exit_call(&mut runtime.gc);
    debug_assert!(still_running, "generator exit popped the root frame");
}

/// Wrap an operator overload probe for the operator-table fast path.
///
/// Exposed for embedders implementing custom opcodes; the dispatch above
/// goes through the operator handlers, which use it internally.
pub fn try_overload(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    signature: i32,
) -> MintResult<bool> {
    call_overload(runtime, cursor, op, signature)
}
