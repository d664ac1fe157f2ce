//! Memory tooling: the helpers the dispatch loop is written in terms of.
//!
//! Symbol resolution, member access with visibility enforcement, call
//! preparation, parameter binding, capture construction, and printer
//! selection.

use crate::ast::cursor::{Call, Cursor};
use crate::ast::printer::{FilePrinter, Printer, StandardPrinter};
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::builtin::iterator::{create_iterator, IteratorPayload};
use crate::memory::class::{make_instance, ClassId, Operator};
use crate::memory::data::{Data, Object};
use crate::memory::function_tool::merge_functions;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::{ReferenceFlags, WeakReference};
use crate::memory::symbol_table::SymbolTable;
use mint_util::Symbol;
use std::collections::VecDeque;
use std::path::PathBuf;

// ----------------------------------------------------------------------
// Symbols

/// Reference for a symbol in a table, creating a DEFAULT-visibility cell on
/// first mention.
pub fn get_symbol_reference(
    gc: &mut GarbageCollector,
    table: &mut SymbolTable,
    symbol: Symbol,
) -> WeakReference {
    if let Some(existing) = table.get(symbol) {
        return gc.share(existing);
    }
    let none = gc.none();
    let reference = gc.new_reference(ReferenceFlags::DEFAULT, none);
    let shared = gc.share(&reference);
    if let Some(previous) = table.insert(symbol, reference) {
        gc.discard(previous);
    }
    shared
}

/// Resolve a symbol through the frame's table, the open package chain, and
/// the root package, creating a local slot when nothing is found.
pub fn load_symbol(runtime: &mut Runtime, cursor: &mut Cursor, symbol: Symbol) -> WeakReference {
    if let Some(existing) = cursor.symbols().get(symbol) {
        let existing = existing.raw_alias();
        return runtime.gc.share(&existing);
    }

    let mut package = cursor.symbols().package();
    while let Some(current) = package {
        if let Some(existing) = runtime.global.package(current).symbols().get(symbol) {
            let existing = existing.raw_alias();
            return runtime.gc.share(&existing);
        }
        package = runtime.global.package(current).owner();
    }

    let root = runtime.global.root();
    if let Some(existing) = runtime.global.package(root).symbols().get(symbol) {
        let existing = existing.raw_alias();
        return runtime.gc.share(&existing);
    }

    get_symbol_reference(&mut runtime.gc, cursor.symbols_mut(), symbol)
}

/// Pop a name computed on the stack and intern it.
pub fn var_symbol(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<Symbol> {
    let name_ref = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("variable name missing on stack".to_string()))?;
    let name = crate::memory::cast_tool::to_string(&runtime.gc, &runtime.global, &name_ref);
    runtime.gc.discard(name_ref);
    Ok(Symbol::intern(&name))
}

/// Declare a symbol with flags; GLOBAL bindings land in the innermost open
/// package (or the root package).
pub fn create_symbol(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
    flags: ReferenceFlags,
) {
    let none = runtime.gc.none();
    let reference = runtime.gc.new_reference(flags, none);
    let displaced = if flags.contains(ReferenceFlags::GLOBAL) {
        let package = cursor.symbols().package().unwrap_or_else(|| runtime.global.root());
        runtime
            .global
            .package_mut(package)
            .symbols_mut()
            .insert(symbol, reference)
    } else {
        cursor.symbols_mut().insert(symbol, reference)
    };
    if let Some(previous) = displaced {
        runtime.gc.discard(previous);
    }
}

/// Declare a fast-slotted symbol.
pub fn create_fast_symbol(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
    index: usize,
    flags: ReferenceFlags,
) {
    let reference = cursor
        .symbols_mut()
        .setup_fast(&mut runtime.gc, symbol, index, flags);
    runtime.gc.discard(reference);
}

/// Declare (or overload) a function binding.
pub fn create_function_symbol(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
    flags: ReferenceFlags,
) -> MintResult<()> {
    let function = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("function value missing on stack".to_string()))?;

    let existing = cursor
        .symbols()
        .get(symbol)
        .filter(|reference| runtime.gc.data_of(reference).as_function().is_some())
        .map(|reference| reference.raw_alias());

    match existing {
        Some(target) => {
            let merged = merge_functions(&mut runtime.gc, &target, &function);
            runtime.gc.discard(function);
            merged?;
        }
        None => {
            let datum = runtime.gc.data_id(&function);
            let bound = runtime.gc.new_reference(flags, datum);
            runtime.gc.discard(function);
            if let Some(previous) = cursor.symbols_mut().insert(symbol, bound) {
                runtime.gc.discard(previous);
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Member access

/// Visibility enforcement for a member owned by `owner`.
fn check_member_access(
    runtime: &Runtime,
    cursor: &Cursor,
    owner: ClassId,
    member: Symbol,
    flags: ReferenceFlags,
) -> MintResult<()> {
    let context = cursor.symbols().metadata();
    let visibility = flags.visibility();

    let accessible = if visibility == ReferenceFlags::PRIVATE_VISIBILITY {
        context == Some(owner)
    } else if visibility == ReferenceFlags::PROTECTED_VISIBILITY {
        context
            .map(|context| runtime.global.is_base_or_same(owner, context))
            .unwrap_or(false)
    } else if visibility == ReferenceFlags::PACKAGE_VISIBILITY {
        let current = cursor
            .symbols()
            .package()
            .unwrap_or_else(|| runtime.global.root());
        runtime.global.class(owner).package() == current
    } else {
        true
    };

    if accessible {
        Ok(())
    } else {
        Err(MintError::NoSuchMember {
            type_name: runtime.global.class(owner).full_name().to_string(),
            member,
        })
    }
}

/// Member lookup on any value, returning the member cell and its owner.
///
/// Instances resolve slots through their own storage; class objects expose
/// statics and globals; packages resolve their symbol table.
pub fn get_object_member(
    runtime: &mut Runtime,
    cursor: &Cursor,
    reference: &WeakReference,
    symbol: Symbol,
) -> MintResult<(WeakReference, Option<ClassId>)> {
    enum Target {
        Object { class: ClassId, is_class: bool },
        Package(crate::memory::global_data::PackageId),
        Other(&'static str),
    }

    let target = match runtime.gc.data_of(reference) {
        Data::Object(object) => Target::Object {
            class: object.class,
            is_class: object.is_class(),
        },
        Data::Package(package) => Target::Package(*package),
        other => Target::Other(other.format().name()),
    };

    match target {
        Target::Object { class, is_class } => {
            let found = runtime
                .global
                .class(class)
                .member(symbol)
                .map(|member| (member.value.raw_alias(), member.owner, member.offset, member.is_slot()))
                .or_else(|| {
                    runtime
                        .global
                        .class(class)
                        .global(symbol)
                        .map(|member| (member.value.raw_alias(), member.owner, 0, false))
                });
            let Some((value, owner, offset, is_slot)) = found else {
                return Err(MintError::NoSuchMember {
                    type_name: runtime.global.class(class).full_name().to_string(),
                    member: symbol,
                });
            };

            let flags = runtime.gc.flags(&value);
            check_member_access(runtime, cursor, owner, symbol, flags)?;

            if is_slot && !is_class {
                // Per-instance storage.
                let slot = match runtime.gc.data_of(reference) {
                    Data::Object(object) => object
                        .slots
                        .as_ref()
                        .and_then(|slots| slots.get(offset))
                        .map(|slot| slot.raw_alias()),
                    _ => None,
                }
                .ok_or_else(|| MintError::Internal("slot offset out of range".to_string()))?;
                Ok((runtime.gc.share(&slot), Some(owner)))
            } else {
                Ok((runtime.gc.share(&value), Some(owner)))
            }
        }
        Target::Package(package) => {
            let found = runtime
                .global
                .package(package)
                .symbols()
                .get(symbol)
                .map(|value| value.raw_alias());
            match found {
                Some(value) => Ok((runtime.gc.share(&value), None)),
                None => Err(MintError::NoSuchSymbol(symbol)),
            }
        }
        Target::Other(type_name) => Err(MintError::NoSuchMember {
            type_name: type_name.to_string(),
            member: symbol,
        }),
    }
}

/// Bound-method packaging: a copy of the function whose signatures capture
/// the receiver under `self`.
pub fn reduce_member(
    runtime: &mut Runtime,
    receiver: &WeakReference,
    function: WeakReference,
) -> MintResult<WeakReference> {
    let bound = runtime.gc.clone_reference(&function);
    runtime.gc.discard(function);

    let self_symbol = mint_util::symbol::known::self_symbol();
    let receiver_infos: Vec<_> = match runtime.gc.data_of(&bound) {
        Data::Function(target) => target.mapping.keys().copied().collect(),
        other => {
            let message = format!("cannot bind {}", other.format().name());
            runtime.gc.discard(bound);
            return Err(MintError::Internal(message));
        }
    };
    for signature in receiver_infos {
        let shared = runtime.gc.share(receiver);
        if let Data::Function(target) = runtime.gc.data_of_mut(&bound) {
            let entry = target
                .mapping
                .get_mut(&signature)
                .expect("signature key was just listed");
            let capture = entry.capture.get_or_insert_with(Default::default);
            if let Some(previous) = capture.insert(self_symbol, shared) {
                runtime.gc.discard(previous);
            }
        }
    }
    Ok(bound)
}

// ----------------------------------------------------------------------
// Call preparation

/// `INIT_CALL`: pop the callee and park it as a waiting call.
///
/// Class objects instantiate: the fresh instance becomes `self` for the
/// `new` operator when one exists, or the call's result otherwise. Objects
/// with a `()` operator dispatch it as a member call.
pub fn init_call(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let function = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("callee missing on stack".to_string()))?;
    init_call_on(runtime, cursor, function)
}

pub fn init_call_on(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    function: WeakReference,
) -> MintResult<()> {
    enum Callee {
        Function,
        ClassObject(ClassId),
        Instance(ClassId),
        Other(&'static str),
    }

    let callee = match runtime.gc.data_of(&function) {
        Data::Function(_) => Callee::Function,
        Data::Object(object) if object.is_class() => Callee::ClassObject(object.class),
        Data::Object(object) => Callee::Instance(object.class),
        other => Callee::Other(other.format().name()),
    };

    match callee {
        Callee::Function => {
            cursor.push_waiting_call(Call::new(function));
            Ok(())
        }
        Callee::ClassObject(class_id) => {
            let instance = make_instance(&runtime.global, &mut runtime.gc, class_id);
            let instance_ref = runtime.gc.new_reference(ReferenceFlags::DEFAULT, instance);
            runtime.gc.discard(function);

            let constructor = runtime
                .global
                .class(class_id)
                .find_operator(Operator::New)
                .map(|member| member.value.raw_alias());
            match constructor {
                Some(constructor) => {
                    let constructor = runtime.gc.share(&constructor);
                    cursor.push(instance_ref);
                    let mut call = Call::new(constructor);
                    call.metadata = Some(class_id);
                    call.member = true;
                    cursor.push_waiting_call(call);
                }
                None => {
                    let mut call = Call::new(instance_ref);
                    call.metadata = Some(class_id);
                    cursor.push_waiting_call(call);
                }
            }
            Ok(())
        }
        Callee::Instance(class_id) => {
            let call_operator = runtime
                .global
                .class(class_id)
                .find_operator(Operator::Call)
                .map(|member| member.value.raw_alias());
            match call_operator {
                Some(handler) => {
                    let handler = runtime.gc.share(&handler);
                    cursor.push(function);
                    let mut call = Call::new(handler);
                    call.metadata = Some(class_id);
                    call.member = true;
                    cursor.push_waiting_call(call);
                    Ok(())
                }
                None => {
                    let type_name =
                        crate::memory::cast_tool::type_name(&runtime.gc, &runtime.global, &function);
                    runtime.gc.discard(function);
                    Err(MintError::NoSuchOperator {
                        type_name,
                        operator: "()",
                    })
                }
            }
        }
        Callee::Other(type_name) => {
            runtime.gc.discard(function);
            Err(MintError::NoSuchOperator {
                type_name: type_name.to_string(),
                operator: "()",
            })
        }
    }
}

/// `INIT_MEMBER_CALL sym`: pop the receiver, look the member up, park the
/// call, and push the receiver back as `self`.
pub fn init_member_call(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
) -> MintResult<()> {
    let object = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("receiver missing on stack".to_string()))?;
    let lookup = get_object_member(runtime, cursor, &object, symbol);
    let (member, owner) = match lookup {
        Ok(found) => found,
        Err(error) => {
            runtime.gc.discard(object);
            return Err(error);
        }
    };

    // A nested class member instantiates instead of dispatching.
    let is_class_object = matches!(
        runtime.gc.data_of(&member),
        Data::Object(object) if object.is_class()
    );
    if is_class_object {
        runtime.gc.discard(object);
        return init_call_on(runtime, cursor, member);
    }

    cursor.push(object);
    let mut call = Call::new(member);
    call.metadata = owner;
    call.member = true;
    cursor.push_waiting_call(call);
    Ok(())
}

/// `INIT_OPERATOR_CALL op`: resolve the operator on the top-of-stack
/// operand, which stays in place as `self`.
pub fn init_operator_call(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
) -> MintResult<()> {
    let operand = cursor
        .top()
        .ok_or_else(|| MintError::Internal("operand missing on stack".to_string()))?
        .raw_alias();

    let found = match runtime.gc.data_of(&operand) {
        Data::Object(object) => runtime
            .global
            .class(object.class)
            .find_operator(op)
            .map(|member| (member.value.raw_alias(), member.owner)),
        _ => None,
    };
    match found {
        Some((handler, owner)) => {
            let handler = runtime.gc.share(&handler);
            let mut call = Call::new(handler);
            call.metadata = Some(owner);
            call.member = true;
            cursor.push_waiting_call(call);
            Ok(())
        }
        None => Err(MintError::NoSuchOperator {
            type_name: crate::memory::cast_tool::type_name(&runtime.gc, &runtime.global, &operand),
            operator: op.name(),
        }),
    }
}

/// `INIT_PARAM sym idx`: pop an argument into a local binding.
///
/// Temporaries rebind into a fresh DEFAULT cell; everything else shares the
/// caller's cell, which is what gives parameters reference semantics.
pub fn init_parameter(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
    index: Option<usize>,
) -> MintResult<()> {
    let argument = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("argument missing on stack".to_string()))?;

    let local = if runtime.gc.flags(&argument).contains(ReferenceFlags::TEMPORARY) {
        let datum = runtime.gc.data_id(&argument);
        let rebound = runtime.gc.new_reference(ReferenceFlags::DEFAULT, datum);
        runtime.gc.discard(argument);
        rebound
    } else {
        argument
    };

    let table = cursor.symbols_mut();
    if let Some(index) = index {
        table.reserve_fast(index + 1);
    }
    if let Some(previous) = table.insert(symbol, local) {
        runtime.gc.discard(previous);
    }
    if let Some(index) = index {
        let reference = table.get_fast(&mut runtime.gc, symbol, index);
        runtime.gc.discard(reference);
    }
    Ok(())
}

/// `LOAD_EXTRA_ARGUMENTS`: materialize the variadic tail as an iterator.
pub fn load_extra_arguments(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let count = cursor.current().extra_args;
    cursor.current_mut().extra_args = 0;

    let mut items = VecDeque::with_capacity(count);
    for _ in 0..count {
        let argument = cursor
            .pop()
            .ok_or_else(|| MintError::Internal("variadic tail underflow".to_string()))?;
        items.push_front(argument);
    }
    let iterator = create_iterator(
        &runtime.global,
        &mut runtime.gc,
        IteratorPayload::items(items),
    );
    cursor.push(iterator);
    Ok(())
}

// ----------------------------------------------------------------------
// Captures

/// `INIT_CAPTURE`: detach the function on top of the stack so its
/// signatures can take captures without mutating the shared constant.
pub fn init_capture(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let function = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("function missing on stack".to_string()))?;
    let detached = runtime.gc.clone_reference(&function);
    runtime.gc.discard(function);

    if let Data::Function(target) = runtime.gc.data_of_mut(&detached) {
        for entry in target.mapping.values_mut() {
            entry.capture.get_or_insert_with(Default::default);
        }
    }
    cursor.push(detached);
    Ok(())
}

/// `CAPTURE_SYMBOL sym`: capture one enclosing binding by reference.
pub fn capture_symbol(runtime: &mut Runtime, cursor: &mut Cursor, symbol: Symbol) -> MintResult<()> {
    let resolved = cursor
        .symbols()
        .get(symbol)
        .map(|reference| reference.raw_alias());
    let Some(resolved) = resolved else {
        return Ok(()); // Nothing to capture; the body will resolve late.
    };
    capture_into_function(runtime, cursor, symbol, resolved)
}

/// `CAPTURE_AS sym`: pop a value and capture it under a name.
pub fn capture_as(runtime: &mut Runtime, cursor: &mut Cursor, symbol: Symbol) -> MintResult<()> {
    let value = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("capture value missing on stack".to_string()))?;
    let result = capture_into_function(runtime, cursor, symbol, value.raw_alias());
    runtime.gc.discard(value);
    result
}

/// `CAPTURE_ALL`: capture every visible binding.
pub fn capture_all(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let bindings: Vec<(Symbol, WeakReference)> = cursor
        .symbols()
        .iter()
        .map(|(symbol, reference)| (symbol, reference.raw_alias()))
        .collect();
    for (symbol, reference) in bindings {
        capture_into_function(runtime, cursor, symbol, reference)?;
    }
    Ok(())
}

fn capture_into_function(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    symbol: Symbol,
    value: WeakReference,
) -> MintResult<()> {
    let function = cursor
        .top()
        .ok_or_else(|| MintError::Internal("capture target missing on stack".to_string()))?
        .raw_alias();

    let signatures: Vec<i32> = match runtime.gc.data_of(&function) {
        Data::Function(target) => target.mapping.keys().copied().collect(),
        other => {
            return Err(MintError::Internal(format!(
                "capture into {}",
                other.format().name()
            )))
        }
    };
    for signature in signatures {
        let shared = runtime.gc.share(&value);
        let mut displaced = None;
        if let Data::Function(target) = runtime.gc.data_of_mut(&function) {
            let entry = target
                .mapping
                .get_mut(&signature)
                .expect("signature key was just listed");
            let capture = entry.capture.get_or_insert_with(Default::default);
            displaced = capture.insert(symbol, shared);
        }
        if let Some(previous) = displaced {
            runtime.gc.discard(previous);
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Printers

/// Build a printer from a popped designator: a stream number or a file
/// path.
pub fn create_printer(
    runtime: &mut Runtime,
    designator: &WeakReference,
) -> MintResult<Box<dyn Printer>> {
    match runtime.gc.data_of(designator) {
        Data::Number(stream) => {
            let stream = *stream as i64;
            StandardPrinter::from_stream(stream)
                .map(|printer| Box::new(printer) as Box<dyn Printer>)
                .ok_or(MintError::InvalidCast {
                    type_name: "number".to_string(),
                    target: "printer stream",
                })
        }
        Data::Object(Object { payload, .. }) => match payload {
            crate::memory::data::Payload::Str(path) => {
                let path = PathBuf::from(path.as_str());
                FilePrinter::open(&path)
                    .map(|printer| Box::new(printer) as Box<dyn Printer>)
                    .map_err(|_| MintError::InvalidCast {
                        type_name: "string".to_string(),
                        target: "printer path",
                    })
            }
            _ => Err(MintError::InvalidCast {
                type_name: crate::memory::cast_tool::type_name(
                    &runtime.gc,
                    &runtime.global,
                    designator,
                ),
                target: "printer",
            }),
        },
        other => Err(MintError::InvalidCast {
            type_name: other.format().name().to_string(),
            target: "printer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::ast::module::MAIN_ID;

    #[test]
    fn get_symbol_reference_creates_once() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut table = SymbolTable::new(None);
        let symbol = Symbol::intern("fresh_symbol");

        let first = get_symbol_reference(&mut runtime.gc, &mut table, symbol);
        let second = get_symbol_reference(&mut runtime.gc, &mut table, symbol);
        assert_eq!(first.info(), second.info());

        runtime.gc.discard(first);
        runtime.gc.discard(second);
        for reference in table.drain() {
            runtime.gc.discard(reference);
        }
    }

    #[test]
    fn init_parameter_rebinds_temporaries() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let temporary = runtime.gc.create(Data::Number(5.0));
        assert!(runtime
            .gc
            .flags(&temporary)
            .contains(ReferenceFlags::TEMPORARY));
        cursor.push(temporary);

        let symbol = Symbol::intern("param");
        init_parameter(&mut runtime, &mut cursor, symbol, None).unwrap();

        let bound = cursor.symbols().get(symbol).unwrap();
        assert_eq!(runtime.gc.flags(bound), ReferenceFlags::DEFAULT);

        cursor.cleanup(&mut runtime.gc);
    }

    #[test]
    fn init_parameter_shares_plain_references() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let datum = runtime.gc.alloc(Data::Number(6.0));
        let caller_cell = runtime.gc.new_reference(ReferenceFlags::DEFAULT, datum);
        let argument = runtime.gc.share(&caller_cell);
        cursor.push(argument);

        let symbol = Symbol::intern("by_ref");
        init_parameter(&mut runtime, &mut cursor, symbol, None).unwrap();

        let bound = cursor.symbols().get(symbol).unwrap();
        assert_eq!(bound.info(), caller_cell.info());

        runtime.gc.discard(caller_cell);
        cursor.cleanup(&mut runtime.gc);
    }
}
