//! Function tooling: builtin-method registration and mapping merges.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::{BuiltinMethod, Runtime};
use crate::error::{MintError, MintResult};
use crate::memory::class::{ClassId, Operator};
use crate::memory::data::{Data, Function, Signature};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::{ReferenceFlags, WeakReference};
use crate::memory::symbol_table::SymbolMapping;
use mint_util::Symbol;

/// Register a native method on a class under a member name.
///
/// The signature counts the receiver; `~n` forms declare variadic methods.
/// Multiple registrations under one name accumulate overloads in the
/// member's function mapping.
pub fn create_builtin_member(
    runtime: &mut Runtime,
    class: ClassId,
    name: &str,
    signature: i32,
    method: BuiltinMethod,
) {
    let symbol = Symbol::intern(name);
    let (signature, handle) = runtime.create_builtin_method(signature, method);

    let existing = runtime
        .global
        .class(class)
        .member(symbol)
        .map(|member| member.value.raw_alias());
    match existing {
        Some(member) => {
            if let Data::Function(function) = runtime.gc.data_of_mut(&member) {
                function.mapping.insert(signature, Signature::new(handle));
            }
        }
        None => {
            let mut function = Function::new();
            function.mapping.insert(signature, Signature::new(handle));
            let data = runtime.gc.alloc(Data::Function(function));
            let reference = runtime.gc.new_reference(
                ReferenceFlags::CONST_ADDRESS | ReferenceFlags::CONST_VALUE,
                data,
            );
            runtime
                .global
                .class_mut(class)
                .add_static_member(symbol, class, reference);
        }
    }
}

/// Register a native operator handler on a class.
pub fn create_builtin_operator(
    runtime: &mut Runtime,
    class: ClassId,
    op: Operator,
    signature: i32,
    method: BuiltinMethod,
) {
    create_builtin_member(runtime, class, op.symbol().as_str(), signature, method);
}

/// Merge `source`'s signatures into `target`'s mapping.
///
/// Capture maps are shared cell-wise; colliding signatures are replaced and
/// their captures released.
pub fn merge_functions(
    gc: &mut GarbageCollector,
    target: &WeakReference,
    source: &WeakReference,
) -> MintResult<()> {
    let entries: Vec<_> = match gc.data_of(source) {
        Data::Function(function) => function
            .mapping
            .iter()
            .map(|(signature, entry)| {
                let capture = entry.capture.as_ref().map(|capture| {
                    capture
                        .iter()
                        .map(|(symbol, reference)| (*symbol, reference.info()))
                        .collect::<Vec<_>>()
                });
                (*signature, entry.handle, capture)
            })
            .collect(),
        other => {
            return Err(MintError::Internal(format!(
                "function overload on {}",
                other.format().name()
            )))
        }
    };

    let mut prepared = Vec::with_capacity(entries.len());
    for (signature, handle, capture) in entries {
        let capture = capture.map(|pairs| {
            let mut map: SymbolMapping<WeakReference> = SymbolMapping::default();
            for (symbol, info) in pairs {
                map.insert(symbol, gc.share_raw(info));
            }
            map
        });
        prepared.push((signature, handle, capture));
    }

    let mut displaced = Vec::new();
    match gc.data_of_mut(target) {
        Data::Function(function) => {
            for (signature, handle, capture) in prepared {
                let mut entry = Signature::new(handle);
                entry.capture = capture;
                if let Some(previous) = function.mapping.insert(signature, entry) {
                    if let Some(capture) = previous.capture {
                        displaced.extend(capture.into_values());
                    }
                }
            }
        }
        other => {
            let message = format!("function overload onto {}", other.format().name());
            for (_, _, capture) in prepared {
                if let Some(capture) = capture {
                    displaced.extend(capture.into_values());
                }
            }
            for reference in displaced {
                gc.discard(reference);
            }
            return Err(MintError::Internal(message));
        }
    }
    for reference in displaced {
        gc.discard(reference);
    }
    Ok(())
}

/// Build a function value around a single handle.
pub fn create_function(
    gc: &mut GarbageCollector,
    signature: i32,
    handle: crate::ast::module::HandleId,
) -> WeakReference {
    let mut function = Function::new();
    function.mapping.insert(signature, Signature::new(handle));
    let data = gc.alloc(Data::Function(function));
    gc.new_reference(
        ReferenceFlags::CONST_ADDRESS | ReferenceFlags::CONST_VALUE,
        data,
    )
}

/// Pop `count` arguments off the stack, last pushed first in the result.
pub fn pop_arguments(cursor: &mut Cursor, count: usize) -> Vec<WeakReference> {
    let mut arguments = Vec::with_capacity(count);
    for _ in 0..count {
        arguments.push(cursor.pop().expect("argument stack underflow"));
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::module::{HandleId, ModuleId};
    use crate::config::RuntimeConfig;

    fn handle(index: u32) -> HandleId {
        HandleId {
            module: ModuleId(0),
            index,
        }
    }

    #[test]
    fn merge_accumulates_signatures() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let gc = &mut runtime.gc;

        let target = create_function(gc, 1, handle(0));
        let source = create_function(gc, 2, handle(1));
        merge_functions(gc, &target, &source).unwrap();

        match gc.data_of(&target) {
            Data::Function(function) => {
                assert!(function.mapping.contains_key(&1));
                assert!(function.mapping.contains_key(&2));
            }
            _ => panic!("expected function"),
        }

        gc.discard(target);
        gc.discard(source);
    }

    #[test]
    fn builtin_member_registration_accumulates_overloads() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        fn noop(_: &mut Runtime, _: &mut Cursor) -> MintResult<()> {
            Ok(())
        }
        let class = runtime
            .global
            .builtin_class(crate::memory::class::Metatype::Array);
        create_builtin_member(&mut runtime, class, "test_overloaded", 1, noop);
        create_builtin_member(&mut runtime, class, "test_overloaded", 2, noop);

        let symbol = Symbol::intern("test_overloaded");
        let member = runtime.global.class(class).member(symbol).unwrap();
        match runtime.gc.data_of(&member.value) {
            Data::Function(function) => assert_eq!(function.mapping.len(), 2),
            _ => panic!("expected function member"),
        }
    }
}
