//! The array builtin.
//!
//! A growable vector of references. Subscripts may be negative
//! (counted from the end) and are bounds-checked.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::MintResult;
use crate::memory::builtin::string::{create_string, resolve_index};
use crate::memory::class::Metatype;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::operator_tool::eq_values;
use crate::memory::reference::{ReferenceFlags, WeakReference};

/// Allocate an array object around its elements.
pub fn create_array(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    elements: Vec<WeakReference>,
) -> WeakReference {
    let class = global.builtin_class(Metatype::Array);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Array(elements),
        finalize: false,
    }));
    gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data)
}

/// Element view of an array reference.
pub fn elements_of<'a>(
    gc: &'a GarbageCollector,
    reference: &WeakReference,
) -> Option<&'a [WeakReference]> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Array(elements),
            ..
        }) => Some(elements),
        _ => None,
    }
}

fn with_elements_mut<R>(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
    action: impl FnOnce(&mut Vec<WeakReference>) -> R,
) -> Option<R> {
    match gc.data_of_mut(reference) {
        Data::Object(Object {
            payload: Payload::Array(elements),
            ..
        }) => Some(action(elements)),
        _ => None,
    }
}

/// Append an element, taking ownership of the reference.
pub fn array_append(
    gc: &mut GarbageCollector,
    array: &WeakReference,
    element: WeakReference,
) {
    let rejected = with_elements_mut(gc, array, |elements| {
        elements.push(element);
    });
    debug_assert!(rejected.is_some(), "append to a non-array");
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::Array);
    create_builtin_member(runtime, class, "size", 1, array_size_method);
    create_builtin_member(runtime, class, "isEmpty", 1, array_is_empty_method);
    create_builtin_member(runtime, class, "push", 2, array_push_method);
    create_builtin_member(runtime, class, "pop", 1, array_pop_method);
    create_builtin_member(runtime, class, "insert", 3, array_insert_method);
    create_builtin_member(runtime, class, "remove", 2, array_remove_method);
    create_builtin_member(runtime, class, "clear", 1, array_clear_method);
    create_builtin_member(runtime, class, "contains", 2, array_contains_method);
    create_builtin_member(runtime, class, "join", 2, array_join_method);
}

fn array_size_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("size() without receiver");
    let size = elements_of(&runtime.gc, &self_ref).map(|e| e.len()).unwrap_or(0);
    let result = runtime.gc.create(Data::Number(size as f64));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_is_empty_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("isEmpty() without receiver");
    let empty = elements_of(&runtime.gc, &self_ref)
        .map(|e| e.is_empty())
        .unwrap_or(true);
    let result = runtime.gc.create(Data::Boolean(empty));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_push_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = cursor.pop().expect("push() without value");
    let self_ref = cursor.pop().expect("push() without receiver");
    array_append(&mut runtime.gc, &self_ref, value);
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_pop_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("pop() without receiver");
    let popped = with_elements_mut(&mut runtime.gc, &self_ref, |elements| elements.pop())
        .flatten();
    let result = popped.unwrap_or_else(|| runtime.gc.none_reference());
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_insert_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = cursor.pop().expect("insert() without value");
    let index_ref = cursor.pop().expect("insert() without index");
    let self_ref = cursor.pop().expect("insert() without receiver");

    let index = crate::memory::cast_tool::to_number(&runtime.gc, &index_ref)?;
    let length = elements_of(&runtime.gc, &self_ref).map(|e| e.len()).unwrap_or(0);
    // Insertion accepts one-past-the-end.
    let position = if index >= length as f64 {
        length
    } else {
        resolve_index(index, length.max(1))?
    };

    with_elements_mut(&mut runtime.gc, &self_ref, |elements| {
        elements.insert(position.min(elements.len()), value);
    });
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(index_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_remove_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let index_ref = cursor.pop().expect("remove() without index");
    let self_ref = cursor.pop().expect("remove() without receiver");

    let index = crate::memory::cast_tool::to_number(&runtime.gc, &index_ref)?;
    let length = elements_of(&runtime.gc, &self_ref).map(|e| e.len()).unwrap_or(0);
    let removed = match resolve_index(index, length) {
        Ok(position) => {
            with_elements_mut(&mut runtime.gc, &self_ref, |elements| elements.remove(position))
        }
        Err(error) => {
            runtime.gc.discard(index_ref);
            runtime.gc.discard(self_ref);
            return Err(error);
        }
    };
    if let Some(reference) = removed {
        runtime.gc.discard(reference);
    }
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(index_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_clear_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("clear() without receiver");
    let drained = with_elements_mut(&mut runtime.gc, &self_ref, std::mem::take)
        .unwrap_or_default();
    for reference in drained {
        runtime.gc.discard(reference);
    }
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_contains_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let needle = cursor.pop().expect("contains() without value");
    let self_ref = cursor.pop().expect("contains() without receiver");

    let element_infos: Vec<_> = elements_of(&runtime.gc, &self_ref)
        .map(|elements| elements.iter().map(|e| e.raw_alias()).collect())
        .unwrap_or_default();
    let found = element_infos
        .iter()
        .any(|element| eq_values(&runtime.gc, element, &needle));

    let result = runtime.gc.create(Data::Boolean(found));
    cursor.push(result);
    runtime.gc.discard(needle);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn array_join_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let separator_ref = cursor.pop().expect("join() without separator");
    let self_ref = cursor.pop().expect("join() without receiver");

    let separator = crate::memory::builtin::string::text_of(&runtime.gc, &separator_ref)
        .unwrap_or_default()
        .to_string();
    let element_infos: Vec<_> = elements_of(&runtime.gc, &self_ref)
        .map(|elements| elements.iter().map(|e| e.raw_alias()).collect())
        .unwrap_or_default();
    let pieces: Vec<String> = element_infos
        .iter()
        .map(|element| crate::memory::cast_tool::to_string(&runtime.gc, &runtime.global, element))
        .collect();

    let joined = pieces.join(&separator);
    let result = create_string(&runtime.global, &mut runtime.gc, &joined);
    cursor.push(result);
    runtime.gc.discard(separator_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}
