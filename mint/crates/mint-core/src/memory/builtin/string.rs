//! The string builtin.
//!
//! UTF-8 text whose indexing and iteration are code-point based: the byte
//! length and the subscript domain differ whenever the text leaves ASCII.
//! Negative indices count from the end.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::class::Metatype;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::{ReferenceFlags, WeakReference};

/// Allocate a string object.
pub fn create_string(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    text: &str,
) -> WeakReference {
    let class = global.builtin_class(Metatype::String);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Str(text.to_string()),
        finalize: false,
    }));
    gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data)
}

/// Text view of a string reference.
pub fn text_of<'a>(gc: &'a GarbageCollector, reference: &WeakReference) -> Option<&'a str> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Str(text),
            ..
        }) => Some(text),
        _ => None,
    }
}

/// Number of code points.
pub fn code_point_count(text: &str) -> usize {
    text.chars().count()
}

/// Resolve a possibly negative code-point index against a length.
pub fn resolve_index(index: f64, length: usize) -> MintResult<usize> {
    let index = index.trunc() as i64;
    let length = length as i64;
    let resolved = if index < 0 { length + index } else { index };
    if resolved < 0 || resolved >= length {
        return Err(MintError::InvalidCast {
            type_name: "number".to_string(),
            target: "index in range",
        });
    }
    Ok(resolved as usize)
}

/// Code point at a resolved index, as a string.
pub fn code_point_at(text: &str, index: usize) -> Option<&str> {
    let start = text.char_indices().nth(index)?.0;
    let end = text[start..]
        .char_indices()
        .nth(1)
        .map(|(offset, _)| start + offset)
        .unwrap_or(text.len());
    Some(&text[start..end])
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::String);
    create_builtin_member(runtime, class, "size", 1, string_size_method);
    create_builtin_member(runtime, class, "isEmpty", 1, string_is_empty_method);
    create_builtin_member(runtime, class, "toUpper", 1, string_to_upper_method);
    create_builtin_member(runtime, class, "toLower", 1, string_to_lower_method);
    create_builtin_member(runtime, class, "startsWith", 2, string_starts_with_method);
    create_builtin_member(runtime, class, "endsWith", 2, string_ends_with_method);
    create_builtin_member(runtime, class, "contains", 2, string_contains_method);
    create_builtin_member(runtime, class, "split", 2, string_split_method);
    create_builtin_member(runtime, class, "substring", 3, string_substring_method);
    create_builtin_member(runtime, class, "replace", 3, string_replace_method);
}

fn self_text(runtime: &Runtime, reference: &WeakReference) -> String {
    text_of(&runtime.gc, reference).unwrap_or_default().to_string()
}

fn string_size_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("size() without receiver");
    let count = text_of(&runtime.gc, &self_ref)
        .map(code_point_count)
        .unwrap_or(0);
    let result = runtime.gc.create(Data::Number(count as f64));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_is_empty_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("isEmpty() without receiver");
    let empty = text_of(&runtime.gc, &self_ref)
        .map(|text| text.is_empty())
        .unwrap_or(true);
    let result = runtime.gc.create(Data::Boolean(empty));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_to_upper_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("toUpper() without receiver");
    let text = self_text(runtime, &self_ref).to_uppercase();
    let result = create_string(&runtime.global, &mut runtime.gc, &text);
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_to_lower_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("toLower() without receiver");
    let text = self_text(runtime, &self_ref).to_lowercase();
    let result = create_string(&runtime.global, &mut runtime.gc, &text);
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_predicate(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    predicate: impl FnOnce(&str, &str) -> bool,
) -> MintResult<()> {
    let needle_ref = cursor.pop().expect("predicate without argument");
    let self_ref = cursor.pop().expect("predicate without receiver");
    let needle = self_text(runtime, &needle_ref);
    let text = self_text(runtime, &self_ref);
    let result = runtime.gc.create(Data::Boolean(predicate(&text, &needle)));
    cursor.push(result);
    runtime.gc.discard(needle_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_starts_with_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    string_predicate(runtime, cursor, |text, needle| text.starts_with(needle))
}

fn string_ends_with_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    string_predicate(runtime, cursor, |text, needle| text.ends_with(needle))
}

fn string_contains_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    string_predicate(runtime, cursor, |text, needle| text.contains(needle))
}

fn string_split_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let separator_ref = cursor.pop().expect("split() without separator");
    let self_ref = cursor.pop().expect("split() without receiver");
    let separator = self_text(runtime, &separator_ref);
    let text = self_text(runtime, &self_ref);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(|c| c.to_string()).collect()
    } else {
        text.split(&separator).map(|piece| piece.to_string()).collect()
    };

    let mut elements = Vec::with_capacity(pieces.len());
    for piece in pieces {
        elements.push(create_string(&runtime.global, &mut runtime.gc, &piece));
    }
    let result = crate::memory::builtin::array::create_array(
        &runtime.global,
        &mut runtime.gc,
        elements,
    );
    cursor.push(result);
    runtime.gc.discard(separator_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_substring_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let length_ref = cursor.pop().expect("substring() without length");
    let start_ref = cursor.pop().expect("substring() without start");
    let self_ref = cursor.pop().expect("substring() without receiver");

    let start = crate::memory::cast_tool::to_number(&runtime.gc, &start_ref)?;
    let length = crate::memory::cast_tool::to_number(&runtime.gc, &length_ref)?;
    let text = self_text(runtime, &self_ref);

    let count = code_point_count(&text);
    let start = resolve_index(start, count.max(1))?.min(count);
    let taken: String = text.chars().skip(start).take(length.max(0.0) as usize).collect();

    let result = create_string(&runtime.global, &mut runtime.gc, &taken);
    cursor.push(result);
    runtime.gc.discard(length_ref);
    runtime.gc.discard(start_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn string_replace_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let replacement_ref = cursor.pop().expect("replace() without replacement");
    let pattern_ref = cursor.pop().expect("replace() without pattern");
    let self_ref = cursor.pop().expect("replace() without receiver");

    let replacement = self_text(runtime, &replacement_ref);
    let pattern = self_text(runtime, &pattern_ref);
    let text = self_text(runtime, &self_ref);
    let replaced = if pattern.is_empty() {
        text
    } else {
        text.replace(&pattern, &replacement)
    };

    let result = create_string(&runtime.global, &mut runtime.gc, &replaced);
    cursor.push(result);
    runtime.gc.discard(replacement_ref);
    runtime.gc.discard(pattern_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}
