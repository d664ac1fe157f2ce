//! The regex builtin.
//!
//! A compiled pattern plus its original source text. Compilation errors
//! surface as cast errors at construction time.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::builtin::string::create_string;
use crate::memory::class::Metatype;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::{ReferenceFlags, WeakReference};

/// Compiled pattern plus source text.
#[derive(Clone, Default)]
pub struct RegexPayload {
    pattern: Option<regex::Regex>,
    source: String,
}

impl RegexPayload {
    pub fn compile(source: &str) -> MintResult<Self> {
        let pattern = regex::Regex::new(source).map_err(|_| MintError::InvalidCast {
            type_name: "string".to_string(),
            target: "regex",
        })?;
        Ok(Self {
            pattern: Some(pattern),
            source: source.to_string(),
        })
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|pattern| pattern.is_match(text))
            .unwrap_or(false)
    }

    /// Capture group text of the first match, 0 being the whole match.
    pub fn capture<'t>(&self, text: &'t str, group: usize) -> Option<&'t str> {
        self.pattern
            .as_ref()?
            .captures(text)?
            .get(group)
            .map(|capture| capture.as_str())
    }
}

/// Allocate a regex object from source text.
pub fn create_regex(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    source: &str,
) -> MintResult<WeakReference> {
    let payload = RegexPayload::compile(source)?;
    let class = global.builtin_class(Metatype::Regex);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Regex(payload),
        finalize: false,
    }));
    Ok(gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data))
}

/// Payload view of a regex reference.
pub fn payload_of<'a>(
    gc: &'a GarbageCollector,
    reference: &WeakReference,
) -> Option<&'a RegexPayload> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Regex(payload),
            ..
        }) => Some(payload),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::Regex);
    create_builtin_member(runtime, class, "match", 2, regex_match_method);
    create_builtin_member(runtime, class, "getCapture", 3, regex_get_capture_method);
}

fn regex_match_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let text_ref = cursor.pop().expect("match() without text");
    let self_ref = cursor.pop().expect("match() without receiver");

    let text = crate::memory::builtin::string::text_of(&runtime.gc, &text_ref)
        .unwrap_or_default()
        .to_string();
    let matched = payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.is_match(&text))
        .unwrap_or(false);

    let result = runtime.gc.create(Data::Boolean(matched));
    cursor.push(result);
    runtime.gc.discard(text_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn regex_get_capture_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let group_ref = cursor.pop().expect("getCapture() without group");
    let text_ref = cursor.pop().expect("getCapture() without text");
    let self_ref = cursor.pop().expect("getCapture() without receiver");

    let group = crate::memory::cast_tool::to_number(&runtime.gc, &group_ref)? as usize;
    let text = crate::memory::builtin::string::text_of(&runtime.gc, &text_ref)
        .unwrap_or_default()
        .to_string();
    let captured = payload_of(&runtime.gc, &self_ref)
        .and_then(|payload| payload.capture(&text, group))
        .map(|capture| capture.to_string());

    let result = match captured {
        Some(capture) => create_string(&runtime.global, &mut runtime.gc, &capture),
        None => runtime.gc.none_reference(),
    };
    cursor.push(result);
    runtime.gc.discard(group_ref);
    runtime.gc.discard(text_ref);
    runtime.gc.discard(self_ref);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_match() {
        let payload = RegexPayload::compile("^t.st$").unwrap();
        assert!(payload.is_match("test"));
        assert!(payload.is_match("tëst"));
        assert!(!payload.is_match("toast"));
        assert_eq!(payload.source(), "^t.st$");
    }

    #[test]
    fn invalid_pattern_is_a_cast_error() {
        assert!(matches!(
            RegexPayload::compile("("),
            Err(MintError::InvalidCast { .. })
        ));
    }

    #[test]
    fn captures_index_groups() {
        let payload = RegexPayload::compile(r"(\w+)@(\w+)").unwrap();
        assert_eq!(payload.capture("user@host", 1), Some("user"));
        assert_eq!(payload.capture("user@host", 2), Some("host"));
        assert_eq!(payload.capture("user@host", 3), None);
    }
}
