//! The library builtin.
//!
//! Wraps an opaque plugin handle. The `call` method resolves an exported
//! `<name>_<signature>` function (falling back through the variadic
//! `<name>_v<n>` forms) and dispatches it with the cursor handle.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::class::Metatype;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::{ReferenceFlags, WeakReference};
use crate::system::plugin::Plugin;
use mint_util::Symbol;
use std::sync::Arc;

/// Allocate a library object around a loaded plugin.
pub fn create_library(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    plugin: Arc<Plugin>,
) -> WeakReference {
    let class = global.builtin_class(Metatype::Library);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Library(Some(plugin)),
        finalize: false,
    }));
    gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data)
}

/// Plugin view of a library reference.
pub fn plugin_of(gc: &GarbageCollector, reference: &WeakReference) -> Option<Arc<Plugin>> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Library(plugin),
            ..
        }) => plugin.clone(),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::Library);
    // lib.call('name', args...): variadic with receiver and name fixed.
    create_builtin_member(runtime, class, "call", !2, library_call_method);
}

/// `lib.call('function', args…)`.
///
/// On entry the stack is `[self, name, args…]`; the variadic tail stays in
/// place for the plugin, which consumes it through the cursor handle and
/// pushes one result.
fn library_call_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let argument_count = cursor.current().extra_args;
    cursor.current_mut().extra_args = 0;

    let name_alias = cursor
        .peek(argument_count)
        .ok_or_else(|| MintError::Internal("call() without function name".to_string()))?
        .raw_alias();
    let name = crate::memory::builtin::string::text_of(&runtime.gc, &name_alias)
        .unwrap_or_default()
        .to_string();
    let self_ref = cursor
        .peek(argument_count + 1)
        .ok_or_else(|| MintError::Internal("call() without receiver".to_string()))?
        .raw_alias();
    let plugin = plugin_of(&runtime.gc, &self_ref).ok_or_else(|| {
        MintError::Unhandled(format!("library is not loaded, cannot call '{name}'"))
    })?;

    let symbol = Symbol::intern(&name);
    plugin.call(runtime, cursor, symbol, argument_count as i32)?;

    // Result on top; the name and receiver beneath it are spent.
    let result = cursor
        .pop()
        .ok_or_else(|| MintError::Internal("plugin pushed no result".to_string()))?;
    let name_ref = cursor.pop().expect("call() name slot disappeared");
    let self_ref = cursor.pop().expect("call() receiver slot disappeared");
    runtime.gc.discard(name_ref);
    runtime.gc.discard(self_ref);
    cursor.push(result);
    Ok(())
}
