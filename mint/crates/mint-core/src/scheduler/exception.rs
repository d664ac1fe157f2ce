//! Exception processes.
//!
//! A raise with no retrieve point escalates here: when the payload is an
//! object with a `show` method, a dedicated process calls it before the
//! original process's death is final. With no `show`, a diagnostic is
//! printed and nothing is scheduled.

use crate::ast::cursor::{Call, Cursor};
use crate::ast::runtime::Runtime;
use crate::error::MintResult;
use crate::memory::data::Data;
use crate::memory::memory_tool::get_object_member;
use crate::memory::operator_tool::call_member_operator;
use crate::memory::reference::WeakReference;
use crate::scheduler::process::{Process, ProcessRole};
use log::error;
use mint_util::symbol::known;

/// Build the process showing an escalated exception, or report it and
/// return `None`.
///
/// Either way the payload is consumed; the caller only has to terminate the
/// failed process.
pub fn make_exception_process(
    runtime: &mut Runtime,
    payload: WeakReference,
) -> MintResult<Option<Process>> {
    let is_object = matches!(
        runtime.gc.data_of(&payload),
        Data::Object(object) if !object.is_class()
    );

    if is_object {
        let probe = Cursor::new(runtime.exec_module(), 0);
        let show = get_object_member(runtime, &probe, &payload, known::show_method());
        if let Ok((handler, owner)) = show {
            let is_function = runtime.gc.data_of(&handler).as_function().is_some();
            if is_function {
                let mut cursor = Cursor::new(runtime.exec_module(), 0);
                let self_ref = runtime.gc.share(&payload);
                cursor.push(self_ref);

                let mut call = Call::new(handler);
                call.metadata = owner;
                call.member = true;
                cursor.push_waiting_call(call);
                call_member_operator(runtime, &mut cursor, 0)?;

                return Ok(Some(Process::from_cursor(
                    cursor,
                    ProcessRole::Exception {
                        reference: Some(payload),
                    },
                )));
            }
            runtime.gc.discard(handler);
        }
    }

    let rendition = crate::memory::cast_tool::to_string(&runtime.gc, &runtime.global, &payload);
    error!("exception : {rendition}");
    runtime.gc.discard(payload);
    Ok(None)
}
