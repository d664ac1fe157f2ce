//! Generator finalization processes.
//!
//! An iterator dropped with a live saved state is driven to completion in
//! single-pass mode: the frame resumes, every further `YIELD` falls
//! through, and the body runs to its generator exit so cleanup code inside
//! it executes.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::MintResult;
use crate::memory::builtin::iterator::take_state_for_finalize;
use crate::memory::reference::WeakReference;
use crate::scheduler::process::{Process, ProcessRole};

/// Build the process that drives an unfinished generator to its end.
///
/// Returns `None` when the iterator holds no saved state (already
/// exhausted, or never a generator).
pub fn make_finalize_process(
    runtime: &mut Runtime,
    iterator: &WeakReference,
) -> MintResult<Option<Process>> {
    let Some(state) = take_state_for_finalize(&mut runtime.gc, iterator)? else {
        return Ok(None);
    };

    let mut cursor = Cursor::new(runtime.exec_module(), 0);
    cursor.restore(state);
    Ok(Some(Process::from_cursor(cursor, ProcessRole::Generator)))
}
