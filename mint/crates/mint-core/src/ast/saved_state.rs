//! Saved states: frozen continuations.
//!
//! `Cursor::interrupt` detaches the current frame together with the stack
//! segment and retrieve points it owns, producing a [`SavedState`]. The
//! state is owned by whoever will resume it (in practice a generator
//! iterator) and is fed back through `Cursor::restore`.

use crate::ast::cursor::{Context, ExecutionMode, RetrievePoint};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::{InfoId, WeakReference};

/// A detached frame plus everything needed to resume it.
pub struct SavedState {
    pub context: Context,

    /// Stack values above the frame's base at interrupt time, in push order.
    pub stored_stack: Vec<WeakReference>,

    /// Retrieve points opened within the frame, with sizes relative to the
    /// frame base so restoring at a different depth rebases them.
    pub retrieve_points: Vec<RetrievePoint>,

    /// Resume mode; finalization flips this to single-pass so further
    /// yields fall through to the generator's end.
    pub mode: ExecutionMode,
}

impl SavedState {
    /// Feed every held reference to the mark phase.
    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        self.context.visit_children(visit);
        for reference in &self.stored_stack {
            visit(reference.info());
        }
    }

    /// Dispose of the state without resuming it.
    pub fn release(self, gc: &mut GarbageCollector) {
        self.context.release(gc);
        for reference in self.stored_stack {
            gc.discard(reference);
        }
    }
}
