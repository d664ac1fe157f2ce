//! Processes: one cursor plus a role tag.

use crate::ast::cursor::{Cursor, RaiseResult};
use crate::ast::module::ModuleId;
use crate::ast::runtime::Runtime;
use crate::error::MintError;
use crate::memory::builtin::string::create_string;
use crate::memory::data::DataId;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::WeakReference;
use crate::scheduler::processor::{run_step, StepResult};
use log::error;

/// What kind of work a process carries.
pub enum ProcessRole {
    /// The standard process running the main module.
    Main,
    /// Launched onto its own OS thread.
    Thread { id: u64 },
    /// Drives a finalized generator to completion.
    Generator,
    /// Runs an object's `delete` operator before its memory is released.
    Destructor { object: DataId },
    /// Calls a raised value's `show` method, then dies.
    Exception { reference: Option<WeakReference> },
}

/// Outcome of one quantum.
pub enum ProcessState {
    /// Ran the full quantum; more work remains.
    Ready,
    /// Voluntarily suspended before the quantum ended.
    Yielded,
    /// The process completed (or was cancelled).
    Finished,
    /// An exception escaped every retrieve point.
    Failed(WeakReference),
}

/// One schedulable unit of execution.
pub struct Process {
    cursor: Cursor,
    role: ProcessRole,
    cancelled: bool,
}

impl Process {
    /// Main process over a module's entry.
    pub fn main(module: ModuleId) -> Self {
        Self::from_cursor(Cursor::new(module, 0), ProcessRole::Main)
    }

    pub fn from_cursor(cursor: Cursor, role: ProcessRole) -> Self {
        Self {
            cursor,
            role,
            cancelled: false,
        }
    }

    #[inline]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[inline]
    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Take the cursor out, abandoning the role wrapper.
    pub fn into_cursor(self) -> Cursor {
        self.cursor
    }

    #[inline]
    pub fn role(&self) -> &ProcessRole {
        &self.role
    }

    pub fn thread_id(&self) -> Option<u64> {
        match self.role {
            ProcessRole::Thread { id } => Some(id),
            _ => None,
        }
    }

    /// Request termination at the next inter-instruction point.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn mark(&self, gc: &mut GarbageCollector) {
        self.cursor.mark(gc);
        if let ProcessRole::Exception {
            reference: Some(reference),
        } = &self.role
        {
            gc.mark_info(reference.info());
        }
    }

    /// Release everything the process still holds.
    pub fn cleanup(&mut self, gc: &mut GarbageCollector) {
        self.cursor.cleanup(gc);
        if let ProcessRole::Exception { reference } = &mut self.role {
            if let Some(reference) = reference.take() {
                gc.discard(reference);
            }
        }
    }

    /// Execute up to `quantum` instructions under the processor lock.
    ///
    /// Raisable errors convert into language exceptions and travel the
    /// cursor's raise path; fatal errors dump the call stack and abort the
    /// process.
    pub fn exec(&mut self, runtime: &mut Runtime, quantum: usize) -> ProcessState {
        if self.cancelled {
            self.cleanup(&mut runtime.gc);
            return ProcessState::Finished;
        }

        for _ in 0..quantum {
            match run_step(runtime, &mut self.cursor) {
                Ok(StepResult::Continue) => {}
                Ok(StepResult::Yield) => return ProcessState::Yielded,
                Ok(StepResult::Done) | Ok(StepResult::Exit) => {
                    self.cleanup(&mut runtime.gc);
                    return ProcessState::Finished;
                }
                Ok(StepResult::Unwound(payload)) => {
                    return ProcessState::Failed(payload);
                }
                Err(error) if error.is_raisable() => {
                    let payload = exception_payload(runtime, &error);
                    match self.cursor.raise(&mut runtime.gc, payload) {
                        RaiseResult::Handled => {}
                        RaiseResult::Unhandled(payload) => {
                            return ProcessState::Failed(payload);
                        }
                    }
                }
                Err(fatal) => {
                    report_fatal(runtime, &self.cursor, &fatal);
                    runtime.exit(70);
                    self.cleanup(&mut runtime.gc);
                    return ProcessState::Finished;
                }
            }
        }
        ProcessState::Ready
    }
}

/// Build the language-level payload for an engine-raised error.
fn exception_payload(runtime: &mut Runtime, error: &MintError) -> WeakReference {
    create_string(&runtime.global, &mut runtime.gc, &error.to_string())
}

fn report_fatal(runtime: &Runtime, cursor: &Cursor, fatal: &MintError) {
    error!("fatal: {fatal}");
    for frame in cursor.dump(&runtime.modules) {
        match frame.line {
            Some(line) => error!("  at {}:{line}", frame.module),
            None => error!("  at {}", frame.module),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::module::MAIN_ID;
    use crate::ast::node::{Command, Node};
    use crate::config::RuntimeConfig;

    #[test]
    fn empty_module_finishes_immediately() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Command(Command::ExitModule));

        let mut process = Process::main(MAIN_ID);
        match process.exec(&mut runtime, 16) {
            ProcessState::Finished => {}
            _ => panic!("expected the process to finish"),
        }
    }

    #[test]
    fn cancelled_process_never_runs() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime
            .modules
            .module_mut(MAIN_ID)
            .push_node(Node::Command(Command::ExitModule));

        let mut process = Process::main(MAIN_ID);
        process.cancel();
        assert!(matches!(
            process.exec(&mut runtime, 16),
            ProcessState::Finished
        ));
    }
}
