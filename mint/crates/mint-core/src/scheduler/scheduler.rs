//! The scheduler: cooperative multiplexing over the processor lock.
//!
//! The processor lock is a mutex around the whole [`Runtime`]. Exactly one
//! process mutates VM state at any instant: the main loop and every
//! spawned OS thread acquire the lock for a quantum, run instructions, and
//! release it. Between quanta the scheduler drains the destructor queue,
//! materializes requested threads, and triggers cycle collection.

use crate::ast::cursor::Cursor;
use crate::ast::module::{ModuleId, MAIN_ID};
use crate::ast::runtime::Runtime;
use crate::config::RuntimeConfig;
use crate::error::MintResult;
use crate::memory::reference::WeakReference;
use crate::scheduler::destructor::make_destructor_process;
use crate::scheduler::exception::make_exception_process;
use crate::scheduler::process::{Process, ProcessRole, ProcessState};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct SchedulerInner {
    /// The processor lock.
    runtime: Mutex<Runtime>,
    running: AtomicBool,
}

/// Owns every process and the processor lock.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    join_handles: Mutex<FxHashMap<u64, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_runtime(Runtime::new(config))
    }

    pub fn with_runtime(runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                runtime: Mutex::new(runtime),
                running: AtomicBool::new(true),
            }),
            join_handles: Mutex::new(FxHashMap::default()),
        }
    }

    /// Acquire the processor lock.
    ///
    /// Embedders use this for any direct runtime manipulation; builtin
    /// methods already run under it.
    pub fn lock_processor(&self) -> MutexGuard<'_, Runtime> {
        self.inner.runtime.lock()
    }

    /// Run the main module to completion and return the exit status.
    pub fn run_main(&self) -> i32 {
        self.run_module(MAIN_ID)
    }

    /// Run an arbitrary module as the main process.
    pub fn run_module(&self, module: ModuleId) -> i32 {
        {
            let mut runtime = self.lock_processor();
            runtime.parked.push_back(Process::main(module));
        }
        let mut failed = false;

        loop {
            let mut runtime = self.lock_processor();
            if !runtime.is_running() {
                break;
            }

            self.drain_destructors(&mut runtime);
            self.spawn_requested_threads(&mut runtime);

            let Some(mut process) = runtime.parked.pop_front() else {
                if runtime.thread_slots.is_empty() {
                    break;
                }
                // Only OS-thread processes remain; let them run.
                drop(runtime);
                std::thread::yield_now();
                continue;
            };

            let quantum = runtime.config.quantum;
            let state = process.exec(&mut runtime, quantum);
            match state {
                ProcessState::Ready | ProcessState::Yielded => {
                    runtime.maybe_collect(Some(process.cursor()));
                    runtime.parked.push_back(process);
                }
                ProcessState::Finished => {
                    finish_process(&mut runtime, process);
                }
                ProcessState::Failed(payload) => {
                    failed = true;
                    escalate(&mut runtime, process, payload);
                }
            }
            drop(runtime);
            std::thread::yield_now();
        }

        self.shutdown(failed)
    }

    /// Queue a process; it joins the round-robin on the next tick.
    pub fn push_process(&self, process: Process) {
        self.lock_processor().parked.push_back(process);
    }

    /// Launch a cursor as a process on its own OS thread.
    ///
    /// Returns the thread id usable with [`Scheduler::join_thread`].
    pub fn start_thread(&self, cursor: Cursor) -> u64 {
        let id = {
            let mut runtime = self.lock_processor();
            let id = runtime.next_thread_id;
            runtime.next_thread_id += 1;
            runtime
                .thread_slots
                .insert(id, Process::from_cursor(cursor, ProcessRole::Thread { id }));
            id
        };

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name(format!("mint-thread-{id}"))
            .spawn(move || thread_main(inner, id))
            .expect("failed to spawn runtime thread");
        self.join_handles.lock().insert(id, handle);
        id
    }

    /// Block until a thread's OS thread exits, releasing the processor lock
    /// while waiting. Returns whether the thread finished within the
    /// timeout.
    pub fn join_thread(&self, id: u64, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            {
                let runtime = self.lock_processor();
                if runtime.finished_threads.contains(&id) {
                    break;
                }
                if !runtime.thread_slots.contains_key(&id)
                    && !runtime.finished_threads.contains(&id)
                {
                    // Unknown id: nothing to wait for.
                    return true;
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if let Some(handle) = self.join_handles.lock().remove(&id) {
            let _ = handle.join();
        }
        true
    }

    /// Run destructor processes synchronously until the queue is empty.
    fn drain_destructors(&self, runtime: &mut Runtime) {
        loop {
            let pending = runtime.gc.take_pending_destructors();
            if pending.is_empty() {
                break;
            }
            let quantum = runtime.config.quantum;
            for object in pending {
                match make_destructor_process(runtime, object) {
                    Ok(Some(mut process)) => {
                        // Destructors run to completion before anything
                        // else touches the runtime.
                        loop {
                            match process.exec(runtime, quantum) {
                                ProcessState::Ready | ProcessState::Yielded => continue,
                                ProcessState::Finished => break,
                                ProcessState::Failed(payload) => {
                                    warn!("exception escaped a destructor");
                                    discard_payload(runtime, payload);
                                    process.cleanup(&mut runtime.gc);
                                    break;
                                }
                            }
                        }
                        runtime.gc.destroy(object);
                    }
                    Ok(None) => runtime.gc.destroy(object),
                    Err(error) => {
                        warn!("destructor setup failed: {error}");
                        runtime.gc.destroy(object);
                    }
                }
            }
        }
    }

    fn spawn_requested_threads(&self, runtime: &mut Runtime) {
        let requests = std::mem::take(&mut runtime.spawn_requests);
        for process in requests {
            match process.thread_id() {
                Some(id) => {
                    runtime.thread_slots.insert(id, process);
                    let inner = Arc::clone(&self.inner);
                    let handle = std::thread::Builder::new()
                        .name(format!("mint-thread-{id}"))
                        .spawn(move || thread_main(inner, id))
                        .expect("failed to spawn runtime thread");
                    self.join_handles.lock().insert(id, handle);
                }
                None => runtime.parked.push_back(process),
            }
        }
    }

    /// Final cleanup: stop threads, drain destructors, collect, and compute
    /// the exit status.
    fn shutdown(&self, failed: bool) -> i32 {
        self.inner.running.store(false, Ordering::SeqCst);
        let handles: Vec<_> = self.join_handles.lock().drain().collect();
        for (_, handle) in handles {
            let _ = handle.join();
        }

        let mut runtime = self.lock_processor();
        let leftovers: Vec<Process> = runtime.parked.drain(..).collect();
        for mut process in leftovers {
            process.cleanup(&mut runtime.gc);
        }
        let threads: Vec<Process> = runtime.thread_slots.drain().map(|(_, p)| p).collect();
        for mut process in threads {
            process.cleanup(&mut runtime.gc);
        }
        self.drain_destructors(&mut runtime);
        runtime.collect(None);
        runtime.flush_output();

        let status = runtime
            .exit_status()
            .unwrap_or(if failed { 1 } else { 0 });
        debug!("scheduler shut down with status {status}");
        status
    }
}

/// Terminate a finished process according to its role.
fn finish_process(runtime: &mut Runtime, process: Process) {
    match process.role() {
        ProcessRole::Destructor { object } => {
            let object = *object;
            runtime.gc.destroy(object);
        }
        ProcessRole::Thread { id } => {
            let id = *id;
            runtime.finished_threads.insert(id);
        }
        _ => {}
    }
    drop(process);
}

/// Escalate an unhandled exception: the failed process dies; when the
/// payload has a `show` method, an exception process runs it first.
fn escalate(runtime: &mut Runtime, mut process: Process, payload: WeakReference) {
    process.cleanup(&mut runtime.gc);
    if let ProcessRole::Thread { id } = process.role() {
        let id = *id;
        runtime.finished_threads.insert(id);
    }
    drop(process);

    match make_exception_process(runtime, payload) {
        Ok(Some(handler)) => runtime.parked.push_front(handler),
        Ok(None) => {}
        Err(error) => warn!("exception handler setup failed: {error}"),
    }
}

fn discard_payload(runtime: &mut Runtime, payload: WeakReference) {
    runtime.gc.discard(payload);
}

/// Per-OS-thread driver: contend for the processor lock, run quanta of the
/// owned process until it completes.
fn thread_main(inner: Arc<SchedulerInner>, id: u64) {
    loop {
        if !inner.running.load(Ordering::SeqCst) {
            return;
        }
        let mut runtime = inner.runtime.lock();
        if !runtime.is_running() {
            return;
        }
        let Some(mut process) = runtime.thread_slots.remove(&id) else {
            return;
        };

        let quantum = runtime.config.quantum;
        match process.exec(&mut runtime, quantum) {
            ProcessState::Ready | ProcessState::Yielded => {
                runtime.maybe_collect(Some(process.cursor()));
                runtime.thread_slots.insert(id, process);
            }
            ProcessState::Finished => {
                finish_process(&mut runtime, process);
                runtime.finished_threads.insert(id);
                return;
            }
            ProcessState::Failed(payload) => {
                escalate(&mut runtime, process, payload);
                runtime.finished_threads.insert(id);
                return;
            }
        }
        drop(runtime);
        std::thread::yield_now();
    }
}

/// Convenience: create a thread-role process around a function value.
///
/// The cursor is primed to call `function` with no arguments; the caller
/// hands it to [`Scheduler::start_thread`] or parks it as a spawn request.
pub fn make_thread_process(
    runtime: &mut Runtime,
    function: &WeakReference,
) -> MintResult<Process> {
    let mut cursor = Cursor::new(runtime.exec_module(), 0);
    let callee = runtime.gc.share(function);
    crate::memory::memory_tool::init_call_on(runtime, &mut cursor, callee)?;
    crate::memory::operator_tool::call_operator(runtime, &mut cursor, 0)?;

    let id = runtime.next_thread_id;
    runtime.next_thread_id += 1;
    Ok(Process::from_cursor(cursor, ProcessRole::Thread { id }))
}

/// Queue a thread process for materialization on the next scheduler tick.
///
/// Builtins running under the processor lock use this instead of spawning
/// directly.
pub fn request_thread(runtime: &mut Runtime, process: Process) -> Option<u64> {
    let id = process.thread_id();
    runtime.spawn_requests.push(process);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::node::{Command, Node};
    use crate::memory::data::Data;

    #[test]
    fn empty_main_module_exits_cleanly() {
        let scheduler = Scheduler::new(RuntimeConfig::default());
        {
            let mut runtime = scheduler.lock_processor();
            runtime
                .modules
                .module_mut(MAIN_ID)
                .push_node(Node::Command(Command::ExitModule));
            runtime.modules.entry_mut(MAIN_ID).state = crate::ast::module::ModuleState::Ready;
        }
        assert_eq!(scheduler.run_main(), 0);
    }

    #[test]
    fn exit_exec_sets_the_status() {
        let scheduler = Scheduler::new(RuntimeConfig::default());
        {
            let mut runtime = scheduler.lock_processor();
            let status = runtime.gc.create(Data::Number(3.0));
            let module = runtime.modules.module_mut(MAIN_ID);
            let constant = module.make_constant(status);
            module.push_nodes([
                Node::Command(Command::LoadConstant),
                Node::Constant(constant),
                Node::Command(Command::ExitExec),
            ]);
        }
        assert_eq!(scheduler.run_main(), 3);
    }
}
