//! The runtime value.
//!
//! [`Runtime`] owns everything with process lifetime: the collector, the
//! package/class world, the module registry, the builtin-method table, and
//! the scheduler's parked processes. There is no global state; the scheduler
//! wraps one `Runtime` in the processor lock and every subsystem receives it
//! explicitly.

use crate::ast::cursor::Cursor;
use crate::ast::module::{
    resolve_module_path, ModuleId, ModuleRegistry, ModuleState,
};
use crate::ast::node::{Command, Node};
use crate::ast::printer::{Printer, StandardPrinter};
use crate::config::RuntimeConfig;
use crate::error::{MintError, MintResult};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::scheduler::process::Process;
use log::debug;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// An in-process builtin method: the native half of the method ABI.
pub type BuiltinMethod = fn(&mut Runtime, &mut Cursor) -> MintResult<()>;

/// The compiler collaborator's seam.
///
/// An implementation translates source text into bytecode through the
/// public module-builder API. The core ships none.
pub trait Compiler: Send {
    fn compile(&mut self, runtime: &mut Runtime, module: ModuleId, source: &str)
        -> MintResult<()>;
}

/// Everything with process lifetime, in one explicit value.
pub struct Runtime {
    pub config: RuntimeConfig,
    pub gc: GarbageCollector,
    pub global: GlobalData,
    pub modules: ModuleRegistry,

    builtin_methods: Vec<BuiltinMethod>,
    builtin_module: ModuleId,
    exec_module: ModuleId,

    pub compiler: Option<Box<dyn Compiler>>,

    default_printer: Box<dyn Printer>,

    // Scheduler state lives under the processor lock so the collector can
    // reach every parked cursor.
    pub(crate) parked: VecDeque<Process>,
    pub(crate) spawn_requests: Vec<Process>,
    pub(crate) thread_slots: rustc_hash::FxHashMap<u64, Process>,
    pub(crate) finished_threads: FxHashSet<u64>,
    pub(crate) next_thread_id: u64,
    pub(crate) exit_status: Option<i32>,
    pub(crate) running: bool,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let mut modules = ModuleRegistry::new();
        let builtin_module = modules.create_module("(builtin)", ModuleState::Ready);
        // Root frame for detached executions (destructors, exception
        // handlers, finalized generators): a single module-exit.
        let exec_module = modules.create_module("(exec)", ModuleState::Ready);
        modules
            .module_mut(exec_module)
            .push_node(Node::Command(Command::ExitModule));

        let mut runtime = Self {
            config,
            gc: GarbageCollector::new(),
            global: GlobalData::new(),
            modules,
            builtin_methods: Vec::new(),
            builtin_module,
            exec_module,
            compiler: None,
            default_printer: Box::new(StandardPrinter::stdout()),
            parked: VecDeque::new(),
            spawn_requests: Vec::new(),
            thread_slots: rustc_hash::FxHashMap::default(),
            finished_threads: FxHashSet::default(),
            next_thread_id: 1,
            exit_status: None,
            running: true,
        };
        crate::memory::builtin::register_builtins(&mut runtime);
        runtime
    }

    // ------------------------------------------------------------------
    // Builtin methods

    /// The module hosting builtin trampolines.
    #[inline]
    pub fn builtin_module(&self) -> ModuleId {
        self.builtin_module
    }

    /// The single-exit module detached executions root their cursor in.
    #[inline]
    pub fn exec_module(&self) -> ModuleId {
        self.exec_module
    }

    /// Register a builtin method and build its trampoline.
    ///
    /// Returns the `(signature, handle)` pair to merge into a function
    /// mapping.
    pub fn create_builtin_method(
        &mut self,
        signature: i32,
        method: BuiltinMethod,
    ) -> (i32, crate::ast::module::HandleId) {
        let index = self.builtin_methods.len() as i32;
        self.builtin_methods.push(method);

        let root = self.global.root();
        let module = self.modules.module_mut(self.builtin_module);
        let offset = module.next_node_offset();
        module.push_nodes([
            Node::Command(Command::CallBuiltin),
            Node::Parameter(index),
            Node::Command(Command::ExitCall),
        ]);
        let handle = module.make_handle(root, offset, 0, false, false);
        (signature, handle)
    }

    /// Dispatch a builtin by table index.
    pub fn call_builtin(&mut self, index: usize, cursor: &mut Cursor) -> MintResult<()> {
        let method = *self
            .builtin_methods
            .get(index)
            .ok_or_else(|| MintError::Internal(format!("unknown builtin method {index}")))?;
        method(self, cursor)
    }

    // ------------------------------------------------------------------
    // Printing

    /// Replace the fallback printer (the REPL and tests capture output this
    /// way).
    pub fn set_default_printer(&mut self, printer: Box<dyn Printer>) {
        self.default_printer = printer;
    }

    /// Write to the innermost open printer, falling back to the default.
    pub fn print(&mut self, cursor: &mut Cursor, text: &str) {
        match cursor.printer_mut() {
            Some(printer) => printer.print(text),
            None => self.default_printer.print(text),
        }
    }

    pub fn flush_output(&mut self) {
        self.default_printer.flush();
    }

    // ------------------------------------------------------------------
    // Module loading

    /// Resolve, compile, and register a module by dotted name.
    ///
    /// The module cache short-circuits repeat loads; compilation is
    /// delegated to the configured [`Compiler`].
    pub fn load_module(&mut self, name: &str) -> MintResult<ModuleId> {
        let path = resolve_module_path(&self.config.library_paths, name).ok_or_else(|| {
            MintError::Compile {
                module: name.to_string(),
                message: "module file not found on MINT_LIBRARY_PATH".to_string(),
            }
        })?;

        let id = self.modules.create_module_for_path(&path, name);
        if self.modules.entry(id).state == ModuleState::Ready {
            return Ok(id);
        }

        let source = std::fs::read_to_string(&path).map_err(|error| MintError::Compile {
            module: name.to_string(),
            message: format!("cannot read '{}': {error}", path.display()),
        })?;

        let mut compiler = self.compiler.take().ok_or_else(|| MintError::Compile {
            module: name.to_string(),
            message: "no compiler is configured".to_string(),
        })?;
        let result = compiler.compile(self, id, &source);
        self.compiler = Some(compiler);
        result?;

        self.modules.entry_mut(id).state = ModuleState::Ready;
        debug!("loaded module '{name}' from {}", path.display());
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Shutdown

    /// Request runtime shutdown with a status code.
    pub fn exit(&mut self, status: i32) {
        self.exit_status = Some(status);
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    // ------------------------------------------------------------------
    // Collection

    /// Run a full mark-sweep cycle.
    ///
    /// Roots: the strong-reference registry, the package/class world, every
    /// module constant pool, every parked or thread-slotted cursor, and the
    /// currently executing cursor.
    pub fn collect(&mut self, current: Option<&Cursor>) -> usize {
        let Runtime {
            gc,
            global,
            modules,
            parked,
            spawn_requests,
            thread_slots,
            ..
        } = self;

        gc.begin_collect();
        global.mark(gc);
        modules.mark(gc);
        for process in parked.iter() {
            process.mark(gc);
        }
        for process in spawn_requests.iter() {
            process.mark(gc);
        }
        for process in thread_slots.values() {
            process.mark(gc);
        }
        if let Some(cursor) = current {
            cursor.mark(gc);
        }
        gc.end_collect()
    }

    /// Collect when the live population crossed the configured threshold.
    pub fn maybe_collect(&mut self, current: Option<&Cursor>) {
        if self.gc.should_collect(self.config.gc_threshold) {
            self.collect(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_trampolines_are_three_nodes_apart() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        fn noop(_: &mut Runtime, _: &mut Cursor) -> MintResult<()> {
            Ok(())
        }
        let (_, first) = runtime.create_builtin_method(1, noop);
        let (_, second) = runtime.create_builtin_method(1, noop);
        let first_offset = runtime.modules.handle(first).offset;
        let second_offset = runtime.modules.handle(second).offset;
        assert_eq!(second_offset - first_offset, 3);
    }

    #[test]
    fn exit_clears_the_run_flag() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        assert!(runtime.is_running());
        runtime.exit(3);
        assert!(!runtime.is_running());
        assert_eq!(runtime.exit_status(), Some(3));
    }

    #[test]
    fn collect_with_no_work_reclaims_nothing_live() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let live = runtime.gc.live_cells();
        runtime.collect(None);
        assert_eq!(runtime.gc.live_cells(), live);
    }
}
