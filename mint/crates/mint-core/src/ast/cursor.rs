//! Cursors: per-coroutine execution state.
//!
//! A cursor owns one value stack shared by all of its frames, the frame
//! (context) stack itself, the waiting-call stack holding functions whose
//! arguments are still being pushed, and the retrieve-point stack recording
//! unwind targets for `raise`.

use crate::ast::module::{Handle, LineInfo, LineInfoList, ModuleId, ModuleRegistry};
use crate::ast::node::Node;
use crate::ast::printer::Printer;
use crate::ast::saved_state::SavedState;
use crate::memory::class::ClassId;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::{InfoId, WeakReference};
use crate::memory::symbol_table::SymbolTable;

/// How a resumed frame treats `YIELD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Yield suspends the frame back into its saved state.
    Interruptible,
    /// Yields are not honored; the frame runs to its generator exit. Used
    /// by finalization.
    SinglePass,
}

/// A pending invocation: the function popped by `INIT_*_CALL`, parked while
/// its arguments are evaluated.
pub struct Call {
    pub function: WeakReference,
    /// Receiver's class for member and operator calls.
    pub metadata: Option<ClassId>,
    /// Arguments beyond the resolved signature's fixed arity.
    pub extra_args: usize,
    pub member: bool,
}

impl Call {
    pub fn new(function: WeakReference) -> Self {
        Self {
            function,
            metadata: None,
            extra_args: 0,
            member: false,
        }
    }
}

/// A saved unwind target: the three stack depths at `try` entry plus the
/// handler offset.
#[derive(Clone, Copy, Debug)]
pub struct RetrievePoint {
    pub stack_size: usize,
    pub call_stack_size: usize,
    pub waiting_calls_count: usize,
    pub retrieve_offset: usize,
}

/// One call frame.
pub struct Context {
    pub module: ModuleId,
    pub iptr: usize,

    /// Own symbol table, or `None` to share the nearest caller's.
    symbols: Option<SymbolTable>,

    /// Target iterator when this frame is a resumed generator body.
    pub generator: Option<WeakReference>,

    /// Iterators under construction by generator expressions.
    pub generator_expressions: Vec<WeakReference>,

    /// Open `print` redirections.
    pub printers: Vec<Box<dyn Printer>>,

    /// Frame is a builtin-method trampoline.
    pub builtin: bool,

    /// Frame's handle was declared as a generator.
    pub handle_generator: bool,

    pub mode: ExecutionMode,

    /// Value-stack depth the frame started from (arguments excluded).
    pub stack_base: usize,
    /// Retrieve-point depth at frame entry.
    pub retrieve_base: usize,
    /// Waiting-call depth at frame entry.
    pub waiting_base: usize,

    /// Argument count beyond the resolved fixed arity, consumed by
    /// `LOAD_EXTRA_ARGUMENTS`.
    pub extra_args: usize,
}

impl Context {
    fn new(module: ModuleId, iptr: usize) -> Self {
        Self {
            module,
            iptr,
            symbols: Some(SymbolTable::new(None)),
            generator: None,
            generator_expressions: Vec::new(),
            printers: Vec::new(),
            builtin: false,
            handle_generator: false,
            mode: ExecutionMode::Interruptible,
            stack_base: 0,
            retrieve_base: 0,
            waiting_base: 0,
            extra_args: 0,
        }
    }

    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        if let Some(symbols) = &self.symbols {
            symbols.visit_children(visit);
        }
        if let Some(generator) = &self.generator {
            visit(generator.info());
        }
        for expression in &self.generator_expressions {
            visit(expression.info());
        }
    }

    /// Dispose of every reference the frame holds.
    pub fn release(mut self, gc: &mut GarbageCollector) {
        if let Some(symbols) = &mut self.symbols {
            for reference in symbols.drain() {
                gc.discard(reference);
            }
        }
        if let Some(generator) = self.generator.take() {
            gc.discard(generator);
        }
        for expression in self.generator_expressions.drain(..) {
            gc.discard(expression);
        }
        for mut printer in self.printers.drain(..) {
            printer.flush();
        }
    }
}

/// Outcome of a raise.
pub enum RaiseResult {
    /// A retrieve point absorbed the exception; execution continues at the
    /// handler.
    Handled,
    /// No retrieve point: the exception escalates to the scheduler.
    Unhandled(WeakReference),
}

/// Per-coroutine execution state.
pub struct Cursor {
    stack: Vec<WeakReference>,
    contexts: Vec<Context>,
    waiting_calls: Vec<Call>,
    retrieve_points: Vec<RetrievePoint>,
}

impl Cursor {
    /// A cursor whose root frame starts at `module:offset`.
    pub fn new(module: ModuleId, offset: usize) -> Self {
        Self {
            stack: Vec::new(),
            contexts: vec![Context::new(module, offset)],
            waiting_calls: Vec::new(),
            retrieve_points: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Instruction flow

    /// Fetch the next node and advance.
    #[inline]
    pub fn next(&mut self, registry: &ModuleRegistry) -> Node {
        let context = self.contexts.last_mut().expect("cursor has no frame");
        let module = registry.module(context.module);
        debug_assert!(context.iptr <= module.end(), "instruction pointer ran past module end");
        let node = module.at(context.iptr);
        context.iptr += 1;
        node
    }

    #[inline]
    pub fn jmp(&mut self, offset: usize) {
        self.current_mut().iptr = offset;
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.current().iptr
    }

    // ------------------------------------------------------------------
    // Frames

    #[inline]
    pub fn current(&self) -> &Context {
        self.contexts.last().expect("cursor has no frame")
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut Context {
        self.contexts.last_mut().expect("cursor has no frame")
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn call_in_progress(&self) -> bool {
        !self.waiting_calls.is_empty()
    }

    /// Whether the current frame is a builtin trampoline.
    pub fn is_in_builtin(&self) -> bool {
        self.current().builtin
    }

    /// Whether the current frame belongs to a generator body.
    pub fn is_in_generator(&self) -> bool {
        self.current().handle_generator
    }

    /// Push a frame for a resolved handle.
    ///
    /// Arguments for the call are still on the stack; the body's prologue
    /// pops them through `INIT_PARAM`. The capture pairs, when present, seed
    /// the fresh symbol table (ownership of the references transfers to the
    /// table).
    pub fn begin_call(
        &mut self,
        gc: &mut GarbageCollector,
        handle: &Handle,
        metadata: Option<ClassId>,
        capture: Option<Vec<(mint_util::Symbol, WeakReference)>>,
        arg_count: usize,
        extra_args: usize,
        builtin: bool,
    ) {
        let mut context = Context::new(handle.module, handle.offset);
        context.builtin = builtin;
        context.handle_generator = handle.generator;
        context.stack_base = self.stack.len().saturating_sub(arg_count);
        context.retrieve_base = self.retrieve_points.len();
        context.waiting_base = self.waiting_calls.len();

        if handle.symbols {
            let mut symbols = SymbolTable::new(metadata);
            symbols.reserve_fast(handle.fast_count);
            for (symbol, reference) in capture.into_iter().flatten() {
                if let Some(previous) = symbols.insert(symbol, reference) {
                    gc.discard(previous);
                }
            }
            context.symbols = Some(symbols);
        } else {
            context.symbols = None;
            for (_, reference) in capture.into_iter().flatten() {
                gc.discard(reference);
            }
        }

        context.extra_args = extra_args;
        self.contexts.push(context);
    }

    /// Pop the current frame. The call result, if any, stays on the stack.
    ///
    /// Returns `false` when the root frame was popped.
    pub fn exit_call(&mut self, gc: &mut GarbageCollector) -> bool {
        let context = self.contexts.pop().expect("exit_call with no frame");
        context.release(gc);
        !self.contexts.is_empty()
    }

    // ------------------------------------------------------------------
    // Value stack

    #[inline]
    pub fn stack(&self) -> &[WeakReference] {
        &self.stack
    }

    #[inline]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn push(&mut self, reference: WeakReference) {
        self.stack.push(reference);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<WeakReference> {
        self.stack.pop()
    }

    /// Top of stack.
    #[inline]
    pub fn top(&self) -> Option<&WeakReference> {
        self.stack.last()
    }

    #[inline]
    pub fn peek(&self, depth: usize) -> Option<&WeakReference> {
        self.stack.len().checked_sub(depth + 1).map(|i| &self.stack[i])
    }

    // ------------------------------------------------------------------
    // Waiting calls

    pub fn push_waiting_call(&mut self, call: Call) {
        self.waiting_calls.push(call);
    }

    pub fn pop_waiting_call(&mut self) -> Option<Call> {
        self.waiting_calls.pop()
    }

    pub fn waiting_call_mut(&mut self) -> Option<&mut Call> {
        self.waiting_calls.last_mut()
    }

    // ------------------------------------------------------------------
    // Symbols

    /// The innermost owned symbol table at or below the current frame.
    pub fn symbols(&self) -> &SymbolTable {
        self.contexts
            .iter()
            .rev()
            .find_map(|context| context.symbols.as_ref())
            .expect("no symbol table in scope")
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        self.contexts
            .iter_mut()
            .rev()
            .find_map(|context| context.symbols.as_mut())
            .expect("no symbol table in scope")
    }

    // ------------------------------------------------------------------
    // Retrieve points

    pub fn set_retrieve_point(&mut self, offset: usize) {
        self.retrieve_points.push(RetrievePoint {
            stack_size: self.stack.len(),
            call_stack_size: self.contexts.len(),
            waiting_calls_count: self.waiting_calls.len(),
            retrieve_offset: offset,
        });
    }

    pub fn unset_retrieve_point(&mut self) {
        debug_assert!(!self.retrieve_points.is_empty());
        self.retrieve_points.pop();
    }

    #[inline]
    pub fn retrieve_point_count(&self) -> usize {
        self.retrieve_points.len()
    }

    /// Unwind to the innermost retrieve point, or report the exception as
    /// unhandled.
    ///
    /// On unwind, the three stacks are truncated to the recorded sizes, the
    /// exception is pushed, and control jumps to the handler offset.
    pub fn raise(&mut self, gc: &mut GarbageCollector, exception: WeakReference) -> RaiseResult {
        let point = match self.retrieve_points.pop() {
            Some(point) => point,
            None => return RaiseResult::Unhandled(exception),
        };

        while self.contexts.len() > point.call_stack_size {
            let context = self.contexts.pop().expect("call stack underflow");
            context.release(gc);
        }
        while self.waiting_calls.len() > point.waiting_calls_count {
            let call = self.waiting_calls.pop().expect("waiting-call underflow");
            gc.discard(call.function);
        }
        while self.stack.len() > point.stack_size {
            let reference = self.stack.pop().expect("value stack underflow");
            gc.discard(reference);
        }

        self.stack.push(exception);
        self.jmp(point.retrieve_offset);
        RaiseResult::Handled
    }

    // ------------------------------------------------------------------
    // Interrupt / restore

    /// Detach the current frame into a saved state.
    ///
    /// The parent frame becomes current. Stack values and retrieve points
    /// above the frame base travel with the state, rebased so they can be
    /// restored at any depth.
    pub fn interrupt(&mut self) -> SavedState {
        let context = self.contexts.pop().expect("interrupt with no frame");
        let stored_stack = self.stack.split_off(context.stack_base);
        let depth = self.contexts.len();
        let mut retrieve_points = self.retrieve_points.split_off(context.retrieve_base);
        for point in &mut retrieve_points {
            point.stack_size -= context.stack_base;
            point.call_stack_size -= depth;
            point.waiting_calls_count -= context.waiting_base;
        }
        let mode = context.mode;
        SavedState {
            context,
            stored_stack,
            retrieve_points,
            mode,
        }
    }

    /// Push a saved state back onto this cursor. Inverse of
    /// [`Cursor::interrupt`].
    pub fn restore(&mut self, state: SavedState) {
        let SavedState {
            mut context,
            stored_stack,
            retrieve_points,
            mode,
        } = state;

        context.stack_base = self.stack.len();
        context.retrieve_base = self.retrieve_points.len();
        context.waiting_base = self.waiting_calls.len();
        context.mode = mode;

        let depth = self.contexts.len();
        for mut point in retrieve_points {
            point.stack_size += context.stack_base;
            point.call_stack_size += depth;
            point.waiting_calls_count += context.waiting_base;
            self.retrieve_points.push(point);
        }
        self.stack.extend(stored_stack);
        self.contexts.push(context);
    }

    // ------------------------------------------------------------------
    // Printers

    pub fn open_printer(&mut self, printer: Box<dyn Printer>) {
        self.current_mut().printers.push(printer);
    }

    pub fn close_printer(&mut self) {
        if let Some(mut printer) = self.current_mut().printers.pop() {
            printer.flush();
        }
    }

    /// Innermost open printer, if any frame has one.
    pub fn printer_mut(&mut self) -> Option<&mut (dyn Printer + '_)> {
        for context in self.contexts.iter_mut().rev() {
            if let Some(printer) = context.printers.last_mut() {
                return Some(printer.as_mut());
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Diagnostics and teardown

    /// Call-stack dump, innermost frame first.
    pub fn dump(&self, registry: &ModuleRegistry) -> LineInfoList {
        self.contexts
            .iter()
            .rev()
            .map(|context| LineInfo {
                module: registry.name(context.module).to_string(),
                line: registry.entry(context.module).debug.line_at(context.iptr.saturating_sub(1)),
            })
            .collect()
    }

    /// Feed everything the cursor holds to the mark phase.
    pub fn mark(&self, gc: &mut GarbageCollector) {
        for reference in &self.stack {
            gc.mark_info(reference.info());
        }
        for call in &self.waiting_calls {
            gc.mark_info(call.function.info());
        }
        let mut visit = |info: InfoId| gc.mark_info(info);
        for context in &self.contexts {
            context.visit_children(&mut visit);
        }
    }

    /// Dispose of every held reference. Run when the owning process dies.
    pub fn cleanup(&mut self, gc: &mut GarbageCollector) {
        while let Some(reference) = self.stack.pop() {
            gc.discard(reference);
        }
        while let Some(call) = self.waiting_calls.pop() {
            gc.discard(call.function);
        }
        while let Some(context) = self.contexts.pop() {
            context.release(gc);
        }
        self.retrieve_points.clear();
    }
}
