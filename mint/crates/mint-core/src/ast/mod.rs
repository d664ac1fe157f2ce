//! AST Module - bytecode, modules, cursors, and the runtime value.

pub mod cursor;
pub mod module;
pub mod node;
pub mod printer;
pub mod runtime;
pub mod saved_state;

pub use cursor::{Call, Context, Cursor, ExecutionMode, RaiseResult, RetrievePoint};
pub use module::{
    DebugInfo, Handle, HandleId, LineInfo, LineInfoList, Module, ModuleId, ModuleRegistry,
    ModuleState, ConstantId, MAIN_ID, MAIN_NAME,
};
pub use node::{Command, Node};
pub use printer::{BufferPrinter, FilePrinter, Printer, StandardPrinter};
pub use runtime::{BuiltinMethod, Compiler, Runtime};
pub use saved_state::SavedState;
