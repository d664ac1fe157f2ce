//! mint-core - The mint language runtime core.
//!
//! This crate implements the bytecode execution engine, the value and memory
//! model, the cooperative scheduler, and the built-in container semantics of
//! the mint runtime:
//!
//! - [`ast`]: bytecode nodes and modules, the per-coroutine [`ast::Cursor`],
//!   saved states for generator suspension, printers, and the [`ast::Runtime`]
//!   value that owns everything with process lifetime.
//! - [`memory`]: tagged data cells, reference cells with visibility and
//!   constness flags, the hybrid reference-counted / mark-sweep
//!   [`memory::GarbageCollector`], class metadata, and the built-in types.
//! - [`scheduler`]: processes (main, thread, generator, destructor,
//!   exception), the instruction dispatch loop, and the global processor
//!   lock that serializes every mutator.
//! - [`system`]: plugin loading and the C plugin ABI.
//!
//! The compiler front-end is an external collaborator: it drives the public
//! module-builder API ([`ast::Module`]) and plugs in through the
//! [`ast::Compiler`] trait. Nothing in this crate parses source text.

pub mod ast;
pub mod config;
pub mod error;
pub mod memory;
pub mod scheduler;
pub mod system;

pub use ast::{Cursor, Module, Node, Runtime};
pub use config::RuntimeConfig;
pub use error::{MintError, MintResult};
pub use scheduler::Scheduler;
