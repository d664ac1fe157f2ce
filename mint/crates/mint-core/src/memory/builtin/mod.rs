//! Built-in types.
//!
//! Each built-in is an object whose singleton class carries the metatype tag
//! selecting the payload representation. The modules here define the payload
//! operations and register the native methods on the builtin classes.

pub mod array;
pub mod hash;
pub mod iterator;
pub mod lib_object;
pub mod library;
pub mod regex;
pub mod string;

use crate::ast::runtime::Runtime;

/// Install the native methods of every builtin class.
///
/// Called once from [`Runtime::new`], after the builtin classes exist and
/// before any user code runs.
pub fn register_builtins(runtime: &mut Runtime) {
    iterator::register(runtime);
    array::register(runtime);
    hash::register(runtime);
    string::register(runtime);
    regex::register(runtime);
    library::register(runtime);
}
