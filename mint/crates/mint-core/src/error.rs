//! Error Module - runtime error types.
//!
//! Every raisable condition in the engine is a [`MintError`]. The dispatch
//! loop converts raisable errors into language-level exceptions through the
//! cursor's raise path; fatal errors abort the owning process with a dumped
//! call stack.

use mint_util::Symbol;
use thiserror::Error;

/// Main error type for all runtime operations.
#[derive(Debug, Error)]
pub enum MintError {
    /// The compiler collaborator rejected a module's source.
    #[error("compile error in module '{module}': {message}")]
    Compile { module: String, message: String },

    /// Lookup of an undeclared symbol in a package or global scope.
    #[error("undefined symbol '{0}'")]
    NoSuchSymbol(Symbol),

    /// Member access on an object that has no such member.
    #[error("object of type '{type_name}' has no member '{member}'")]
    NoSuchMember { type_name: String, member: Symbol },

    /// Operator applied to an operand whose class defines no overload.
    #[error("type '{type_name}' has no operator '{operator}'")]
    NoSuchOperator {
        type_name: String,
        operator: &'static str,
    },

    /// Write through a CONST_VALUE or rebind of a CONST_ADDRESS reference.
    #[error("invalid modification of constant reference")]
    InvalidModification,

    /// A member is inherited from several unrelated bases with no override.
    #[error("class '{class}': member '{member}' is ambiguous between bases")]
    AmbiguousInheritance { class: String, member: Symbol },

    /// A base path named in a class description did not resolve to a class.
    #[error("class '{class}': base '{base}' was not found")]
    UnresolvedBase { class: String, base: String },

    /// Call with no compatible signature in the function mapping.
    #[error("called function of type '{type_name}' with {signature} argument(s): no matching signature")]
    ArityMismatch {
        type_name: String,
        signature: i32,
    },

    /// Strict numeric or boolean conversion of an incompatible value.
    #[error("invalid conversion of '{type_name}' to '{target}'")]
    InvalidCast {
        type_name: String,
        target: &'static str,
    },

    /// Integer division or modulo by zero (float division follows IEEE).
    #[error("division by zero")]
    DivisionByZero,

    /// `next` on a generator that was finalized or already driven to its end.
    #[error("generator is closed")]
    GeneratorClosed,

    /// A raise with no retrieve point and no `show` method on the payload.
    #[error("unhandled exception: {0}")]
    Unhandled(String),

    /// Invariant violation inside the engine itself. Never raisable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MintError {
    /// Whether this error travels through the language-level raise path.
    ///
    /// Non-raisable errors (ambiguous inheritance, internal assertions)
    /// abort the owning process instead.
    pub fn is_raisable(&self) -> bool {
        !matches!(
            self,
            MintError::AmbiguousInheritance { .. }
                | MintError::UnresolvedBase { .. }
                | MintError::Internal(_)
        )
    }
}

/// Result type alias for runtime operations.
pub type MintResult<T> = std::result::Result<T, MintError>;
