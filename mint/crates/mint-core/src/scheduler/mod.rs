//! Scheduler Module - cooperative multi-process execution.
//!
//! One [`process::Process`] wraps one cursor plus a role tag. The
//! [`scheduler::Scheduler`] owns the processor lock (a mutex around the
//! whole [`crate::Runtime`]) and round-robins processes over it;
//! [`processor::run_step`] is the instruction dispatch the quantum is made
//! of.

pub mod destructor;
pub mod exception;
pub mod generator;
pub mod process;
pub mod processor;
#[allow(clippy::module_inception)]
pub mod scheduler;

pub use process::{Process, ProcessRole, ProcessState};
pub use processor::{run_step, StepResult};
pub use scheduler::Scheduler;
