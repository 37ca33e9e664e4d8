//! Validation gate and its command runners.

pub mod gate;
pub mod mock;
pub mod runner;

pub use gate::{CheckKind, CheckResult, GateReport, ValidationGate};
pub use mock::MockValidationRunner;
pub use runner::{
    run_shell, CommandOutput, ShellValidationRunner, ValidationError, ValidationRunner,
};
