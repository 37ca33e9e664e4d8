//! Shared helpers for the ledit-core integration tests.
//!
//! - [`fixtures`]: process definitions built in code
//! - [`mocks`]: a test environment wiring mock collaborators to a temp dir
//! - [`assertions`]: checks over run states and event streams

pub mod assertions;
pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::*;
