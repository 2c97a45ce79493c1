//! Shared helpers for server integration tests.

pub mod fixtures;
pub mod mocks;
pub mod server;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::*;
#[allow(unused_imports)]
pub use server::*;
