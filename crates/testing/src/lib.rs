//! Shared test fixtures: one lazily-initialized Postgres/Redis container per
//! test process, so `cargo test` across crates doesn't spin up a container
//! per test file.

mod fixtures;

pub use fixtures::*;
