//! Integration tests for clock jump monitor acceptance testing.
//!
//! Tests marked `#[ignore]` need privileges, the freeze module, or exclusive
//! use of every CPU. Run them with `cargo test -- --ignored`.

mod common;
mod freeze_test;
mod monitor_test;
