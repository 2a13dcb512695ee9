//! End-to-end test support for the mama-core engine.

pub mod harness;
