//! Facade over [`geotree_core`] for the workspace demos.
//!
//! `cargo run --example basic_usage` and `cargo run --example drill_down`
//! exercise the hierarchy and the cascading selector end to end.

pub use geotree_core::*;
