//! Command-line surface for `widelong-core`.
//!
//! `src/bin/widelong.rs` is a thin shim over [`run`].

mod cli;

pub use crate::cli::{run, run_with_args, Args};
