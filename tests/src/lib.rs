//! # Simulator Test Suite
//!
//! Cross-crate integration tests that don't fit naturally inside any one
//! of the `sim-*` crates: full driver runs, two-replica network
//! choreography, and the end-to-end scenarios the simulator is meant to
//! reproduce.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p sim-tests
//! ```

#![allow(unused_imports)]

pub mod integration;
