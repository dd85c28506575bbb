#![forbid(unsafe_code)]

//! Test utilities for the cull crates.
//!
//! [`ScriptedSource`] is a fully in-memory [`AssetSource`] with programmable
//! latency, stalls, failures and partial delivery, plus journals recording
//! every warming hint, load and deletion so tests can assert on the exact
//! traffic the engine generated.

mod scripted_source;

pub use scripted_source::ScriptedSource;
