#![deny(unreachable_pub)]

//! Engine for the fishnet worker: a UCI driver, job executor, backoff
//! generator, job-protocol HTTP client, and a thread-per-worker supervisor.
//!
//! `unsafe` is not forbidden crate-wide: killing an engine's whole process
//! group on Unix goes through a raw `libc::kill` call (see `uci.rs`).

/// Public API for the engine crate.
pub mod api;

mod backoff;
mod error;
mod executor;
mod http_client;
mod info_parser;
mod logging;
mod supervisor;
mod uci;
mod worker;

pub use api::*;
