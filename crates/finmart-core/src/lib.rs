//! Core types and trait definitions for the finmart submission layer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Store backends implement [`store::StoreAdapter`]; the intake layer and the
//! HTTP surface depend on that abstraction, never on a concrete backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod document;
pub mod error;
pub mod kind;
pub mod live;
pub mod store;

pub use error::{Error, Result};
