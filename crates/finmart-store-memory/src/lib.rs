//! In-process realtime document store for finmart.
//!
//! Holds every collection in memory and pushes a fresh snapshot to each
//! attached live query after every committed write, in commit order. It backs
//! the "pending" side of a deployment and doubles as the injectable fake in
//! tests: access-control denials and transient outages can be switched on,
//! and every adapter call is counted.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::MemoryStore;
