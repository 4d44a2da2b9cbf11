//! Submission routing and dual-source aggregation.
//!
//! - [`writer::SubmissionWriter`] validates and routes form submissions into
//!   the pending store.
//! - [`aggregate::Aggregator`] merges live pending and approved streams into
//!   one ordered per-owner view.
//! - [`transition::TransitionManager`] is the admin path for status changes
//!   and promotion into the approved store.
//!
//! Every component receives its store adapters by injection.

pub mod aggregate;
pub mod error;
pub mod identity;
pub mod transition;
pub mod writer;

pub use error::{TransitionError, WriteError};
pub use identity::Identity;
