//! Scatter/gather coordination
//!
//! A [`Gather`] fans one request out to a set of targets, merges their
//! replies and answers the original requester exactly once: when every
//! target has answered or when its deadline fires, whichever comes first.
//! What is sent, how replies merge and what a timeout leaves behind is
//! supplied by a [`GatherPolicy`]; the four registry aggregations live in
//! [`policies`].

mod core;
pub mod policies;
mod reply;
mod stats;

pub use self::core::{Gather, GatherEvent, GatherPolicy};
pub use reply::ReplyTo;
pub use stats::{GatherMetrics, GatherStats};
