//! Actor lifecycle primitives
//!
//! Every registry node and every gather coordinator is a tokio task that owns
//! the receiving half of its mailbox. This module holds the small pieces they
//! share:
//! - [`Addr`] - identity plus the sending half of a mailbox
//! - [`watch`] - termination notification for a watched actor
//! - [`Deadline`] - cancellable one-shot timer delivered as a mailbox message
//! - [`ChildIndex`] - parent-side id/actor index kept in lock-step

mod addr;
mod deadline;
mod index;
mod watch;

pub use addr::{ActorId, Addr, MailboxClosed, WeakAddr, mailbox};
pub use deadline::Deadline;
pub use index::ChildIndex;
pub use watch::{WatchGuard, watch};
