//! Event queue for the vigil watcher pipeline.
//!
//! [`EventQueue`] is the fan-out stage: it consumes the single change stream
//! produced by the reader and delivers each change to every subscription
//! whose selectors match, preserving input order per subscription.
//!
//! Subscriptions are created with [`EventQueue::subscribe`] from one or more
//! [`Selector`]s; each selector names an entity type, a kind mask, and an
//! optional predicate. Sends to subscribers are capacity-1 rendezvous: a slow
//! subscriber stalls the dispatcher, which stalls the reader, which degrades
//! into longer coalescing windows instead of unbounded buffering.

pub mod error;
pub mod queue;
pub mod selector;
pub mod subscription;

pub use error::{QueueError, Result};
pub use queue::EventQueue;
pub use selector::Selector;
pub use subscription::Subscription;
