//! Combinators for composing fibers.
//!
//! All composition goes through one primitive: [`wait`] parks the calling
//! fiber on a set of children by borrowing its own graph node as the wait
//! list. The `when_*` forms add ownership handling on top:
//!
//! - [`when_all`] / [`when_all2`] / [`when_all3`]: wait for all, gather
//!   every result.
//! - [`when_any`] / [`when_any2`]: wait for the first, return the winning
//!   index along with the fibers (losers stay drainable or cancellable).
//!
//! Every form accepts a [`Deadline`](crate::time::Deadline); expiry
//! surfaces as `TimedOut` and detaches whatever was still pending.

pub mod join;
pub mod race;
pub mod wait;

pub use join::{when_all, when_all2, when_all3};
pub use race::{when_any, when_any2, WhenAny};
pub use wait::{wait, Until};
