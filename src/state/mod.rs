//! Client-side state derived from socket channel snapshots.
//!
//! Socket channels push full snapshots (all open orders of an account, recent
//! trades of a ticker) rather than deltas. [`AccountOrders`] diffs consecutive
//! order snapshots into status transitions and [`TradeCursor`] picks the trades
//! not seen before.

mod orders;
mod trades;

pub use orders::*;
pub use trades::*;
