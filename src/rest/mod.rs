//! REST API clients.
//!
//! [`PublicClient`] covers market data endpoints, [`OpiumClient`] adds the
//! account endpoints authenticated with a signed access token.

mod client;
mod http;
mod public;

pub use client::OpiumClient;
pub use public::PublicClient;
