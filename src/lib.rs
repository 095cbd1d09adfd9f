//! Opium exchange SDK.
//!
//! # Overview
//!
//! Async client for the Opium derivatives exchange: REST calls for tickers,
//! balances and order management, EIP-712 signing of the order payloads the
//! exchange forms for us, and socket.io subscriptions for trades, order book
//! and account updates.
//!
//! Use [`rest::PublicClient`] for unauthenticated market data and
//! [`rest::OpiumClient`] for account operations. Orders are placed in two steps:
//! the exchange forms typed-data payloads (`/orderbook/formOrder`), the client
//! signs them with [`signing::TypedDataSigner`] and submits the signatures.
//!
//! Use [`stream::OpiumStream`] to read channel snapshots or to follow live
//! updates; [`state::AccountOrders`] turns consecutive order snapshots into
//! ACTIVE/CANCELED/FILLED transitions.
//!
//! # Limitations/follow-ups
//!
//! * Only the websocket transport of socket.io is supported, long-polling
//!   fallback is not implemented.
//!
//! * Binary socket.io packets are rejected, the exchange does not use them.
//!
//! * Order quantities are integral contract counts.
//!
//! [`testing`] module provides a local socket.io server and signing fixtures
//! for tests.
//!
//! See `./tests` for examples.

pub mod config;
pub mod error;
pub mod num;
pub mod rest;
pub mod signing;
pub mod socket;
pub mod state;
pub mod stream;
pub mod testing;
pub mod types;

use url::Url;

use crate::error::ApiError;

/// REST API version path segment.
pub const API_VERSION: &str = "v1";

/// Revision of the engine.io protocol spoken by the socket server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineIo {
    /// Engine.io 3 (socket.io 2.x servers): client sends pings.
    #[default]
    V3,
    /// Engine.io 4 (socket.io 3.x/4.x servers): server sends pings.
    V4,
}

impl EngineIo {
    /// Value of the `EIO` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            EngineIo::V3 => "3",
            EngineIo::V4 => "4",
        }
    }
}

/// Exchange deployment the client talks to.
#[derive(Clone, Debug)]
pub struct Network {
    rest_url: Url,
    socket_url: Url,
    namespace: String,
    engine_io: EngineIo,
}

impl Network {
    pub fn mainnet() -> Self {
        Self::from_host("api.opium.exchange")
    }

    pub fn testnet() -> Self {
        Self::from_host("api-test.opium.exchange")
    }

    fn from_host(host: &str) -> Self {
        Self {
            rest_url: Url::parse(&format!("https://{host}/{API_VERSION}"))
                .expect("static REST url"),
            socket_url: Url::parse(&format!("https://{host}")).expect("static socket url"),
            namespace: format!("/{API_VERSION}"),
            engine_io: EngineIo::default(),
        }
    }

    pub fn custom(
        rest_url: &str,
        socket_url: &str,
        namespace: &str,
        engine_io: EngineIo,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            rest_url: Url::parse(rest_url.trim_end_matches('/'))?,
            socket_url: Url::parse(socket_url)?,
            namespace: namespace.to_string(),
            engine_io,
        })
    }

    pub fn with_engine_io(mut self, engine_io: EngineIo) -> Self {
        self.engine_io = engine_io;
        self
    }

    pub fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    pub fn socket_url(&self) -> &Url {
        &self.socket_url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn engine_io(&self) -> EngineIo {
        self.engine_io
    }

    /// Full URL of a REST endpoint, `path` starts with `/`.
    pub fn rest_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.rest_url.as_str().trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_endpoints() {
        let network = Network::testnet();
        assert_eq!(
            network.rest_endpoint("/tickers"),
            "https://api-test.opium.exchange/v1/tickers"
        );
        assert_eq!(network.socket_url().host_str(), Some("api-test.opium.exchange"));
        assert_eq!(network.namespace(), "/v1");
        assert_eq!(network.engine_io(), EngineIo::V3);
    }

    #[test]
    fn test_custom_network_trims_trailing_slash() {
        let network = Network::custom(
            "http://127.0.0.1:8080/v1/",
            "http://127.0.0.1:8081",
            "/v1",
            EngineIo::V4,
        )
        .unwrap();
        assert_eq!(
            network.rest_endpoint("/meta/config"),
            "http://127.0.0.1:8080/v1/meta/config"
        );
        assert_eq!(network.engine_io().query_value(), "4");
    }
}
