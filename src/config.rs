//! Client configuration.
//!
//! Credentials and endpoints come from environment variables prefixed with
//! `OPIUM_`, optionally loaded from a `.env` file:
//! - `OPIUM_PUBLIC_KEY`, `OPIUM_PRIVATE_KEY`: wallet credentials
//! - `OPIUM_TESTNET`: use the test deployment
//! - `OPIUM_TIMEOUT_SECONDS`: HTTP request timeout
//! - `OPIUM_REST_URL`, `OPIUM_SOCKET_URL`: endpoint overrides
//! - `OPIUM_ENGINE_IO`: engine.io revision of the socket server, 3 or 4

use std::time::Duration;

use tracing::debug;

use crate::{EngineIo, Network, error::ApiError};

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

const ENV_PREFIX: &str = "OPIUM_";

/// Client configuration.
#[derive(Clone, derive_more::Debug, serde::Deserialize)]
pub struct Config {
    /// Wallet address, `0x`-prefixed.
    pub public_key: String,

    /// Wallet private key, hex with or without `0x`.
    #[debug(skip)]
    pub private_key: String,

    /// Use the test deployment.
    #[serde(default)]
    pub testnet: bool,

    /// HTTP request timeout (default: 30s).
    pub timeout_seconds: Option<u64>,

    /// REST base URL override, including the API version path.
    pub rest_url: Option<String>,

    /// Socket base URL override.
    pub socket_url: Option<String>,

    /// Engine.io protocol revision of the socket server (3 or 4, default: 3).
    pub engine_io: Option<u8>,
}

impl Config {
    pub fn new(public_key: &str, private_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            testnet: false,
            timeout_seconds: None,
            rest_url: None,
            socket_url: None,
            engine_io: None,
        }
    }

    /// Load configuration from `.env` (if present) and environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        if let Err(e) = dotenvy::dotenv() {
            debug!(%e, "no .env file loaded");
        }
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// Fails if any of the credentials is empty.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.public_key.trim().is_empty() {
            return Err(ApiError::EmptyKey("public key"));
        }
        if self.private_key.trim().is_empty() {
            return Err(ApiError::EmptyKey("private key"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// Network selected by the configuration, with overrides applied.
    pub fn network(&self) -> Result<Network, ApiError> {
        let base = if self.testnet {
            Network::testnet()
        } else {
            Network::mainnet()
        };
        let engine_io = match self.engine_io {
            None | Some(3) => EngineIo::V3,
            Some(4) => EngineIo::V4,
            Some(other) => {
                return Err(ApiError::InvalidRequest(format!(
                    "unsupported engine.io revision: {other}"
                )));
            }
        };
        if self.rest_url.is_none() && self.socket_url.is_none() {
            return Ok(base.with_engine_io(engine_io));
        }
        Network::custom(
            self.rest_url.as_deref().unwrap_or(base.rest_url().as_str()),
            self.socket_url
                .as_deref()
                .unwrap_or(base.socket_url().as_str()),
            base.namespace(),
            engine_io,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_hides_private_key() {
        let config = Config::new("0x2083fc00ad9a17b9073b10b520dcf936a14eaa05", "deadbeef");
        let debug = format!("{config:?}");
        assert!(debug.contains("0x2083fc00ad9a17b9073b10b520dcf936a14eaa05"));
        assert!(!debug.contains("deadbeef"));
    }

    #[test]
    fn test_config_validate() {
        assert!(Config::new("0x01", "02").validate().is_ok());
        assert!(matches!(
            Config::new("", "02").validate(),
            Err(ApiError::EmptyKey("public key"))
        ));
        assert!(matches!(
            Config::new("0x01", " ").validate(),
            Err(ApiError::EmptyKey("private key"))
        ));
    }

    #[test]
    fn test_config_network_overrides() {
        let mut config = Config::new("0x01", "02");
        config.testnet = true;
        assert_eq!(
            config.network().unwrap().rest_endpoint("/tickers"),
            "https://api-test.opium.exchange/v1/tickers"
        );

        config.rest_url = Some("http://localhost:3000/v1".to_string());
        config.engine_io = Some(4);
        let network = config.network().unwrap();
        assert_eq!(network.rest_endpoint("/tickers"), "http://localhost:3000/v1/tickers");
        assert_eq!(network.socket_url().host_str(), Some("api-test.opium.exchange"));
        assert_eq!(network.engine_io(), EngineIo::V4);

        config.engine_io = Some(5);
        assert!(config.network().is_err());
    }

    #[test]
    fn test_config_from_env_vars() {
        let vars = vec![
            ("OPIUM_PUBLIC_KEY".to_string(), "0x01".to_string()),
            ("OPIUM_PRIVATE_KEY".to_string(), "02".to_string()),
            ("OPIUM_TESTNET".to_string(), "true".to_string()),
            ("OPIUM_TIMEOUT_SECONDS".to_string(), "5".to_string()),
        ];
        let config: Config = envy::prefixed(ENV_PREFIX).from_iter(vars).unwrap();
        assert!(config.testnet);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.rest_url, None);
    }
}
