use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::http::{HttpTransport, Query};
use crate::{
    Network,
    error::ApiError,
    types::{Ticker, TickerData, TickerHash, TokenAddress},
};

/// Client for endpoints that do not require authentication.
#[derive(Clone, Debug)]
pub struct PublicClient {
    http: HttpTransport,
    ticker_tokens: Arc<RwLock<HashMap<TickerHash, TokenAddress>>>,
}

impl PublicClient {
    pub fn new(network: Network, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpTransport::new(network, timeout)?,
            ticker_tokens: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn network(&self) -> &Network {
        self.http.network()
    }

    pub(crate) fn http(&self) -> &HttpTransport {
        &self.http
    }

    /// `GET /meta/config`, useful as a connectivity check.
    pub async fn check_network(&self) -> Result<Value, ApiError> {
        self.http
            .send(Method::GET, "/meta/config", &Query::new(), None::<&()>, None)
            .await?
            .json()
    }

    /// Tickers that are not expired yet.
    pub async fn tickers(&self) -> Result<Vec<Ticker>, ApiError> {
        self.http
            .send(
                Method::GET,
                "/tickers",
                &vec![("expired", "false".to_string())],
                None::<&()>,
                None,
            )
            .await?
            .json()
    }

    /// Map of product title to ticker hash of not expired tickers.
    pub async fn traded_tickers(&self) -> Result<HashMap<String, TickerHash>, ApiError> {
        Ok(traded_tickers(&self.tickers().await?))
    }

    /// Hash of a traded ticker by its product title.
    pub async fn ticker_hash(&self, product_title: &str) -> Result<TickerHash, ApiError> {
        self.traded_tickers()
            .await?
            .remove(product_title)
            .ok_or_else(|| ApiError::UnknownTicker(product_title.to_string()))
    }

    /// Margin token address of the ticker, cached after the first request.
    pub async fn ticker_token(&self, ticker_hash: &str) -> Result<TokenAddress, ApiError> {
        if let Some(token) = self.ticker_tokens.read().await.get(ticker_hash) {
            return Ok(token.clone());
        }
        let data: Vec<TickerData> = self
            .http
            .send(
                Method::GET,
                &format!("/tickers/data/{ticker_hash}"),
                &Query::new(),
                None::<&()>,
                None,
            )
            .await?
            .json()?;
        let token = data
            .into_iter()
            .next()
            .map(|d| d.token)
            .ok_or(ApiError::EmptyResponse("/tickers/data"))?;
        debug!(%ticker_hash, %token, "ticker token resolved");
        self.ticker_tokens
            .write()
            .await
            .insert(ticker_hash.to_string(), token.clone());
        Ok(token)
    }

    /// Typed-data document to sign to obtain an access token.
    pub async fn login_data(&self) -> Result<Value, ApiError> {
        self.http
            .send(Method::GET, "/auth/loginData", &Query::new(), None::<&()>, None)
            .await?
            .json()
    }
}

pub(crate) fn traded_tickers(tickers: &[Ticker]) -> HashMap<String, TickerHash> {
    tickers
        .iter()
        .map(|t| (t.product_title.clone(), t.hash.clone()))
        .collect()
}
