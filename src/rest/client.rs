use std::collections::HashMap;

use alloy::primitives::Address;
use fastnum::UD64;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    PublicClient,
    http::{HttpResponse, Query},
    public,
};
use crate::{
    config::Config,
    error::ApiError,
    signing::{self, TypedDataSigner},
    types::{
        self, Balance, FormOrderRequest, Instrument, OrderAction, OrderId, OrderToSign,
        PlacedOrder, Side, SignedOrder, Ticker, TickerHash, TokenBalance,
    },
};

/// Client for account endpoints, signs requests with the wallet key.
///
/// Access token is the signature of the exchange login data and is generated
/// lazily on the first secure call; it is regenerated once if the exchange
/// rejects it.
#[derive(derive_more::Debug)]
pub struct OpiumClient {
    public: PublicClient,
    public_key: String,
    signer: TypedDataSigner,
    #[debug(skip)]
    access_token: RwLock<Option<String>>,
    tickers: RwLock<Vec<Ticker>>,
}

impl OpiumClient {
    /// Creates a client for the network selected by the configuration.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        config.validate()?;
        let public = PublicClient::new(config.network()?, config.timeout())?;
        Self::with_public(public, &config.public_key, &config.private_key)
    }

    /// Creates a client on top of an existing public client.
    pub fn with_public(
        public: PublicClient,
        public_key: &str,
        private_key: &str,
    ) -> Result<Self, ApiError> {
        if public_key.trim().is_empty() {
            return Err(ApiError::EmptyKey("public key"));
        }
        let signer = TypedDataSigner::new(private_key)?;
        if let Ok(address) = public_key.parse::<Address>() {
            if address != signer.address() {
                warn!(
                    %address,
                    signer = %signer.address(),
                    "public key does not match private key"
                );
            }
        }
        Ok(Self {
            public,
            public_key: public_key.trim().to_string(),
            signer,
            access_token: RwLock::new(None),
            tickers: RwLock::new(Vec::new()),
        })
    }

    pub fn public(&self) -> &PublicClient {
        &self.public
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Loads not expired tickers into the client cache.
    pub async fn init(&self) -> Result<(), ApiError> {
        let tickers = self.public.tickers().await?;
        info!(count = tickers.len(), "tickers loaded");
        *self.tickers.write().await = tickers;
        Ok(())
    }

    /// Cached tickers, loaded by [`Self::init`].
    pub async fn tickers(&self) -> Vec<Ticker> {
        self.tickers.read().await.clone()
    }

    /// Cached map of product title to ticker hash.
    pub async fn traded_tickers(&self) -> HashMap<String, TickerHash> {
        public::traded_tickers(&self.tickers.read().await)
    }

    /// Product title of a ticker by its bot title.
    pub async fn bot_to_product_title(&self, bot_title: &str) -> Result<String, ApiError> {
        self.tickers
            .read()
            .await
            .iter()
            .find(|t| t.bot_title.as_deref() == Some(bot_title))
            .map(|t| t.product_title.clone())
            .ok_or_else(|| ApiError::UnknownTicker(bot_title.to_string()))
    }

    /// Instruments of the cached tickers.
    pub async fn instruments(&self) -> Vec<Instrument> {
        self.tickers
            .read()
            .await
            .iter()
            .flat_map(|t| Instrument::from_ticker(t, types::QUOTE_CURRENCY))
            .collect()
    }

    /// Signs exchange login data and caches the result as the access token.
    /// Returned token is signature hex without `0x` prefix.
    pub async fn generate_access_token(&self) -> Result<String, ApiError> {
        let login_data = self.public.login_data().await?;
        let signature = self.signer.sign_hex(&login_data)?;
        let token = signature.trim_start_matches("0x").to_string();
        *self.access_token.write().await = Some(token.clone());
        debug!("access token generated");
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.generate_access_token().await
    }

    async fn secure_call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        mut query: Query,
        body: Option<&B>,
    ) -> Result<HttpResponse, ApiError> {
        query.insert(0, ("authAddress", self.public_key.clone()));
        let token = self.access_token().await?;
        match self
            .public
            .http()
            .send(method.clone(), endpoint, &query, body, Some(&token))
            .await
        {
            Err(e) if e.is_unauthorized() => {
                warn!(%endpoint, "access token rejected, regenerating");
                let token = self.generate_access_token().await?;
                self.public
                    .http()
                    .send(method, endpoint, &query, body, Some(&token))
                    .await
            }
            result => result,
        }
    }

    /// Wallet balances, amounts converted with the token decimals.
    pub async fn balance(&self) -> Result<Vec<Balance>, ApiError> {
        let response = self
            .secure_call(
                Method::GET,
                "/wallet/balance/tokens",
                Query::new(),
                None::<&()>,
            )
            .await?;
        if response.is_empty() {
            return Ok(vec![]);
        }
        let tokens: Vec<TokenBalance> = response.json()?;
        tokens.iter().map(Balance::try_from).collect()
    }

    /// Asks the exchange to form orders to sign for the given parameters.
    pub async fn form_order(
        &self,
        request: &FormOrderRequest,
    ) -> Result<Vec<OrderToSign>, ApiError> {
        let orders: Vec<OrderToSign> = self
            .secure_call(
                Method::POST,
                "/orderbook/formOrder",
                Query::new(),
                Some(request),
            )
            .await?
            .json()?;
        if orders.is_empty() {
            return Err(ApiError::EmptyResponse("/orderbook/formOrder"));
        }
        Ok(orders)
    }

    /// Signs formed orders.
    pub fn sign_orders(&self, orders: &[OrderToSign]) -> Result<Vec<SignedOrder>, ApiError> {
        orders
            .iter()
            .map(|order| {
                let mut typed_data = order.order_to_sign.clone();
                signing::normalize_uint_fields(&mut typed_data);
                Ok(SignedOrder {
                    id: order.id.clone(),
                    signature: self.signer.sign_hex(&typed_data)?,
                })
            })
            .collect()
    }

    /// Submits signed orders.
    pub async fn submit_orders(
        &self,
        orders: &[SignedOrder],
    ) -> Result<Vec<PlacedOrder>, ApiError> {
        self.secure_call(Method::POST, "/orderbook/orders", Query::new(), Some(orders))
            .await?
            .json()
    }

    /// Forms, signs and submits an order.
    pub async fn send_order(
        &self,
        action: OrderAction,
        ticker_hash: &str,
        currency: &str,
        price: UD64,
        quantity: u64,
        expires_at: u64,
    ) -> Result<Vec<PlacedOrder>, ApiError> {
        if quantity == 0 {
            return Err(ApiError::InvalidRequest("zero order quantity".to_string()));
        }
        let request = FormOrderRequest::new(
            action,
            ticker_hash.to_string(),
            currency.to_string(),
            price,
            quantity,
            expires_at,
        )?;
        let formed = self.form_order(&request).await?;
        let signed = self.sign_orders(&formed)?;
        let placed = self.submit_orders(&signed).await?;
        info!(?action, %ticker_hash, %price, quantity, ids = ?placed, "order placed");
        Ok(placed)
    }

    /// Places an order for an instrument by its product title.
    /// Requires tickers loaded by [`Self::init`].
    pub async fn create_order(
        &self,
        instrument_name: &str,
        side: Side,
        price: UD64,
        quantity: u64,
    ) -> Result<Vec<PlacedOrder>, ApiError> {
        let ticker_hash = self
            .traded_tickers()
            .await
            .remove(instrument_name)
            .ok_or_else(|| ApiError::UnknownTicker(instrument_name.to_string()))?;
        let currency = self.public.ticker_token(&ticker_hash).await?;
        self.send_order(
            side.into(),
            &ticker_hash,
            &currency,
            price,
            quantity,
            types::NO_EXPIRY,
        )
        .await
    }

    /// Cancels orders by their IDs.
    pub async fn cancel_orders(&self, order_ids: &[OrderId]) -> Result<(), ApiError> {
        if order_ids.is_empty() {
            return Ok(());
        }
        let query = order_ids
            .iter()
            .map(|id| ("ids[]", id.clone()))
            .collect::<Query>();
        let response = self
            .secure_call(Method::PUT, "/orderbook/cancel", query, None::<&()>)
            .await?;
        if response.status != StatusCode::ACCEPTED {
            debug!(status = %response.status, body = %response.body, "unexpected cancel status");
        }
        info!(ids = ?order_ids, "orders canceled");
        Ok(())
    }
}
