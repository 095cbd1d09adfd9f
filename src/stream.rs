//! Socket channel subscriptions.
//!
//! [`OpiumStream`] resolves ticker titles to the channel parameters over REST,
//! then either reads a single channel snapshot (the exchange serves some data
//! only over the socket) or follows a channel as a stream of parsed batches.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{
    StreamExt, TryStreamExt, future,
    stream::{self, BoxStream},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tracing::{debug, info, trace, warn};

use crate::{
    Network,
    error::ApiError,
    rest::PublicClient,
    socket::{DEFAULT_CHANNEL_SIZE, SocketClient},
    state::{AccountOrders, OrderUpdate, TradeCursor},
    types::{
        self, AccountFill, AccountOrder, AccountTrade, BookEntry, Envelope, MarketTrade, OrderBook,
        Trade,
    },
};

/// Timeout of REST calls made to resolve channel parameters.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time to wait for the first message in one-shot reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream of parsed channel messages, ends after the first error.
pub type ChannelStream<T> = BoxStream<'static, Result<T, ApiError>>;

/// Socket channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Recent public trades of a ticker.
    Trades,
    /// Order book of a ticker.
    OrderBook,
    /// Open orders of a maker address.
    AccountOrders,
    /// Trades of an address.
    AccountTrades,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Trades => "trades:ticker:all",
            Channel::OrderBook => "orderbook:orders:ticker",
            Channel::AccountOrders => "orderbook:orders:makerAddress",
            Channel::AccountTrades => "trades:ticker:address",
        }
    }

    /// Whether the channel requires [`AccountAuth`].
    pub fn is_account(&self) -> bool {
        matches!(self, Channel::AccountOrders | Channel::AccountTrades)
    }
}

/// Credentials of account channels: the address and its access token.
#[derive(Clone, derive_more::Debug)]
pub struct AccountAuth {
    pub address: String,
    #[debug(skip)]
    pub signature: String,
}

impl AccountAuth {
    pub fn new(address: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            signature: signature.into(),
        }
    }
}

/// Reads and follows socket channels of a network.
#[derive(Clone, Debug)]
pub struct OpiumStream {
    public: PublicClient,
    read_timeout: Duration,
    last_message: Arc<AtomicU64>,
}

impl OpiumStream {
    pub fn new(network: Network) -> Result<Self, ApiError> {
        Ok(Self::with_public(PublicClient::new(network, DEFAULT_TIMEOUT)?))
    }

    pub fn with_public(public: PublicClient) -> Self {
        Self {
            public,
            read_timeout: DEFAULT_READ_TIMEOUT,
            last_message: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sets the time [`Self::read_once`] waits for the channel message.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn network(&self) -> &Network {
        self.public.network()
    }

    /// Unix time in seconds of the last channel message, 0 if none was received.
    pub fn last_message_time(&self) -> u64 {
        self.last_message.load(Ordering::Relaxed)
    }

    /// Subscription parameters of a ticker by its product title.
    pub async fn params(
        &self,
        channel: Channel,
        ticker: &str,
        auth: Option<&AccountAuth>,
    ) -> Result<Map<String, Value>, ApiError> {
        let ticker_hash = self.public.ticker_hash(ticker).await?;
        let currency = self.public.ticker_token(&ticker_hash).await?;
        let mut params = Map::new();
        params.insert("t".to_string(), Value::String(ticker_hash));
        params.insert("c".to_string(), Value::String(currency));
        if channel.is_account() {
            let auth = auth.ok_or(ApiError::EmptyKey("account channel credentials"))?;
            params.insert("addr".to_string(), Value::String(auth.address.clone()));
            params.insert("sig".to_string(), Value::String(auth.signature.clone()));
        }
        Ok(params)
    }

    async fn subscribe(
        &self,
        channel: Channel,
        params: &Map<String, Value>,
    ) -> Result<SocketClient, ApiError> {
        let mut client = SocketClient::connect(self.network()).await?;
        client.subscribe(channel.name(), params).await?;
        Ok(client)
    }

    /// Subscribes to the channel, returns its first message and disconnects.
    ///
    /// The subscription is only withdrawn after a successful read, the
    /// connection is closed in any case.
    pub async fn read_once(
        &self,
        channel: Channel,
        ticker: &str,
        auth: Option<&AccountAuth>,
    ) -> Result<Value, ApiError> {
        let params = self.params(channel, ticker, auth).await?;
        let mut client = self.subscribe(channel, &params).await?;

        let read_timeout = self.read_timeout;
        let result = time::timeout(read_timeout, async {
            loop {
                let event = client.recv().await?;
                if event.name == channel.name() {
                    return Ok::<_, ApiError>(event.data);
                }
                trace!(name = %event.name, "skipping event");
            }
        })
        .await
        .unwrap_or_else(|_| {
            Err(ApiError::Socket(format!(
                "no message on {} within {read_timeout:?}",
                channel.name()
            )))
        });

        if result.is_ok() {
            self.touch();
            if let Err(e) = client.unsubscribe(channel.name(), &params).await {
                warn!(channel = channel.name(), error = %e, "unsubscribe failed");
            }
        }
        if let Err(e) = client.disconnect().await {
            warn!(channel = channel.name(), error = %e, "disconnect failed");
        }
        result
    }

    /// Recent trades of the ticker, newest first.
    pub async fn latest_trades(&self, ticker: &str) -> Result<Vec<Trade>, ApiError> {
        let trades: Vec<MarketTrade> = parse(self.read_once(Channel::Trades, ticker, None).await?)?;
        Ok(trades
            .iter()
            .map(|t| Trade::from_market(ticker, t))
            .collect())
    }

    /// Current order book of the ticker.
    pub async fn order_book(&self, ticker: &str) -> Result<OrderBook, ApiError> {
        let entries: Vec<BookEntry> =
            parse(self.read_once(Channel::OrderBook, ticker, None).await?)?;
        Ok(OrderBook::from_entries(types::unix_now(), &entries))
    }

    /// Open orders of the account on the ticker.
    pub async fn account_orders(
        &self,
        ticker: &str,
        auth: &AccountAuth,
    ) -> Result<Vec<AccountOrder>, ApiError> {
        parse(
            self.read_once(Channel::AccountOrders, ticker, Some(auth))
                .await?,
        )
    }

    /// Recent trades of the account on the ticker.
    pub async fn account_trades(
        &self,
        ticker: &str,
        auth: &AccountAuth,
    ) -> Result<Vec<AccountFill>, ApiError> {
        let trades: Vec<AccountTrade> = parse(
            self.read_once(Channel::AccountTrades, ticker, Some(auth))
                .await?,
        )?;
        Ok(trades
            .iter()
            .map(|t| AccountFill::from_trade(t, ticker))
            .collect())
    }

    /// Follows the channel, yielding parsed message payloads.
    pub async fn messages<T>(
        &self,
        channel: Channel,
        ticker: &str,
        auth: Option<&AccountAuth>,
    ) -> Result<ChannelStream<Vec<T>>, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let params = self.params(channel, ticker, auth).await?;
        let client = self.subscribe(channel, &params).await?;
        info!(channel = channel.name(), %ticker, "listening");

        let last_message = self.last_message.clone();
        Ok(stream::unfold(Some(client), move |client| {
            let last_message = last_message.clone();
            async move {
                let mut client = client?;
                loop {
                    match client.recv().await {
                        Ok(event) if event.name == channel.name() => {
                            last_message.store(types::unix_now(), Ordering::Relaxed);
                            return match parse(event.data) {
                                Ok(batch) => Some((Ok(batch), Some(client))),
                                Err(e) => {
                                    warn!(
                                        channel = channel.name(),
                                        error = %e,
                                        "malformed message"
                                    );
                                    Some((Err(e), None))
                                }
                            };
                        }
                        Ok(event) => trace!(name = %event.name, "skipping event"),
                        Err(e) => {
                            debug!(channel = channel.name(), error = %e, "stream ended");
                            return Some((Err(e), None));
                        }
                    }
                }
            }
        })
        .boxed())
    }

    /// New public trades of the ticker, oldest first.
    ///
    /// With `new_only` the trades already present at subscription time are skipped.
    pub async fn trades(
        &self,
        ticker: &str,
        new_only: bool,
    ) -> Result<ChannelStream<Vec<Trade>>, ApiError> {
        let mut cursor = TradeCursor::new(new_only);
        let pair = ticker.to_string();
        Ok(self
            .messages::<MarketTrade>(Channel::Trades, ticker, None)
            .await?
            .map_ok(move |trades| {
                cursor
                    .next(&trades)
                    .iter()
                    .map(|t| Trade::from_market(&pair, t))
                    .collect::<Vec<_>>()
            })
            .try_filter(|trades| future::ready(!trades.is_empty()))
            .boxed())
    }

    /// Order book snapshots of the ticker.
    pub async fn order_book_updates(
        &self,
        ticker: &str,
    ) -> Result<ChannelStream<OrderBook>, ApiError> {
        Ok(self
            .messages::<BookEntry>(Channel::OrderBook, ticker, None)
            .await?
            .map_ok(|entries| OrderBook::from_entries(types::unix_now(), &entries))
            .boxed())
    }

    /// Status transitions of the account orders on the ticker.
    pub async fn account_order_updates(
        &self,
        ticker: &str,
        auth: &AccountAuth,
    ) -> Result<ChannelStream<Vec<OrderUpdate>>, ApiError> {
        let mut orders = AccountOrders::new();
        Ok(self
            .messages::<AccountOrder>(Channel::AccountOrders, ticker, Some(auth))
            .await?
            .map_ok(move |snapshot| orders.update(snapshot))
            .try_filter(|updates| future::ready(!updates.is_empty()))
            .boxed())
    }

    /// Fills of the account orders on the ticker, oldest first.
    pub async fn account_fills(
        &self,
        ticker: &str,
        auth: &AccountAuth,
    ) -> Result<ChannelStream<Vec<AccountFill>>, ApiError> {
        let pair = ticker.to_string();
        Ok(self
            .messages::<AccountTrade>(Channel::AccountTrades, ticker, Some(auth))
            .await?
            .map_ok(move |trades| {
                trades
                    .iter()
                    .rev()
                    .map(|t| AccountFill::from_trade(t, &pair))
                    .collect::<Vec<_>>()
            })
            .boxed())
    }

    fn touch(&self) {
        self.last_message
            .store(types::unix_now(), Ordering::Relaxed);
    }
}

/// Payload of a channel message, a missing payload is an empty list.
fn parse<T: DeserializeOwned>(message: Value) -> Result<Vec<T>, ApiError> {
    let envelope: Envelope<Vec<T>> = serde_json::from_value(message)?;
    Ok(envelope.into_data().unwrap_or_default())
}

/// Runs the stream on a background task, pushing items into a bounded channel.
///
/// The task ends with the first stream error or when the receiver is dropped.
pub fn spawn<T>(stream: ChannelStream<T>) -> (mpsc::Receiver<T>, JoinHandle<Result<(), ApiError>>)
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let handle = tokio::spawn(async move {
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            if tx.send(item?).await.is_err() {
                // Receiver dropped
                break;
            }
        }
        Ok(())
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use fastnum::udec64;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::Trades.name(), "trades:ticker:all");
        assert_eq!(Channel::OrderBook.name(), "orderbook:orders:ticker");
        assert_eq!(Channel::AccountOrders.name(), "orderbook:orders:makerAddress");
        assert!(Channel::AccountTrades.is_account());
        assert!(!Channel::OrderBook.is_account());
    }

    #[test]
    fn test_parse_message() {
        let trades: Vec<MarketTrade> = parse(json!({
            "d": [{"tx": "0x2", "p": 12.5, "q": 3, "ts": 1603449216}]
        }))
        .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, udec64!(12.5));

        let empty: Vec<MarketTrade> = parse(json!({"d": null})).unwrap();
        assert!(empty.is_empty());
        assert!(parse::<MarketTrade>(json!({"d": [{"tx": 1}]})).is_err());
    }

    #[test]
    fn test_account_auth_debug_hides_signature() {
        let auth = AccountAuth::new("0xabc", "secret");
        assert!(!format!("{auth:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_spawn_forwards_until_error() {
        let items: Vec<Result<u32, ApiError>> = vec![Ok(1), Ok(2), Err(ApiError::Closed), Ok(3)];
        let (mut rx, handle) = spawn(stream::iter(items).boxed());
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
        assert!(matches!(handle.await.unwrap(), Err(ApiError::Closed)));
    }
}
