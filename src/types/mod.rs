mod balance;
mod book;
mod order;
mod ticker;
mod trade;

pub use balance::{Balance, TokenBalance};
pub use book::{BookEntry, OrderBook};
pub use order::{
    AccountOrder, FormOrderRequest, OrderAction, OrderStatus, OrderToSign, PlacedOrder, Side,
    SignedOrder,
};
pub use ticker::{Instrument, Ticker, TickerData};
pub use trade::{AccountFill, AccountTrade, MarketTrade, Trade};

use serde::Deserialize;

/// Hash identifying a derivative ticker, `0x`-prefixed hex.
pub type TickerHash = String;

/// Address of the margin/currency token of a ticker.
pub type TokenAddress = String;

/// Exchange order ID.
pub type OrderId = String;

/// Currency tickers are margined and fees are charged in.
pub const QUOTE_CURRENCY: &str = "DAI";

/// Expiration used for orders placed without explicit expiry.
pub const NO_EXPIRY: u64 = 9_999_999_999;

/// Socket channel message, the payload is carried under `d`.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "d")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
