use fastnum::UD64;
use serde::{Deserialize, Serialize};

use super::{OrderAction, OrderId, QUOTE_CURRENCY, Side};
use crate::num::json_decimal;

/// Trade as pushed by the public ticker trades channel.
#[derive(Clone, derive_more::Debug, PartialEq, Deserialize)]
pub struct MarketTrade {
    /// Transaction hash the trade was settled in.
    pub tx: String,

    #[serde(rename = "p", with = "json_decimal")]
    #[debug("{price}")]
    pub price: UD64,

    #[serde(rename = "q", with = "json_decimal")]
    #[debug("{quantity}")]
    pub quantity: UD64,

    #[serde(rename = "ts", default)]
    pub timestamp: u64,
}

/// Public trade of a traded ticker.
#[derive(Clone, derive_more::Debug, PartialEq, Serialize)]
pub struct Trade {
    pub trading_pair: String,
    pub trade_id: String,
    #[debug("{price}")]
    #[serde(serialize_with = "serialize_display")]
    pub price: UD64,
    #[debug("{amount}")]
    #[serde(serialize_with = "serialize_display")]
    pub amount: UD64,
    pub timestamp: u64,
}

impl Trade {
    pub fn from_market(trading_pair: &str, trade: &MarketTrade) -> Self {
        Self {
            trading_pair: trading_pair.to_string(),
            trade_id: trade.tx.clone(),
            price: trade.price,
            amount: trade.quantity,
            timestamp: trade.timestamp,
        }
    }
}

/// Trade of the account as pushed by the account trades channel.
#[derive(Clone, derive_more::Debug, PartialEq, Deserialize)]
pub struct AccountTrade {
    #[serde(rename = "a")]
    pub action: OrderAction,

    #[serde(rename = "p", with = "json_decimal")]
    #[debug("{price}")]
    pub price: UD64,

    #[serde(rename = "q", with = "json_decimal")]
    #[debug("{quantity}")]
    pub quantity: UD64,

    #[serde(rename = "t", default)]
    pub timestamp: u64,

    #[serde(rename = "i", default)]
    pub id: Option<String>,

    #[serde(rename = "oi", default)]
    pub order_id: Option<OrderId>,
}

/// Normalized fill of an account order.
#[derive(Clone, derive_more::Debug, PartialEq, Serialize)]
pub struct AccountFill {
    pub side: Side,
    pub instrument_name: String,
    #[debug("{fee}")]
    #[serde(serialize_with = "serialize_display")]
    pub fee: UD64,
    pub trade_id: String,
    pub create_time: u64,
    #[debug("{traded_price}")]
    #[serde(serialize_with = "serialize_display")]
    pub traded_price: UD64,
    #[debug("{traded_quantity}")]
    #[serde(serialize_with = "serialize_display")]
    pub traded_quantity: UD64,
    pub fee_currency: String,
    pub order_id: Option<OrderId>,
}

impl AccountFill {
    pub fn from_trade(trade: &AccountTrade, trading_pair: &str) -> Self {
        Self {
            side: trade.action.into(),
            instrument_name: trading_pair.to_string(),
            fee: UD64::ZERO,
            trade_id: trade.id.clone().unwrap_or_else(|| "0".to_string()),
            create_time: trade.timestamp,
            traded_price: trade.price,
            traded_quantity: trade.quantity,
            fee_currency: QUOTE_CURRENCY.to_string(),
            order_id: trade.order_id.clone(),
        }
    }
}

pub(crate) fn serialize_display<S: serde::Serializer>(
    value: &UD64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
