use fastnum::UD64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OrderId, TickerHash, TokenAddress};
use crate::{error::ApiError, num::json_decimal};

/// Order book side of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Ask,
    Bid,
}

/// Trading direction as used by bot integrations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderAction {
    fn from(value: Side) -> Self {
        match value {
            Side::Buy => OrderAction::Bid,
            Side::Sell => OrderAction::Ask,
        }
    }
}

impl From<OrderAction> for Side {
    fn from(value: OrderAction) -> Self {
        match value {
            OrderAction::Bid => Side::Buy,
            OrderAction::Ask => Side::Sell,
        }
    }
}

/// Lifecycle status of an account order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Active,
    Canceled,
    Filled,
}

/// Request body of `POST /orderbook/formOrder`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOrderRequest {
    pub action: OrderAction,
    pub price: f64,
    pub ticker: TickerHash,
    pub quantity: u64,
    pub expires_at: u64,
    pub currency: TokenAddress,
}

impl FormOrderRequest {
    /// Fails if the price is zero or cannot be sent as a JSON number.
    pub fn new(
        action: OrderAction,
        ticker: TickerHash,
        currency: TokenAddress,
        price: UD64,
        quantity: u64,
        expires_at: u64,
    ) -> Result<Self, ApiError> {
        // The endpoint accepts JSON numbers only
        let price_number = price
            .to_string()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid order price: {price}")))?;
        Ok(Self {
            action,
            price: price_number,
            ticker,
            quantity,
            expires_at,
            currency,
        })
    }
}

/// Order formed by the exchange, waiting for the maker signature.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderToSign {
    pub id: OrderId,

    /// EIP-712 typed-data document to sign.
    pub order_to_sign: Value,
}

/// Signature of a formed order, body item of `POST /orderbook/orders`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignedOrder {
    pub id: OrderId,
    pub signature: String,
}

/// Order accepted by the exchange.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlacedOrder {
    pub id: OrderId,
}

/// Open order of the account as pushed by the maker address channel.
#[derive(Clone, derive_more::Debug, PartialEq, Deserialize)]
pub struct AccountOrder {
    #[serde(rename = "i", alias = "id", alias = "_id")]
    pub id: OrderId,

    #[serde(rename = "a")]
    pub action: OrderAction,

    #[serde(rename = "p", with = "json_decimal")]
    #[debug("{price}")]
    pub price: UD64,

    #[serde(rename = "q", with = "json_decimal")]
    #[debug("{quantity}")]
    pub quantity: UD64,

    /// Quantity filled so far.
    #[serde(rename = "f", default, with = "json_decimal::option")]
    pub filled: Option<UD64>,

    #[serde(rename = "t", default)]
    pub timestamp: Option<u64>,
}

impl AccountOrder {
    pub fn side(&self) -> Side {
        self.action.into()
    }

    pub fn filled(&self) -> UD64 {
        self.filled.unwrap_or(UD64::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec64;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_form_order_request_wire_format() {
        let request = FormOrderRequest::new(
            Side::Buy.into(),
            "0x598c".to_string(),
            "0x0558".to_string(),
            udec64!(19.43),
            10,
            crate::types::NO_EXPIRY,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "action": "BID",
                "price": 19.43,
                "ticker": "0x598c",
                "quantity": 10,
                "expiresAt": 9999999999u64,
                "currency": "0x0558"
            })
        );
    }

    #[test]
    fn test_form_order_request_rejects_zero_price() {
        let err = FormOrderRequest::new(
            OrderAction::Ask,
            "0x598c".to_string(),
            "0x0558".to_string(),
            UD64::ZERO,
            1,
            crate::types::NO_EXPIRY,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(ref msg) if msg.contains("price")));
    }

    #[test]
    fn test_account_order_decoding() {
        let order: AccountOrder = serde_json::from_value(json!({
            "i": "5f92b180603bd50028f46a82",
            "a": "ASK",
            "p": "19.43",
            "q": 10,
            "f": 4,
            "t": 1603449216
        }))
        .unwrap();
        assert_eq!(order.id, "5f92b180603bd50028f46a82");
        assert_eq!(order.side(), Side::Sell);
        assert_eq!(order.price, udec64!(19.43));
        assert_eq!(order.quantity, udec64!(10));
        assert_eq!(order.filled(), udec64!(4));

        let order: AccountOrder = serde_json::from_value(json!({
            "id": "5f92", "a": "BID", "p": 1.5, "q": "2"
        }))
        .unwrap();
        assert_eq!(order.filled(), UD64::ZERO);
        assert_eq!(order.timestamp, None);
    }

    #[test]
    fn test_order_status_wire_format() {
        assert_eq!(serde_json::to_value(OrderStatus::Canceled).unwrap(), json!("CANCELED"));
        assert_eq!(
            serde_json::from_value::<OrderAction>(json!("BID")).unwrap(),
            OrderAction::Bid
        );
    }
}
