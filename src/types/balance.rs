use alloy::primitives::U256;
use fastnum::UD128;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::{error::ApiError, num};

/// Wallet token balance as returned by `GET /wallet/balance/tokens`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenBalance {
    pub title: String,

    /// Raw integer amount in the smallest token units.
    #[serde(deserialize_with = "string_or_number")]
    pub total: String,

    #[serde(default)]
    pub decimals: Option<u8>,
}

/// Wallet balance of a single currency.
#[derive(Clone, derive_more::Debug, PartialEq, Serialize)]
pub struct Balance {
    pub currency: String,
    #[debug("{balance}")]
    #[serde(serialize_with = "serialize_display")]
    pub balance: UD128,
    #[debug("{available}")]
    #[serde(serialize_with = "serialize_display")]
    pub available: UD128,
}

impl TryFrom<&TokenBalance> for Balance {
    type Error = ApiError;

    fn try_from(value: &TokenBalance) -> Result<Self, Self::Error> {
        let raw = U256::from_str_radix(value.total.trim(), 10).map_err(|e| {
            ApiError::InvalidRequest(format!("{} balance {:?}: {e}", value.title, value.total))
        })?;
        let converter = num::Converter::new(value.decimals.unwrap_or(num::DEFAULT_TOKEN_DECIMALS));
        let total = converter.from_unsigned(raw).ok_or_else(|| {
            ApiError::InvalidRequest(format!("{} balance overflow: {}", value.title, value.total))
        })?;
        Ok(Self {
            currency: value.title.clone(),
            balance: total,
            available: total,
        })
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid amount: {other}"))),
    }
}

fn serialize_display<S: serde::Serializer>(
    value: &UD128,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use fastnum::udec128;

    use super::*;

    #[test]
    fn test_balance_from_wei() {
        let token = TokenBalance {
            title: "ETH".to_string(),
            total: "2500000000000000000".to_string(),
            decimals: None,
        };
        let balance = Balance::try_from(&token).unwrap();
        assert_eq!(balance.currency, "ETH");
        assert_eq!(balance.balance, udec128!(2.5));
        assert_eq!(balance.available, udec128!(2.5));
    }

    #[test]
    fn test_balance_with_token_decimals() {
        let token = TokenBalance {
            title: "USDC".to_string(),
            total: "1234567".to_string(),
            decimals: Some(6),
        };
        assert_eq!(Balance::try_from(&token).unwrap().balance, udec128!(1.234567));
    }

    #[test]
    fn test_balance_rejects_garbage() {
        let token = TokenBalance {
            title: "DAI".to_string(),
            total: "1.5".to_string(),
            decimals: Some(18),
        };
        assert!(matches!(
            Balance::try_from(&token),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
