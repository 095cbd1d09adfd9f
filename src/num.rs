use alloy::primitives::U256;
use fastnum::{
    UD64, bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

/// Decimals of native ETH and of most ERC-20 tokens.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Fixed-point token amount to decimal converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Converter for 18-decimals amounts (wei to ether).
    pub fn wei() -> Self {
        Self::new(DEFAULT_TOKEN_DECIMALS)
    }

    /// Scales raw integer amount down by the token decimals,
    /// `None` if the amount does not fit `N` words.
    pub fn from_unsigned<const N: usize>(&self, value: U256) -> Option<UnsignedDecimal<N>> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())?;
        Some(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }
}

/// Parses a decimal string like `"19.43"`.
pub fn parse_unsigned(value: &str) -> Option<UD64> {
    UD64::from_str(value.trim(), Context::default()).ok()
}

/// Parses a JSON number or numeric string into a decimal.
pub fn from_json(value: &Value) -> Option<UD64> {
    match value {
        Value::Number(n) => parse_unsigned(&n.to_string()),
        Value::String(s) => parse_unsigned(s),
        _ => None,
    }
}

/// Serde adapter for decimals the exchange sends either as numbers or strings.
pub(crate) mod json_decimal {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UD64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_json(&value).ok_or_else(|| de::Error::custom(format!("invalid decimal: {value}")))
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<UD64>, D::Error> {
            match Option::<Value>::deserialize(deserializer)? {
                None | Some(Value::Null) => Ok(None),
                Some(value) => from_json(&value)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid decimal: {value}"))),
            }
        }
    }
}
