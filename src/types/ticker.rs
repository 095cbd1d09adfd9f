use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{TickerHash, TokenAddress};

/// Decimals the exchange quotes prices and quantities with.
const DEFAULT_DECIMALS: u8 = 2;

/// Derivative ticker listed on the exchange.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Ticker hash used in order and subscription requests.
    pub hash: TickerHash,

    /// Human readable title, e.g. `OEX-FUT-1DEC-135.00`.
    pub product_title: String,

    /// Title used by trading bots, e.g. `OEX_FUT_1DEC_135.00-DAI`.
    #[serde(default)]
    pub bot_title: Option<String>,

    /// Remaining ticker attributes as returned by the exchange.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ticker details, only the margin token is used.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TickerData {
    pub token: TokenAddress,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tradable instrument description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub instrument_name: String,
    pub quote_currency: String,
    pub base_currency: String,
    pub price_decimals: u8,
    pub quantity_decimals: u8,
}

impl Instrument {
    /// Instruments of a ticker, under its product and bot titles.
    pub fn from_ticker(ticker: &Ticker, quote_currency: &str) -> Vec<Self> {
        std::iter::once(&ticker.product_title)
            .chain(ticker.bot_title.iter())
            .map(|name| Self {
                instrument_name: name.clone(),
                quote_currency: quote_currency.to_string(),
                base_currency: ticker.product_title.clone(),
                price_decimals: DEFAULT_DECIMALS,
                quantity_decimals: DEFAULT_DECIMALS,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ticker_keeps_unknown_fields() {
        let ticker: Ticker = serde_json::from_value(json!({
            "hash": "0x598cc7d5b3a09a27e68b450610d5b47d86cc8602308f23232c03571f79e65a77",
            "productTitle": "OEX-FUT-1DEC-135.00",
            "botTitle": "OEX_FUT_1DEC_135.00-DAI",
            "expired": false
        }))
        .unwrap();
        assert_eq!(ticker.product_title, "OEX-FUT-1DEC-135.00");
        assert_eq!(ticker.bot_title.as_deref(), Some("OEX_FUT_1DEC_135.00-DAI"));
        assert_eq!(ticker.extra.get("expired"), Some(&json!(false)));
    }

    #[test]
    fn test_instruments_from_ticker() {
        let ticker: Ticker = serde_json::from_value(json!({
            "hash": "0x01",
            "productTitle": "OEX-FUT-1DEC-135.00",
            "botTitle": "OEX_FUT_1DEC_135.00-DAI"
        }))
        .unwrap();
        let instruments = Instrument::from_ticker(&ticker, "DAI");
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].instrument_name, "OEX-FUT-1DEC-135.00");
        assert_eq!(instruments[1].instrument_name, "OEX_FUT_1DEC_135.00-DAI");
        assert!(instruments.iter().all(|i| i.base_currency == "OEX-FUT-1DEC-135.00"));
        assert!(instruments.iter().all(|i| i.quote_currency == "DAI"));
    }
}
