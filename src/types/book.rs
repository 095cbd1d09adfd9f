use fastnum::UD64;
use itertools::Itertools;
use serde::Deserialize;

use super::OrderAction;
use crate::num::json_decimal;

/// Order book entry as pushed by the ticker order book channel.
#[derive(Clone, derive_more::Debug, PartialEq, Deserialize)]
pub struct BookEntry {
    #[serde(rename = "a")]
    pub action: OrderAction,

    #[serde(rename = "p", with = "json_decimal")]
    #[debug("{price}")]
    pub price: UD64,

    #[serde(rename = "v", with = "json_decimal")]
    #[debug("{volume}")]
    pub volume: UD64,
}

/// Order book snapshot of a ticker.
///
/// Levels are kept as pushed by the exchange, one per order, sorted away
/// from the spread.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderBook {
    /// Unix time in seconds the snapshot was taken at.
    pub last_update_id: u64,

    /// Bid price/volume pairs, highest price first.
    pub bids: Vec<(UD64, UD64)>,

    /// Ask price/volume pairs, lowest price first.
    pub asks: Vec<(UD64, UD64)>,
}

impl OrderBook {
    pub fn from_entries(last_update_id: u64, entries: &[BookEntry]) -> Self {
        let (bids, asks): (Vec<_>, Vec<_>) = entries
            .iter()
            .partition(|e| e.action == OrderAction::Bid);
        Self {
            last_update_id,
            bids: bids
                .into_iter()
                .map(|e| (e.price, e.volume))
                .sorted_by(|a, b| b.0.cmp(&a.0))
                .collect(),
            asks: asks
                .into_iter()
                .map(|e| (e.price, e.volume))
                .sorted_by(|a, b| a.0.cmp(&b.0))
                .collect(),
        }
    }

    /// Best bid price/volume.
    pub fn best_bid(&self) -> Option<(UD64, UD64)> {
        self.bids.first().copied()
    }

    /// Best ask price/volume.
    pub fn best_ask(&self) -> Option<(UD64, UD64)> {
        self.asks.first().copied()
    }

    /// Total volume at the given bid price.
    pub fn bid_volume(&self, price: UD64) -> UD64 {
        Self::volume_at(&self.bids, price)
    }

    /// Total volume at the given ask price.
    pub fn ask_volume(&self, price: UD64) -> UD64 {
        Self::volume_at(&self.asks, price)
    }

    fn volume_at(side: &[(UD64, UD64)], price: UD64) -> UD64 {
        side.iter()
            .filter(|(p, _)| *p == price)
            .fold(UD64::ZERO, |acc, (_, v)| acc + *v)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec64;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_order_book_from_entries() {
        let entries: Vec<BookEntry> = serde_json::from_value(json!([
            {"a": "BID", "p": 19.1, "v": 3},
            {"a": "ASK", "p": 21, "v": 1},
            {"a": "BID", "p": 19.4, "v": 2},
            {"a": "ASK", "p": "20.5", "v": 4},
            {"a": "BID", "p": 19.4, "v": 5}
        ]))
        .unwrap();
        let book = OrderBook::from_entries(42, &entries);
        assert_eq!(book.last_update_id, 42);
        assert_eq!(book.best_bid().map(|(p, _)| p), Some(udec64!(19.4)));
        assert_eq!(book.best_ask(), Some((udec64!(20.5), udec64!(4))));
        assert_eq!(book.bids.last(), Some(&(udec64!(19.1), udec64!(3))));
        assert_eq!(book.bid_volume(udec64!(19.4)), udec64!(7));
        assert_eq!(book.ask_volume(udec64!(19.4)), UD64::ZERO);
    }

    #[test]
    fn test_empty_order_book() {
        let book = OrderBook::from_entries(1, &[]);
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
    }
}
