use crate::types::MarketTrade;

/// Tracks the last seen trade of the ticker trades channel.
///
/// The channel pushes the recent trades of a ticker, newest first, on every
/// new trade. The cursor remembers the newest transaction and returns only
/// the trades after it, oldest first.
#[derive(Clone, Debug, Default)]
pub struct TradeCursor {
    new_only: bool,
    started: bool,
    last_tx: Option<String>,
}

impl TradeCursor {
    /// With `new_only` the first message only positions the cursor.
    pub fn new(new_only: bool) -> Self {
        Self {
            new_only,
            ..Default::default()
        }
    }

    pub fn last_tx(&self) -> Option<&str> {
        self.last_tx.as_deref()
    }

    /// Trades of the message that were not returned before, oldest first.
    pub fn next(&mut self, trades: &[MarketTrade]) -> Vec<MarketTrade> {
        let first = !self.started;
        self.started = true;
        let Some(newest) = trades.first() else {
            return vec![];
        };

        let unseen = if first {
            if self.new_only { 0 } else { trades.len() }
        } else {
            self.last_tx
                .as_ref()
                .and_then(|last| trades.iter().position(|t| &t.tx == last))
                .unwrap_or(trades.len())
        };
        self.last_tx = Some(newest.tx.clone());

        trades[..unseen].iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec64;

    use super::*;

    fn trade(tx: &str, ts: u64) -> MarketTrade {
        MarketTrade {
            tx: tx.to_string(),
            price: udec64!(10),
            quantity: udec64!(1),
            timestamp: ts,
        }
    }

    fn txs(trades: &[MarketTrade]) -> Vec<&str> {
        trades.iter().map(|t| t.tx.as_str()).collect()
    }

    #[test]
    fn test_first_message_returns_all_oldest_first() {
        let mut cursor = TradeCursor::new(false);
        let out = cursor.next(&[trade("c", 3), trade("b", 2), trade("a", 1)]);
        assert_eq!(txs(&out), vec!["a", "b", "c"]);
        assert_eq!(cursor.last_tx(), Some("c"));
    }

    #[test]
    fn test_new_only_skips_first_message() {
        let mut cursor = TradeCursor::new(true);
        assert!(cursor.next(&[trade("b", 2), trade("a", 1)]).is_empty());
        assert_eq!(cursor.last_tx(), Some("b"));

        let out = cursor.next(&[trade("d", 4), trade("c", 3), trade("b", 2), trade("a", 1)]);
        assert_eq!(txs(&out), vec!["c", "d"]);
        assert_eq!(cursor.last_tx(), Some("d"));

        assert!(cursor.next(&[trade("d", 4), trade("c", 3)]).is_empty());
    }

    #[test]
    fn test_missing_last_tx_returns_whole_message() {
        let mut cursor = TradeCursor::new(true);
        cursor.next(&[trade("a", 1)]);
        let out = cursor.next(&[trade("z", 9), trade("y", 8)]);
        assert_eq!(txs(&out), vec!["y", "z"]);
    }

    #[test]
    fn test_empty_messages() {
        let mut cursor = TradeCursor::new(false);
        assert!(cursor.next(&[]).is_empty());
        assert_eq!(cursor.last_tx(), None);

        // First non-empty message after an empty one returns everything
        let out = cursor.next(&[trade("a", 1)]);
        assert_eq!(txs(&out), vec!["a"]);
    }
}
