use std::collections::{HashMap, HashSet};

use fastnum::UD64;

use crate::types::{AccountFill, AccountOrder, OrderId, OrderStatus};

/// Status transition of an account order.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct OrderUpdate {
    pub order: AccountOrder,
    pub status: OrderStatus,

    /// Filled quantity known at the moment of the update.
    #[debug("{filled}")]
    pub filled: UD64,
}

/// Open orders of an account, reconciled from consecutive snapshots.
///
/// The maker address channel pushes the full list of open orders on every
/// change, so transitions are derived by diffing snapshots:
///
/// * an order that disappears is FILLED once its filled quantity reaches the
///   order quantity, CANCELED otherwise;
/// * an order that appears is ACTIVE;
/// * an order whose filled quantity changes is re-emitted as ACTIVE.
///
/// Filled quantity is the larger of the one reported with the order and the sum
/// of fills recorded with [`Self::record_fill`], as the last partial fill can
/// remove the order from the snapshot before it is reported on the order.
#[derive(Clone, Debug, Default)]
pub struct AccountOrders {
    orders: HashMap<OrderId, AccountOrder>,
    fills: HashMap<OrderId, UD64>,
}

impl AccountOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open orders.
    pub fn orders(&self) -> &HashMap<OrderId, AccountOrder> {
        &self.orders
    }

    pub fn order(&self, order_id: &str) -> Option<&AccountOrder> {
        self.orders.get(order_id)
    }

    /// Applies the snapshot of open orders and returns status transitions.
    pub fn update(&mut self, snapshot: Vec<AccountOrder>) -> Vec<OrderUpdate> {
        let snapshot_ids: HashSet<&OrderId> = snapshot.iter().map(|o| &o.id).collect();
        let mut removed: Vec<OrderId> = self
            .orders
            .keys()
            .filter(|id| !snapshot_ids.contains(id))
            .cloned()
            .collect();
        removed.sort();

        let mut updates = Vec::with_capacity(removed.len() + snapshot.len());
        for id in removed {
            let Some(order) = self.orders.remove(&id) else {
                continue;
            };
            let filled = self.filled_quantity(&order);
            self.fills.remove(&id);
            let status = if filled >= order.quantity {
                OrderStatus::Filled
            } else {
                OrderStatus::Canceled
            };
            updates.push(OrderUpdate {
                order,
                status,
                filled,
            });
        }

        for order in snapshot {
            let changed = match self.orders.get(&order.id) {
                Some(prev) => prev.filled() != order.filled(),
                None => true,
            };
            if changed {
                updates.push(OrderUpdate {
                    filled: self.filled_quantity(&order),
                    order: order.clone(),
                    status: OrderStatus::Active,
                });
            }
            self.orders.insert(order.id.clone(), order);
        }

        // Fills of orders that are not open anymore
        self.fills.retain(|id, _| self.orders.contains_key(id));

        updates
    }

    /// Accounts a fill of an order, fills without order ID are ignored.
    ///
    /// Fills of orders not open after the next [`Self::update`] are discarded by it.
    pub fn record_fill(&mut self, fill: &AccountFill) {
        if let Some(order_id) = &fill.order_id {
            let filled = self.fills.entry(order_id.clone()).or_insert(UD64::ZERO);
            *filled = *filled + fill.traded_quantity;
        }
    }

    fn filled_quantity(&self, order: &AccountOrder) -> UD64 {
        let recorded = self.fills.get(&order.id).copied().unwrap_or(UD64::ZERO);
        if recorded > order.filled() {
            recorded
        } else {
            order.filled()
        }
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec64;

    use super::*;
    use crate::types::{OrderAction, Side};

    fn order(id: &str, quantity: UD64, filled: Option<UD64>) -> AccountOrder {
        AccountOrder {
            id: id.to_string(),
            action: OrderAction::Bid,
            price: udec64!(19.5),
            quantity,
            filled,
            timestamp: None,
        }
    }

    fn statuses(updates: &[OrderUpdate]) -> Vec<(&str, OrderStatus)> {
        updates
            .iter()
            .map(|u| (u.order.id.as_str(), u.status))
            .collect()
    }

    #[test]
    fn test_new_orders_are_active() {
        let mut state = AccountOrders::new();
        let updates = state.update(vec![
            order("1", udec64!(10), None),
            order("2", udec64!(5), None),
        ]);
        assert_eq!(
            statuses(&updates),
            vec![("1", OrderStatus::Active), ("2", OrderStatus::Active)]
        );
        assert_eq!(state.orders().len(), 2);

        // Same snapshot again
        let updates = state.update(vec![
            order("1", udec64!(10), None),
            order("2", udec64!(5), None),
        ]);
        assert!(updates.is_empty());
    }

    #[test]
    fn test_removed_orders_canceled_or_filled() {
        let mut state = AccountOrders::new();
        state.update(vec![
            order("3", udec64!(10), Some(udec64!(4))),
            order("1", udec64!(10), None),
            order("2", udec64!(5), Some(udec64!(5))),
        ]);

        let updates = state.update(vec![order("4", udec64!(1), None)]);
        assert_eq!(
            statuses(&updates),
            vec![
                ("1", OrderStatus::Canceled),
                ("2", OrderStatus::Filled),
                ("3", OrderStatus::Canceled),
                ("4", OrderStatus::Active),
            ]
        );
        assert_eq!(updates[2].filled, udec64!(4));
        assert_eq!(state.orders().len(), 1);
        assert!(state.order("4").is_some());
        assert!(state.order("1").is_none());
    }

    #[test]
    fn test_partial_fill_emits_active_update() {
        let mut state = AccountOrders::new();
        state.update(vec![order("1", udec64!(10), None)]);

        let updates = state.update(vec![order("1", udec64!(10), Some(udec64!(3)))]);
        assert_eq!(statuses(&updates), vec![("1", OrderStatus::Active)]);
        assert_eq!(updates[0].filled, udec64!(3));

        let updates = state.update(vec![order("1", udec64!(10), Some(udec64!(3)))]);
        assert!(updates.is_empty());
    }

    #[test]
    fn test_recorded_fills_complete_order() {
        let mut state = AccountOrders::new();
        state.update(vec![order("1", udec64!(10), Some(udec64!(6)))]);

        let fill = AccountFill {
            side: Side::Buy,
            instrument_name: "ETH/DAI".to_string(),
            fee: UD64::ZERO,
            trade_id: "0".to_string(),
            create_time: 1603449216,
            traded_price: udec64!(19.5),
            traded_quantity: udec64!(6),
            fee_currency: "DAI".to_string(),
            order_id: Some("1".to_string()),
        };
        state.record_fill(&fill);
        state.record_fill(&AccountFill {
            traded_quantity: udec64!(4),
            ..fill.clone()
        });
        state.record_fill(&AccountFill {
            order_id: None,
            ..fill.clone()
        });

        let updates = state.update(vec![]);
        assert_eq!(statuses(&updates), vec![("1", OrderStatus::Filled)]);
        assert_eq!(updates[0].filled, udec64!(10));
        assert!(state.orders().is_empty());
    }

    #[test]
    fn test_fills_of_untracked_orders_are_dropped() {
        let mut state = AccountOrders::new();
        state.update(vec![order("1", udec64!(10), None)]);

        let fill = AccountFill {
            side: Side::Sell,
            instrument_name: "ETH/DAI".to_string(),
            fee: UD64::ZERO,
            trade_id: "0".to_string(),
            create_time: 1603449216,
            traded_price: udec64!(19.5),
            traded_quantity: udec64!(1),
            fee_currency: "DAI".to_string(),
            order_id: Some("1".to_string()),
        };
        state.record_fill(&fill);
        for i in 0..1000 {
            state.record_fill(&AccountFill {
                order_id: Some(format!("other-{i}")),
                ..fill.clone()
            });
        }
        assert_eq!(state.fills.len(), 1001);

        let updates = state.update(vec![order("1", udec64!(10), None)]);
        assert!(updates.is_empty());
        assert_eq!(state.fills.len(), 1);
        assert_eq!(state.fills.get("1"), Some(&udec64!(1)));

        let updates = state.update(vec![]);
        assert_eq!(statuses(&updates), vec![("1", OrderStatus::Canceled)]);
        assert!(state.fills.is_empty());
    }

    #[test]
    fn test_empty_snapshot_on_empty_state() {
        let mut state = AccountOrders::new();
        assert!(state.update(vec![]).is_empty());
    }
}
