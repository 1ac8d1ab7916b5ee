//! Order book — the append-only store of settlement records.
//!
//! Orders are never deleted and their status only moves forward through
//! the state machine in `mandi_types::order`. Every mutation goes through
//! [`OrderBook::transition`], which re-checks the guard under the write
//! lock, so a stale caller loses cleanly with `InvalidOrderState`.
//!
//! Each order also carries a settle lock: confirm-receipt and refund for
//! one order serialize on it, so two racing requests cannot both reach
//! the ledger. The loser re-reads the order and fails the status guard —
//! escrow funds move exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::Mutex as AsyncMutex;

use mandi_types::{MandiError, Order, OrderId, OrderStatus, OrderSummary, Result, TxHash, UserId};

/// Append-only order store with guarded transitions.
#[derive(Default)]
pub struct OrderBook {
    orders: RwLock<HashMap<OrderId, Order>>,
    settle_locks: Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>,
}

impl OrderBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            settle_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Record a new order.
    ///
    /// # Errors
    /// `Internal` on id collision — order ids are UUIDv7 and never reused.
    pub fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        if orders.contains_key(&order.id) {
            return Err(MandiError::Internal(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    /// Fetch a copy of an order.
    ///
    /// # Errors
    /// `OrderNotFound` for an unknown id.
    pub fn get(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&order_id)
            .cloned()
            .ok_or(MandiError::OrderNotFound(order_id))
    }

    /// Fetch an order iff it is owned by `buyer` and still `DEPOSITED` —
    /// the shared precondition of confirm-receipt and refund.
    ///
    /// # Errors
    /// `OrderNotFound`, or `InvalidOrderState` when the guard fails.
    pub fn guard_deposited(&self, order_id: OrderId, buyer: UserId) -> Result<Order> {
        let order = self.get(order_id)?;
        if order.buyer != buyer {
            return Err(MandiError::InvalidOrderState {
                order_id,
                status: order.status,
                reason: "order is not owned by the requesting buyer".into(),
            });
        }
        if order.status != OrderStatus::Deposited {
            return Err(MandiError::InvalidOrderState {
                order_id,
                status: order.status,
                reason: "order is not awaiting settlement".into(),
            });
        }
        Ok(order)
    }

    /// Advance an order's status, recording the transaction that proved
    /// the step: the deposit hash for `DEPOSITED`, the release/refund
    /// hash for the terminal states.
    ///
    /// # Errors
    /// `OrderNotFound`, or `InvalidOrderState` if the state machine
    /// forbids the move.
    pub fn transition(&self, order_id: OrderId, next: OrderStatus, tx: TxHash) -> Result<Order> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        let order = orders
            .get_mut(&order_id)
            .ok_or(MandiError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(next) {
            return Err(MandiError::InvalidOrderState {
                order_id,
                status: order.status,
                reason: format!("cannot transition {} -> {next}", order.status),
            });
        }

        order.status = next;
        match next {
            OrderStatus::Deposited => order.deposit_tx = Some(tx),
            OrderStatus::Completed | OrderStatus::Refunded => order.settle_tx = Some(tx),
            OrderStatus::Pending => {}
        }
        Ok(order.clone())
    }

    /// The per-order settle lock. Confirm/refund flows hold it across
    /// their ledger call so duplicates serialize instead of racing.
    #[must_use]
    pub fn settle_lock(&self, order_id: OrderId) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .settle_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(order_id).or_insert_with(Arc::default))
    }

    /// A buyer's orders, newest first.
    #[must_use]
    pub fn list_for_buyer(&self, buyer: UserId) -> Vec<OrderSummary> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<OrderSummary> = orders
            .values()
            .filter(|o| o.buyer == buyer)
            .map(Order::summary)
            .collect();
        summaries.sort_by(|a, b| b.date.cmp(&a.date).then(b.order_id.cmp(&a.order_id)));
        summaries
    }

    /// Number of recorded orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
