//! Order types — the settlement record of a purchase.
//!
//! An order is append-only and its status moves one way through
//! `PENDING → DEPOSITED → {COMPLETED | REFUNDED}`. It can never re-enter
//! a state it has left.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, ProductId, TxHash, UserId};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Stock reserved, not yet settled on-chain. Transient; not observed
    /// when reservation and deposit are committed together.
    Pending,
    /// Buyer's funds are held by escrow. Precondition for both release
    /// and refund.
    Deposited,
    /// Seller paid. Terminal.
    Completed,
    /// Buyer repaid. Terminal.
    Refunded,
}

impl OrderStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Deposited)
                | (Self::Deposited, Self::Completed | Self::Refunded)
        )
    }

    /// Terminal states admit no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Deposited => write!(f, "DEPOSITED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// The object of record for a purchase.
///
/// Product name, seller, quantity, and total are snapshotted at purchase
/// time so the audit trail survives later changes to the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Quantity purchased, in kg.
    pub quantity_kg: Decimal,
    /// Total amount in the marketplace's unit of account.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// The escrow deposit transaction.
    pub deposit_tx: Option<TxHash>,
    /// The release (COMPLETED) or refund (REFUNDED) transaction.
    pub settle_tx: Option<TxHash>,
    pub created_at: DateTime<Utc>,
}

/// Flat order view returned to the request layer. Never carries key
/// material or transaction internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub product_name: String,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
}

impl Order {
    /// Summary view for order listings.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_id: self.id,
            product_name: self.product_name.clone(),
            amount: self.total_amount,
            status: self.status,
            date: self.created_at,
        }
    }
}
