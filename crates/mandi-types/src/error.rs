//! Error types for the MandiSettle escrow settlement engine.
//!
//! All errors use the `MS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation / wallet registration errors
//! - 2xx: Stock errors
//! - 3xx: Funds / wallet lookup errors
//! - 4xx: Ledger boundary errors
//! - 5xx: Order errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{OrderId, OrderStatus, ProductId, TxHash, UserId};

/// Central error enum for all MandiSettle operations.
#[derive(Debug, Error)]
pub enum MandiError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// A request field was missing or malformed. Rejected before touching
    /// stock or ledger.
    #[error("MS_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// A wallet already exists for this user (one per user, created once).
    #[error("MS_ERR_101: Wallet already exists for user {0}")]
    WalletExists(UserId),

    // =================================================================
    // Stock Errors (2xx)
    // =================================================================
    /// The requested product was not found.
    #[error("MS_ERR_200: Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Stock reservation found insufficient quantity. No side effects.
    #[error("MS_ERR_201: Out of stock: product {product_id} has {available} kg, requested {requested} kg")]
    OutOfStock {
        product_id: ProductId,
        available: Decimal,
        requested: Decimal,
    },

    // =================================================================
    // Funds / Wallet Errors (3xx)
    // =================================================================
    /// The buyer's on-ledger balance is less than the purchase total.
    /// The stock reservation is released before this is returned.
    #[error("MS_ERR_300: Insufficient funds: need {needed} base units, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    /// No wallet is registered for this user.
    #[error("MS_ERR_301: Wallet not found for user {0}")]
    WalletNotFound(UserId),

    // =================================================================
    // Ledger Boundary Errors (4xx)
    // =================================================================
    /// Transient RPC/network failure. Safe to retry the step that failed,
    /// since nothing advanced past it.
    #[error("MS_ERR_400: Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// The ledger refused a submitted transaction (e.g., reverted).
    #[error("MS_ERR_401: Ledger rejected transaction: {reason}")]
    LedgerRejected { reason: String },

    /// A confirmation wait elapsed. The transaction may still land; the
    /// caller must requery its status before assuming failure.
    #[error("MS_ERR_402: Confirmation timed out for tx {tx} after {waited_ms}ms")]
    ConfirmationTimeout { tx: TxHash, waited_ms: u64 },

    /// The signing capability failed (unknown key handle, key generation).
    #[error("MS_ERR_403: Signing failed: {reason}")]
    SigningFailed { reason: String },

    // =================================================================
    // Order Errors (5xx)
    // =================================================================
    /// The requested order was not found.
    #[error("MS_ERR_500: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Confirm/refund requested against an order not in DEPOSITED, or not
    /// owned by the caller.
    #[error("MS_ERR_501: Invalid order state: order {order_id} is {status}: {reason}")]
    InvalidOrderState {
        order_id: OrderId,
        status: OrderStatus,
        reason: String,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// A marketplace-unit amount cannot be represented in ledger base
    /// units (negative, too precise, or out of range).
    #[error("MS_ERR_900: Amount out of range: {reason}")]
    AmountOverflow { reason: String },

    /// Unrecoverable internal error.
    #[error("MS_ERR_901: Internal error: {0}")]
    Internal(String),
}

impl MandiError {
    /// Whether this error is a transient ledger failure worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LedgerUnavailable { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MandiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = MandiError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("MS_ERR_500"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = MandiError::InsufficientFunds {
            needed: 1000,
            available: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("MS_ERR_300"));
        assert!(msg.contains("1000"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn out_of_stock_display() {
        let err = MandiError::OutOfStock {
            product_id: ProductId::new(),
            available: Decimal::ZERO,
            requested: Decimal::ONE,
        };
        let msg = format!("{err}");
        assert!(msg.contains("MS_ERR_201"));
        assert!(msg.contains("0 kg"));
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(
            MandiError::LedgerUnavailable {
                reason: "rpc reset".into()
            }
            .is_transient()
        );
        assert!(
            !MandiError::LedgerRejected {
                reason: "reverted".into()
            }
            .is_transient()
        );
        assert!(!MandiError::Internal("x".into()).is_transient());
    }

    #[test]
    fn all_errors_have_ms_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(MandiError::Validation {
                reason: "test".into(),
            }),
            Box::new(MandiError::WalletExists(UserId::new())),
            Box::new(MandiError::WalletNotFound(UserId::new())),
            Box::new(MandiError::LedgerUnavailable {
                reason: "test".into(),
            }),
            Box::new(MandiError::SigningFailed {
                reason: "test".into(),
            }),
            Box::new(MandiError::AmountOverflow {
                reason: "test".into(),
            }),
            Box::new(MandiError::Internal("test".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("MS_ERR_"),
                "Error missing MS_ERR_ prefix: {msg}"
            );
        }
    }
}
