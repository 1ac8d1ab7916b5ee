//! # mandi-settlement
//!
//! The settlement plane of MandiSettle: everything between a buy request
//! and a finalized escrow outcome.
//!
//! ## Architecture
//!
//! A purchase flows through:
//! 1. [`WalletDirectory`]: the buyer must hold a registered wallet
//! 2. [`StockLedger`]: atomic check-and-decrement stock reservation
//! 3. The ledger boundary (`mandi-ledger`): approve, then deposit into
//!    escrow, each confirmed before the next step
//! 4. [`OrderBook`]: the append-only order of record
//!
//! Confirm-receipt and refund reverse the deposit through the custodian's
//! signing key, guarded by buyer ownership and the `DEPOSITED` status.
//! [`SettlementEngine`] composes the pieces and owns every compensating
//! action (stock release on failure, allowance reconciliation logging).

pub mod engine;
pub mod orders;
pub mod stock;
pub mod wallets;

pub use engine::{Custodian, PurchaseOutcome, SettleOutcome, SettlementEngine};
pub use orders::OrderBook;
pub use stock::{Reservation, StockLedger};
pub use wallets::WalletDirectory;
