//! # mandi-ledger
//!
//! The chain boundary of the MandiSettle engine. Everything that talks to
//! (or stands in for) the external ledger lives here:
//!
//! - **Client contract**: [`Ledger`], the async trait the settlement
//!   engine consumes
//! - **Units**: [`units`], fixed-scale conversion between marketplace
//!   decimals and ledger base units
//! - **Custody**: [`WalletVault`], signing without leaking key bytes
//! - **Sequencing**: [`NonceAllocator`], collision-free per-address nonces
//! - **Dev chain**: [`InMemoryLedger`], deterministic backend for
//!   development and tests
//! - **Retries**: [`retry`], capped retries for transient failures
//!
//! The engine never touches a private key, never computes a nonce on its
//! own, and never waits on a confirmation without a timeout.

pub mod client;
pub mod memory;
pub mod nonce;
pub mod retry;
pub mod signer;
pub mod units;

pub use client::{Ledger, SignedTx, TxCall, TxDraft, TxReceipt, TxStatus};
pub use memory::InMemoryLedger;
pub use nonce::NonceAllocator;
pub use signer::WalletVault;
