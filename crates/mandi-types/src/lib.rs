//! # mandi-types
//!
//! Shared types, errors, and configuration for the **MandiSettle** escrow
//! settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`ProductId`], [`OrderId`], [`Address`], [`TxHash`]
//! - **Wallet model**: [`Wallet`], [`KeyHandle`]
//! - **Product model**: [`Product`], [`CommodityKind`], [`QualityGrade`]
//! - **Order model**: [`Order`], [`OrderStatus`], [`OrderSummary`]
//! - **Configuration**: [`EngineConfig`], [`FundingConfig`]
//! - **Errors**: [`MandiError`] with `MS_ERR_` prefix codes
//! - **Constants**: system-wide scales and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod product;
pub mod wallet;

// Re-export all primary types at crate root for ergonomic imports:
//   use mandi_types::{Order, OrderStatus, Wallet, MandiError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use product::*;
pub use wallet::*;

// Constants are accessed via `mandi_types::constants::FOO`
// (not re-exported to avoid name collisions).
