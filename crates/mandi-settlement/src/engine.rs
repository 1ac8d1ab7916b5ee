//! Settlement engine — composes custody, nonce allocation, stock, and
//! the order book into the three escrow flows.
//!
//! ## Buy
//! 1. Buyer wallet lookup
//! 2. Atomic stock reservation (the whole remaining lot)
//! 3. Balance check in base units — insufficient funds release the
//!    reservation
//! 4. Approve the escrow contract as spender, wait for confirmation
//! 5. Deposit into escrow, wait for confirmation
//! 6. Record the order as `DEPOSITED`
//!
//! Any failure between steps 2 and 5 releases the reservation. A failure
//! after a confirmed approval additionally leaves an on-chain allowance
//! with nothing deposited; that inconsistency is logged for operator
//! reconciliation and the deposit may be retried with the allowance
//! already in place.
//!
//! ## Confirm-receipt / refund
//! Guarded by buyer ownership and `DEPOSITED` status under the per-order
//! settle lock, then a single custodian-signed escrow payout. Nothing
//! advances on failure, so both flows are safely retryable; a duplicate
//! request fails the status guard with `InvalidOrderState`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use mandi_ledger::client::{Ledger, TxCall, TxDraft, TxStatus};
use mandi_ledger::{retry, units, NonceAllocator, WalletVault};
use mandi_types::{
    Address, EngineConfig, KeyHandle, MandiError, Order, OrderId, OrderStatus, OrderSummary,
    Product, ProductId, Result, TxHash, UserId, Wallet,
};

use crate::orders::OrderBook;
use crate::stock::StockLedger;
use crate::wallets::WalletDirectory;

/// The marketplace-operated signing identity: funds new wallets and
/// releases/refunds escrow. Its nonce cursor is shared by all of those
/// flows through the engine's single allocator.
#[derive(Debug, Clone, Copy)]
pub struct Custodian {
    pub address: Address,
    pub key: KeyHandle,
}

/// Result of a successful buy.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub deposit_tx: TxHash,
}

/// Result of a successful confirm-receipt or refund.
#[derive(Debug, Clone)]
pub struct SettleOutcome {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub settle_tx: TxHash,
}

/// Which way escrowed funds leave on settlement.
#[derive(Debug, Clone, Copy)]
enum SettleAction {
    /// Pay the seller; order completes.
    Release,
    /// Repay the buyer; order is refunded.
    Refund,
}

/// The process-wide settlement engine. Constructed once at startup and
/// shared by reference; every component it owns is the single authority
/// for its piece of state.
pub struct SettlementEngine<L: Ledger> {
    ledger: Arc<L>,
    vault: WalletVault,
    nonces: NonceAllocator,
    stock: StockLedger,
    orders: OrderBook,
    wallets: WalletDirectory,
    custodian: Custodian,
    config: EngineConfig,
}

impl<L: Ledger> SettlementEngine<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>, vault: WalletVault, custodian: Custodian, config: EngineConfig) -> Self {
        Self {
            ledger,
            vault,
            nonces: NonceAllocator::new(),
            stock: StockLedger::new(),
            orders: OrderBook::new(),
            wallets: WalletDirectory::new(),
            custodian,
            config,
        }
    }

    // -----------------------------------------------------------------
    // Wallets
    // -----------------------------------------------------------------

    /// Create a custodial wallet for a new user and fund it: a gas-coin
    /// transfer so it can pay fees, then the token grant, both signed by
    /// the custodian through the shared nonce allocator.
    ///
    /// The wallet is registered before funding starts, so a funding
    /// failure surfaces without re-creating keys; the grants can be
    /// retried by the registration collaborator.
    pub async fn create_funded_wallet(&self, user_id: UserId) -> Result<Wallet> {
        if self.wallets.contains(user_id) {
            return Err(MandiError::WalletExists(user_id));
        }

        let (address, key) = self.vault.create_wallet()?;
        let wallet = Wallet::new(user_id, address, key);
        self.wallets.register(wallet)?;

        let gas = units::to_base_units(self.config.funding.gas_grant)?;
        let tokens = units::to_base_units(self.config.funding.token_grant)?;

        self.submit_and_confirm(
            self.custodian.address,
            self.custodian.key,
            TxCall::GasTransfer { to: address, amount: gas },
        )
        .await?;
        self.submit_and_confirm(
            self.custodian.address,
            self.custodian.key,
            TxCall::Mint { to: address, amount: tokens },
        )
        .await?;

        tracing::info!(
            user_id = %user_id,
            address = %address.short(),
            "wallet created and funded"
        );
        Ok(wallet)
    }

    /// The user's on-ledger token balance, in marketplace units.
    pub async fn wallet_balance(&self, user_id: UserId) -> Result<Decimal> {
        let wallet = self.wallets.get(user_id)?;
        let balance = retry::with_retries(
            self.config.submit_retries,
            self.config.retry_backoff(),
            || self.ledger.token_balance(wallet.address),
        )
        .await?;
        units::from_base_units(balance)
    }

    // -----------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------

    /// Add a product to the stock ledger.
    ///
    /// # Errors
    /// `Validation` for a negative quantity or non-positive price.
    pub fn add_product(&self, product: Product) -> Result<ProductId> {
        if product.quantity_kg < Decimal::ZERO {
            return Err(MandiError::Validation {
                reason: format!("quantity must not be negative, got {}", product.quantity_kg),
            });
        }
        if product.price_per_kg <= Decimal::ZERO {
            return Err(MandiError::Validation {
                reason: format!("price must be positive, got {}", product.price_per_kg),
            });
        }
        Ok(self.stock.insert(product))
    }

    /// Snapshot of one listing.
    #[must_use]
    pub fn product(&self, product_id: ProductId) -> Option<Product> {
        self.stock.get(product_id)
    }

    /// All listings with stock remaining.
    #[must_use]
    pub fn market_listings(&self) -> Vec<Product> {
        self.stock.list_available()
    }

    // -----------------------------------------------------------------
    // Buy
    // -----------------------------------------------------------------

    /// Purchase the full remaining lot of a product, depositing the
    /// price into escrow. Returns once the deposit is confirmed.
    pub async fn buy(&self, buyer: UserId, product_id: ProductId) -> Result<PurchaseOutcome> {
        let wallet = self.wallets.get(buyer)?;
        let reservation = self.stock.reserve_all(product_id)?;
        let total = reservation.total();

        // From here on every failure must hand the stock back.
        match self.deposit_into_escrow(&wallet, total).await {
            Ok(deposit_tx) => {
                let order = Order {
                    id: OrderId::new(),
                    buyer,
                    seller: reservation.seller,
                    product_id,
                    product_name: reservation.product_name.clone(),
                    quantity_kg: reservation.quantity_kg,
                    total_amount: total,
                    status: OrderStatus::Deposited,
                    deposit_tx: Some(deposit_tx),
                    settle_tx: None,
                    created_at: Utc::now(),
                };
                let order_id = order.id;
                self.orders.insert(order)?;

                tracing::info!(
                    order_id = %order_id,
                    product_id = %product_id,
                    total = %total,
                    deposit_tx = %deposit_tx,
                    "purchase deposited into escrow"
                );
                Ok(PurchaseOutcome {
                    order_id,
                    status: OrderStatus::Deposited,
                    total_amount: total,
                    deposit_tx,
                })
            }
            Err(err) => {
                self.stock.release(reservation);
                Err(err)
            }
        }
    }

    /// Balance check, approval, and deposit. Stock compensation is the
    /// caller's job; allowance reconciliation is handled here.
    async fn deposit_into_escrow(&self, wallet: &Wallet, total: Decimal) -> Result<TxHash> {
        let amount = units::to_base_units(total)?;

        let available = retry::with_retries(
            self.config.submit_retries,
            self.config.retry_backoff(),
            || self.ledger.token_balance(wallet.address),
        )
        .await?;
        if available < amount {
            return Err(MandiError::InsufficientFunds {
                needed: amount,
                available,
            });
        }

        let spender = self.ledger.escrow_address();
        let approve_tx = self
            .submit_and_confirm(
                wallet.address,
                wallet.key,
                TxCall::Approve { spender, amount },
            )
            .await?;

        match self
            .submit_and_confirm(wallet.address, wallet.key, TxCall::EscrowDeposit { amount })
            .await
        {
            Ok(deposit_tx) => Ok(deposit_tx),
            Err(err) => {
                // The approval confirmed but the deposit did not: an
                // allowance now exists with nothing behind it. The
                // deposit can be retried against it without a second
                // approval; until then, reconciliation owns it.
                tracing::warn!(
                    buyer = %wallet.user_id,
                    approve_tx = %approve_tx,
                    amount,
                    error = %err,
                    "deposit failed after confirmed approval; allowance left for reconciliation"
                );
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------
    // Confirm-receipt / refund
    // -----------------------------------------------------------------

    /// Buyer confirms receipt of the goods: escrow pays the seller and
    /// the order completes.
    pub async fn confirm_receipt(&self, buyer: UserId, order_id: OrderId) -> Result<SettleOutcome> {
        self.settle(buyer, order_id, SettleAction::Release).await
    }

    /// Buyer requests their money back: escrow repays the buyer and the
    /// order is refunded.
    pub async fn refund(&self, buyer: UserId, order_id: OrderId) -> Result<SettleOutcome> {
        self.settle(buyer, order_id, SettleAction::Refund).await
    }

    /// A buyer's orders, newest first.
    #[must_use]
    pub fn list_orders(&self, buyer: UserId) -> Vec<OrderSummary> {
        self.orders.list_for_buyer(buyer)
    }

    async fn settle(
        &self,
        buyer: UserId,
        order_id: OrderId,
        action: SettleAction,
    ) -> Result<SettleOutcome> {
        // Serialize settlement attempts per order: the loser of a race
        // re-reads the order below and fails the status guard instead of
        // reaching the ledger.
        let settle_lock = self.orders.settle_lock(order_id);
        let _held = settle_lock.lock().await;

        let order = self.orders.guard_deposited(order_id, buyer)?;
        let amount = units::to_base_units(order.total_amount)?;

        let (recipient, next) = match action {
            SettleAction::Release => (self.wallets.get(order.seller)?.address, OrderStatus::Completed),
            SettleAction::Refund => (self.wallets.get(order.buyer)?.address, OrderStatus::Refunded),
        };
        let call = match action {
            SettleAction::Release => TxCall::EscrowRelease { to: recipient, amount },
            SettleAction::Refund => TxCall::EscrowRefund { to: recipient, amount },
        };

        let settle_tx = self
            .submit_and_confirm(self.custodian.address, self.custodian.key, call)
            .await?;
        let updated = self.orders.transition(order_id, next, settle_tx)?;

        tracing::info!(
            order_id = %order_id,
            status = %updated.status,
            settle_tx = %settle_tx,
            "escrow settled"
        );
        Ok(SettleOutcome {
            order_id,
            status: updated.status,
            settle_tx,
        })
    }

    // -----------------------------------------------------------------
    // Ledger pipeline
    // -----------------------------------------------------------------

    /// Reserve a nonce, sign, submit (with capped transient retries),
    /// and wait for confirmation.
    ///
    /// The transaction reference is computed before submission, so an
    /// uncertain outcome — a rejection that might stem from an earlier
    /// attempt having landed, or a confirmation timeout — is resolved by
    /// requerying status rather than re-submitting with a fresh nonce.
    async fn submit_and_confirm(
        &self,
        from: Address,
        key: KeyHandle,
        call: TxCall,
    ) -> Result<TxHash> {
        let nonce = self.nonces.reserve(self.ledger.as_ref(), from).await?;
        let draft = TxDraft { from, nonce, call };
        let signed = self.vault.sign(key, &draft)?;
        let tx = signed.hash();

        let submitted = retry::with_retries(
            self.config.submit_retries,
            self.config.retry_backoff(),
            || self.ledger.submit(signed.clone()),
        )
        .await;

        if let Err(err) = submitted {
            if matches!(err, MandiError::LedgerRejected { .. })
                && self.ledger.tx_status(tx).await? != TxStatus::Unknown
            {
                // An earlier attempt landed; fall through to confirmation.
                tracing::debug!(tx = %tx, "submit rejected but transaction is known; continuing");
            } else {
                return Err(err);
            }
        }

        match self
            .ledger
            .wait_for_confirmation(tx, self.config.confirmation_timeout())
            .await
        {
            Ok(receipt) => Ok(receipt.tx),
            Err(timeout @ MandiError::ConfirmationTimeout { .. }) => {
                // The wait elapsed locally; the transaction may still
                // have landed. Requery before assuming failure.
                if self.ledger.tx_status(tx).await? == TxStatus::Confirmed {
                    let receipt = self
                        .ledger
                        .wait_for_confirmation(tx, self.config.confirmation_timeout())
                        .await?;
                    Ok(receipt.tx)
                } else {
                    tracing::warn!(
                        tx = %tx,
                        from = %from.short(),
                        nonce,
                        "confirmation timed out with transaction still unresolved"
                    );
                    Err(timeout)
                }
            }
            Err(err) => Err(err),
        }
    }
}
