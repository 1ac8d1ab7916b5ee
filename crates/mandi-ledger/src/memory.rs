//! Deterministic in-memory ledger for development and tests.
//!
//! Implements the [`Ledger`] trait over the same contract surface the
//! production chain exposes: token balances and allowances, custodian-only
//! minting, native-coin (gas) transfers, and the escrow contract's
//! deposit/release/refund.
//!
//! Nonce semantics match a real chain: a reused nonce is rejected
//! outright, while a future nonce is accepted and parked — it stalls
//! until every earlier nonce from that address has landed, then executes
//! in sequence. A reverted execution still consumes its nonce.
//!
//! Fault windows allow tests to exercise the engine's failure branches:
//! transient unavailability, execution rejection, and withheld receipts
//! (submitted but never confirmed, so confirmation waits time out).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use mandi_types::{constants, Address, MandiError, Result, TxHash};

use crate::client::{Ledger, SignedTx, TxCall, TxReceipt, TxStatus};

/// The escrow contract's well-known account on this chain.
const ESCROW_CONTRACT: Address = Address([0xEE; 20]);

/// Chain state behind one lock. Locks are never held across awaits.
#[derive(Default)]
struct ChainState {
    token: HashMap<Address, u128>,
    gas: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    escrow_held: u128,
    /// Nonces consumed per address — the next directly executable nonce.
    tx_counts: HashMap<Address, u64>,
    /// Future-nonce transactions parked until their gap fills.
    queued: HashMap<Address, BTreeMap<u64, SignedTx>>,
    receipts: HashMap<TxHash, TxReceipt>,
    /// Accepted but not yet executed (parked, or withheld by fault).
    unconfirmed: HashSet<TxHash>,
    /// Parked transactions that reverted when their turn came.
    failed: HashMap<TxHash, String>,
}

/// A `skip`-then-`fail` window for injecting submit failures.
#[derive(Debug, Default)]
struct FaultWindow {
    skip: u32,
    fail: u32,
}

impl FaultWindow {
    /// Advance the window by one submit; true if this one should fail.
    fn trip(&mut self) -> bool {
        if self.skip > 0 {
            self.skip -= 1;
            false
        } else if self.fail > 0 {
            self.fail -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
struct Faults {
    unavailable: FaultWindow,
    reject: FaultWindow,
    withhold_receipts: bool,
}

/// In-memory chain: token + escrow contracts plus native gas accounting.
pub struct InMemoryLedger {
    custodian: Address,
    state: Mutex<ChainState>,
    faults: Mutex<Faults>,
}

impl InMemoryLedger {
    /// Create a chain whose privileged (mint/release/refund) account is
    /// `custodian`.
    #[must_use]
    pub fn new(custodian: Address) -> Self {
        Self {
            custodian,
            state: Mutex::new(ChainState::default()),
            faults: Mutex::new(Faults::default()),
        }
    }

    // -----------------------------------------------------------------
    // Seeding (genesis allocations)
    // -----------------------------------------------------------------

    /// Credit `amount` base units of gas coin to an account.
    pub fn seed_gas(&self, address: Address, amount: u128) {
        let mut state = self.state_lock();
        *state.gas.entry(address).or_insert(0) += amount;
    }

    /// Credit `amount` base units of tokens to an account.
    pub fn seed_tokens(&self, address: Address, amount: u128) {
        let mut state = self.state_lock();
        *state.token.entry(address).or_insert(0) += amount;
    }

    /// Gas-coin balance of an account, in base units.
    #[must_use]
    pub fn gas_balance(&self, address: Address) -> u128 {
        self.state_lock().gas.get(&address).copied().unwrap_or(0)
    }

    /// The privileged account this chain was created with.
    #[must_use]
    pub fn custodian(&self) -> Address {
        self.custodian
    }

    // -----------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------

    /// After `skip` more submits, fail the next `count` with
    /// `LedgerUnavailable` before any state is touched.
    pub fn fail_submits(&self, skip: u32, count: u32) {
        self.faults_lock().unavailable = FaultWindow { skip, fail: count };
    }

    /// After `skip` more submits, reject the next `count` as reverted.
    /// A rejected execution still consumes its nonce.
    pub fn reject_submits(&self, skip: u32, count: u32) {
        self.faults_lock().reject = FaultWindow { skip, fail: count };
    }

    /// While set, accepted transactions are never executed or confirmed:
    /// confirmation waits time out and `tx_status` reports `Pending`.
    pub fn set_withhold_receipts(&self, withhold: bool) {
        self.faults_lock().withhold_receipts = withhold;
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn state_lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn faults_lock(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn verify_signature(tx: &SignedTx) -> std::result::Result<(), String> {
        let verifying = VerifyingKey::from_bytes(&tx.public_key)
            .map_err(|_| "malformed public key".to_string())?;
        let sig_bytes: [u8; 64] = tx
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| "malformed signature".to_string())?;
        verifying
            .verify(&tx.draft.signing_bytes(), &Signature::from_bytes(&sig_bytes))
            .map_err(|_| "signature verification failed".to_string())?;
        if Address::from_public_key(&tx.public_key) != tx.draft.from {
            return Err("sender address does not match signing key".to_string());
        }
        Ok(())
    }

    /// Apply a call to chain state. Errors are execution reverts — the
    /// nonce has already been consumed by the time this runs.
    fn execute(
        &self,
        state: &mut ChainState,
        from: Address,
        call: TxCall,
    ) -> std::result::Result<(), String> {
        match call {
            TxCall::GasTransfer { to, amount } => {
                let balance = state.gas.get(&from).copied().unwrap_or(0);
                if balance < amount {
                    return Err(format!("insufficient gas balance: {balance} < {amount}"));
                }
                state.gas.insert(from, balance - amount);
                *state.gas.entry(to).or_insert(0) += amount;
            }
            TxCall::Transfer { to, amount } => {
                let balance = state.token.get(&from).copied().unwrap_or(0);
                if balance < amount {
                    return Err(format!("insufficient token balance: {balance} < {amount}"));
                }
                state.token.insert(from, balance - amount);
                *state.token.entry(to).or_insert(0) += amount;
            }
            TxCall::Mint { to, amount } => {
                if from != self.custodian {
                    return Err("mint restricted to the custodian".to_string());
                }
                *state.token.entry(to).or_insert(0) += amount;
            }
            TxCall::Approve { spender, amount } => {
                state.allowances.insert((from, spender), amount);
            }
            TxCall::EscrowDeposit { amount } => {
                let allowed = state
                    .allowances
                    .get(&(from, ESCROW_CONTRACT))
                    .copied()
                    .unwrap_or(0);
                if allowed < amount {
                    return Err(format!("escrow allowance too low: {allowed} < {amount}"));
                }
                let balance = state.token.get(&from).copied().unwrap_or(0);
                if balance < amount {
                    return Err(format!("insufficient token balance: {balance} < {amount}"));
                }
                state
                    .allowances
                    .insert((from, ESCROW_CONTRACT), allowed - amount);
                state.token.insert(from, balance - amount);
                state.escrow_held += amount;
            }
            TxCall::EscrowRelease { to, amount } | TxCall::EscrowRefund { to, amount } => {
                if from != self.custodian {
                    return Err("escrow payout restricted to the custodian".to_string());
                }
                if state.escrow_held < amount {
                    return Err(format!(
                        "escrow underfunded: {} < {amount}",
                        state.escrow_held
                    ));
                }
                state.escrow_held -= amount;
                *state.token.entry(to).or_insert(0) += amount;
            }
        }
        Ok(())
    }

    /// Execute parked transactions whose gap has just been filled.
    fn drain_queued(&self, state: &mut ChainState, from: Address) {
        loop {
            let expected = state.tx_counts.get(&from).copied().unwrap_or(0);
            let Some(tx) = state
                .queued
                .get_mut(&from)
                .and_then(|queue| queue.remove(&expected))
            else {
                break;
            };

            let hash = tx.hash();
            state.tx_counts.insert(from, expected + 1);
            state.unconfirmed.remove(&hash);
            match self.execute(state, from, tx.draft.call) {
                Ok(()) => {
                    state.receipts.insert(
                        hash,
                        TxReceipt {
                            tx: hash,
                            from,
                            nonce: expected,
                            confirmed_at: Utc::now(),
                        },
                    );
                }
                // The revert consumed the nonce; later parked
                // transactions still drain on top of it.
                Err(reason) => {
                    state.failed.insert(hash, reason);
                }
            }
        }
    }
}

impl Ledger for InMemoryLedger {
    async fn token_balance(&self, address: Address) -> Result<u128> {
        Ok(self.state_lock().token.get(&address).copied().unwrap_or(0))
    }

    async fn escrow_balance(&self) -> Result<u128> {
        Ok(self.state_lock().escrow_held)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<u128> {
        Ok(self
            .state_lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0))
    }

    async fn pending_count(&self, address: Address) -> Result<u64> {
        let state = self.state_lock();
        let consumed = state.tx_counts.get(&address).copied().unwrap_or(0);
        let parked = state
            .queued
            .get(&address)
            .map(|queue| queue.len() as u64)
            .unwrap_or(0);
        Ok(consumed + parked)
    }

    async fn submit(&self, tx: SignedTx) -> Result<TxHash> {
        if self.faults_lock().unavailable.trip() {
            return Err(MandiError::LedgerUnavailable {
                reason: "rpc connection reset".into(),
            });
        }

        Self::verify_signature(&tx).map_err(|reason| MandiError::LedgerRejected { reason })?;

        let hash = tx.hash();
        let from = tx.draft.from;
        let nonce = tx.draft.nonce;

        let mut state = self.state_lock();
        let expected = state.tx_counts.get(&from).copied().unwrap_or(0);

        if nonce < expected {
            return Err(MandiError::LedgerRejected {
                reason: format!("nonce too low: expected {expected}, got {nonce}"),
            });
        }
        if nonce > expected {
            // A gap stalls this transaction until earlier nonces land.
            state.unconfirmed.insert(hash);
            state.queued.entry(from).or_default().insert(nonce, tx);
            return Ok(hash);
        }

        // The nonce is consumed from here on, even if execution reverts.
        state.tx_counts.insert(from, expected + 1);

        if self.faults_lock().reject.trip() {
            self.drain_queued(&mut state, from);
            return Err(MandiError::LedgerRejected {
                reason: "execution reverted".into(),
            });
        }

        if self.faults_lock().withhold_receipts {
            state.unconfirmed.insert(hash);
            return Ok(hash);
        }

        let executed = self.execute(&mut state, from, tx.draft.call);
        if executed.is_ok() {
            state.receipts.insert(
                hash,
                TxReceipt {
                    tx: hash,
                    from,
                    nonce,
                    confirmed_at: Utc::now(),
                },
            );
        }
        self.drain_queued(&mut state, from);
        executed
            .map(|()| hash)
            .map_err(|reason| MandiError::LedgerRejected { reason })
    }

    async fn tx_status(&self, tx: TxHash) -> Result<TxStatus> {
        let state = self.state_lock();
        if state.receipts.contains_key(&tx) {
            Ok(TxStatus::Confirmed)
        } else if state.unconfirmed.contains(&tx) {
            Ok(TxStatus::Pending)
        } else {
            Ok(TxStatus::Unknown)
        }
    }

    async fn wait_for_confirmation(&self, tx: TxHash, timeout: Duration) -> Result<TxReceipt> {
        let poll = Duration::from_millis(constants::CONFIRMATION_POLL_INTERVAL_MS);
        let wait = async {
            loop {
                {
                    let state = self.state_lock();
                    if let Some(receipt) = state.receipts.get(&tx).copied() {
                        return Ok(receipt);
                    }
                    if let Some(reason) = state.failed.get(&tx).cloned() {
                        return Err(MandiError::LedgerRejected { reason });
                    }
                }
                tokio::time::sleep(poll).await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => Err(MandiError::ConfirmationTimeout {
                tx,
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn escrow_address(&self) -> Address {
        ESCROW_CONTRACT
    }
}
