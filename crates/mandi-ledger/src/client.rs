//! The ledger client contract and transaction wire types.
//!
//! The settlement engine is a *client* of an external ledger: it reads
//! balances, submits signed transactions, and waits (bounded) for
//! confirmations. All amounts at this boundary are integers in the
//! ledger's smallest unit; conversion happens in [`crate::units`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mandi_types::{Address, Result, TxHash};

/// The contract surface the engine invokes on the chain.
///
/// Token calls (`Approve`, `Transfer`, `Mint`) and escrow calls
/// (`EscrowDeposit`, `EscrowRelease`, `EscrowRefund`) mirror the deployed
/// token and escrow contracts; `GasTransfer` is a native-coin value
/// transfer used when funding a new wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxCall {
    /// Native-coin transfer (gas funding).
    GasTransfer { to: Address, amount: u128 },
    /// Token transfer between accounts.
    Transfer { to: Address, amount: u128 },
    /// Mint tokens to an account. Custodian-only.
    Mint { to: Address, amount: u128 },
    /// Permit `spender` to move up to `amount` of the signer's tokens.
    Approve { spender: Address, amount: u128 },
    /// Move `amount` of the signer's tokens into escrow custody.
    /// Requires a prior allowance for the escrow contract.
    EscrowDeposit { amount: u128 },
    /// Pay out `amount` of escrowed funds to `to`. Custodian-only.
    EscrowRelease { to: Address, amount: u128 },
    /// Return `amount` of escrowed funds to `to`. Custodian-only.
    EscrowRefund { to: Address, amount: u128 },
}

impl TxCall {
    /// Append a canonical byte encoding of this call to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::GasTransfer { to, amount } => {
                buf.push(0x01);
                buf.extend_from_slice(to.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Transfer { to, amount } => {
                buf.push(0x02);
                buf.extend_from_slice(to.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Mint { to, amount } => {
                buf.push(0x03);
                buf.extend_from_slice(to.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Approve { spender, amount } => {
                buf.push(0x04);
                buf.extend_from_slice(spender.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::EscrowDeposit { amount } => {
                buf.push(0x05);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::EscrowRelease { to, amount } => {
                buf.push(0x06);
                buf.extend_from_slice(to.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::EscrowRefund { to, amount } => {
                buf.push(0x07);
                buf.extend_from_slice(to.as_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
        }
    }
}

/// An unsigned transaction: sender, sequence number, and the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDraft {
    pub from: Address,
    pub nonce: u64,
    pub call: TxCall,
}

impl TxDraft {
    /// Canonical bytes the signer signs and the ledger verifies.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        self.call.encode_into(&mut buf);
        buf
    }
}

/// A signed transaction payload ready for submission.
///
/// Carries the signer's public key and signature — never the private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub draft: TxDraft,
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

impl SignedTx {
    /// The transaction reference, computable before submission.
    ///
    /// A caller uncertain whether a submit landed requeries by this hash
    /// instead of re-submitting with a fresh nonce.
    #[must_use]
    pub fn hash(&self) -> TxHash {
        let mut payload = self.draft.signing_bytes();
        payload.extend_from_slice(&self.signature);
        TxHash::digest(&payload)
    }
}

/// Where a submitted transaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted but not yet finalized. Its effect cannot be relied upon.
    Pending,
    /// Finalized; its effect can be relied upon.
    Confirmed,
    /// The ledger has no record of this reference.
    Unknown,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Proof of a confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub confirmed_at: DateTime<Utc>,
}

/// Client contract for the external ledger.
///
/// Every method may fail with `LedgerUnavailable` (transient transport
/// failure) or `LedgerRejected` (the chain refused the request). Neither
/// is swallowed here — the settlement engine decides retry vs. abort.
pub trait Ledger: Send + Sync {
    /// Token balance of an account, in base units.
    fn token_balance(&self, address: Address) -> impl Future<Output = Result<u128>> + Send;

    /// Total funds currently held by the escrow contract, in base units.
    fn escrow_balance(&self) -> impl Future<Output = Result<u128>> + Send;

    /// Remaining allowance `owner` has granted `spender`, in base units.
    fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<u128>> + Send;

    /// Count of transactions (confirmed and pending) from an address.
    /// This is the seed for the address's nonce cursor.
    fn pending_count(&self, address: Address) -> impl Future<Output = Result<u64>> + Send;

    /// Submit a signed transaction. Returns its reference on acceptance.
    fn submit(&self, tx: SignedTx) -> impl Future<Output = Result<TxHash>> + Send;

    /// Requery the status of a previously submitted transaction.
    fn tx_status(&self, tx: TxHash) -> impl Future<Output = Result<TxStatus>> + Send;

    /// Wait until `tx` confirms, at most `timeout`. A submitted
    /// transaction cannot be cancelled: on `ConfirmationTimeout` the
    /// caller stops waiting locally but the transaction may still land.
    fn wait_for_confirmation(
        &self,
        tx: TxHash,
        timeout: Duration,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// The deployed escrow contract's account — the spender named in the
    /// buy flow's approval step.
    fn escrow_address(&self) -> Address;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(nonce: u64) -> TxDraft {
        TxDraft {
            from: Address([1u8; 20]),
            nonce,
            call: TxCall::Approve {
                spender: Address([2u8; 20]),
                amount: 1_000,
            },
        }
    }

    #[test]
    fn signing_bytes_are_deterministic() {
        assert_eq!(draft(0).signing_bytes(), draft(0).signing_bytes());
    }

    #[test]
    fn signing_bytes_differ_by_nonce() {
        assert_ne!(draft(0).signing_bytes(), draft(1).signing_bytes());
    }

    #[test]
    fn signing_bytes_differ_by_call() {
        let a = TxDraft {
            call: TxCall::EscrowDeposit { amount: 5 },
            ..draft(0)
        };
        let b = TxDraft {
            call: TxCall::EscrowRelease {
                to: Address([3u8; 20]),
                amount: 5,
            },
            ..draft(0)
        };
        assert_ne!(a.signing_bytes(), b.signing_bytes());
    }

    #[test]
    fn tx_hash_is_stable_per_payload() {
        let signed = SignedTx {
            draft: draft(4),
            public_key: [9u8; 32],
            signature: vec![7u8; 64],
        };
        assert_eq!(signed.hash(), signed.clone().hash());

        let other = SignedTx {
            signature: vec![8u8; 64],
            ..signed
        };
        assert_ne!(signed.hash(), other.hash());
    }

    #[test]
    fn tx_status_display() {
        assert_eq!(format!("{}", TxStatus::Pending), "PENDING");
        assert_eq!(format!("{}", TxStatus::Confirmed), "CONFIRMED");
        assert_eq!(format!("{}", TxStatus::Unknown), "UNKNOWN");
    }

    #[test]
    fn signed_tx_serde_roundtrip() {
        let signed = SignedTx {
            draft: draft(2),
            public_key: [1u8; 32],
            signature: vec![2u8; 64],
        };
        let json = serde_json::to_string(&signed).unwrap();
        let back: SignedTx = serde_json::from_str(&json).unwrap();
        assert_eq!(signed, back);
    }
}
