//! Custodial wallet records.
//!
//! A wallet ties a marketplace user to a ledger address. The private key
//! is NOT part of this record — it lives behind the signing boundary in
//! `mandi-ledger`, reachable only through the opaque [`KeyHandle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, UserId};

/// Opaque reference to a private key held by the wallet vault.
///
/// Deliberately carries no key material. Serializing or logging a handle
/// reveals nothing about the key it points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle(pub u64);

impl std::fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key:{}", self.0)
    }
}

/// One custodial wallet per user. Created once at registration, immutable
/// thereafter; the balance lives on the external ledger, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// The owning user.
    pub user_id: UserId,
    /// Ledger-native account identifier. Globally unique across wallets.
    pub address: Address,
    /// Opaque handle into the signing vault.
    pub key: KeyHandle,
    /// When the wallet was created.
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    #[must_use]
    pub fn new(user_id: UserId, address: Address, key: KeyHandle) -> Self {
        Self {
            user_id,
            address,
            key,
            created_at: Utc::now(),
        }
    }
}
