//! Wallet directory — the user → wallet table consumed by settlement.
//!
//! One wallet per user, registered once. Addresses are globally unique;
//! a duplicate address would mean two users share custody of the same
//! ledger account, so registration enforces both invariants.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use mandi_types::{Address, MandiError, Result, UserId, Wallet};

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, Wallet>,
    addresses: HashSet<Address>,
}

/// Registry of custodial wallets, keyed by user.
#[derive(Default)]
pub struct WalletDirectory {
    inner: RwLock<Inner>,
}

impl WalletDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a freshly created wallet.
    ///
    /// # Errors
    /// - `WalletExists` if the user already has one
    /// - `Internal` if the address is already registered (custody
    ///   invariant breach)
    pub fn register(&self, wallet: Wallet) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if inner.by_user.contains_key(&wallet.user_id) {
            return Err(MandiError::WalletExists(wallet.user_id));
        }
        if !inner.addresses.insert(wallet.address) {
            return Err(MandiError::Internal(format!(
                "address {} already under custody",
                wallet.address
            )));
        }
        inner.by_user.insert(wallet.user_id, wallet);
        Ok(())
    }

    /// Look up a user's wallet.
    ///
    /// # Errors
    /// `WalletNotFound` if the user has none.
    pub fn get(&self, user_id: UserId) -> Result<Wallet> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_user
            .get(&user_id)
            .copied()
            .ok_or(MandiError::WalletNotFound(user_id))
    }

    /// Whether the user already holds a wallet.
    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_user
            .contains_key(&user_id)
    }

    /// Number of registered wallets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_user
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use mandi_types::KeyHandle;

    use super::*;

    fn wallet(user: UserId, byte: u8) -> Wallet {
        Wallet::new(user, Address([byte; 20]), KeyHandle(u64::from(byte)))
    }

    #[test]
    fn register_then_get() {
        let dir = WalletDirectory::new();
        let user = UserId::new();
        dir.register(wallet(user, 1)).unwrap();

        let found = dir.get(user).unwrap();
        assert_eq!(found.address, Address([1u8; 20]));
        assert!(dir.contains(user));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn one_wallet_per_user() {
        let dir = WalletDirectory::new();
        let user = UserId::new();
        dir.register(wallet(user, 1)).unwrap();

        let err = dir.register(wallet(user, 2)).unwrap_err();
        assert!(matches!(err, MandiError::WalletExists(u) if u == user));
    }

    #[test]
    fn duplicate_address_is_an_invariant_breach() {
        let dir = WalletDirectory::new();
        dir.register(wallet(UserId::new(), 1)).unwrap();

        let err = dir.register(wallet(UserId::new(), 1)).unwrap_err();
        assert!(matches!(err, MandiError::Internal(_)));
    }

    #[test]
    fn missing_wallet_not_found() {
        let dir = WalletDirectory::new();
        let user = UserId::new();
        let err = dir.get(user).unwrap_err();
        assert!(matches!(err, MandiError::WalletNotFound(u) if u == user));
        assert!(dir.is_empty());
    }
}
