//! Wallet custody — the signing boundary.
//!
//! The vault owns every private key in the process. Callers hold opaque
//! [`KeyHandle`]s and receive [`SignedTx`] payloads; key bytes never
//! cross this boundary, and the vault's `Debug` output is redacted so a
//! stray log line cannot leak them either.

use std::fmt;
use std::sync::Mutex;

use ed25519_dalek::{Signer, SigningKey};

use mandi_types::{Address, KeyHandle, MandiError, Result};

use crate::client::{SignedTx, TxDraft};

/// In-process key custody for custodial wallets.
///
/// One vault instance serves the whole process. `create_wallet` is a
/// one-time, side-effecting operation per user; it fails only on
/// underlying key-generation failure.
pub struct WalletVault {
    keys: Mutex<Vec<SigningKey>>,
}

impl WalletVault {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Generate a keypair and return its address and opaque handle.
    pub fn create_wallet(&self) -> Result<(Address, KeyHandle)> {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = Address::from_public_key(key.verifying_key().as_bytes());

        let mut keys = self.keys.lock().map_err(|_| poisoned())?;
        let handle = KeyHandle(keys.len() as u64);
        keys.push(key);
        Ok((address, handle))
    }

    /// Sign a transaction draft with the key behind `handle`.
    ///
    /// # Errors
    /// `SigningFailed` if the handle does not refer to a vault key.
    pub fn sign(&self, handle: KeyHandle, draft: &TxDraft) -> Result<SignedTx> {
        let keys = self.keys.lock().map_err(|_| poisoned())?;
        let key = keys
            .get(usize::try_from(handle.0).map_err(|_| unknown_handle(handle))?)
            .ok_or_else(|| unknown_handle(handle))?;

        let signature = key.sign(&draft.signing_bytes());
        Ok(SignedTx {
            draft: *draft,
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        })
    }

    /// Number of keys under custody.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().map(|k| k.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WalletVault {
    fn default() -> Self {
        Self::new()
    }
}

// Key material must never reach logs, even through {:?}.
impl fmt::Debug for WalletVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletVault")
            .field("keys", &format_args!("<redacted; {} held>", self.len()))
            .finish()
    }
}

fn poisoned() -> MandiError {
    MandiError::SigningFailed {
        reason: "vault lock poisoned".into(),
    }
}

fn unknown_handle(handle: KeyHandle) -> MandiError {
    MandiError::SigningFailed {
        reason: format!("unknown key handle {handle}"),
    }
}
