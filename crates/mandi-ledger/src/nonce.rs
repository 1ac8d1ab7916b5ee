//! Per-address transaction sequencing.
//!
//! The allocator is the single authority for nonces in this process: no
//! other code path may compute or guess one. Each address gets its own
//! cursor behind its own async mutex — concurrent reservations for one
//! address serialize, different addresses proceed independently.
//!
//! A cursor is seeded lazily from the ledger's pending transaction count
//! and advanced by exactly one per reservation. It is never rolled back:
//! if a reserved nonce's transaction is rejected, the rejection consumed
//! the sequence number on-chain, and rolling the cursor back would race
//! with nonces already reserved past it. The caller retries with a fresh
//! reservation instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;

use mandi_types::{Address, Result};

use crate::client::Ledger;

/// Per-address cursor state. `None` until seeded from the ledger.
#[derive(Debug, Default)]
struct Cursor {
    next: Option<u64>,
}

/// Issues strictly increasing, collision-free nonces per signing address.
#[derive(Default)]
pub struct NonceAllocator {
    /// Registry of per-address cursors. The outer lock is held only long
    /// enough to fetch or create an entry; reservations block on the
    /// inner per-address lock.
    cursors: StdMutex<HashMap<Address, Arc<Mutex<Cursor>>>>,
}

impl NonceAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cursors: StdMutex::new(HashMap::new()),
        }
    }

    /// Reserve the next nonce for `address`.
    ///
    /// Seeds the cursor from `pending_count` on first use, then performs
    /// an atomic increment-and-return under the per-address lock.
    ///
    /// # Errors
    /// Propagates ledger failures from the initial seed read.
    pub async fn reserve<L: Ledger>(&self, ledger: &L, address: Address) -> Result<u64> {
        let cursor = self.entry(address);
        let mut guard = cursor.lock().await;

        let next = match guard.next {
            Some(n) => n,
            None => {
                let seeded = ledger.pending_count(address).await?;
                tracing::debug!(address = %address.short(), seed = seeded, "nonce cursor seeded");
                seeded
            }
        };
        guard.next = Some(next + 1);
        Ok(next)
    }

    /// The next nonce this allocator would hand out, if the cursor has
    /// been seeded. Diagnostic only — never use this to build a draft.
    #[must_use]
    pub fn peek(&self, address: Address) -> Option<u64> {
        let cursors = self
            .cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cursors
            .get(&address)
            .and_then(|cursor| cursor.try_lock().ok().and_then(|c| c.next))
    }

    fn entry(&self, address: Address) -> Arc<Mutex<Cursor>> {
        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cursors.entry(address).or_insert_with(Arc::default))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use mandi_types::{MandiError, TxHash};

    use super::*;
    use crate::client::{SignedTx, TxReceipt, TxStatus};

    /// Ledger stub: only `pending_count` matters to the allocator.
    struct CountingLedger {
        start: u64,
    }

    impl Ledger for CountingLedger {
        async fn token_balance(&self, _address: Address) -> Result<u128> {
            Ok(0)
        }
        async fn escrow_balance(&self) -> Result<u128> {
            Ok(0)
        }
        async fn allowance(&self, _owner: Address, _spender: Address) -> Result<u128> {
            Ok(0)
        }
        async fn pending_count(&self, _address: Address) -> Result<u64> {
            Ok(self.start)
        }
        async fn submit(&self, _tx: SignedTx) -> Result<TxHash> {
            Err(MandiError::Internal("not used".into()))
        }
        async fn tx_status(&self, _tx: TxHash) -> Result<TxStatus> {
            Ok(TxStatus::Unknown)
        }
        async fn wait_for_confirmation(
            &self,
            _tx: TxHash,
            _timeout: Duration,
        ) -> Result<TxReceipt> {
            Err(MandiError::Internal("not used".into()))
        }
        fn escrow_address(&self) -> Address {
            Address([0u8; 20])
        }
    }

    #[tokio::test]
    async fn seeds_from_pending_count() {
        let ledger = CountingLedger { start: 7 };
        let alloc = NonceAllocator::new();
        let addr = Address([1u8; 20]);

        assert_eq!(alloc.reserve(&ledger, addr).await.unwrap(), 7);
        assert_eq!(alloc.reserve(&ledger, addr).await.unwrap(), 8);
        assert_eq!(alloc.peek(addr), Some(9));
    }

    #[tokio::test]
    async fn addresses_are_independent() {
        let ledger = CountingLedger { start: 0 };
        let alloc = NonceAllocator::new();

        assert_eq!(alloc.reserve(&ledger, Address([1u8; 20])).await.unwrap(), 0);
        assert_eq!(alloc.reserve(&ledger, Address([2u8; 20])).await.unwrap(), 0);
        assert_eq!(alloc.reserve(&ledger, Address([1u8; 20])).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reservations_are_contiguous() {
        const TASKS: u64 = 64;

        let ledger = Arc::new(CountingLedger { start: 3 });
        let alloc = Arc::new(NonceAllocator::new());
        let addr = Address([9u8; 20]);

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let ledger = Arc::clone(&ledger);
            let alloc = Arc::clone(&alloc);
            handles.push(tokio::spawn(async move {
                alloc.reserve(ledger.as_ref(), addr).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()), "duplicate nonce issued");
        }

        // Distinct, contiguous, no gaps: exactly [3, 3 + TASKS).
        for nonce in 3..3 + TASKS {
            assert!(seen.contains(&nonce), "gap at nonce {nonce}");
        }
    }

    #[tokio::test]
    async fn cursor_is_not_rolled_back_after_rejection() {
        let ledger = CountingLedger { start: 0 };
        let alloc = NonceAllocator::new();
        let addr = Address([5u8; 20]);

        let first = alloc.reserve(&ledger, addr).await.unwrap();
        // Simulate downstream rejection of `first`: the caller simply
        // reserves again, and the cursor has moved on regardless.
        let second = alloc.reserve(&ledger, addr).await.unwrap();
        assert_eq!(second, first + 1);
    }
}
