//! Stock ledger — atomic reservation of listed quantity.
//!
//! Each product row has its own lock, held for the whole check-and-
//! decrement: no other caller can observe the check and the write as
//! separate steps. A unit of stock is therefore sold to at most one
//! buyer, no matter how many requests race.
//!
//! Reservation failure leaves the row untouched; a successful
//! [`Reservation`] must either settle or be handed back via
//! [`StockLedger::release`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;

use mandi_types::{MandiError, Product, ProductId, Result, UserId};

/// A successful stock hold, snapshotting everything the settlement flow
/// needs to price and attribute the purchase.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub product_id: ProductId,
    pub seller: UserId,
    pub product_name: String,
    /// Quantity held, in kg.
    pub quantity_kg: Decimal,
    /// Unit price snapshotted at reservation time.
    pub price_per_kg: Decimal,
}

impl Reservation {
    /// Total price of the held quantity.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.quantity_kg * self.price_per_kg
    }
}

/// The product inventory. Quantity is mutated only inside the per-row
/// critical sections below.
#[derive(Default)]
pub struct StockLedger {
    rows: Mutex<HashMap<ProductId, Arc<Mutex<Product>>>>,
}

impl StockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// Add a listing. Rows are never removed — a sold-out product stays
    /// at quantity zero.
    pub fn insert(&self, product: Product) -> ProductId {
        let id = product.id;
        let mut rows = lock(&self.rows);
        rows.insert(id, Arc::new(Mutex::new(product)));
        id
    }

    /// Snapshot of a single product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<Product> {
        let row = {
            let rows = lock(&self.rows);
            rows.get(&product_id).cloned()
        }?;
        let product = lock(&row);
        Some(product.clone())
    }

    /// All listings with quantity remaining, for the market view.
    #[must_use]
    pub fn list_available(&self) -> Vec<Product> {
        let rows: Vec<_> = lock(&self.rows).values().cloned().collect();
        rows.iter()
            .filter_map(|row| {
                let product = lock(row);
                product.is_in_stock().then(|| product.clone())
            })
            .collect()
    }

    /// Reserve `quantity_kg` of a product.
    ///
    /// # Errors
    /// - `Validation` if the requested quantity is not positive
    /// - `ProductNotFound` for an unknown id
    /// - `OutOfStock` if remaining quantity is insufficient (no side
    ///   effects)
    pub fn reserve(&self, product_id: ProductId, quantity_kg: Decimal) -> Result<Reservation> {
        if quantity_kg <= Decimal::ZERO {
            return Err(MandiError::Validation {
                reason: format!("reservation quantity must be positive, got {quantity_kg}"),
            });
        }
        self.reserve_inner(product_id, Some(quantity_kg))
    }

    /// Reserve the entire remaining lot.
    ///
    /// # Errors
    /// `ProductNotFound` for an unknown id; `OutOfStock` if nothing
    /// remains.
    pub fn reserve_all(&self, product_id: ProductId) -> Result<Reservation> {
        self.reserve_inner(product_id, None)
    }

    /// Compensating action: hand a reservation back to the row.
    pub fn release(&self, reservation: Reservation) {
        let row = {
            let rows = lock(&self.rows);
            rows.get(&reservation.product_id).cloned()
        };
        match row {
            Some(row) => {
                let mut product = lock(&row);
                product.quantity_kg += reservation.quantity_kg;
                tracing::info!(
                    product_id = %reservation.product_id,
                    quantity_kg = %reservation.quantity_kg,
                    "stock reservation released"
                );
            }
            // Rows are never removed, so this is unreachable in practice.
            None => tracing::warn!(
                product_id = %reservation.product_id,
                quantity_kg = %reservation.quantity_kg,
                "released reservation for unknown product row"
            ),
        }
    }

    fn reserve_inner(
        &self,
        product_id: ProductId,
        quantity_kg: Option<Decimal>,
    ) -> Result<Reservation> {
        let row = {
            let rows = lock(&self.rows);
            rows.get(&product_id).cloned()
        }
        .ok_or(MandiError::ProductNotFound(product_id))?;

        // Critical section: check and decrement under the row lock.
        let mut product = lock(&row);
        let requested = quantity_kg.unwrap_or(product.quantity_kg);
        if requested <= Decimal::ZERO || product.quantity_kg < requested {
            return Err(MandiError::OutOfStock {
                product_id,
                available: product.quantity_kg,
                requested,
            });
        }
        product.quantity_kg -= requested;

        Ok(Reservation {
            product_id,
            seller: product.owner,
            product_name: product.name.clone(),
            quantity_kg: requested,
            price_per_kg: product.price_per_kg,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
