//! Product (stock unit) types.
//!
//! A product is a seller's listed lot of a commodity: a quantity in kg at
//! a fixed price per kg. The quantity field is mutated only inside the
//! stock ledger's reservation critical section.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ProductId, UserId};

/// The commodity category of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommodityKind {
    Seeds,
    Byproduct,
}

impl std::fmt::Display for CommodityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seeds => write!(f, "SEEDS"),
            Self::Byproduct => write!(f, "BYPRODUCT"),
        }
    }
}

/// Assessed quality grade of the lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    Good,
    Mid,
    Bad,
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Good => write!(f, "GOOD"),
            Self::Mid => write!(f, "MID"),
            Self::Bad => write!(f, "BAD"),
        }
    }
}

/// A listed stock unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// The selling user.
    pub owner: UserId,
    pub kind: CommodityKind,
    pub name: String,
    /// Quantity available, in kg. Invariant: never negative.
    pub quantity_kg: Decimal,
    /// Unit price in the marketplace's unit of account, per kg.
    pub price_per_kg: Decimal,
    /// Assessed quality grade.
    pub quality: QualityGrade,
    /// Sensor-derived quality score.
    pub score: f64,
    pub listed_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn new(
        owner: UserId,
        kind: CommodityKind,
        name: impl Into<String>,
        quantity_kg: Decimal,
        price_per_kg: Decimal,
    ) -> Self {
        Self {
            id: ProductId::new(),
            owner,
            kind,
            name: name.into(),
            quantity_kg,
            price_per_kg,
            quality: QualityGrade::Mid,
            score: 0.0,
            listed_at: Utc::now(),
        }
    }

    /// Whether any quantity remains for sale.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.quantity_kg > Decimal::ZERO
    }

    /// Price of the entire remaining lot.
    #[must_use]
    pub fn lot_price(&self) -> Decimal {
        self.quantity_kg * self.price_per_kg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot() -> Product {
        Product::new(
            UserId::new(),
            CommodityKind::Seeds,
            "groundnut",
            Decimal::new(100, 0),
            Decimal::new(10, 0),
        )
    }

    #[test]
    fn lot_price_is_quantity_times_unit_price() {
        let p = lot();
        assert_eq!(p.lot_price(), Decimal::new(1000, 0));
    }

    #[test]
    fn zero_quantity_is_out_of_stock() {
        let mut p = lot();
        assert!(p.is_in_stock());
        p.quantity_kg = Decimal::ZERO;
        assert!(!p.is_in_stock());
    }

    #[test]
    fn kind_and_quality_display() {
        assert_eq!(format!("{}", CommodityKind::Seeds), "SEEDS");
        assert_eq!(format!("{}", CommodityKind::Byproduct), "BYPRODUCT");
        assert_eq!(format!("{}", QualityGrade::Good), "GOOD");
    }

    #[test]
    fn product_serde_roundtrip() {
        let p = lot();
        let json = serde_json::to_string(&p).unwrap();
        let back: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(p.id, back.id);
        assert_eq!(p.quantity_kg, back.quantity_kg);
        assert_eq!(p.price_per_kg, back.price_per_kg);
    }
}
