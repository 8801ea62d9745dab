//! Effective-dated product prices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// A points price that applies from `effective_from` until superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// The product.
    pub product_id: ProductId,

    /// Price per unit in points.
    pub points_price: i64,

    /// When this price takes effect.
    pub effective_from: DateTime<Utc>,
}

/// Display metadata for a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// The product.
    pub id: ProductId,

    /// Display name attached to tickets.
    pub name: String,

    /// Whether the product can currently be redeemed.
    pub active: bool,
}

/// Pick the most recent price with `effective_from <= at`.
///
/// Future-dated records are ignored. Ties on `effective_from` resolve to the
/// record listed last.
#[must_use]
pub fn effective_price(records: &[PriceRecord], at: DateTime<Utc>) -> Option<&PriceRecord> {
    records
        .iter()
        .filter(|r| r.effective_from <= at)
        .max_by_key(|r| r.effective_from)
}
