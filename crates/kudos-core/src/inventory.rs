//! Inventory counters for redeemable products.
//!
//! `available` is already net of live reservations, so it is the sellable
//! stock shown to participants. Reserve and release move units between
//! `available` and `reserved`; fulfillment moves them from `reserved` to
//! `fulfilled`. Only [`InventoryRecord::adjust`] changes the total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};
use crate::ProductId;

/// Stock counters for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// The product.
    pub product_id: ProductId,

    /// Units that can still be reserved.
    pub available: i64,

    /// Units held by pending or approved redemptions.
    pub reserved: i64,

    /// Units permanently consumed by delivered redemptions.
    pub fulfilled: i64,

    /// Restock threshold for `available`.
    pub reorder_level: i64,

    /// When the counters last changed.
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Create a record with `available` units and nothing reserved.
    #[must_use]
    pub fn new(product_id: ProductId, available: i64, reorder_level: i64) -> Self {
        Self {
            product_id,
            available,
            reserved: 0,
            fulfilled: 0,
            reorder_level,
            updated_at: Utc::now(),
        }
    }

    /// Hold `qty` units.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::OutOfStock` and leaves the record untouched if
    /// fewer than `qty` units are available.
    pub fn reserve(&mut self, qty: i64) -> Result<()> {
        if self.available < qty {
            return Err(RewardsError::OutOfStock {
                product_id: self.product_id.to_string(),
                available: self.available,
                requested: qty,
            });
        }
        self.available -= qty;
        self.reserved += qty;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Return up to `qty` reserved units to `available`. Returns the number
    /// of units actually released.
    pub fn release(&mut self, qty: i64) -> i64 {
        let released = qty.min(self.reserved).max(0);
        self.reserved -= released;
        self.available += released;
        self.updated_at = Utc::now();
        released
    }

    /// Permanently consume up to `qty` reserved units. Returns the number of
    /// units actually consumed.
    pub fn confirm_fulfillment(&mut self, qty: i64) -> i64 {
        let consumed = qty.min(self.reserved).max(0);
        self.reserved -= consumed;
        self.fulfilled += consumed;
        self.updated_at = Utc::now();
        consumed
    }

    /// Apply an administrative correction to `available`.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` if the correction would drive
    /// `available` below zero or push the unit total past `i64::MAX`.
    pub fn adjust(&mut self, delta: i64) -> Result<i64> {
        let next = self
            .available
            .checked_add(delta)
            .filter(|n| *n >= 0)
            .filter(|n| {
                n.checked_add(self.reserved)
                    .and_then(|t| t.checked_add(self.fulfilled))
                    .is_some()
            })
            .ok_or_else(|| {
                RewardsError::InvalidAmount(format!(
                    "adjustment {delta} would leave {} available",
                    self.available.saturating_add(delta)
                ))
            })?;
        self.available = next;
        self.updated_at = Utc::now();
        Ok(self.available)
    }

    /// Total units ever stocked, net of corrections.
    #[must_use]
    pub fn total_units(&self) -> i64 {
        self.available
            .saturating_add(self.reserved)
            .saturating_add(self.fulfilled)
    }

    /// Check if `available` is at or below the restock threshold.
    #[must_use]
    pub fn needs_reorder(&self) -> bool {
        self.available <= self.reorder_level
    }
}
