//! Inventory reservation.
//!
//! Holds stock for pending redemptions. `available` is what can still be
//! reserved; `reserved` is held for open tickets; `fulfilled` counts units
//! handed out. Reserve, release and fulfillment only move units between
//! those counters. Only `adjust` changes the total.

use std::sync::Arc;

use kudos_core::{InventoryRecord, ProductId, Result, RewardsError};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::ensure_positive;

/// Per-product stock counters.
pub struct InventoryReservation<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
}

impl<S: ?Sized> Clone for InventoryReservation<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: Store + ?Sized> InventoryReservation<S> {
    /// Create a reservation service over `store`.
    pub fn new(store: Arc<S>, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    /// Register a product with its opening stock.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the product is already stocked.
    /// - `InvalidAmount` for negative stock or reorder level.
    pub fn stock(
        &self,
        product_id: ProductId,
        available: i64,
        reorder_level: i64,
    ) -> Result<InventoryRecord> {
        if available < 0 || reorder_level < 0 {
            return Err(RewardsError::InvalidAmount(format!(
                "stock {available} and reorder level {reorder_level} must not be negative"
            )));
        }

        let _guard = self.locks.acquire([LockKey::Product(product_id)])?;
        if self.store.get_inventory(&product_id)?.is_some() {
            return Err(RewardsError::AlreadyExists {
                entity: "inventory",
                id: product_id.to_string(),
            });
        }

        let record = InventoryRecord::new(product_id, available, reorder_level);
        let mut txn = Txn::begin(&*self.store);
        txn.put_inventory(record.clone());
        txn.commit()?;

        tracing::info!(product_id = %product_id, available, reorder_level, "Product stocked");
        Ok(record)
    }

    /// Read a product's counters.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product was never stocked.
    pub fn get(&self, product_id: &ProductId) -> Result<InventoryRecord> {
        self.store
            .get_inventory(product_id)?
            .ok_or_else(|| RewardsError::not_found("product", product_id))
    }

    /// Hold `qty` units.
    ///
    /// # Errors
    ///
    /// - `OutOfStock` if fewer than `qty` units are available.
    /// - `NotFound` if the product was never stocked.
    /// - `InvalidAmount` unless `qty` is positive.
    pub fn reserve(&self, product_id: ProductId, qty: i64) -> Result<InventoryRecord> {
        self.update(product_id, |txn| stage_reserve(txn, &product_id, qty))
    }

    /// Return up to `qty` held units to `available`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product was never stocked.
    /// - `InvalidAmount` unless `qty` is positive.
    pub fn release(&self, product_id: ProductId, qty: i64) -> Result<InventoryRecord> {
        self.update(product_id, |txn| stage_release(txn, &product_id, qty))
    }

    /// Consume up to `qty` held units permanently.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product was never stocked.
    /// - `InvalidAmount` unless `qty` is positive.
    pub fn confirm_fulfillment(&self, product_id: ProductId, qty: i64) -> Result<InventoryRecord> {
        self.update(product_id, |txn| stage_confirm(txn, &product_id, qty))
    }

    /// Correct `available` by `delta`, outside the reserve/release pairing.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the correction would leave `available` negative.
    /// - `NotFound` if the product was never stocked.
    pub fn adjust(&self, product_id: ProductId, delta: i64) -> Result<InventoryRecord> {
        self.update(product_id, |txn| {
            let mut record = existing_record(txn, &product_id)?;
            record.adjust(delta)?;
            txn.put_inventory(record.clone());
            Ok(record)
        })
    }

    fn update(
        &self,
        product_id: ProductId,
        stage: impl FnOnce(&mut Txn<'_, S>) -> Result<InventoryRecord>,
    ) -> Result<InventoryRecord> {
        let _guard = self.locks.acquire([LockKey::Product(product_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let record = stage(&mut txn)?;
        txn.commit()?;

        tracing::debug!(
            product_id = %product_id,
            available = record.available,
            reserved = record.reserved,
            fulfilled = record.fulfilled,
            "Inventory updated"
        );
        if record.needs_reorder() {
            tracing::warn!(
                product_id = %product_id,
                available = record.available,
                reorder_level = record.reorder_level,
                "Product at or below reorder level"
            );
        }
        Ok(record)
    }
}

// =============================================================================
// Staged operations (caller holds the product lock)
// =============================================================================

pub(crate) fn stage_reserve<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    product_id: &ProductId,
    qty: i64,
) -> Result<InventoryRecord> {
    ensure_positive("quantity", qty)?;
    let mut record = existing_record(txn, product_id)?;
    record.reserve(qty)?;
    txn.put_inventory(record.clone());
    Ok(record)
}

pub(crate) fn stage_release<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    product_id: &ProductId,
    qty: i64,
) -> Result<InventoryRecord> {
    ensure_positive("quantity", qty)?;
    let mut record = existing_record(txn, product_id)?;
    let released = record.release(qty);
    if released < qty {
        tracing::warn!(product_id = %product_id, qty, released, "Released fewer units than requested");
    }
    txn.put_inventory(record.clone());
    Ok(record)
}

pub(crate) fn stage_confirm<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    product_id: &ProductId,
    qty: i64,
) -> Result<InventoryRecord> {
    ensure_positive("quantity", qty)?;
    let mut record = existing_record(txn, product_id)?;
    let consumed = record.confirm_fulfillment(qty);
    if consumed < qty {
        tracing::warn!(product_id = %product_id, qty, consumed, "Fulfilled fewer units than requested");
    }
    txn.put_inventory(record.clone());
    Ok(record)
}

fn existing_record<S: Store + ?Sized>(
    txn: &Txn<'_, S>,
    product_id: &ProductId,
) -> Result<InventoryRecord> {
    txn.inventory(product_id)?
        .ok_or_else(|| RewardsError::not_found("product", product_id))
}
