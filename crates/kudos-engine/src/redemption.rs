//! Redemption workflow.
//!
//! A redemption moves Pending → Approved → Delivered, or to Cancelled from
//! either open status. Creation reserves stock, debits the account and
//! writes the ticket as one unit of work under the account and product
//! locks; if the debit fails the staged reservation is discarded with the
//! rest. Cancellation releases the stock and refunds the points the same
//! way. Transitions take the ticket lock first so two admins cannot move the
//! same ticket at once.

use std::sync::Arc;

use chrono::Utc;

use kudos_core::{
    effective_price, AccountId, AdminId, Origin, ProductId, RedemptionTicket, Result,
    RewardsError, TicketId,
};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::collaborators::{Catalog, Directory};
use crate::ensure_positive;
use crate::inventory::{stage_confirm, stage_release, stage_reserve};
use crate::ledger::{stage_debit, stage_refund};

/// Redemption ticket lifecycle.
pub struct RedemptionWorkflow<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn Directory>,
    max_page: usize,
}

impl<S: ?Sized> Clone for RedemptionWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            catalog: Arc::clone(&self.catalog),
            directory: Arc::clone(&self.directory),
            max_page: self.max_page,
        }
    }
}

impl<S: Store + ?Sized> RedemptionWorkflow<S> {
    /// Create a workflow over `store`, pricing through `catalog` and checking
    /// account holders through `directory`.
    pub fn new(
        store: Arc<S>,
        locks: Arc<LockTable>,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn Directory>,
        max_page: usize,
    ) -> Self {
        Self {
            store,
            locks,
            catalog,
            directory,
            max_page,
        }
    }

    /// Redeem `qty` units of a product.
    ///
    /// The unit price is the catalog's most recent price already in effect.
    /// On success the account is debited, the units are reserved and a
    /// Pending ticket exists; on any failure none of that happened.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown product or account.
    /// - `AccountInactive` if the directory reports the holder inactive.
    /// - `PriceUnavailable` if no price is in effect yet.
    /// - `OutOfStock`, then `InsufficientBalance`, in that order.
    /// - `Conflict` if a lock is busy.
    pub fn create(
        &self,
        user_id: AccountId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<RedemptionTicket> {
        ensure_positive("quantity", qty)?;

        let product = self
            .catalog
            .product(&product_id)
            .filter(|p| p.active)
            .ok_or_else(|| RewardsError::not_found("product", product_id))?;
        let prices = self.catalog.prices(&product_id);
        let unit_cost = effective_price(&prices, Utc::now())
            .map(|p| p.points_price)
            .ok_or_else(|| RewardsError::PriceUnavailable(product_id.to_string()))?;
        let total_cost = unit_cost.checked_mul(qty).ok_or_else(|| {
            RewardsError::InvalidAmount(format!("{qty} x {unit_cost} points overflows"))
        })?;

        match self.directory.account_active(&user_id) {
            None => return Err(RewardsError::not_found("account", user_id)),
            Some(false) => return Err(RewardsError::AccountInactive(user_id.to_string())),
            Some(true) => {}
        }

        let ticket_id = TicketId::generate();
        let _guard = self
            .locks
            .acquire([LockKey::Account(user_id), LockKey::Product(product_id)])?;
        let mut txn = Txn::begin(&*self.store);

        stage_reserve(&mut txn, &product_id, qty)?;
        let entry = stage_debit(
            &mut txn,
            user_id,
            total_cost,
            Origin::redemption(ticket_id),
            format!("Redeemed {qty} x {}", product.name),
        )
        .map_err(|e| {
            tracing::warn!(
                user_id = %user_id,
                product_id = %product_id,
                total_cost,
                error = %e,
                "Redemption debit failed, reservation discarded"
            );
            e
        })?;

        let ticket = RedemptionTicket::pending(
            ticket_id,
            user_id,
            product_id,
            product.name,
            unit_cost,
            qty,
        );
        txn.put_ticket(ticket.clone());
        txn.commit()?;

        tracing::info!(
            ticket_id = %ticket.id,
            user_id = %user_id,
            product_id = %product_id,
            qty,
            total_cost,
            balance = entry.balance_after,
            "Redemption created"
        );
        Ok(ticket)
    }

    /// Approve a pending ticket.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the ticket is Pending.
    /// - `NotFound` for an unknown ticket.
    pub fn approve(&self, ticket_id: TicketId, approver: AdminId) -> Result<RedemptionTicket> {
        let _guard = self.locks.acquire([LockKey::Ticket(ticket_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let mut ticket = existing_ticket(&txn, &ticket_id)?;

        ticket.approve(approver)?;
        txn.put_ticket(ticket.clone());
        txn.commit()?;

        tracing::info!(ticket_id = %ticket_id, approver = %approver, "Redemption approved");
        Ok(ticket)
    }

    /// Deliver an approved ticket, consuming its reserved stock.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the ticket is Approved.
    /// - `NotFound` for an unknown ticket.
    pub fn deliver(&self, ticket_id: TicketId, processor: AdminId) -> Result<RedemptionTicket> {
        let product_id = self.get(&ticket_id)?.product_id;
        let _guard = self
            .locks
            .acquire([LockKey::Ticket(ticket_id), LockKey::Product(product_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let mut ticket = existing_ticket(&txn, &ticket_id)?;

        ticket.deliver(processor)?;
        stage_confirm(&mut txn, &ticket.product_id, ticket.quantity)?;
        txn.put_ticket(ticket.clone());
        txn.commit()?;

        tracing::info!(ticket_id = %ticket_id, processor = %processor, "Redemption delivered");
        Ok(ticket)
    }

    /// Cancel an open ticket, returning its stock and points.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the ticket is Delivered or already Cancelled.
    /// - `NotFound` for an unknown ticket.
    pub fn cancel(&self, ticket_id: TicketId, reason: impl Into<String>) -> Result<RedemptionTicket> {
        let snapshot = self.get(&ticket_id)?;
        let _guard = self.locks.acquire([
            LockKey::Ticket(ticket_id),
            LockKey::Account(snapshot.account_id),
            LockKey::Product(snapshot.product_id),
        ])?;
        let mut txn = Txn::begin(&*self.store);
        let mut ticket = existing_ticket(&txn, &ticket_id)?;

        ticket.cancel(reason.into())?;
        stage_release(&mut txn, &ticket.product_id, ticket.quantity)?;
        let entry = stage_refund(
            &mut txn,
            ticket.account_id,
            ticket.total_cost,
            Origin::redemption(ticket_id),
            format!("Refund for cancelled redemption of {}", ticket.product_name),
        )?;
        txn.put_ticket(ticket.clone());
        txn.commit()?;

        tracing::info!(
            ticket_id = %ticket_id,
            user_id = %ticket.account_id,
            refunded = ticket.total_cost,
            balance = entry.balance_after,
            "Redemption cancelled"
        );
        Ok(ticket)
    }

    /// Read a ticket.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ticket.
    pub fn get(&self, ticket_id: &TicketId) -> Result<RedemptionTicket> {
        self.store
            .get_ticket(ticket_id)?
            .ok_or_else(|| RewardsError::not_found("ticket", ticket_id))
    }

    /// An account's tickets, newest first. `limit` is capped at the
    /// configured page size.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn list_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionTicket>> {
        Ok(self
            .store
            .list_tickets_by_account(account_id, limit.min(self.max_page), offset)?)
    }
}

fn existing_ticket<S: Store + ?Sized>(
    txn: &Txn<'_, S>,
    ticket_id: &TicketId,
) -> Result<RedemptionTicket> {
    txn.ticket(ticket_id)?
        .ok_or_else(|| RewardsError::not_found("ticket", ticket_id))
}
