//! Points ledger.
//!
//! Owns account balances and the append-only entry log. Every balance change
//! writes the new account state and exactly one entry in the same commit,
//! under the account's lock.
//!
//! Credits provision unknown accounts on the fly; debits and refunds require
//! the account to exist.

use std::sync::Arc;

use serde::Serialize;

use kudos_core::{
    Account, AccountId, EntryId, EntryKind, LedgerEntry, Origin, Result, RewardsError,
};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::ensure_positive;

/// Balance bookkeeping for participant accounts.
pub struct PointsLedger<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
    max_page: usize,
}

impl<S: ?Sized> Clone for PointsLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            max_page: self.max_page,
        }
    }
}

impl<S: Store + ?Sized> PointsLedger<S> {
    /// Create a ledger over `store`, serialized through `locks`.
    pub fn new(store: Arc<S>, locks: Arc<LockTable>, max_page: usize) -> Self {
        Self {
            store,
            locks,
            max_page,
        }
    }

    /// Provision a zero-balance account. Opening an existing account returns
    /// it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the account lock is busy, or a storage error.
    pub fn open_account(&self, account_id: AccountId) -> Result<Account> {
        let _guard = self.locks.acquire([LockKey::Account(account_id)])?;
        if let Some(existing) = self.store.get_account(&account_id)? {
            return Ok(existing);
        }

        let account = Account::new(account_id);
        let mut txn = Txn::begin(&*self.store);
        txn.put_account(account.clone());
        txn.commit()?;

        tracing::info!(account_id = %account_id, "Account opened");
        Ok(account)
    }

    /// Add points, creating the account if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount` is positive.
    /// - `Conflict` if the account lock is busy.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: i64,
        origin: Origin,
        description: impl Into<String>,
    ) -> Result<LedgerEntry> {
        self.post(account_id, |txn| {
            stage_credit(txn, account_id, amount, origin, description.into())
        })
    }

    /// Remove points.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the account does not exist.
    /// - `InsufficientBalance` if the balance is below `amount`; nothing is
    ///   written.
    /// - `InvalidAmount` unless `amount` is positive.
    /// - `Conflict` if the account lock is busy.
    pub fn debit(
        &self,
        account_id: AccountId,
        amount: i64,
        origin: Origin,
        description: impl Into<String>,
    ) -> Result<LedgerEntry> {
        self.post(account_id, |txn| {
            stage_debit(txn, account_id, amount, origin, description.into())
        })
    }

    /// Return points taken by an earlier debit.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the account does not exist.
    /// - `InvalidAmount` unless `amount` is positive.
    /// - `Conflict` if the account lock is busy.
    pub fn refund(
        &self,
        account_id: AccountId,
        amount: i64,
        origin: Origin,
        description: impl Into<String>,
    ) -> Result<LedgerEntry> {
        self.post(account_id, |txn| {
            stage_refund(txn, account_id, amount, origin, description.into())
        })
    }

    fn post(
        &self,
        account_id: AccountId,
        stage: impl FnOnce(&mut Txn<'_, S>) -> Result<LedgerEntry>,
    ) -> Result<LedgerEntry> {
        let _guard = self.locks.acquire([LockKey::Account(account_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let entry = stage(&mut txn)?;
        txn.commit()?;

        tracing::info!(
            account_id = %account_id,
            entry_id = %entry.id,
            amount = entry.amount,
            balance = entry.balance_after,
            origin = %entry.origin,
            "Ledger entry posted"
        );
        Ok(entry)
    }

    /// Read an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub fn account(&self, account_id: &AccountId) -> Result<Account> {
        self.store
            .get_account(account_id)?
            .ok_or_else(|| RewardsError::not_found("account", account_id))
    }

    /// Current balance of an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub fn balance(&self, account_id: &AccountId) -> Result<i64> {
        Ok(self.account(account_id)?.current_balance)
    }

    /// An account's entries, newest first. `limit` is capped at the
    /// configured page size.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub fn history(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.account(account_id)?;
        Ok(self
            .store
            .list_entries_by_account(account_id, limit.min(self.max_page), offset)?)
    }

    /// Replay an account's full entry log and compare it with the stored
    /// balance and totals.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist, or `Conflict` if the
    /// account lock is busy.
    pub fn verify(&self, account_id: &AccountId) -> Result<LedgerAudit> {
        let _guard = self.locks.acquire([LockKey::Account(*account_id)])?;
        let account = self.account(account_id)?;

        let mut entries = self
            .store
            .list_entries_by_account(account_id, usize::MAX, 0)?;
        entries.reverse();

        let mut audit = LedgerAudit {
            account_id: *account_id,
            entry_count: entries.len(),
            replayed_balance: 0,
            replayed_earned: 0,
            replayed_redeemed: 0,
            broken_snapshots: Vec::new(),
            stored: account,
        };
        for entry in &entries {
            match entry.kind {
                EntryKind::Earned | EntryKind::Refunded => {
                    audit.replayed_earned = audit.replayed_earned.saturating_add(entry.amount);
                }
                EntryKind::Redeemed => {
                    audit.replayed_redeemed = audit.replayed_redeemed.saturating_sub(entry.amount);
                }
            }
            audit.replayed_balance = audit.replayed_balance.saturating_add(entry.amount);
            if entry.balance_after != audit.replayed_balance {
                audit.broken_snapshots.push(entry.id);
            }
        }

        if !audit.is_consistent() {
            tracing::warn!(
                account_id = %account_id,
                stored = audit.stored.current_balance,
                replayed = audit.replayed_balance,
                broken = audit.broken_snapshots.len(),
                "Ledger does not match account"
            );
        }
        Ok(audit)
    }
}

/// Result of replaying an account's ledger.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerAudit {
    /// The account audited.
    pub account_id: AccountId,
    /// Number of entries replayed.
    pub entry_count: usize,
    /// Sum of every entry's amount.
    pub replayed_balance: i64,
    /// Sum of earned and refunded amounts.
    pub replayed_earned: i64,
    /// Sum of redeemed amounts, as a positive number.
    pub replayed_redeemed: i64,
    /// Entries whose `balance_after` disagrees with the running total.
    pub broken_snapshots: Vec<EntryId>,
    /// The account as stored.
    pub stored: Account,
}

impl LedgerAudit {
    /// Check that the log and the stored account agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.broken_snapshots.is_empty()
            && self.stored.is_consistent()
            && self.replayed_balance == self.stored.current_balance
            && self.replayed_earned == self.stored.total_earned
            && self.replayed_redeemed == self.stored.total_redeemed
    }
}

// =============================================================================
// Staged operations
//
// These run inside a caller's unit of work. The caller holds the account lock.
// =============================================================================

pub(crate) fn stage_credit<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    account_id: AccountId,
    amount: i64,
    origin: Origin,
    description: String,
) -> Result<LedgerEntry> {
    ensure_positive("credit amount", amount)?;
    let mut account = txn
        .account(&account_id)?
        .unwrap_or_else(|| Account::new(account_id));
    let balance = account.apply_credit(amount)?;

    let entry = LedgerEntry::earned(account_id, amount, balance, origin, description);
    txn.put_account(account);
    txn.append_entry(entry.clone());
    Ok(entry)
}

pub(crate) fn stage_debit<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    account_id: AccountId,
    amount: i64,
    origin: Origin,
    description: String,
) -> Result<LedgerEntry> {
    ensure_positive("debit amount", amount)?;
    let mut account = existing_account(txn, &account_id)?;
    let balance = account.apply_debit(amount)?;

    let entry = LedgerEntry::redeemed(account_id, amount, balance, origin, description);
    txn.put_account(account);
    txn.append_entry(entry.clone());
    Ok(entry)
}

pub(crate) fn stage_refund<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    account_id: AccountId,
    amount: i64,
    origin: Origin,
    description: String,
) -> Result<LedgerEntry> {
    ensure_positive("refund amount", amount)?;
    let mut account = existing_account(txn, &account_id)?;
    let balance = account.apply_credit(amount)?;

    let entry = LedgerEntry::refunded(account_id, amount, balance, origin, description);
    txn.put_account(account);
    txn.append_entry(entry.clone());
    Ok(entry)
}

fn existing_account<S: Store + ?Sized>(
    txn: &Txn<'_, S>,
    account_id: &AccountId,
) -> Result<Account> {
    txn.account(account_id)?
        .ok_or_else(|| RewardsError::not_found("account", account_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kudos_core::{AdminId, EventId};
    use kudos_store::MemoryStore;

    fn ledger() -> PointsLedger<MemoryStore> {
        PointsLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LockTable::default()),
            100,
        )
    }

    #[test]
    fn credit_provisions_account() {
        let ledger = ledger();
        let id = AccountId::generate();

        let entry = ledger
            .credit(id, 250, Origin::event(EventId::generate()), "Hackathon")
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Earned);
        assert_eq!(entry.balance_after, 250);
        assert_eq!(ledger.balance(&id).unwrap(), 250);
    }

    #[test]
    fn debit_requires_existing_account() {
        let ledger = ledger();
        let err = ledger
            .debit(AccountId::generate(), 10, Origin::adjustment("test"), "x")
            .unwrap_err();
        assert!(matches!(err, RewardsError::NotFound { entity: "account", .. }));
    }

    #[test]
    fn overdraft_leaves_account_untouched() {
        let ledger = ledger();
        let id = AccountId::generate();
        ledger
            .credit(id, 100, Origin::admin_award(AdminId::generate()), "Thanks")
            .unwrap();

        let err = ledger
            .debit(id, 150, Origin::adjustment("test"), "Too much")
            .unwrap_err();
        assert!(matches!(
            err,
            RewardsError::InsufficientBalance {
                balance: 100,
                required: 150
            }
        ));
        assert_eq!(ledger.balance(&id).unwrap(), 100);
        assert_eq!(ledger.history(&id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn refund_counts_as_earned() {
        let ledger = ledger();
        let id = AccountId::generate();
        ledger.credit(id, 500, Origin::adjustment("seed"), "Seed").unwrap();
        ledger.debit(id, 200, Origin::adjustment("spend"), "Spend").unwrap();
        let entry = ledger
            .refund(id, 200, Origin::adjustment("undo"), "Undo")
            .unwrap();

        assert_eq!(entry.kind, EntryKind::Refunded);
        assert_eq!(entry.balance_after, 500);
        let account = ledger.account(&id).unwrap();
        assert_eq!(account.total_earned, 700);
        assert_eq!(account.total_redeemed, 200);
        assert!(account.is_consistent());
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let ledger = ledger();
        let id = AccountId::generate();
        assert!(matches!(
            ledger.credit(id, 0, Origin::adjustment("x"), "x"),
            Err(RewardsError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.credit(id, -5, Origin::adjustment("x"), "x"),
            Err(RewardsError::InvalidAmount(_))
        ));
    }

    #[test]
    fn history_is_capped_and_newest_first() {
        let ledger = PointsLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LockTable::default()),
            2,
        );
        let id = AccountId::generate();
        for amount in [10, 20, 30] {
            ledger.credit(id, amount, Origin::adjustment("x"), "x").unwrap();
        }

        let page = ledger.history(&id, 50, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].amount, 30);
        assert_eq!(page[1].amount, 20);
    }

    #[test]
    fn open_account_is_idempotent() {
        let ledger = ledger();
        let id = AccountId::generate();
        ledger.open_account(id).unwrap();
        ledger.credit(id, 40, Origin::adjustment("x"), "x").unwrap();

        let reopened = ledger.open_account(id).unwrap();
        assert_eq!(reopened.current_balance, 40);
    }

    #[test]
    fn verify_replays_history() {
        let ledger = ledger();
        let id = AccountId::generate();
        ledger.credit(id, 300, Origin::adjustment("a"), "a").unwrap();
        ledger.debit(id, 120, Origin::adjustment("b"), "b").unwrap();
        ledger.refund(id, 20, Origin::adjustment("c"), "c").unwrap();

        let audit = ledger.verify(&id).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.entry_count, 3);
        assert_eq!(audit.replayed_balance, 200);
        assert_eq!(audit.replayed_earned, 320);
        assert_eq!(audit.replayed_redeemed, 120);
    }
}
