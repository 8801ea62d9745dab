//! Budget-gated awards.
//!
//! Every award made by an administrator goes through the administrator's
//! monthly budget: validate, then award, then record consumption. All three
//! steps share one unit of work and the budget lock is held from validation
//! to commit, so concurrent awards by the same administrator cannot both
//! pass a stale check and nothing is recorded for an award that failed.

use std::sync::Arc;

use serde::Serialize;

use kudos_core::{
    AccountId, AdminId, BudgetCheck, BudgetPolicy, EventId, LedgerEntry, Origin, PeriodKey,
    Result,
};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::budget::{stage_record, stage_validate};
use crate::ledger::stage_credit;
use crate::pool::{bulk_total, log_award, stage_award, stage_bulk, AwardRequest, EventAward};

/// Outcome of a budget-gated award.
#[derive(Debug, Clone, Serialize)]
pub struct AwardReceipt {
    /// Event awards made (empty for ad-hoc awards).
    pub awards: Vec<EventAward>,
    /// Ad-hoc ledger credit, if this was an ad-hoc award.
    pub adhoc_entry: Option<LedgerEntry>,
    /// Budget state as validated before the award.
    pub budget: BudgetCheck,
}

impl AwardReceipt {
    /// Points awarded in total.
    #[must_use]
    pub fn total_points(&self) -> i64 {
        self.awards
            .iter()
            .map(|a| a.award.awarded_points)
            .chain(self.adhoc_entry.iter().map(|e| e.amount))
            .sum()
    }
}

/// Coordinates budgets, event pools and the ledger for administrator awards.
pub struct AwardOrchestrator<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
    policy: BudgetPolicy,
}

impl<S: ?Sized> Clone for AwardOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            policy: self.policy,
        }
    }
}

impl<S: Store + ?Sized> AwardOrchestrator<S> {
    /// Create an orchestrator; `policy` applies to budget periods opened on
    /// first use.
    pub fn new(store: Arc<S>, locks: Arc<LockTable>, policy: BudgetPolicy) -> Self {
        Self {
            store,
            locks,
            policy,
        }
    }

    /// Award an event winner from the event's pool, charged to `admin_id`'s
    /// budget.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` before the pool or ledger is touched.
    /// - `AlreadyAwarded`, `PoolExhausted` or `NotFound` from the pool.
    /// - `Conflict` if a lock is busy.
    pub fn award_event_winner(
        &self,
        admin_id: AdminId,
        event_id: EventId,
        user_id: AccountId,
        points: i64,
        rank: u32,
    ) -> Result<AwardReceipt> {
        let _guard = self.locks.acquire([
            LockKey::Budget(admin_id),
            LockKey::Event(event_id),
            LockKey::Account(user_id),
        ])?;
        let period = PeriodKey::current();
        let mut txn = Txn::begin(&*self.store);

        let budget = stage_validate(&mut txn, admin_id, period, self.policy, points)?;
        let award = stage_award(&mut txn, event_id, AwardRequest::new(user_id, points, rank))?;
        stage_record(&mut txn, admin_id, period, self.policy, points)?;
        txn.commit()?;

        log_award(&award);
        tracing::info!(admin_id = %admin_id, points, "Budget charged for event award");
        Ok(AwardReceipt {
            awards: vec![award],
            adhoc_entry: None,
            budget,
        })
    }

    /// Award several event participants, all or none. The budget is checked
    /// against the bulk total.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` for the total, before any award.
    /// - `PoolExhausted` if the pool cannot cover the total.
    /// - Any single-award error, for the first failing line.
    pub fn bulk_award_event(
        &self,
        admin_id: AdminId,
        event_id: EventId,
        requests: &[AwardRequest],
    ) -> Result<AwardReceipt> {
        let total = bulk_total(requests)?;

        let keys = [LockKey::Budget(admin_id), LockKey::Event(event_id)]
            .into_iter()
            .chain(requests.iter().map(|r| LockKey::Account(r.user_id)));
        let _guard = self.locks.acquire(keys)?;
        let period = PeriodKey::current();
        let mut txn = Txn::begin(&*self.store);

        let budget = stage_validate(&mut txn, admin_id, period, self.policy, total)?;
        let awards = stage_bulk(&mut txn, event_id, requests)?;
        stage_record(&mut txn, admin_id, period, self.policy, total)?;
        txn.commit()?;

        tracing::info!(
            admin_id = %admin_id,
            event_id = %event_id,
            count = awards.len(),
            total,
            "Bulk event award committed"
        );
        Ok(AwardReceipt {
            awards,
            adhoc_entry: None,
            budget,
        })
    }

    /// Award points outside any event.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` before the ledger is touched.
    /// - `InvalidAmount` unless `points` is positive.
    /// - `Conflict` if a lock is busy.
    pub fn award_adhoc(
        &self,
        admin_id: AdminId,
        user_id: AccountId,
        points: i64,
        reason: impl Into<String>,
    ) -> Result<AwardReceipt> {
        let _guard = self
            .locks
            .acquire([LockKey::Budget(admin_id), LockKey::Account(user_id)])?;
        let period = PeriodKey::current();
        let mut txn = Txn::begin(&*self.store);

        let budget = stage_validate(&mut txn, admin_id, period, self.policy, points)?;
        let entry = stage_credit(
            &mut txn,
            user_id,
            points,
            Origin::admin_award(admin_id),
            reason.into(),
        )?;
        stage_record(&mut txn, admin_id, period, self.policy, points)?;
        txn.commit()?;

        tracing::info!(
            admin_id = %admin_id,
            user_id = %user_id,
            points,
            balance = entry.balance_after,
            "Ad-hoc award committed"
        );
        Ok(AwardReceipt {
            awards: Vec::new(),
            adhoc_entry: Some(entry),
            budget,
        })
    }
}
