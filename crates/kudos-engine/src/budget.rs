//! Administrator award budgets.
//!
//! Every administrator has one budget period per calendar month, created on
//! first use with the engine's default policy. Awards are bracketed as
//! validate, award, record: `record` only runs once the award commits.

use std::sync::Arc;

use kudos_core::{AdminId, BudgetCheck, BudgetPeriod, BudgetPolicy, PeriodKey, Result};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::ensure_positive;

/// Monthly award limits per administrator.
pub struct BudgetGuard<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
    policy: BudgetPolicy,
}

impl<S: ?Sized> Clone for BudgetGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            policy: self.policy,
        }
    }
}

impl<S: Store + ?Sized> BudgetGuard<S> {
    /// Create a guard that opens new periods with `policy`.
    pub fn new(store: Arc<S>, locks: Arc<LockTable>, policy: BudgetPolicy) -> Self {
        Self {
            store,
            locks,
            policy,
        }
    }

    /// Policy applied to periods created on first use.
    #[must_use]
    pub fn default_policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// Check whether `admin_id` may award `points` more this month. Opens the
    /// month's period if needed.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` if the period is hard-limited and would overflow.
    /// - `InvalidAmount` unless `points` is positive.
    /// - `Conflict` if the budget lock is busy.
    pub fn validate(&self, admin_id: AdminId, points: i64) -> Result<BudgetCheck> {
        let _guard = self.locks.acquire([LockKey::Budget(admin_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let check = stage_validate(&mut txn, admin_id, PeriodKey::current(), self.policy, points)?;
        txn.commit()?;
        Ok(check)
    }

    /// Add `points` to this month's consumption.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `points` is positive.
    /// - `Conflict` if the budget lock is busy.
    pub fn record(&self, admin_id: AdminId, points: i64) -> Result<BudgetPeriod> {
        let _guard = self.locks.acquire([LockKey::Budget(admin_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let period = stage_record(&mut txn, admin_id, PeriodKey::current(), self.policy, points)?;
        txn.commit()?;

        tracing::info!(
            admin_id = %admin_id,
            period = %period.period,
            consumed = period.consumed,
            limit = period.limit,
            "Budget consumption recorded"
        );
        Ok(period)
    }

    /// Set the limits for one administrator and month, keeping whatever has
    /// already been consumed.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the policy is invalid or puts a hard limit below
    ///   current consumption.
    /// - `Conflict` if the budget lock is busy.
    pub fn configure_period(
        &self,
        admin_id: AdminId,
        period: PeriodKey,
        policy: BudgetPolicy,
    ) -> Result<BudgetPeriod> {
        policy.validate()?;

        let _guard = self.locks.acquire([LockKey::Budget(admin_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let budget = match txn.budget_period(&admin_id, &period)? {
            Some(mut existing) => {
                existing.reconfigure(policy)?;
                existing
            }
            None => BudgetPeriod::open(admin_id, period, policy),
        };
        txn.put_budget_period(budget.clone());
        txn.commit()?;

        tracing::info!(
            admin_id = %admin_id,
            period = %period,
            limit = policy.limit,
            is_hard = policy.is_hard,
            "Budget period configured"
        );
        Ok(budget)
    }

    /// This month's period, or a fresh one under the default policy if the
    /// administrator has not awarded anything yet.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn status(&self, admin_id: &AdminId) -> Result<BudgetPeriod> {
        let period = PeriodKey::current();
        Ok(self
            .store
            .get_budget_period(admin_id, &period)?
            .unwrap_or_else(|| BudgetPeriod::open(*admin_id, period, self.policy)))
    }
}

// =============================================================================
// Staged operations (caller holds the budget lock)
// =============================================================================

fn load_or_open<S: Store + ?Sized>(
    txn: &Txn<'_, S>,
    admin_id: AdminId,
    period: PeriodKey,
    policy: BudgetPolicy,
) -> Result<(BudgetPeriod, bool)> {
    Ok(match txn.budget_period(&admin_id, &period)? {
        Some(existing) => (existing, false),
        None => (BudgetPeriod::open(admin_id, period, policy), true),
    })
}

pub(crate) fn stage_validate<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    admin_id: AdminId,
    period: PeriodKey,
    policy: BudgetPolicy,
    points: i64,
) -> Result<BudgetCheck> {
    ensure_positive("award points", points)?;
    let (budget, created) = load_or_open(txn, admin_id, period, policy)?;

    let check = budget.check(points).map_err(|e| {
        tracing::warn!(
            admin_id = %admin_id,
            period = %period,
            consumed = budget.consumed,
            limit = budget.limit,
            points,
            error = %e,
            "Award rejected by budget"
        );
        e
    })?;

    if check.over_soft_limit {
        tracing::warn!(
            admin_id = %admin_id,
            period = %period,
            prospective = check.prospective_consumed,
            limit = check.limit,
            "Award exceeds soft budget limit"
        );
    } else if check.warning {
        tracing::warn!(
            admin_id = %admin_id,
            period = %period,
            prospective = check.prospective_consumed,
            limit = check.limit,
            "Award crosses budget warning threshold"
        );
    }

    if created {
        txn.put_budget_period(budget);
    }
    Ok(check)
}

pub(crate) fn stage_record<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    admin_id: AdminId,
    period: PeriodKey,
    policy: BudgetPolicy,
    points: i64,
) -> Result<BudgetPeriod> {
    ensure_positive("award points", points)?;
    let (mut budget, _) = load_or_open(txn, admin_id, period, policy)?;
    budget.record(points)?;
    txn.put_budget_period(budget.clone());
    Ok(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kudos_core::RewardsError;
    use kudos_store::MemoryStore;

    fn guard(policy: BudgetPolicy) -> BudgetGuard<MemoryStore> {
        BudgetGuard::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LockTable::default()),
            policy,
        )
    }

    fn policy(limit: i64, is_hard: bool) -> BudgetPolicy {
        BudgetPolicy {
            limit,
            is_hard,
            warn_threshold_pct: 80,
        }
    }

    #[test]
    fn validate_opens_period_lazily() {
        let guard = guard(policy(1000, true));
        let admin = AdminId::generate();

        let check = guard.validate(admin, 100).unwrap();
        assert_eq!(check.prospective_consumed, 100);
        assert!(!check.warning);
        assert_eq!(guard.status(&admin).unwrap().consumed, 0);
        assert_eq!(guard.status(&admin).unwrap().limit, 1000);
    }

    #[test]
    fn hard_limit_rejects_overflow() {
        let guard = guard(policy(1000, true));
        let admin = AdminId::generate();
        guard.record(admin, 900).unwrap();

        let err = guard.validate(admin, 101).unwrap_err();
        assert!(matches!(
            err,
            RewardsError::BudgetExceeded {
                consumed: 900,
                limit: 1000,
                requested: 101,
                ..
            }
        ));
        assert!(guard.validate(admin, 100).is_ok());
    }

    #[test]
    fn soft_limit_only_warns() {
        let guard = guard(policy(1000, false));
        let admin = AdminId::generate();
        guard.record(admin, 900).unwrap();

        let check = guard.validate(admin, 500).unwrap();
        assert!(check.warning);
        assert!(check.over_soft_limit);
    }

    #[test]
    fn warning_at_threshold() {
        let guard = guard(policy(1000, true));
        let admin = AdminId::generate();

        assert!(!guard.validate(admin, 799).unwrap().warning);
        assert!(guard.validate(admin, 800).unwrap().warning);
    }

    #[test]
    fn reconfigure_keeps_consumption() {
        let guard = guard(policy(1000, true));
        let admin = AdminId::generate();
        guard.record(admin, 600).unwrap();

        let period = PeriodKey::current();
        let updated = guard
            .configure_period(admin, period, policy(2000, true))
            .unwrap();
        assert_eq!(updated.consumed, 600);
        assert_eq!(updated.limit, 2000);

        assert!(matches!(
            guard.configure_period(admin, period, policy(500, true)),
            Err(RewardsError::InvalidAmount(_))
        ));
    }

    #[test]
    fn periods_are_per_admin() {
        let guard = guard(policy(100, true));
        let a = AdminId::generate();
        let b = AdminId::generate();
        guard.record(a, 100).unwrap();

        assert!(guard.validate(a, 1).is_err());
        assert!(guard.validate(b, 100).is_ok());
    }
}
