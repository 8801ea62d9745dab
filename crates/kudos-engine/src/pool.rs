//! Event award pools.
//!
//! Each event has a fixed pool of points to distribute among participants.
//! An award allocates from the pool, records the participant's award and
//! credits their account in one commit, holding the event lock and the
//! participant's account lock. A participant is awarded at most once per
//! event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kudos_core::{
    AccountId, AwardPool, EventId, LedgerEntry, Origin, ParticipantAward, Result, RewardsError,
};
use kudos_store::{LockKey, LockTable, Store, Txn};

use crate::ensure_positive;
use crate::ledger::stage_credit;

/// One line of a bulk award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRequest {
    /// The participant.
    pub user_id: AccountId,
    /// Points to award.
    pub points: i64,
    /// Finishing position.
    pub rank: u32,
}

impl AwardRequest {
    /// Build a request.
    #[must_use]
    pub const fn new(user_id: AccountId, points: i64, rank: u32) -> Self {
        Self {
            user_id,
            points,
            rank,
        }
    }
}

/// A committed event award and the ledger entry that paid it.
#[derive(Debug, Clone, Serialize)]
pub struct EventAward {
    /// The participant's award record.
    pub award: ParticipantAward,
    /// The credit to the participant's account.
    pub entry: LedgerEntry,
}

/// Allocator for per-event award pools.
pub struct EventAwardPool<S: ?Sized> {
    store: Arc<S>,
    locks: Arc<LockTable>,
}

impl<S: ?Sized> Clone for EventAwardPool<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: Store + ?Sized> EventAwardPool<S> {
    /// Create an allocator over `store`.
    pub fn new(store: Arc<S>, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    /// Open an event's pool.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `total_pool` is positive.
    /// - `AlreadyExists` if the event already has a pool.
    pub fn open_pool(&self, event_id: EventId, total_pool: i64) -> Result<AwardPool> {
        let pool = AwardPool::new(event_id, total_pool)?;

        let _guard = self.locks.acquire([LockKey::Event(event_id)])?;
        if self.store.get_pool(&event_id)?.is_some() {
            return Err(RewardsError::AlreadyExists {
                entity: "award pool",
                id: event_id.to_string(),
            });
        }

        let mut txn = Txn::begin(&*self.store);
        txn.put_pool(pool.clone());
        txn.commit()?;

        tracing::info!(event_id = %event_id, total_pool, "Award pool opened");
        Ok(pool)
    }

    /// Read an event's pool.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event has no pool.
    pub fn pool(&self, event_id: &EventId) -> Result<AwardPool> {
        self.store
            .get_pool(event_id)?
            .ok_or_else(|| RewardsError::not_found("event", event_id))
    }

    /// Points not yet allocated.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event has no pool.
    pub fn remaining_pool(&self, event_id: &EventId) -> Result<i64> {
        Ok(self.pool(event_id)?.remaining())
    }

    /// Every award made from an event's pool, by rank.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event has no pool.
    pub fn awards(&self, event_id: &EventId) -> Result<Vec<ParticipantAward>> {
        self.pool(event_id)?;
        let mut awards = self.store.list_participant_awards(event_id)?;
        awards.sort_by_key(|a| (a.rank, a.awarded_at));
        Ok(awards)
    }

    /// Award `points` to one participant.
    ///
    /// # Errors
    ///
    /// - `AlreadyAwarded` if the participant already holds an award.
    /// - `PoolExhausted` if the pool cannot cover `points`.
    /// - `NotFound` if the event has no pool.
    /// - `Conflict` if a lock is busy.
    pub fn award(
        &self,
        event_id: EventId,
        user_id: AccountId,
        points: i64,
        rank: u32,
    ) -> Result<EventAward> {
        let _guard = self
            .locks
            .acquire([LockKey::Event(event_id), LockKey::Account(user_id)])?;
        let mut txn = Txn::begin(&*self.store);
        let award = stage_award(&mut txn, event_id, AwardRequest::new(user_id, points, rank))?;
        txn.commit()?;

        log_award(&award);
        Ok(award)
    }

    /// Award several participants, all or none.
    ///
    /// # Errors
    ///
    /// - `PoolExhausted` if the pool cannot cover the total.
    /// - Any error a single award can return, for the first failing line.
    pub fn bulk_award(&self, event_id: EventId, requests: &[AwardRequest]) -> Result<Vec<EventAward>> {
        let total = bulk_total(requests)?;
        self.pool(&event_id)?.ensure_fits(total)?;

        let keys = std::iter::once(LockKey::Event(event_id))
            .chain(requests.iter().map(|r| LockKey::Account(r.user_id)));
        let _guard = self.locks.acquire(keys)?;

        let mut txn = Txn::begin(&*self.store);
        let awards = stage_bulk(&mut txn, event_id, requests)?;
        txn.commit()?;

        tracing::info!(event_id = %event_id, count = awards.len(), total, "Bulk award committed");
        for award in &awards {
            log_award(award);
        }
        Ok(awards)
    }
}

pub(crate) fn log_award(award: &EventAward) {
    tracing::info!(
        event_id = %award.award.event_id,
        user_id = %award.award.user_id,
        points = award.award.awarded_points,
        rank = award.award.rank,
        balance = award.entry.balance_after,
        "Event award committed"
    );
}

/// Sum of a bulk request's points.
pub(crate) fn bulk_total(requests: &[AwardRequest]) -> Result<i64> {
    if requests.is_empty() {
        return Err(RewardsError::InvalidAmount("bulk award has no lines".into()));
    }
    requests.iter().try_fold(0_i64, |sum, r| {
        ensure_positive("award points", r.points)?;
        sum.checked_add(r.points)
            .ok_or_else(|| RewardsError::InvalidAmount("bulk award total overflows".into()))
    })
}

// =============================================================================
// Staged operations (caller holds the event lock and participant locks)
// =============================================================================

pub(crate) fn stage_award<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    event_id: EventId,
    request: AwardRequest,
) -> Result<EventAward> {
    let AwardRequest {
        user_id,
        points,
        rank,
    } = request;
    ensure_positive("award points", points)?;

    let mut pool = txn
        .pool(&event_id)?
        .ok_or_else(|| RewardsError::not_found("event", event_id))?;
    if txn.participant_award(&event_id, &user_id)?.is_some() {
        return Err(RewardsError::AlreadyAwarded {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
        });
    }
    pool.allocate(points)?;

    let award = ParticipantAward::new(event_id, user_id, points, rank);
    txn.put_pool(pool);
    txn.insert_participant_award(award.clone())?;
    let entry = stage_credit(
        txn,
        user_id,
        points,
        Origin::event(event_id),
        format!("Event award, rank {rank}"),
    )?;

    Ok(EventAward { award, entry })
}

/// Total is pre-checked by the caller; each line is re-checked against the
/// staged pool as it is applied.
pub(crate) fn stage_bulk<S: Store + ?Sized>(
    txn: &mut Txn<'_, S>,
    event_id: EventId,
    requests: &[AwardRequest],
) -> Result<Vec<EventAward>> {
    let total = bulk_total(requests)?;
    txn.pool(&event_id)?
        .ok_or_else(|| RewardsError::not_found("event", event_id))?
        .ensure_fits(total)?;

    requests
        .iter()
        .map(|request| stage_award(txn, event_id, *request))
        .collect()
}
