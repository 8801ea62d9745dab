//! Event award pools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};
use crate::{AccountId, EventId};

/// The fixed number of points an event may distribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardPool {
    /// The event.
    pub event_id: EventId,

    /// Points the event may distribute in total.
    pub total_pool: i64,

    /// Sum of all participant awards so far. Never exceeds `total_pool`.
    pub allocated: i64,

    /// When the pool was opened.
    pub created_at: DateTime<Utc>,

    /// When `allocated` last changed.
    pub updated_at: DateTime<Utc>,
}

impl AwardPool {
    /// Open a pool.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` unless `total_pool` is positive.
    pub fn new(event_id: EventId, total_pool: i64) -> Result<Self> {
        if total_pool <= 0 {
            return Err(RewardsError::InvalidAmount(format!(
                "award pool must be positive, got {total_pool}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            event_id,
            total_pool,
            allocated: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Points still available to award.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.total_pool - self.allocated
    }

    /// Fail unless `points` fit in the remaining pool.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::PoolExhausted` when they do not.
    pub fn ensure_fits(&self, points: i64) -> Result<()> {
        if points > self.remaining() {
            return Err(RewardsError::PoolExhausted {
                event_id: self.event_id.to_string(),
                remaining: self.remaining(),
                requested: points,
            });
        }
        Ok(())
    }

    /// Allocate `points` from the pool.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::PoolExhausted` and leaves the pool untouched if
    /// `allocated + points` would exceed `total_pool`.
    pub fn allocate(&mut self, points: i64) -> Result<()> {
        self.ensure_fits(points)?;
        self.allocated += points;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A participant's award from an event. Written once per (event, participant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAward {
    /// The event.
    pub event_id: EventId,

    /// The participant.
    pub user_id: AccountId,

    /// Points awarded.
    pub awarded_points: i64,

    /// Placement within the event.
    pub rank: u32,

    /// When the award was made.
    pub awarded_at: DateTime<Utc>,
}

impl ParticipantAward {
    /// Record an award made now.
    #[must_use]
    pub fn new(event_id: EventId, user_id: AccountId, awarded_points: i64, rank: u32) -> Self {
        Self {
            event_id,
            user_id,
            awarded_points,
            rank,
            awarded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_must_be_positive() {
        assert!(AwardPool::new(EventId::generate(), 0).is_err());
        assert!(AwardPool::new(EventId::generate(), -5).is_err());
    }

    #[test]
    fn allocate_until_exhausted() {
        let mut pool = AwardPool::new(EventId::generate(), 1000).unwrap();
        pool.allocate(600).unwrap();
        pool.allocate(400).unwrap();
        assert_eq!(pool.remaining(), 0);

        let err = pool.allocate(1).unwrap_err();
        assert!(matches!(
            err,
            RewardsError::PoolExhausted {
                remaining: 0,
                requested: 1,
                ..
            }
        ));
        assert_eq!(pool.allocated, 1000);
    }
}
