//! Monthly award budgets for administrators.
//!
//! Each administrator has at most one [`BudgetPeriod`] per calendar month.
//! Periods are created lazily from a [`BudgetPolicy`] on first use and their
//! `consumed` counter only grows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};
use crate::AdminId;

/// A calendar month, e.g. `2026-10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: u16,
    month: u8,
}

impl PeriodKey {
    /// Build a key.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` if `month` is not 1-12.
    pub fn new(year: u16, month: u8) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(RewardsError::InvalidAmount(format!("month {month} out of range")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: u16::try_from(at.year()).unwrap_or(u16::MAX),
            month: u8::try_from(at.month()).unwrap_or(1),
        }
    }

    /// The current month.
    #[must_use]
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// Year component.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Month component (1-12).
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Fixed-width byte encoding that sorts chronologically.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 3] {
        let [hi, lo] = self.year.to_be_bytes();
        [hi, lo, self.month]
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = RewardsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RewardsError::InvalidAmount(format!("invalid period key: {s}"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = RewardsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

/// Limits applied to a budget period when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    /// Points the administrator may award per month.
    pub limit: i64,

    /// Reject awards that would exceed `limit` (otherwise only warn).
    pub is_hard: bool,

    /// Warn once consumption crosses this share of `limit`, in percent.
    pub warn_threshold_pct: u8,
}

impl BudgetPolicy {
    /// Check the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` for a negative limit or a
    /// threshold above 100%.
    pub fn validate(&self) -> Result<()> {
        if self.limit < 0 {
            return Err(RewardsError::InvalidAmount(format!(
                "budget limit must not be negative, got {}",
                self.limit
            )));
        }
        if self.warn_threshold_pct > 100 {
            return Err(RewardsError::InvalidAmount(format!(
                "warn threshold must be at most 100%, got {}",
                self.warn_threshold_pct
            )));
        }
        Ok(())
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            limit: 10_000,
            is_hard: true,
            warn_threshold_pct: 80,
        }
    }
}

/// One administrator's consumption for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    /// The administrator.
    pub admin_id: AdminId,

    /// The month.
    pub period: PeriodKey,

    /// Points that may be awarded this month.
    pub limit: i64,

    /// Whether `limit` is enforced.
    pub is_hard: bool,

    /// Warning threshold, in percent of `limit`.
    pub warn_threshold_pct: u8,

    /// Points awarded so far. Only grows.
    pub consumed: i64,

    /// When the period was created.
    pub created_at: DateTime<Utc>,

    /// When the period last changed.
    pub updated_at: DateTime<Utc>,
}

impl BudgetPeriod {
    /// Open a period with nothing consumed.
    #[must_use]
    pub fn open(admin_id: AdminId, period: PeriodKey, policy: BudgetPolicy) -> Self {
        let now = Utc::now();
        Self {
            admin_id,
            period,
            limit: policy.limit,
            is_hard: policy.is_hard,
            warn_threshold_pct: policy.warn_threshold_pct,
            consumed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Points left before `limit` is reached (zero once exceeded).
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.limit.saturating_sub(self.consumed).max(0)
    }

    /// Consumption at which a warning is raised.
    #[must_use]
    pub fn warn_threshold(&self) -> i64 {
        let threshold = i128::from(self.limit) * i128::from(self.warn_threshold_pct) / 100;
        i64::try_from(threshold).unwrap_or(i64::MAX)
    }

    /// Decide whether awarding `points` more is allowed.
    ///
    /// # Errors
    ///
    /// - `RewardsError::BudgetExceeded` when the period is hard-limited and
    ///   `consumed + points` exceeds `limit`.
    /// - `RewardsError::InvalidAmount` if `consumed + points` overflows.
    pub fn check(&self, points: i64) -> Result<BudgetCheck> {
        let prospective = self.prospective(points)?;
        if self.is_hard && prospective > self.limit {
            return Err(RewardsError::BudgetExceeded {
                admin_id: self.admin_id.to_string(),
                consumed: self.consumed,
                limit: self.limit,
                requested: points,
            });
        }
        Ok(BudgetCheck {
            period: self.period,
            prospective_consumed: prospective,
            limit: self.limit,
            warning: prospective >= self.warn_threshold(),
            over_soft_limit: prospective > self.limit,
        })
    }

    /// Add `points` to consumption.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` and leaves the period untouched
    /// if consumption would overflow.
    pub fn record(&mut self, points: i64) -> Result<()> {
        self.consumed = self.prospective(points)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn prospective(&self, points: i64) -> Result<i64> {
        self.consumed.checked_add(points).ok_or_else(|| {
            RewardsError::InvalidAmount(format!(
                "{points} points on top of {} consumed overflows",
                self.consumed
            ))
        })
    }

    /// Replace the period's limits, keeping consumption.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` if the policy is invalid or would
    /// put a hard limit below what has already been consumed.
    pub fn reconfigure(&mut self, policy: BudgetPolicy) -> Result<()> {
        policy.validate()?;
        if policy.is_hard && policy.limit < self.consumed {
            return Err(RewardsError::InvalidAmount(format!(
                "hard limit {} is below consumed {}",
                policy.limit, self.consumed
            )));
        }
        self.limit = policy.limit;
        self.is_hard = policy.is_hard;
        self.warn_threshold_pct = policy.warn_threshold_pct;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Outcome of a successful budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCheck {
    /// The period checked.
    pub period: PeriodKey,

    /// Consumption if the award goes through.
    pub prospective_consumed: i64,

    /// The period limit.
    pub limit: i64,

    /// Prospective consumption crosses the warning threshold.
    pub warning: bool,

    /// Prospective consumption exceeds a soft limit.
    pub over_soft_limit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period(policy: BudgetPolicy) -> BudgetPeriod {
        BudgetPeriod::open(AdminId::generate(), PeriodKey::new(2026, 10).unwrap(), policy)
    }

    #[test]
    fn period_key_format_and_parse() {
        let at = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let key = PeriodKey::containing(at);
        assert_eq!(key.to_string(), "2026-03");
        assert_eq!("2026-03".parse::<PeriodKey>().unwrap(), key);
        assert!("2026-13".parse::<PeriodKey>().is_err());
        assert!("march".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn period_key_bytes_sort_chronologically() {
        let dec = PeriodKey::new(2025, 12).unwrap();
        let jan = PeriodKey::new(2026, 1).unwrap();
        assert!(dec.to_bytes() < jan.to_bytes());
    }

    #[test]
    fn hard_limit_rejects_overrun() {
        let mut p = period(BudgetPolicy {
            limit: 1000,
            is_hard: true,
            warn_threshold_pct: 80,
        });
        p.record(900).unwrap();
        assert!(p.check(100).is_ok());
        let err = p.check(101).unwrap_err();
        assert!(matches!(
            err,
            RewardsError::BudgetExceeded {
                consumed: 900,
                limit: 1000,
                requested: 101,
                ..
            }
        ));
    }

    #[test]
    fn soft_limit_only_warns() {
        let p = period(BudgetPolicy {
            limit: 1000,
            is_hard: false,
            warn_threshold_pct: 80,
        });
        let check = p.check(1500).unwrap();
        assert!(check.warning);
        assert!(check.over_soft_limit);
    }

    #[test]
    fn warning_threshold_is_inclusive() {
        let p = period(BudgetPolicy {
            limit: 1000,
            is_hard: true,
            warn_threshold_pct: 80,
        });
        assert!(!p.check(799).unwrap().warning);
        assert!(p.check(800).unwrap().warning);
    }

    #[test]
    fn reconfigure_keeps_consumption() {
        let mut p = period(BudgetPolicy::default());
        p.record(600).unwrap();
        let lowered = BudgetPolicy {
            limit: 500,
            is_hard: true,
            warn_threshold_pct: 80,
        };
        assert!(p.reconfigure(lowered).is_err());

        p.reconfigure(BudgetPolicy {
            limit: 2000,
            ..lowered
        })
        .unwrap();
        assert_eq!(p.limit, 2000);
        assert_eq!(p.consumed, 600);
    }

    #[test]
    fn overflowing_consumption_is_rejected() {
        let mut p = period(BudgetPolicy {
            limit: 100,
            is_hard: false,
            warn_threshold_pct: 80,
        });
        p.record(10).unwrap();

        assert!(matches!(
            p.check(i64::MAX),
            Err(RewardsError::InvalidAmount(_))
        ));
        assert!(matches!(
            p.record(i64::MAX),
            Err(RewardsError::InvalidAmount(_))
        ));
        assert_eq!(p.consumed, 10);
    }

    #[test]
    fn warn_threshold_of_huge_limit_does_not_overflow() {
        let p = period(BudgetPolicy {
            limit: i64::MAX,
            is_hard: true,
            warn_threshold_pct: 100,
        });
        assert_eq!(p.warn_threshold(), i64::MAX);
    }
}
