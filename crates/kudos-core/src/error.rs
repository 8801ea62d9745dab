//! Error types for kudos.

use serde::{Deserialize, Serialize};

use crate::ids::IdError;

/// Result type for kudos operations.
pub type Result<T> = std::result::Result<T, RewardsError>;

/// Errors that can occur in kudos operations.
#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    /// A referenced account, product, event, ticket or period does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// The account cannot cover a debit.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in points.
        balance: i64,
        /// Points the operation needed.
        required: i64,
    },

    /// The product cannot cover a reservation.
    #[error("out of stock: product={product_id}, available={available}, requested={requested}")]
    OutOfStock {
        /// The product that ran out.
        product_id: String,
        /// Units currently available.
        available: i64,
        /// Units the operation asked for.
        requested: i64,
    },

    /// The event's award pool cannot cover an award.
    #[error("pool exhausted: event={event_id}, remaining={remaining}, requested={requested}")]
    PoolExhausted {
        /// The event whose pool is exhausted.
        event_id: String,
        /// Points still unallocated.
        remaining: i64,
        /// Points the operation asked for.
        requested: i64,
    },

    /// A hard-limited budget period cannot cover an award.
    #[error(
        "budget exceeded: admin={admin_id}, consumed={consumed}, limit={limit}, requested={requested}"
    )]
    BudgetExceeded {
        /// The administrator whose budget is exhausted.
        admin_id: String,
        /// Points already consumed this period.
        consumed: i64,
        /// The period limit.
        limit: i64,
        /// Points the operation asked for.
        requested: i64,
    },

    /// A redemption transition was attempted from a disallowed status.
    #[error("cannot {action} ticket {ticket_id} in status {status}")]
    InvalidState {
        /// The ticket the transition was attempted on.
        ticket_id: String,
        /// The status the ticket is currently in.
        status: String,
        /// The rejected transition.
        action: &'static str,
    },

    /// The participant already holds an award for this event.
    #[error("already awarded: event={event_id}, user={user_id}")]
    AlreadyAwarded {
        /// The event.
        event_id: String,
        /// The participant.
        user_id: String,
    },

    /// A record that may only be created once already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// The kind of record.
        entity: &'static str,
        /// The record id.
        id: String,
    },

    /// A concurrent mutation held the resource; nothing was written.
    #[error("conflict on {resource}, retry")]
    Conflict {
        /// The contended resource.
        resource: String,
    },

    /// The account exists but is not active.
    #[error("account inactive: {0}")]
    AccountInactive(String),

    /// No effective price exists for the product at the requested time.
    #[error("no effective price for product {0}")]
    PriceUnavailable(String),

    /// Invalid amount or quantity.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse outcome classification handed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Debit rejected.
    InsufficientBalance,
    /// Reservation rejected.
    OutOfStock,
    /// Award rejected by the event pool.
    PoolExhausted,
    /// Award rejected by a hard budget.
    BudgetExceeded,
    /// Transition from a disallowed status.
    InvalidState,
    /// Referenced entity missing.
    NotFound,
    /// Resource contention or duplicate record.
    Conflict,
    /// Caller supplied bad input.
    Invalid,
    /// Storage or configuration failure.
    Internal,
}

impl RewardsError {
    /// Build a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify this error into an outcome kind.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::InsufficientBalance { .. } => OutcomeKind::InsufficientBalance,
            Self::OutOfStock { .. } => OutcomeKind::OutOfStock,
            Self::PoolExhausted { .. } => OutcomeKind::PoolExhausted,
            Self::BudgetExceeded { .. } => OutcomeKind::BudgetExceeded,
            Self::InvalidState { .. } | Self::AccountInactive(_) => OutcomeKind::InvalidState,
            Self::NotFound { .. } | Self::PriceUnavailable(_) => OutcomeKind::NotFound,
            Self::AlreadyAwarded { .. } | Self::AlreadyExists { .. } | Self::Conflict { .. } => {
                OutcomeKind::Conflict
            }
            Self::InvalidAmount(_) | Self::InvalidId(_) => OutcomeKind::Invalid,
            Self::Storage(_) | Self::Serialization(_) | Self::Configuration(_) => {
                OutcomeKind::Internal
            }
        }
    }

    /// Whether retrying the same call immediately can succeed.
    ///
    /// Only lock-layer conflicts qualify: they are raised before anything is
    /// staged, so no partial write exists.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_kinds() {
        assert_eq!(
            RewardsError::InsufficientBalance {
                balance: 1,
                required: 2
            }
            .kind(),
            OutcomeKind::InsufficientBalance
        );
        assert_eq!(
            RewardsError::not_found("ticket", "t1").kind(),
            OutcomeKind::NotFound
        );
        assert_eq!(
            RewardsError::AlreadyAwarded {
                event_id: "e".into(),
                user_id: "u".into()
            }
            .kind(),
            OutcomeKind::Conflict
        );
        assert_eq!(
            RewardsError::Storage("disk".into()).kind(),
            OutcomeKind::Internal
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(RewardsError::Conflict {
            resource: "account:x".into()
        }
        .is_retryable());
        assert!(!RewardsError::AlreadyAwarded {
            event_id: "e".into(),
            user_id: "u".into()
        }
        .is_retryable());
        let exists = RewardsError::AlreadyExists {
            entity: "award pool",
            id: "e".into(),
        };
        assert_eq!(exists.kind(), OutcomeKind::Conflict);
        assert!(!exists.is_retryable());
        assert!(!RewardsError::InvalidAmount("0".into()).is_retryable());
    }

    #[test]
    fn invalid_state_names_status() {
        let err = RewardsError::InvalidState {
            ticket_id: "t1".into(),
            status: "delivered".into(),
            action: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel ticket t1 in status delivered");
    }
}
