//! Ledger entry types for kudos.
//!
//! Every change to an account's balance appends one immutable entry. Entry ids
//! are ULIDs, so an account's history sorts chronologically by id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, AdminId, EntryId, EventId, TicketId};

/// An immutable record of one balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id (ULID for time-ordering).
    pub id: EntryId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// Direction of the change.
    pub kind: EntryKind,

    /// What caused the change.
    pub origin: Origin,

    /// Balance immediately after this entry was applied.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry for points earned from an event or award.
    #[must_use]
    pub fn earned(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        origin: Origin,
        description: String,
    ) -> Self {
        Self::build(account_id, amount.abs(), EntryKind::Earned, origin, balance_after, description)
    }

    /// Create an entry for points spent on a redemption. The stored amount is
    /// always negative.
    #[must_use]
    pub fn redeemed(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        origin: Origin,
        description: String,
    ) -> Self {
        Self::build(account_id, -amount.abs(), EntryKind::Redeemed, origin, balance_after, description)
    }

    /// Create an entry for points returned by a cancelled redemption.
    #[must_use]
    pub fn refunded(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        origin: Origin,
        description: String,
    ) -> Self {
        Self::build(account_id, amount.abs(), EntryKind::Refunded, origin, balance_after, description)
    }

    fn build(
        account_id: AccountId,
        amount: i64,
        kind: EntryKind,
        origin: Origin,
        balance_after: i64,
        description: String,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            amount,
            kind,
            origin,
            balance_after,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Points credited from an event or award.
    Earned,

    /// Points debited for a redemption.
    Redeemed,

    /// Points credited back by a cancellation.
    Refunded,
}

impl EntryKind {
    /// Check if this kind adds points.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Earned | Self::Refunded)
    }
}

/// What a ledger entry is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Category of the originating action.
    pub kind: OriginKind,

    /// Id of the originating record (event, administrator or ticket).
    pub id: String,
}

impl Origin {
    /// Points awarded from an event's pool.
    #[must_use]
    pub fn event(event_id: EventId) -> Self {
        Self {
            kind: OriginKind::Event,
            id: event_id.to_string(),
        }
    }

    /// Points awarded directly by an administrator.
    #[must_use]
    pub fn admin_award(admin_id: AdminId) -> Self {
        Self {
            kind: OriginKind::AdminAward,
            id: admin_id.to_string(),
        }
    }

    /// Points moved by a redemption ticket.
    #[must_use]
    pub fn redemption(ticket_id: TicketId) -> Self {
        Self {
            kind: OriginKind::Redemption,
            id: ticket_id.to_string(),
        }
    }

    /// A manual correction.
    #[must_use]
    pub fn adjustment(reference: impl Into<String>) -> Self {
        Self {
            kind: OriginKind::Adjustment,
            id: reference.into(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            OriginKind::Event => "event",
            OriginKind::AdminAward => "admin_award",
            OriginKind::Redemption => "redemption",
            OriginKind::Adjustment => "adjustment",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// Category of the action behind a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Event pool award.
    Event,

    /// Ad-hoc administrator award.
    AdminAward,

    /// Redemption debit or refund.
    Redemption,

    /// Manual correction.
    Adjustment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeemed_entry_is_negative() {
        let ticket = TicketId::generate();
        let entry = LedgerEntry::redeemed(
            AccountId::generate(),
            300,
            700,
            Origin::redemption(ticket),
            "Redeemed 1 x mug".into(),
        );

        assert_eq!(entry.amount, -300);
        assert_eq!(entry.kind, EntryKind::Redeemed);
        assert_eq!(entry.balance_after, 700);
        assert_eq!(entry.origin.kind, OriginKind::Redemption);
        assert_eq!(entry.origin.id, ticket.to_string());
    }

    #[test]
    fn credit_entries_are_positive() {
        let account = AccountId::generate();
        let earned = LedgerEntry::earned(
            account,
            500,
            500,
            Origin::event(EventId::generate()),
            "Hackathon winner".into(),
        );
        let refunded = LedgerEntry::refunded(
            account,
            -300,
            800,
            Origin::redemption(TicketId::generate()),
            "Cancelled".into(),
        );

        assert_eq!(earned.amount, 500);
        assert_eq!(refunded.amount, 300);
        assert!(earned.kind.is_credit());
        assert!(refunded.kind.is_credit());
        assert!(!EntryKind::Redeemed.is_credit());
    }

    #[test]
    fn origin_display_names_kind_and_id() {
        let origin = Origin::adjustment("manual-fix-42");
        assert_eq!(origin.to_string(), "adjustment:manual-fix-42");
    }
}
