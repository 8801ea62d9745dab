//! Key encoding utilities for `RocksDB`.
//!
//! Composite keys concatenate fixed-width ids so that a prefix scan on the
//! first component yields every record for it, in id order.

use kudos_core::{AccountId, AdminId, EntryId, EventId, PeriodKey, ProductId, TicketId};

/// Create an account key.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a ledger entry key.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create an account-entry index key.
///
/// Format: `account_id (16 bytes) || entry_id (16 bytes)`
///
/// Since ULIDs are time-ordered, an account's entries sort by time.
#[must_use]
pub fn account_entry_key(account_id: &AccountId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating an account's index entries.
#[must_use]
pub fn account_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the trailing 16-byte ULID from an index key.
///
/// Returns `None` if the key is shorter than 32 bytes.
#[must_use]
pub fn trailing_ulid(key: &[u8]) -> Option<[u8; 16]> {
    key.get(16..32)?.try_into().ok()
}

/// Create an inventory key.
#[must_use]
pub fn inventory_key(product_id: &ProductId) -> Vec<u8> {
    product_id.as_bytes().to_vec()
}

/// Create an award pool key.
#[must_use]
pub fn pool_key(event_id: &EventId) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Create a participant award key.
///
/// Format: `event_id (16 bytes) || user_id (16 bytes)`
#[must_use]
pub fn participant_award_key(event_id: &EventId, user_id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(event_id.as_bytes());
    key.extend_from_slice(user_id.as_bytes());
    key
}

/// Create a prefix for iterating an event's participant awards.
#[must_use]
pub fn event_prefix(event_id: &EventId) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Create a budget period key.
///
/// Format: `admin_id (16 bytes) || year (2 bytes, BE) || month (1 byte)`
#[must_use]
pub fn budget_period_key(admin_id: &AdminId, period: &PeriodKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(19);
    key.extend_from_slice(admin_id.as_bytes());
    key.extend_from_slice(&period.to_bytes());
    key
}

/// Create a ticket key.
#[must_use]
pub fn ticket_key(ticket_id: &TicketId) -> Vec<u8> {
    ticket_id.to_bytes().to_vec()
}

/// Create an account-ticket index key.
///
/// Format: `account_id (16 bytes) || ticket_id (16 bytes)`
#[must_use]
pub fn account_ticket_key(account_id: &AccountId, ticket_id: &TicketId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&ticket_id.to_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_entry_key_format() {
        let account_id = AccountId::generate();
        let entry_id = EntryId::generate();
        let key = account_entry_key(&account_id, &entry_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], account_id.as_bytes());
        assert_eq!(&key[16..], entry_id.to_bytes());
        assert!(key.starts_with(&account_prefix(&account_id)));
    }

    #[test]
    fn trailing_ulid_roundtrip() {
        let account_id = AccountId::generate();
        let ticket_id = TicketId::generate();
        let key = account_ticket_key(&account_id, &ticket_id);

        let bytes = trailing_ulid(&key).unwrap();
        assert_eq!(TicketId::from_bytes(bytes), ticket_id);
        assert!(trailing_ulid(&key[..20]).is_none());
    }

    #[test]
    fn participant_award_key_groups_by_event() {
        let event_id = EventId::generate();
        let key = participant_award_key(&event_id, &AccountId::generate());
        assert_eq!(key.len(), 32);
        assert!(key.starts_with(&event_prefix(&event_id)));
    }

    #[test]
    fn budget_period_key_length() {
        let key = budget_period_key(&AdminId::generate(), &PeriodKey::new(2026, 10).unwrap());
        assert_eq!(key.len(), 19);
        assert_eq!(&key[16..], &[0x07, 0xEA, 10]);
    }
}
