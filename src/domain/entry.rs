use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type EntryId = Uuid;

/// What a ledger entry records: money leaving the balance for a dose, or
/// money entering it as a top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Consumption,
    Recharge,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Consumption => "consumption",
            EntryKind::Recharge => "recharge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "consumption" => Some(EntryKind::Consumption),
            "recharge" => Some(EntryKind::Recharge),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable line of the audit trail. Entries are append-only (never
/// updated or deleted) and the sequence number gives the ledger a total
/// order. The account reference is historical: deleting the account does not
/// touch its entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Monotonically increasing, assigned by the repository at insert
    pub sequence: i64,
    pub account_id: AccountId,
    /// Signed cents: negative for consumption, positive for recharge
    pub amount_cents: Cents,
    pub kind: EntryKind,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entry for one dose poured at the given price. The amount is recorded
    /// negated, as a debit against the balance.
    pub fn consumption(account_id: AccountId, price_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            account_id,
            amount_cents: -price_cents,
            kind: EntryKind::Consumption,
            timestamp: Utc::now(),
        }
    }

    /// Entry for a balance top-up.
    pub fn recharge(account_id: AccountId, amount_cents: Cents) -> Self {
        assert!(amount_cents > 0, "Recharge amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            account_id,
            amount_cents,
            kind: EntryKind::Recharge,
            timestamp: Utc::now(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount_cents < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_roundtrip() {
        for kind in [EntryKind::Consumption, EntryKind::Recharge] {
            let s = kind.as_str();
            let parsed = EntryKind::from_str(s).unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_consumption_entry_is_negative() {
        let account = Uuid::new_v4();
        let entry = LedgerEntry::consumption(account, 50);

        assert_eq!(entry.amount_cents, -50);
        assert_eq!(entry.kind, EntryKind::Consumption);
        assert_eq!(entry.account_id, account);
        assert!(entry.is_debit());
    }

    #[test]
    fn test_free_dose_records_zero_amount() {
        // A zero-cost lot prices a dose at 0; the entry is still written
        let entry = LedgerEntry::consumption(Uuid::new_v4(), 0);
        assert_eq!(entry.amount_cents, 0);
        assert!(!entry.is_debit());
    }

    #[test]
    fn test_recharge_entry_is_positive() {
        let account = Uuid::new_v4();
        let entry = LedgerEntry::recharge(account, 500);

        assert_eq!(entry.amount_cents, 500);
        assert_eq!(entry.kind, EntryKind::Recharge);
        assert!(!entry.is_debit());
    }

    #[test]
    #[should_panic(expected = "Recharge amount must be positive")]
    fn test_recharge_requires_positive_amount() {
        LedgerEntry::recharge(Uuid::new_v4(), 0);
    }
}
