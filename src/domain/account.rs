use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// A registered coffee drinker. The matricula is the external identifier
/// (employee/student number) typed at the machine; it must be unique across
/// all accounts. Balances are allowed to go negative: running a tab is part
/// of the deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub matricula: String,
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, matricula: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            matricula,
            balance_cents: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_balance(mut self, balance_cents: Cents) -> Self {
        self.balance_cents = balance_cents;
        self
    }

    pub fn is_in_debt(&self) -> bool {
        self.balance_cents < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_at_zero() {
        let account = Account::new("Ana".into(), "20231234".into());
        assert_eq!(account.balance_cents, 0);
        assert!(!account.is_in_debt());
    }

    #[test]
    fn test_with_balance() {
        let account = Account::new("Ana".into(), "20231234".into()).with_balance(1500);
        assert_eq!(account.balance_cents, 1500);
    }

    #[test]
    fn test_negative_balance_is_debt() {
        let account = Account::new("Rui".into(), "20230001".into()).with_balance(-250);
        assert!(account.is_in_debt());
    }
}
