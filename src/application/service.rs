use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::domain::{
    Account, AccountId, Cents, Grams, LedgerEntry, StockState, price_per_dose,
};
use crate::storage::{EntryWithAccount, LedgerStats, Repository};

use super::AppError;

/// Default page sizes for activity listings.
pub const RECENT_ACTIVITY_LIMIT: i64 = 100;
pub const ACCOUNT_ACTIVITY_LIMIT: i64 = 20;

/// Application service providing high-level operations for the coffee
/// ledger. This is the primary interface for any client (CLI, API, etc.):
/// account management, stock management, and the consume/recharge
/// transaction coordinator.
pub struct LedgerService {
    repo: Repository,
}

/// Read-only composite of stock, dose setting and the derived dose price.
#[derive(Debug, Clone, Serialize)]
pub struct SystemView {
    pub coffee_stock_grams: Grams,
    pub stock_total_cost_cents: Cents,
    pub qr_code_reference: String,
    pub dose_grams: Grams,
    pub price_per_dose_cents: Cents,
}

/// Result of a committed consumption.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReceipt {
    pub account_id: AccountId,
    pub matricula: String,
    pub price_cents: Cents,
    pub new_balance_cents: Cents,
}

/// Result of a committed recharge.
#[derive(Debug, Clone, Serialize)]
pub struct RechargeReceipt {
    pub account_id: AccountId,
    pub matricula: String,
    pub amount_cents: Cents,
    pub new_balance_cents: Cents,
}

impl LedgerService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account. Name and matricula are required non-empty;
    /// the matricula must not already be in use.
    pub async fn register_account(
        &self,
        name: String,
        matricula: String,
        initial_balance_cents: Cents,
    ) -> Result<Account, AppError> {
        let name = name.trim().to_string();
        let matricula = matricula.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("name must not be empty".into()));
        }
        if matricula.is_empty() {
            return Err(AppError::InvalidInput("matricula must not be empty".into()));
        }

        // Uniqueness check and insert commit together; the UNIQUE index on
        // matricula backs the check at the store level.
        let mut tx = self.repo.begin().await?;

        if Repository::account_by_matricula_in(&mut tx, &matricula)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateMatricula(matricula));
        }

        let account = Account::new(name, matricula).with_balance(initial_balance_cents);
        Repository::insert_account_in(&mut tx, &account).await?;
        tx.commit().await.context("Failed to commit registration")?;

        info!(matricula = %account.matricula, "account registered");
        Ok(account)
    }

    /// Get an account by matricula.
    pub async fn account_by_matricula(&self, matricula: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_matricula(matricula)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(matricula.to_string()))
    }

    /// List all accounts, sorted by name.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    /// Overwrite an account's name, matricula and balance (full update,
    /// not a partial patch). The new matricula must not belong to a
    /// different account.
    pub async fn update_account(
        &self,
        id: AccountId,
        name: String,
        matricula: String,
        balance_cents: Cents,
    ) -> Result<Account, AppError> {
        let name = name.trim().to_string();
        let matricula = matricula.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("name must not be empty".into()));
        }
        if matricula.is_empty() {
            return Err(AppError::InvalidInput("matricula must not be empty".into()));
        }

        let mut tx = self.repo.begin().await?;

        let existing = Repository::account_by_id_in(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;

        if let Some(other) = Repository::account_by_matricula_in(&mut tx, &matricula).await? {
            if other.id != id {
                return Err(AppError::DuplicateMatricula(matricula));
            }
        }

        let account = Account {
            id,
            name,
            matricula,
            balance_cents,
            created_at: existing.created_at,
        };
        Repository::update_account_in(&mut tx, &account).await?;
        tx.commit().await.context("Failed to commit account update")?;

        info!(matricula = %account.matricula, "account updated");
        Ok(account)
    }

    /// Hard-delete an account. Its ledger entries are kept as historical
    /// records; the activity listing shows them without a name.
    pub async fn delete_account(&self, id: AccountId) -> Result<Account, AppError> {
        let account = self
            .repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;

        self.repo.delete_account(id).await?;
        info!(matricula = %account.matricula, "account deleted");
        Ok(account)
    }

    // ========================
    // Stock operations
    // ========================

    /// Add an intake lot. Cost may be 0 (donated stock); grams must be
    /// positive. The weighted average shifts toward the new lot.
    pub async fn add_stock(
        &self,
        grams: Grams,
        cost_cents: Cents,
    ) -> Result<StockState, AppError> {
        if grams <= 0 {
            return Err(AppError::InvalidInput("added grams must be positive".into()));
        }
        if cost_cents < 0 {
            return Err(AppError::InvalidInput("cost must not be negative".into()));
        }

        let stock = self.repo.add_stock(grams, cost_cents).await?;
        info!(grams, cost_cents, "stock added");
        Ok(stock)
    }

    /// Replace both stock fields unconditionally (admin correction).
    pub async fn override_stock(
        &self,
        grams: Grams,
        cost_cents: Cents,
    ) -> Result<StockState, AppError> {
        self.repo.override_stock(grams, cost_cents).await?;
        info!(grams, cost_cents, "stock overridden");
        Ok(self.repo.stock().await?)
    }

    /// Replace the payment QR reference.
    pub async fn set_qr_reference(&self, reference: &str) -> Result<(), AppError> {
        self.repo.set_qr_reference(reference).await?;
        info!(reference, "QR reference updated");
        Ok(())
    }

    /// Read the configured dose size.
    pub async fn dose_grams(&self) -> Result<Grams, AppError> {
        Ok(self.repo.dose_grams().await?)
    }

    /// Update the configured dose size.
    pub async fn set_dose_grams(&self, grams: Grams) -> Result<(), AppError> {
        if grams <= 0 {
            return Err(AppError::InvalidInput("dose grams must be positive".into()));
        }
        self.repo.set_dose_grams(grams).await?;
        info!(grams, "dose size updated");
        Ok(())
    }

    /// Composite system view: stock, QR reference, dose setting, and the
    /// price of one dose derived fresh from the current weighted average.
    /// Read in one store transaction so the pieces are consistent.
    pub async fn system_view(&self) -> Result<SystemView, AppError> {
        let mut tx = self.repo.begin().await?;
        let stock = Repository::stock_in(&mut tx).await?;
        let dose_grams = Repository::dose_grams_in(&mut tx).await?;
        tx.commit().await.context("Failed to finish system view read")?;

        let price_per_dose_cents = price_per_dose(&stock, dose_grams);
        Ok(SystemView {
            coffee_stock_grams: stock.coffee_stock_grams,
            stock_total_cost_cents: stock.stock_total_cost_cents,
            qr_code_reference: stock.qr_code_reference,
            dose_grams,
            price_per_dose_cents,
        })
    }

    // ========================
    // Transactions
    // ========================

    /// Consume one dose: look the account up, price the dose from the
    /// current stock, debit the balance, append the ledger entry and
    /// decrement the stock, all inside one store transaction. Any failing
    /// step rolls the whole thing back.
    pub async fn consume(&self, matricula: &str) -> Result<ConsumptionReceipt, AppError> {
        let mut tx = self.repo.begin().await?;

        let account = Repository::account_by_matricula_in(&mut tx, matricula)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(matricula.to_string()))?;

        let stock = Repository::stock_in(&mut tx).await?;
        let dose_grams = Repository::dose_grams_in(&mut tx).await?;

        // Guard on raw grams, not price: a zero-cost lot still pours.
        if !stock.has_stock_for(dose_grams) {
            return Err(AppError::InsufficientStock {
                available: stock.coffee_stock_grams,
                required: dose_grams,
            });
        }

        let price_cents = price_per_dose(&stock, dose_grams);

        let new_balance_cents =
            Repository::adjust_balance_in(&mut tx, account.id, -price_cents).await?;

        let mut entry = LedgerEntry::consumption(account.id, price_cents);
        Repository::insert_entry_in(&mut tx, &mut entry).await?;

        // Cost comes down by the price charged, keeping the average cost
        // per gram stable across consumptions.
        Repository::decrement_stock_in(&mut tx, dose_grams, price_cents).await?;

        tx.commit().await.context("Failed to commit consumption")?;

        info!(
            matricula = %account.matricula,
            price_cents,
            new_balance_cents,
            "dose consumed"
        );

        Ok(ConsumptionReceipt {
            account_id: account.id,
            matricula: account.matricula,
            price_cents,
            new_balance_cents,
        })
    }

    /// Credit a balance top-up: one store transaction covering the balance
    /// credit and the ledger entry.
    pub async fn recharge(
        &self,
        matricula: &str,
        amount_cents: Cents,
    ) -> Result<RechargeReceipt, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidInput(
                "recharge amount must be positive".into(),
            ));
        }

        let mut tx = self.repo.begin().await?;

        let account = Repository::account_by_matricula_in(&mut tx, matricula)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(matricula.to_string()))?;

        let new_balance_cents =
            Repository::adjust_balance_in(&mut tx, account.id, amount_cents).await?;

        let mut entry = LedgerEntry::recharge(account.id, amount_cents);
        Repository::insert_entry_in(&mut tx, &mut entry).await?;

        tx.commit().await.context("Failed to commit recharge")?;

        info!(
            matricula = %account.matricula,
            amount_cents,
            new_balance_cents,
            "balance recharged"
        );

        Ok(RechargeReceipt {
            account_id: account.id,
            matricula: account.matricula,
            amount_cents,
            new_balance_cents,
        })
    }

    // ========================
    // Activity and integrity
    // ========================

    /// Most recent entries across all accounts, newest first, joined with
    /// account name/matricula.
    pub async fn recent_activity(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<EntryWithAccount>, AppError> {
        Ok(self
            .repo
            .list_entries(limit.unwrap_or(RECENT_ACTIVITY_LIMIT))
            .await?)
    }

    /// One account's entries, newest first.
    pub async fn account_activity(
        &self,
        matricula: &str,
        limit: Option<i64>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let account = self.account_by_matricula(matricula).await?;
        Ok(self
            .repo
            .list_entries_for_account(account.id, limit.unwrap_or(ACCOUNT_ACTIVITY_LIMIT))
            .await?)
    }

    /// The whole ledger in sequence order, for export.
    pub async fn all_entries(&self) -> Result<Vec<EntryWithAccount>, AppError> {
        Ok(self.repo.list_all_entries().await?)
    }

    /// Ledger integrity statistics.
    pub async fn check_ledger(&self) -> Result<LedgerStats, AppError> {
        Ok(self.repo.ledger_stats().await?)
    }
}
