use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Cents, DEFAULT_DOSE_GRAMS, EntryKind, Grams, LedgerEntry, StockState,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub has_sequence_gaps: bool,
    /// Entries whose account has since been hard-deleted
    pub orphaned_entries: i64,
}

/// A ledger entry joined with the account it belonged to at query time.
/// Name and matricula are absent when the account was deleted.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithAccount {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub account_name: Option<String>,
    pub matricula: Option<String>,
}

/// Repository for persisting accounts, the stock singleton, settings and
/// the ledger. The pool is capped at one connection, so every transaction
/// started with [`Repository::begin`] runs serialized against all other
/// store access: concurrent consume/recharge calls queue on pool
/// acquisition instead of racing on stale reads.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Idempotent; seeds the stock singleton and
    /// the default dose setting.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Begin a store transaction. All reads and writes of a consume or
    /// recharge must go through the returned transaction's connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account row.
    pub async fn insert_account_in(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, matricula, balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&account.matricula)
        .bind(account.balance_cents)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert account")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        Self::account_by_id_in(&mut conn, id).await
    }

    pub async fn account_by_id_in(
        conn: &mut SqliteConnection,
        id: AccountId,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, matricula, balance_cents, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by matricula.
    pub async fn get_account_by_matricula(&self, matricula: &str) -> Result<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        Self::account_by_matricula_in(&mut conn, matricula).await
    }

    pub async fn account_by_matricula_in(
        conn: &mut SqliteConnection,
        matricula: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, matricula, balance_cents, created_at
            FROM accounts
            WHERE matricula = ?
            "#,
        )
        .bind(matricula)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account by matricula")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts, sorted by display name.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, matricula, balance_cents, created_at
            FROM accounts
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Overwrite name, matricula and balance of an existing account.
    pub async fn update_account_in(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET name = ?, matricula = ?, balance_cents = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.name)
        .bind(&account.matricula)
        .bind(account.balance_cents)
        .bind(account.id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update account")?;
        Ok(())
    }

    /// Hard-delete an account. Ledger entries are left in place.
    /// Returns the number of rows removed (0 if the id was unknown).
    pub async fn delete_account(&self, id: AccountId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected())
    }

    /// Atomically add a delta to an account balance and return the new
    /// balance. Expressed as a SQL increment so no caller ever writes back
    /// a stale in-memory value.
    pub async fn adjust_balance_in(
        conn: &mut SqliteConnection,
        id: AccountId,
        delta_cents: Cents,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(delta_cents)
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to adjust balance")?;

        Ok(row.get("balance_cents"))
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            name: row.get("name"),
            matricula: row.get("matricula"),
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Stock operations
    // ========================

    /// Read the stock singleton.
    pub async fn stock(&self) -> Result<StockState> {
        let mut conn = self.pool.acquire().await?;
        Self::stock_in(&mut conn).await
    }

    pub async fn stock_in(conn: &mut SqliteConnection) -> Result<StockState> {
        let row = sqlx::query(
            r#"
            SELECT coffee_stock_grams, stock_total_cost_cents, qr_code_reference
            FROM stock_state
            WHERE id = 1
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to fetch stock state")?;

        Ok(Self::row_to_stock(&row))
    }

    /// Add an intake lot to the stock: grams and cost both increment in one
    /// statement, shifting the weighted average toward the new lot.
    /// Returns the updated state.
    pub async fn add_stock(&self, grams: Grams, cost_cents: Cents) -> Result<StockState> {
        let row = sqlx::query(
            r#"
            UPDATE stock_state
            SET coffee_stock_grams = coffee_stock_grams + ?,
                stock_total_cost_cents = stock_total_cost_cents + ?
            WHERE id = 1
            RETURNING coffee_stock_grams, stock_total_cost_cents, qr_code_reference
            "#,
        )
        .bind(grams)
        .bind(cost_cents)
        .fetch_one(&self.pool)
        .await
        .context("Failed to add stock")?;

        Ok(Self::row_to_stock(&row))
    }

    /// Unconditionally replace both stock fields (admin escape hatch).
    pub async fn override_stock(&self, grams: Grams, cost_cents: Cents) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE stock_state
            SET coffee_stock_grams = ?, stock_total_cost_cents = ?
            WHERE id = 1
            "#,
        )
        .bind(grams)
        .bind(cost_cents)
        .execute(&self.pool)
        .await
        .context("Failed to override stock")?;
        Ok(())
    }

    /// Decrement stock by one dose and its charged price. Runs inside the
    /// consume transaction, on the same connection as the balance debit.
    pub async fn decrement_stock_in(
        conn: &mut SqliteConnection,
        grams: Grams,
        cost_cents: Cents,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE stock_state
            SET coffee_stock_grams = coffee_stock_grams - ?,
                stock_total_cost_cents = stock_total_cost_cents - ?
            WHERE id = 1
            "#,
        )
        .bind(grams)
        .bind(cost_cents)
        .execute(&mut *conn)
        .await
        .context("Failed to decrement stock")?;
        Ok(())
    }

    /// Replace the payment QR reference.
    pub async fn set_qr_reference(&self, reference: &str) -> Result<()> {
        sqlx::query("UPDATE stock_state SET qr_code_reference = ? WHERE id = 1")
            .bind(reference)
            .execute(&self.pool)
            .await
            .context("Failed to set QR reference")?;
        Ok(())
    }

    fn row_to_stock(row: &sqlx::sqlite::SqliteRow) -> StockState {
        StockState {
            coffee_stock_grams: row.get("coffee_stock_grams"),
            stock_total_cost_cents: row.get("stock_total_cost_cents"),
            qr_code_reference: row.get("qr_code_reference"),
        }
    }

    // ========================
    // Settings
    // ========================

    /// Read the configured dose size.
    pub async fn dose_grams(&self) -> Result<Grams> {
        let mut conn = self.pool.acquire().await?;
        Self::dose_grams_in(&mut conn).await
    }

    pub async fn dose_grams_in(conn: &mut SqliteConnection) -> Result<Grams> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = 'dose_grams'")
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch dose setting")?;

        match row {
            Some(row) => {
                let value: String = row.get("value");
                value.parse().context("Invalid dose_grams setting")
            }
            None => Ok(DEFAULT_DOSE_GRAMS),
        }
    }

    /// Update the configured dose size.
    pub async fn set_dose_grams(&self, grams: Grams) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ('dose_grams', ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(grams.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to set dose setting")?;
        Ok(())
    }

    // ========================
    // Ledger operations
    // ========================

    /// Append a ledger entry, assigning the next sequence number on the
    /// same connection so the assignment commits or rolls back with the
    /// rest of the transaction.
    pub async fn insert_entry_in(
        conn: &mut SqliteConnection,
        entry: &mut LedgerEntry,
    ) -> Result<()> {
        entry.sequence = Self::next_sequence(conn).await?;

        sqlx::query(
            r#"
            INSERT INTO entries (id, sequence, account_id, amount_cents, kind, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(entry.account_id.to_string())
        .bind(entry.amount_cents)
        .bind(entry.kind.as_str())
        .bind(entry.timestamp.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to append ledger entry")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'entry_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// List the most recent entries across all accounts, newest first,
    /// joined with account name and matricula. Entries of deleted accounts
    /// are kept and appear without a name.
    pub async fn list_entries(&self, limit: i64) -> Result<Vec<EntryWithAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.sequence, e.account_id, e.amount_cents, e.kind, e.timestamp,
                   a.name, a.matricula
            FROM entries e
            LEFT JOIN accounts a ON a.id = e.account_id
            ORDER BY e.sequence DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter()
            .map(|row| {
                Ok(EntryWithAccount {
                    entry: Self::row_to_entry(row)?,
                    account_name: row.get("name"),
                    matricula: row.get("matricula"),
                })
            })
            .collect()
    }

    /// List the whole ledger in sequence order (oldest first), joined with
    /// account name and matricula. Export uses this as the audit dump.
    pub async fn list_all_entries(&self) -> Result<Vec<EntryWithAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.sequence, e.account_id, e.amount_cents, e.kind, e.timestamp,
                   a.name, a.matricula
            FROM entries e
            LEFT JOIN accounts a ON a.id = e.account_id
            ORDER BY e.sequence
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter()
            .map(|row| {
                Ok(EntryWithAccount {
                    entry: Self::row_to_entry(row)?,
                    account_name: row.get("name"),
                    matricula: row.get("matricula"),
                })
            })
            .collect()
    }

    /// List one account's entries, newest first.
    pub async fn list_entries_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, account_id, amount_cents, kind, timestamp
            FROM entries
            WHERE account_id = ?
            ORDER BY sequence DESC
            LIMIT ?
            "#,
        )
        .bind(account_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entries for account")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Get statistics for integrity checking.
    pub async fn ledger_stats(&self) -> Result<LedgerStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let entry_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM entries")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let sequence_check = sqlx::query(
            r#"
            SELECT MIN(sequence) as min_seq, MAX(sequence) as max_seq, COUNT(*) as count
            FROM entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_seq: Option<i64> = sequence_check.get("min_seq");
        let max_seq: Option<i64> = sequence_check.get("max_seq");
        let count: i64 = sequence_check.get("count");

        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => (max - min + 1) != count,
            _ => false,
        };

        let orphaned_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM entries e
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.account_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(LedgerStats {
            account_count,
            entry_count,
            has_sequence_gaps,
            orphaned_entries,
        })
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        Ok(LedgerEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            amount_cents: row.get("amount_cents"),
            kind: EntryKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid entry kind: {}", kind_str))?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }
}
