use anyhow::Result;
use std::io::Write;

use crate::application::LedgerService;

/// Exporter for dumping ledger data to reporting formats. Entries are
/// exported in sequence order (the audit order), accounts by name.
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the whole ledger to CSV format.
    pub async fn export_entries_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.all_entries().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "timestamp",
            "kind",
            "amount_cents",
            "matricula",
            "account_name",
            "account_id",
        ])?;

        for item in &entries {
            csv_writer.write_record([
                item.entry.sequence.to_string(),
                item.entry.timestamp.to_rfc3339(),
                item.entry.kind.to_string(),
                item.entry.amount_cents.to_string(),
                item.matricula.clone().unwrap_or_default(),
                item.account_name.clone().unwrap_or_default(),
                item.entry.account_id.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export the whole ledger to JSON format.
    pub async fn export_entries_json<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.all_entries().await?;
        serde_json::to_writer_pretty(writer, &entries)?;
        Ok(entries.len())
    }

    /// Export all accounts to CSV format.
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["name", "matricula", "balance_cents", "created_at", "id"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.name.clone(),
                account.matricula.clone(),
                account.balance_cents.to_string(),
                account.created_at.to_rfc3339(),
                account.id.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export all accounts to JSON format.
    pub async fn export_accounts_json<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        serde_json::to_writer_pretty(writer, &accounts)?;
        Ok(accounts.len())
    }
}
