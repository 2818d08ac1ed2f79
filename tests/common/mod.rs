// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use cuppa::application::LedgerService;
use cuppa::domain::Cents;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Register a drinker with an opening balance
pub async fn register(
    service: &LedgerService,
    name: &str,
    matricula: &str,
    balance_cents: Cents,
) -> Result<()> {
    service
        .register_account(name.into(), matricula.into(), balance_cents)
        .await?;
    Ok(())
}

/// Stock the machine with the canonical test lot: 1000g bought for 50.00.
/// With the default 10g dose this prices a dose at exactly 0.50.
pub async fn stock_standard_lot(service: &LedgerService) -> Result<()> {
    service.add_stock(1000, 5000).await?;
    Ok(())
}
