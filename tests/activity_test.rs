mod common;

use anyhow::Result;
use common::{register, stock_standard_lot, test_service};
use cuppa::application::AppError;
use cuppa::domain::EntryKind;
use cuppa::io::Exporter;

#[tokio::test]
async fn test_recent_activity_newest_first_with_names() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1000).await?;
    register(&service, "Bruno", "1002", 0).await?;
    stock_standard_lot(&service).await?;

    service.recharge("1002", 500).await?;
    service.consume("1001").await?;

    let entries = service.recent_activity(None).await?;
    assert_eq!(entries.len(), 2);

    // The consume came last, so it lists first
    assert_eq!(entries[0].entry.kind, EntryKind::Consumption);
    assert_eq!(entries[0].account_name.as_deref(), Some("Ana"));
    assert_eq!(entries[0].matricula.as_deref(), Some("1001"));

    assert_eq!(entries[1].entry.kind, EntryKind::Recharge);
    assert_eq!(entries[1].account_name.as_deref(), Some("Bruno"));

    Ok(())
}

#[tokio::test]
async fn test_activity_limits() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 0).await?;
    for _ in 0..5 {
        service.recharge("1001", 100).await?;
    }

    let entries = service.recent_activity(Some(3)).await?;
    assert_eq!(entries.len(), 3);

    let entries = service.account_activity("1001", Some(2)).await?;
    assert_eq!(entries.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_account_activity_is_scoped() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1000).await?;
    register(&service, "Bruno", "1002", 1000).await?;
    stock_standard_lot(&service).await?;

    service.consume("1001").await?;
    service.consume("1002").await?;
    service.recharge("1001", 200).await?;

    let entries = service.account_activity("1001", None).await?;
    assert_eq!(entries.len(), 2);

    let entries = service.account_activity("1002", None).await?;
    assert_eq!(entries.len(), 1);

    assert!(matches!(
        service.account_activity("9999", None).await,
        Err(AppError::AccountNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_deleting_account_keeps_its_history() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1000).await?;
    stock_standard_lot(&service).await?;
    service.consume("1001").await?;
    service.recharge("1001", 200).await?;

    let account = service.account_by_matricula("1001").await?;
    service.delete_account(account.id).await?;

    // Entries survive the hard delete, listed without a name
    let entries = service.recent_activity(None).await?;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.account_name.is_none()));
    assert!(entries.iter().all(|e| e.entry.account_id == account.id));

    let stats = service.check_ledger().await?;
    assert_eq!(stats.account_count, 0);
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.orphaned_entries, 2);

    Ok(())
}

#[tokio::test]
async fn test_ledger_stats_clean_after_activity() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1000).await?;
    stock_standard_lot(&service).await?;
    service.consume("1001").await?;
    service.recharge("1001", 500).await?;
    service.consume("1001").await?;

    let stats = service.check_ledger().await?;
    assert_eq!(stats.account_count, 1);
    assert_eq!(stats.entry_count, 3);
    assert!(!stats.has_sequence_gaps);
    assert_eq!(stats.orphaned_entries, 0);

    Ok(())
}

#[tokio::test]
async fn test_export_entries_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1000).await?;
    stock_standard_lot(&service).await?;
    service.consume("1001").await?;
    service.recharge("1001", 500).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_entries_csv(&mut buffer).await?;
    assert_eq!(count, 2);

    let csv_text = String::from_utf8(buffer)?;
    let mut lines = csv_text.lines();
    assert_eq!(
        lines.next(),
        Some("sequence,timestamp,kind,amount_cents,matricula,account_name,account_id")
    );
    // Sequence order: the consume first, then the recharge
    assert!(lines.next().unwrap().contains("consumption"));
    assert!(lines.next().unwrap().contains("recharge"));

    Ok(())
}

#[tokio::test]
async fn test_export_accounts_json() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 1500).await?;
    register(&service, "Bruno", "1002", 0).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_accounts_json(&mut buffer).await?;
    assert_eq!(count, 2);

    let parsed: serde_json::Value = serde_json::from_slice(&buffer)?;
    let accounts = parsed.as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["name"], "Ana");
    assert_eq!(accounts[0]["balance_cents"], 1500);

    Ok(())
}
