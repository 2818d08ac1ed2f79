mod common;

use anyhow::Result;
use common::{register, test_service};
use cuppa::application::AppError;

#[tokio::test]
async fn test_register_and_lookup() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .register_account("Ana Souza".into(), "20231234".into(), 0)
        .await?;
    assert_eq!(account.balance_cents, 0);

    let found = service.account_by_matricula("20231234").await?;
    assert_eq!(found.id, account.id);
    assert_eq!(found.name, "Ana Souza");

    Ok(())
}

#[tokio::test]
async fn test_register_with_opening_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .register_account("Rui".into(), "1001".into(), 1500)
        .await?;
    assert_eq!(account.balance_cents, 1500);

    Ok(())
}

#[tokio::test]
async fn test_register_rejects_duplicate_matricula() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 0).await?;
    let result = service
        .register_account("Someone Else".into(), "1001".into(), 0)
        .await;

    assert!(matches!(result, Err(AppError::DuplicateMatricula(_))));
    Ok(())
}

#[tokio::test]
async fn test_register_rejects_empty_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.register_account("".into(), "1001".into(), 0).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let result = service.register_account("Ana".into(), "  ".into(), 0).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    Ok(())
}

#[tokio::test]
async fn test_lookup_unknown_matricula() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.account_by_matricula("9999").await;
    assert!(matches!(result, Err(AppError::AccountNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_sorted_by_name() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Carla", "3", 0).await?;
    register(&service, "Ana", "1", 0).await?;
    register(&service, "Bruno", "2", 0).await?;

    let accounts = service.list_accounts().await?;
    let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Ana", "Bruno", "Carla"]);

    Ok(())
}

#[tokio::test]
async fn test_update_overwrites_all_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .register_account("Ana".into(), "1001".into(), 100)
        .await?;

    let updated = service
        .update_account(account.id, "Ana Souza".into(), "2002".into(), 2500)
        .await?;

    assert_eq!(updated.name, "Ana Souza");
    assert_eq!(updated.matricula, "2002");
    assert_eq!(updated.balance_cents, 2500);

    // The old matricula no longer resolves
    assert!(matches!(
        service.account_by_matricula("1001").await,
        Err(AppError::AccountNotFound(_))
    ));
    let found = service.account_by_matricula("2002").await?;
    assert_eq!(found.id, account.id);

    Ok(())
}

#[tokio::test]
async fn test_update_keeping_own_matricula() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .register_account("Ana".into(), "1001".into(), 0)
        .await?;

    // Renaming without changing matricula must not trip the duplicate check
    let updated = service
        .update_account(account.id, "Ana S.".into(), "1001".into(), 0)
        .await?;
    assert_eq!(updated.name, "Ana S.");

    Ok(())
}

#[tokio::test]
async fn test_update_rejects_taken_matricula() -> Result<()> {
    let (service, _temp) = test_service().await?;

    register(&service, "Ana", "1001", 0).await?;
    let bruno = service
        .register_account("Bruno".into(), "1002".into(), 0)
        .await?;

    let result = service
        .update_account(bruno.id, "Bruno".into(), "1001".into(), 0)
        .await;
    assert!(matches!(result, Err(AppError::DuplicateMatricula(_))));

    // Bruno is unchanged
    let bruno_again = service.account_by_matricula("1002").await?;
    assert_eq!(bruno_again.id, bruno.id);

    Ok(())
}

#[tokio::test]
async fn test_update_unknown_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .update_account(uuid::Uuid::new_v4(), "Ghost".into(), "1001".into(), 0)
        .await;
    assert!(matches!(result, Err(AppError::AccountNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_delete_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .register_account("Ana".into(), "1001".into(), 0)
        .await?;

    let deleted = service.delete_account(account.id).await?;
    assert_eq!(deleted.id, account.id);

    assert!(matches!(
        service.account_by_matricula("1001").await,
        Err(AppError::AccountNotFound(_))
    ));

    // Deleting again reports not found
    let result = service.delete_account(account.id).await;
    assert!(matches!(result, Err(AppError::AccountNotFound(_))));

    Ok(())
}
