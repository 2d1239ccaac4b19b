//! Integration tests for User repository using in-memory SurrealDB.

use tessera_core::error::TesseraError;
use tessera_core::models::user::CreateUser;
use tessera_core::repository::{TwoFactorStatus, UserRepository};
use tessera_db::repository::SurrealUserRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> SurrealUserRepository<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tessera_db::run_migrations(&db).await.unwrap();
    SurrealUserRepository::new(db)
}

fn alice() -> CreateUser {
    CreateUser {
        name: "Alice".into(),
        email: "alice@example.com".into(),
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = setup().await;

    let user = repo.create(alice()).await.unwrap();
    assert_eq!(user.name, "Alice");
    assert_eq!(user.email, "alice@example.com");
    assert!(!user.two_factor_enabled);
    assert!(user.current_workspace_id.is_none());

    let fetched = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched.id, user.id);

    let by_email = repo.get_by_email("alice@example.com").await.unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));
    assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let repo = setup().await;
    repo.create(alice()).await.unwrap();

    let err = repo.create(alice()).await.unwrap_err();
    assert!(matches!(err, TesseraError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let repo = setup().await;
    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));
}

#[tokio::test]
async fn current_workspace_can_be_set_and_cleared() {
    let repo = setup().await;
    let user = repo.create(alice()).await.unwrap();
    let workspace_id = Uuid::new_v4();

    let updated = repo
        .set_current_workspace(user.id, Some(workspace_id))
        .await
        .unwrap();
    assert!(updated.is_current_workspace(workspace_id));

    let active = repo.list_by_current_workspace(workspace_id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, user.id);

    let cleared = repo.set_current_workspace(user.id, None).await.unwrap();
    assert!(cleared.current_workspace_id.is_none());
    assert!(
        repo.list_by_current_workspace(workspace_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn two_factor_flag_is_reported() {
    let repo = setup().await;
    let user = repo.create(alice()).await.unwrap();
    assert!(!repo.has_two_factor_enabled(user.id).await.unwrap());

    repo.set_two_factor_enabled(user.id, true).await.unwrap();
    assert!(repo.has_two_factor_enabled(user.id).await.unwrap());
}
