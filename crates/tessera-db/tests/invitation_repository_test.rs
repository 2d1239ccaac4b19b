//! Integration tests for the Invitation repository using in-memory
//! SurrealDB.

use chrono::{Duration, Utc};
use tessera_core::error::TesseraError;
use tessera_core::models::invitation::UpsertInvitation;
use tessera_core::models::membership::Role;
use tessera_core::models::plan::Limit;
use tessera_core::models::workspace::CreateWorkspace;
use tessera_core::repository::{InvitationRepository, MembershipRepository, WorkspaceRepository};
use tessera_db::DbManager;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Spin up in-memory DB with one workspace; returns (db, workspace, owner).
async fn setup() -> (DbManager<Db>, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    let manager = DbManager::from_client(db);
    manager.migrate().await.unwrap();

    let owner = Uuid::new_v4();
    let ws = manager
        .workspaces()
        .create(CreateWorkspace {
            name: "Acme".into(),
            slug: "acme".into(),
            personal: false,
            owner_id: owner,
        })
        .await
        .unwrap();

    (manager, ws.id, owner)
}

fn invite(workspace_id: Uuid, owner: Uuid, email: &str, token_hash: &str) -> UpsertInvitation {
    UpsertInvitation {
        workspace_id,
        email: email.into(),
        role: Role::Member,
        token_hash: token_hash.into(),
        invited_by: owner,
        expires_at: Utc::now() + Duration::days(7),
    }
}

#[tokio::test]
async fn upsert_creates_then_refreshes() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();

    let first = repo
        .upsert_pending(invite(ws, owner, "dana@example.com", "hash-1"), Limit::Max(2))
        .await
        .unwrap();
    assert_eq!(first.role, Role::Member);

    let mut again = invite(ws, owner, "dana@example.com", "hash-2");
    again.role = Role::Admin;
    let refreshed = repo.upsert_pending(again, Limit::Max(2)).await.unwrap();

    assert_eq!(refreshed.id, first.id);
    assert_eq!(refreshed.role, Role::Admin);
    assert_eq!(refreshed.token_hash, "hash-2");
    assert_eq!(repo.list(ws).await.unwrap().len(), 1);
    assert!(repo.get_by_token_hash("hash-1").await.is_err());
}

#[tokio::test]
async fn upsert_rejects_when_seats_are_full() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();

    // Owner takes one seat, this invitation the second.
    repo.upsert_pending(invite(ws, owner, "a@example.com", "hash-a"), Limit::Max(2))
        .await
        .unwrap();

    let err = repo
        .upsert_pending(invite(ws, owner, "b@example.com", "hash-b"), Limit::Max(2))
        .await
        .unwrap_err();
    assert!(
        matches!(err, TesseraError::LimitReached { limit: 2, .. }),
        "got {err:?}"
    );
    assert!(repo.find_pending(ws, "b@example.com").await.unwrap().is_none());

    // Refreshing an address that already holds a seat is still allowed.
    repo.upsert_pending(invite(ws, owner, "a@example.com", "hash-a2"), Limit::Max(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn unlimited_plan_never_blocks() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();

    for i in 0..5 {
        repo.upsert_pending(
            invite(ws, owner, &format!("u{i}@example.com"), &format!("hash-{i}")),
            Limit::Unlimited,
        )
        .await
        .unwrap();
    }
    assert_eq!(repo.count_pending(ws).await.unwrap(), 5);
}

#[tokio::test]
async fn expired_invitations_are_not_counted() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();

    let mut stale = invite(ws, owner, "old@example.com", "hash-old");
    stale.expires_at = Utc::now() - Duration::days(1);
    repo.upsert_pending(stale, Limit::Unlimited).await.unwrap();

    assert_eq!(repo.count_pending(ws).await.unwrap(), 0);

    // The expired row does not hold a seat either.
    repo.upsert_pending(invite(ws, owner, "new@example.com", "hash-new"), Limit::Max(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn consume_creates_membership_and_deletes_invitation() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();
    let invitation = repo
        .upsert_pending(invite(ws, owner, "dana@example.com", "hash-d"), Limit::Unlimited)
        .await
        .unwrap();

    let user = Uuid::new_v4();
    let edge = repo.consume(&invitation, user).await.unwrap();
    assert_eq!(edge.role, Role::Member);
    assert_eq!(edge.workspace_id, ws);

    assert!(repo.find_pending(ws, "dana@example.com").await.unwrap().is_none());
    assert_eq!(db.memberships().count(ws).await.unwrap(), 2);
}

#[tokio::test]
async fn consume_keeps_existing_membership() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();
    let invitation = repo
        .upsert_pending(invite(ws, owner, "owner@example.com", "hash-o"), Limit::Unlimited)
        .await
        .unwrap();

    let edge = repo.consume(&invitation, owner).await.unwrap();
    assert_eq!(edge.role, Role::Owner);
    assert_eq!(db.memberships().count(ws).await.unwrap(), 1);
    assert!(repo.list(ws).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_and_delete_are_workspace_scoped() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();
    let invitation = repo
        .upsert_pending(invite(ws, owner, "dana@example.com", "hash-d"), Limit::Unlimited)
        .await
        .unwrap();

    let other = Uuid::new_v4();
    assert!(matches!(
        repo.get_by_id(other, invitation.id).await,
        Err(TesseraError::NotFound { .. })
    ));

    repo.delete(other, invitation.id).await.unwrap();
    assert!(repo.get_by_id(ws, invitation.id).await.is_ok());

    repo.delete(ws, invitation.id).await.unwrap();
    assert!(repo.get_by_id(ws, invitation.id).await.is_err());
}

#[tokio::test]
async fn concurrent_upserts_respect_seat_limit() {
    let (db, ws, owner) = setup().await;
    let repo = db.invitations();

    let (a, b, c) = tokio::join!(
        repo.upsert_pending(invite(ws, owner, "a@example.com", "hash-a"), Limit::Max(3)),
        repo.upsert_pending(invite(ws, owner, "b@example.com", "hash-b"), Limit::Max(3)),
        repo.upsert_pending(invite(ws, owner, "c@example.com", "hash-c"), Limit::Max(3)),
    );

    let written = [&a, &b, &c].iter().filter(|r| r.is_ok()).count();
    assert_eq!(written, 2, "a: {a:?}, b: {b:?}, c: {c:?}");
    for result in [a, b, c] {
        if let Err(err) = result {
            assert!(
                matches!(err, TesseraError::LimitReached { limit: 3, .. }),
                "got {err:?}"
            );
        }
    }
    assert_eq!(db.memberships().count(ws).await.unwrap(), 1);
    assert_eq!(repo.count_pending(ws).await.unwrap(), 2);
}

#[tokio::test]
async fn upsert_touches_the_workspace_row() {
    let (db, ws, owner) = setup().await;
    let before = db.workspaces().get_by_id(ws).await.unwrap().updated_at;

    db.invitations()
        .upsert_pending(invite(ws, owner, "a@example.com", "hash-a"), Limit::Max(3))
        .await
        .unwrap();

    let after = db.workspaces().get_by_id(ws).await.unwrap().updated_at;
    assert!(after > before);
}
