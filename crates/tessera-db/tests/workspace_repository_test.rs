//! Integration tests for the Workspace and Membership repositories using
//! in-memory SurrealDB.

use tessera_core::error::TesseraError;
use tessera_core::models::capability::{Capability, CapabilitySet};
use tessera_core::models::membership::{CreateMembership, Role};
use tessera_core::models::plan::CountedResource;
use tessera_core::models::workspace::{CreateWorkspace, UpdateWorkspace};
use tessera_core::repository::{MembershipRepository, ResourceCounter, WorkspaceRepository};
use tessera_db::DbManager;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> DbManager<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    let manager = DbManager::from_client(db);
    manager.migrate().await.unwrap();
    manager
}

fn workspace(name: &str, slug: &str, owner_id: Uuid) -> CreateWorkspace {
    CreateWorkspace {
        name: name.into(),
        slug: slug.into(),
        personal: false,
        owner_id,
    }
}

#[tokio::test]
async fn create_writes_owner_membership() {
    let db = setup().await;
    let owner = Uuid::new_v4();

    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", owner))
        .await
        .unwrap();
    assert_eq!(ws.owner_id, owner);
    assert!(!ws.require_two_factor);
    assert!(!ws.is_deleted());

    let edge = db.memberships().find(ws.id, owner).await.unwrap().unwrap();
    assert_eq!(edge.role, Role::Owner);
    assert!(edge.permissions.is_empty());
    assert_eq!(db.memberships().count(ws.id).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_slug_is_conflict() {
    let db = setup().await;
    db.workspaces()
        .create(workspace("Acme", "acme", Uuid::new_v4()))
        .await
        .unwrap();

    let err = db
        .workspaces()
        .create(workspace("Acme", "acme", Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn soft_deleted_workspace_is_hidden_but_keeps_slug() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", owner))
        .await
        .unwrap();

    db.workspaces().soft_delete(ws.id).await.unwrap();

    let err = db.workspaces().get_by_id(ws.id).await.unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));
    assert!(db.workspaces().get_by_slug("acme").await.is_err());
    assert!(db.workspaces().slug_exists("acme").await.unwrap());
    assert!(db.workspaces().list_owned_by(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let db = setup().await;
    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", Uuid::new_v4()))
        .await
        .unwrap();

    let updated = db
        .workspaces()
        .update(
            ws.id,
            UpdateWorkspace {
                require_two_factor: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.require_two_factor);
    assert_eq!(updated.name, "Acme");
    assert_eq!(updated.slug, "acme");
}

#[tokio::test]
async fn listings_follow_ownership_and_membership() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();

    let personal = db
        .workspaces()
        .create(CreateWorkspace {
            name: "Owner's Workspace".into(),
            slug: "owner-s-workspace".into(),
            personal: true,
            owner_id: owner,
        })
        .await
        .unwrap();
    let team = db
        .workspaces()
        .create(workspace("Team", "team", owner))
        .await
        .unwrap();
    db.memberships()
        .add(CreateMembership {
            workspace_id: team.id,
            user_id: member,
            role: Role::Member,
            permissions: CapabilitySet::empty(),
        })
        .await
        .unwrap();

    assert_eq!(db.workspaces().list_owned_by(owner).await.unwrap().len(), 2);
    assert_eq!(db.workspaces().get_personal(owner).await.unwrap().id, personal.id);

    let joined = db.workspaces().list_for_user(member).await.unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].id, team.id);
    assert!(db.workspaces().get_personal(member).await.is_err());
}

#[tokio::test]
async fn membership_add_update_remove() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let user = Uuid::new_v4();
    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", owner))
        .await
        .unwrap();

    let input = CreateMembership {
        workspace_id: ws.id,
        user_id: user,
        role: Role::Member,
        permissions: CapabilitySet::from([Capability::ViewActivityLogs]),
    };
    let edge = db.memberships().add(input.clone()).await.unwrap();
    assert!(edge.permissions.contains(Capability::ViewActivityLogs));

    let err = db.memberships().add(input).await.unwrap_err();
    assert!(matches!(err, TesseraError::AlreadyExists { .. }), "got {err:?}");

    let promoted = db
        .memberships()
        .update_role(ws.id, user, Role::Admin, CapabilitySet::empty())
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);
    assert!(promoted.permissions.is_empty());

    db.memberships().remove(ws.id, user).await.unwrap();
    assert!(db.memberships().find(ws.id, user).await.unwrap().is_none());
    assert_eq!(db.memberships().count(ws.id).await.unwrap(), 1);
}

#[tokio::test]
async fn transfer_ownership_swaps_roles_atomically() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", owner))
        .await
        .unwrap();
    db.memberships()
        .add(CreateMembership {
            workspace_id: ws.id,
            user_id: admin,
            role: Role::Admin,
            permissions: CapabilitySet::empty(),
        })
        .await
        .unwrap();

    db.memberships()
        .transfer_ownership(ws.id, owner, admin)
        .await
        .unwrap();

    let ws = db.workspaces().get_by_id(ws.id).await.unwrap();
    assert_eq!(ws.owner_id, admin);
    let old = db.memberships().find(ws.id, owner).await.unwrap().unwrap();
    let new = db.memberships().find(ws.id, admin).await.unwrap().unwrap();
    assert_eq!(old.role, Role::Admin);
    assert_eq!(new.role, Role::Owner);

    let owners = db
        .memberships()
        .list(ws.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.role == Role::Owner)
        .count();
    assert_eq!(owners, 1);
}

#[tokio::test]
async fn transfer_to_non_member_changes_nothing() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let ws = db
        .workspaces()
        .create(workspace("Acme", "acme", owner))
        .await
        .unwrap();

    let err = db
        .memberships()
        .transfer_ownership(ws.id, owner, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));

    let ws = db.workspaces().get_by_id(ws.id).await.unwrap();
    assert_eq!(ws.owner_id, owner);
    let edge = db.memberships().find(ws.id, owner).await.unwrap().unwrap();
    assert_eq!(edge.role, Role::Owner);
}

#[tokio::test]
async fn resource_counter_is_scoped_to_workspace() {
    let db = setup().await;
    let ws = Uuid::new_v4().to_string();
    let other = Uuid::new_v4().to_string();

    for (table, workspace_id) in [("api_key", &ws), ("api_key", &ws), ("webhook", &other)] {
        let sql = if table == "api_key" {
            "CREATE api_key SET workspace_id = $ws, name = 'key'"
        } else {
            "CREATE webhook SET workspace_id = $ws, url = 'https://example.com/hook'"
        };
        db.client()
            .query(sql)
            .bind(("ws", workspace_id.clone()))
            .await
            .unwrap()
            .check()
            .unwrap();
    }

    let counter = db.resource_counter();
    let ws_id = Uuid::parse_str(&ws).unwrap();
    assert_eq!(counter.count(ws_id, CountedResource::ApiKeys).await.unwrap(), 2);
    assert_eq!(counter.count(ws_id, CountedResource::Webhooks).await.unwrap(), 0);
}
