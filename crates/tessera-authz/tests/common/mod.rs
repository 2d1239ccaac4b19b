//! Shared fixtures: in-memory SurrealDB, a static plan resolver and a
//! recording invitation notifier.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tessera_authz::{AuthzConfig, InvitationService, WorkspaceService, WorkspaceStores};
use tessera_core::error::TesseraResult;
use tessera_core::models::capability::CapabilitySet;
use tessera_core::models::invitation::InvitationEmail;
use tessera_core::models::membership::{CreateMembership, Role};
use tessera_core::models::user::{CreateUser, User};
use tessera_core::models::workspace::Workspace;
use tessera_core::repository::{
    InvitationNotifier, MembershipRepository, PlanResolver, UserRepository, WorkspaceRepository,
};
use tessera_db::DbManager;
use tessera_db::repository::{
    SurrealInvitationRepository, SurrealMembershipRepository, SurrealResourceCounter,
    SurrealUserRepository, SurrealWorkspaceRepository,
};
use uuid::Uuid;

/// Plan keys per workspace; anything unset is on `free`.
#[derive(Clone, Default)]
pub struct StaticPlans(Arc<Mutex<HashMap<Uuid, String>>>);

impl StaticPlans {
    pub fn set(&self, workspace_id: Uuid, plan_key: &str) {
        self.0
            .lock()
            .unwrap()
            .insert(workspace_id, plan_key.to_string());
    }
}

impl PlanResolver for StaticPlans {
    async fn resolve_plan_key(&self, workspace_id: Uuid) -> TesseraResult<String> {
        let key = self.0.lock().unwrap().get(&workspace_id).cloned();
        Ok(key.unwrap_or_else(|| "free".into()))
    }
}

/// Keeps every dispatched invitation email.
#[derive(Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<InvitationEmail>>>);

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<InvitationEmail> {
        self.0.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> String {
        self.0
            .lock()
            .unwrap()
            .last()
            .map(|m| m.token.clone())
            .expect("no invitation email was sent")
    }
}

impl InvitationNotifier for RecordingNotifier {
    async fn send_invitation_email(&self, email: InvitationEmail) {
        self.0.lock().unwrap().push(email);
    }
}

pub type Invitations = InvitationService<
    SurrealWorkspaceRepository<Db>,
    SurrealMembershipRepository<Db>,
    SurrealInvitationRepository<Db>,
    SurrealUserRepository<Db>,
    StaticPlans,
    RecordingNotifier,
>;

pub type Workspaces = WorkspaceService<
    SurrealWorkspaceRepository<Db>,
    SurrealMembershipRepository<Db>,
    SurrealInvitationRepository<Db>,
    SurrealUserRepository<Db>,
    StaticPlans,
    SurrealResourceCounter<Db>,
    SurrealUserRepository<Db>,
>;

pub struct Env {
    pub db: DbManager<Db>,
    pub plans: StaticPlans,
    pub mailer: RecordingNotifier,
}

impl Env {
    /// Spin up in-memory DB and run migrations.
    pub async fn new() -> Self {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        let db = DbManager::from_client(db);
        db.migrate().await.unwrap();
        Self {
            db,
            plans: StaticPlans::default(),
            mailer: RecordingNotifier::default(),
        }
    }

    pub fn invitations(&self) -> Invitations {
        InvitationService::new(
            self.db.workspaces(),
            self.db.memberships(),
            self.db.invitations(),
            self.db.users(),
            self.plans.clone(),
            self.mailer.clone(),
            AuthzConfig::default(),
        )
    }

    pub fn workspaces(&self) -> Workspaces {
        WorkspaceService::new(
            WorkspaceStores {
                workspaces: self.db.workspaces(),
                memberships: self.db.memberships(),
                invitations: self.db.invitations(),
                users: self.db.users(),
                plans: self.plans.clone(),
                resources: self.db.resource_counter(),
                two_factor: self.db.users(),
            },
            AuthzConfig::default(),
        )
    }

    /// Create a user with their personal workspace, returning the
    /// refreshed user (current workspace set).
    pub async fn register(&self, name: &str, email: &str) -> (User, Workspace) {
        let user = self
            .db
            .users()
            .create(CreateUser {
                name: name.into(),
                email: email.into(),
            })
            .await
            .unwrap();
        let personal = self
            .workspaces()
            .create_personal_workspace(&user)
            .await
            .unwrap();
        let user = self.db.users().get_by_id(user.id).await.unwrap();
        (user, personal)
    }

    /// A team workspace owned by `owner`, whose personal workspace is
    /// upgraded to `pro` so the workspace limit allows it.
    pub async fn team(&self, owner: &User, name: &str, plan_key: &str) -> Workspace {
        let personal = self.db.workspaces().get_personal(owner.id).await.unwrap();
        self.plans.set(personal.id, "pro");
        let team = self.workspaces().create_workspace(owner.id, name).await.unwrap();
        self.plans.set(team.id, plan_key);
        team
    }

    pub async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: Role,
        permissions: CapabilitySet,
    ) {
        self.db
            .memberships()
            .add(CreateMembership {
                workspace_id,
                user_id,
                role,
                permissions,
            })
            .await
            .unwrap();
    }

    pub async fn user(&self, id: Uuid) -> User {
        self.db.users().get_by_id(id).await.unwrap()
    }
}
