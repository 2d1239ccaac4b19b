//! SurrealDB implementation of [`MembershipRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::capability::CapabilitySet;
use tessera_core::models::membership::{CreateMembership, Membership, Role};
use tessera_core::repository::MembershipRepository;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(crate) struct MembershipRow {
    record_id: String,
    workspace_id: String,
    user_id: String,
    role: String,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    pub(crate) fn try_into_membership(self) -> Result<Membership, DbError> {
        let role = self.role.parse::<Role>().map_err(DbError::Decode)?;
        let permissions = CapabilitySet::from_keys(&self.permissions)
            .map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Membership {
            id: parse_uuid("membership", &self.record_id)?,
            workspace_id: parse_uuid("workspace", &self.workspace_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            role,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Load the edge for (workspace, user), shared with the invitation
/// repository which re-reads it after acceptance.
pub(crate) async fn find_membership<C: Connection>(
    db: &Surreal<C>,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM membership \
             WHERE workspace_id = $workspace_id AND user_id = $user_id",
        )
        .bind(("workspace_id", workspace_id.to_string()))
        .bind(("user_id", user_id.to_string()))
        .await?;

    let rows: Vec<MembershipRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .map(MembershipRow::try_into_membership)
        .transpose()
}

/// SurrealDB implementation of the Membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn require(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Membership, DbError> {
        find_membership(&self.db, workspace_id, user_id)
            .await?
            .ok_or_else(|| {
                DbError::not_found("membership", format!("workspace={workspace_id},user={user_id}"))
            })
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn find(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<Option<Membership>> {
        Ok(find_membership(&self.db, workspace_id, user_id).await?)
    }

    async fn list(&self, workspace_id: Uuid) -> TesseraResult<Vec<Membership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM membership \
                 WHERE workspace_id = $workspace_id \
                 ORDER BY created_at ASC",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(MembershipRow::try_into_membership)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn count(&self, workspace_id: Uuid) -> TesseraResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM membership \
                 WHERE workspace_id = $workspace_id GROUP ALL",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(rows))
    }

    async fn add(&self, input: CreateMembership) -> TesseraResult<Membership> {
        self.db
            .query(
                "CREATE type::record('membership', $id) SET \
                 workspace_id = $workspace_id, user_id = $user_id, \
                 role = $role, permissions = $permissions",
            )
            .bind(("id", Uuid::new_v4().to_string()))
            .bind(("workspace_id", input.workspace_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("permissions", input.permissions.to_keys()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("membership", e))?;

        Ok(self.require(input.workspace_id, input.user_id).await?)
    }

    async fn update_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: Role,
        permissions: CapabilitySet,
    ) -> TesseraResult<Membership> {
        self.db
            .query(
                "UPDATE membership SET role = $role, permissions = $permissions, \
                 updated_at = time::now() \
                 WHERE workspace_id = $workspace_id AND user_id = $user_id",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("role", role.as_str().to_string()))
            .bind(("permissions", permissions.to_keys()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("membership", e))?;

        Ok(self.require(workspace_id, user_id).await?)
    }

    async fn remove(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<()> {
        self.db
            .query(
                "DELETE membership \
                 WHERE workspace_id = $workspace_id AND user_id = $user_id",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn transfer_ownership(
        &self,
        workspace_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> TesseraResult<()> {
        // All three writes are skipped unless the new owner already holds
        // an edge, so a missing member can never leave the workspace
        // without an owner.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $target = (SELECT VALUE id FROM membership \
                 WHERE workspace_id = $workspace_id AND user_id = $to_user_id); \
                 IF array::len($target) > 0 { \
                 UPDATE membership SET role = 'admin', permissions = [], \
                 updated_at = time::now() \
                 WHERE workspace_id = $workspace_id AND user_id = $from_user_id; \
                 UPDATE membership SET role = 'owner', permissions = [], \
                 updated_at = time::now() \
                 WHERE workspace_id = $workspace_id AND user_id = $to_user_id; \
                 UPDATE type::record('workspace', $workspace_id) SET \
                 owner_id = $to_user_id, updated_at = time::now(); \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("from_user_id", from_user_id.to_string()))
            .bind(("to_user_id", to_user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("membership", e))?;

        let promoted = self.require(workspace_id, to_user_id).await?;
        if promoted.role != Role::Owner {
            return Err(DbError::not_found(
                "membership",
                format!("workspace={workspace_id},user={to_user_id}"),
            )
            .into());
        }

        info!(
            workspace_id = %workspace_id,
            from_user_id = %from_user_id,
            to_user_id = %to_user_id,
            "Workspace ownership transferred"
        );
        Ok(())
    }
}
