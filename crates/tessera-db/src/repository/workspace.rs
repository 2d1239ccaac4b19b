//! SurrealDB implementation of [`WorkspaceRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::workspace::{CreateWorkspace, UpdateWorkspace, Workspace};
use tessera_core::repository::WorkspaceRepository;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct WorkspaceRow {
    record_id: String,
    name: String,
    slug: String,
    personal: bool,
    owner_id: String,
    require_two_factor: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl WorkspaceRow {
    fn try_into_workspace(self) -> Result<Workspace, DbError> {
        Ok(Workspace {
            id: parse_uuid("workspace", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            personal: self.personal,
            owner_id: parse_uuid("owner", &self.owner_id)?,
            require_two_factor: self.require_two_factor,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

fn into_workspaces(rows: Vec<WorkspaceRow>) -> Result<Vec<Workspace>, DbError> {
    rows.into_iter()
        .map(WorkspaceRow::try_into_workspace)
        .collect()
}

/// Concurrent creates share only the slug index entry, so losing the
/// commit race means the slug was claimed.
fn slug_conflict(err: DbError) -> DbError {
    match err {
        DbError::TransactionConflict { entity, reason } => DbError::Conflict { entity, reason },
        other => other,
    }
}

/// SurrealDB implementation of the Workspace repository.
#[derive(Clone)]
pub struct SurrealWorkspaceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealWorkspaceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> Result<Workspace, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('workspace', $id) \
                 WHERE deleted_at = NONE",
            )
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<WorkspaceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("workspace", id_str))?
            .try_into_workspace()
    }
}

impl<C: Connection> WorkspaceRepository for SurrealWorkspaceRepository<C> {
    async fn create(&self, input: CreateWorkspace) -> TesseraResult<Workspace> {
        let id = Uuid::new_v4();

        // Workspace row and owner edge commit together so no reader can
        // observe a workspace without its owner.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('workspace', $id) SET \
                 name = $name, slug = $slug, personal = $personal, \
                 owner_id = $owner_id, require_two_factor = false; \
                 CREATE type::record('membership', $membership_id) SET \
                 workspace_id = $id, user_id = $owner_id, \
                 role = 'owner', permissions = []; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("membership_id", Uuid::new_v4().to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("personal", input.personal))
            .bind(("owner_id", input.owner_id.to_string()))
            .await
            .map_err(|e| slug_conflict(DbError::from_statement("workspace", e)))?
            .check()
            .map_err(|e| slug_conflict(DbError::from_statement("workspace", e)))?;

        let workspace = self.fetch(id).await?;
        info!(
            workspace_id = %workspace.id,
            owner_id = %workspace.owner_id,
            personal = workspace.personal,
            "Workspace created"
        );
        Ok(workspace)
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<Workspace> {
        Ok(self.fetch(id).await?)
    }

    async fn get_by_slug(&self, slug: &str) -> TesseraResult<Workspace> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM workspace \
                 WHERE slug = $slug AND deleted_at = NONE",
            )
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("workspace", format!("slug={slug}")))?;

        Ok(row.try_into_workspace()?)
    }

    async fn slug_exists(&self, slug: &str) -> TesseraResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM workspace WHERE slug = $slug GROUP ALL")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(rows) > 0)
    }

    async fn update(&self, id: Uuid, input: UpdateWorkspace) -> TesseraResult<Workspace> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.require_two_factor.is_some() {
            sets.push("require_two_factor = $require_two_factor");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('workspace', $id) SET {} \
             WHERE deleted_at = NONE",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(require_two_factor) = input.require_two_factor {
            builder = builder.bind(("require_two_factor", require_two_factor));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("workspace", e))?;

        Ok(self.fetch(id).await?)
    }

    async fn soft_delete(&self, id: Uuid) -> TesseraResult<()> {
        self.db
            .query(
                "UPDATE type::record('workspace', $id) SET \
                 deleted_at = time::now(), updated_at = time::now() \
                 WHERE deleted_at = NONE",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("workspace", e))?;

        Ok(())
    }

    async fn list_owned_by(&self, user_id: Uuid) -> TesseraResult<Vec<Workspace>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM workspace \
                 WHERE owner_id = $user_id AND deleted_at = NONE \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_workspaces(rows)?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> TesseraResult<Vec<Workspace>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM workspace \
                 WHERE deleted_at = NONE AND meta::id(id) IN \
                 (SELECT VALUE workspace_id FROM membership \
                 WHERE user_id = $user_id) \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_workspaces(rows)?)
    }

    async fn get_personal(&self, user_id: Uuid) -> TesseraResult<Workspace> {
        let user_id_str = user_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM workspace \
                 WHERE owner_id = $user_id AND personal = true \
                 AND deleted_at = NONE LIMIT 1",
            )
            .bind(("user_id", user_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("personal workspace", format!("owner={user_id_str}")))?;

        Ok(row.try_into_workspace()?)
    }
}
