//! SurrealDB implementation of [`UserRepository`] and [`TwoFactorStatus`].
//!
//! Credentials live with the identity provider; this table only carries
//! what workspace authorization reads: email for invitation matching,
//! the two-factor flag and the currently selected workspace.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::user::{CreateUser, User};
use tessera_core::repository::{TwoFactorStatus, UserRepository};
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    name: String,
    email: String,
    two_factor_enabled: bool,
    current_workspace_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            name: self.name,
            email: self.email,
            two_factor_enabled: self.two_factor_enabled,
            current_workspace_id: parse_optional_uuid(
                "current workspace",
                self.current_workspace_id,
            )?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> Result<User, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<UserRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id_str))?
            .try_into_user()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> TesseraResult<User> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 name = $name, email = $email, two_factor_enabled = false",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        Ok(self.fetch(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<User> {
        Ok(self.fetch(id).await?)
    }

    async fn get_by_email(&self, email: &str) -> TesseraResult<Option<User>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(UserRow::try_into_user)
            .transpose()?)
    }

    async fn set_current_workspace(
        &self,
        user_id: Uuid,
        workspace_id: Option<Uuid>,
    ) -> TesseraResult<User> {
        // Make sure the user exists before writing; UPDATE on a missing
        // record id would silently create nothing.
        self.fetch(user_id).await?;

        self.db
            .query(
                "UPDATE type::record('user', $id) SET \
                 current_workspace_id = $workspace_id, updated_at = time::now()",
            )
            .bind(("id", user_id.to_string()))
            .bind(("workspace_id", workspace_id.map(|w| w.to_string())))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        Ok(self.fetch(user_id).await?)
    }

    async fn set_two_factor_enabled(&self, user_id: Uuid, enabled: bool) -> TesseraResult<User> {
        self.fetch(user_id).await?;

        self.db
            .query(
                "UPDATE type::record('user', $id) SET \
                 two_factor_enabled = $enabled, updated_at = time::now()",
            )
            .bind(("id", user_id.to_string()))
            .bind(("enabled", enabled))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        Ok(self.fetch(user_id).await?)
    }

    async fn list_by_current_workspace(&self, workspace_id: Uuid) -> TesseraResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE current_workspace_id = $workspace_id \
                 ORDER BY created_at ASC",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }
}

impl<C: Connection> TwoFactorStatus for SurrealUserRepository<C> {
    async fn has_two_factor_enabled(&self, user_id: Uuid) -> TesseraResult<bool> {
        Ok(self.fetch(user_id).await?.two_factor_enabled)
    }
}
