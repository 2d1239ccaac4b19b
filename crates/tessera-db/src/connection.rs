//! SurrealDB connection management.

use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::repository::{
    SurrealInvitationRepository, SurrealMembershipRepository, SurrealResourceCounter,
    SurrealUserRepository, SurrealWorkspaceRepository,
};
use crate::schema::run_migrations;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "tessera".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Owns a SurrealDB client and hands out repositories bound to it.
#[derive(Clone)]
pub struct DbManager<C: Connection> {
    db: Surreal<C>,
}

impl DbManager<Client> {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }
}

impl<C: Connection> DbManager<C> {
    /// Wrap an already-configured client (e.g. an embedded in-memory
    /// engine).
    pub fn from_client(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }

    pub fn workspaces(&self) -> SurrealWorkspaceRepository<C> {
        SurrealWorkspaceRepository::new(self.db.clone())
    }

    pub fn memberships(&self) -> SurrealMembershipRepository<C> {
        SurrealMembershipRepository::new(self.db.clone())
    }

    pub fn invitations(&self) -> SurrealInvitationRepository<C> {
        SurrealInvitationRepository::new(self.db.clone())
    }

    pub fn users(&self) -> SurrealUserRepository<C> {
        SurrealUserRepository::new(self.db.clone())
    }

    pub fn resource_counter(&self) -> SurrealResourceCounter<C> {
        SurrealResourceCounter::new(self.db.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_tessera_namespace() {
        let config = DbConfig::default();
        assert_eq!(config.url, "127.0.0.1:8000");
        assert_eq!(config.namespace, "tessera");
        assert_eq!(config.database, "main");
    }
}
