//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings, roles as
//! lowercase strings guarded by ASSERT, and the uniqueness invariants
//! of the workspace model are backed by UNIQUE indexes.

use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD two_factor_enabled ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD current_workspace_id ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_current_workspace ON TABLE user \
    COLUMNS current_workspace_id;

-- =======================================================================
-- Workspaces (tenants)
-- =======================================================================
DEFINE TABLE workspace SCHEMAFULL;
DEFINE FIELD name ON TABLE workspace TYPE string;
DEFINE FIELD slug ON TABLE workspace TYPE string;
DEFINE FIELD personal ON TABLE workspace TYPE bool DEFAULT false;
DEFINE FIELD owner_id ON TABLE workspace TYPE string;
DEFINE FIELD require_two_factor ON TABLE workspace TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE workspace TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE workspace TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD deleted_at ON TABLE workspace TYPE option<datetime>;
DEFINE INDEX idx_workspace_slug ON TABLE workspace COLUMNS slug UNIQUE;
DEFINE INDEX idx_workspace_owner ON TABLE workspace COLUMNS owner_id;

-- =======================================================================
-- Memberships (user x workspace edge)
-- =======================================================================
DEFINE TABLE membership SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE membership TYPE string;
DEFINE FIELD user_id ON TABLE membership TYPE string;
DEFINE FIELD role ON TABLE membership TYPE string \
    ASSERT $value IN ['owner', 'admin', 'member'];
DEFINE FIELD permissions ON TABLE membership TYPE array<string> \
    DEFAULT [];
DEFINE FIELD created_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_membership_workspace_user ON TABLE membership \
    COLUMNS workspace_id, user_id UNIQUE;
DEFINE INDEX idx_membership_user ON TABLE membership COLUMNS user_id;

-- =======================================================================
-- Invitations (workspace scope)
-- =======================================================================
DEFINE TABLE invitation SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE invitation TYPE string;
DEFINE FIELD email ON TABLE invitation TYPE string;
DEFINE FIELD role ON TABLE invitation TYPE string \
    ASSERT $value IN ['admin', 'member'];
DEFINE FIELD token_hash ON TABLE invitation TYPE string;
DEFINE FIELD invited_by ON TABLE invitation TYPE string;
DEFINE FIELD expires_at ON TABLE invitation TYPE datetime;
DEFINE FIELD created_at ON TABLE invitation TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE invitation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invitation_workspace_email ON TABLE invitation \
    COLUMNS workspace_id, email UNIQUE;
DEFINE INDEX idx_invitation_token ON TABLE invitation \
    COLUMNS token_hash UNIQUE;

-- =======================================================================
-- Counted resources (workspace scope; full shape owned elsewhere)
-- =======================================================================
DEFINE TABLE api_key SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE api_key TYPE string;
DEFINE FIELD name ON TABLE api_key TYPE string;
DEFINE FIELD created_at ON TABLE api_key TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_api_key_workspace ON TABLE api_key \
    COLUMNS workspace_id;

DEFINE TABLE webhook SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE webhook TYPE string;
DEFINE FIELD url ON TABLE webhook TYPE string;
DEFINE FIELD created_at ON TABLE webhook TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_webhook_workspace ON TABLE webhook \
    COLUMNS workspace_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Highest applied migration version, 0 on a fresh database.
async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT VALUE version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let versions: Vec<u32> = result.take(0)?;
    Ok(versions.first().copied().unwrap_or(0))
}

/// The migration's DDL and its `_migration` record in one transaction,
/// so a failed migration leaves no version behind.
fn migration_script(migration: &Migration) -> String {
    format!(
        "BEGIN TRANSACTION;\n{}\
         CREATE _migration SET version = $version, name = $name;\n\
         COMMIT TRANSACTION;",
        migration.sql
    )
}

/// Bring the schema up to the latest version.
///
/// The `_migration` table is defined idempotently on every call; every
/// migration newer than the highest recorded version is then applied
/// in ascending order.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = applied_version(db).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > current);

    for migration in pending {
        db.query(migration_script(migration))
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "v{} '{}': {e}",
                    migration.version, migration.name
                ))
            })?;

        info!(
            version = migration.version,
            name = migration.name,
            from_version = current,
            "Schema migration applied"
        );
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
