//! SurrealDB implementation of [`InvitationRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::invitation::{Invitation, UpsertInvitation};
use tessera_core::models::membership::{Membership, Role};
use tessera_core::models::plan::Limit;
use tessera_core::repository::InvitationRepository;
use tracing::debug;
use uuid::Uuid;

use super::membership::find_membership;
use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// Re-runs of a seat-guarded upsert that lost a write conflict.
const MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Debug, SurrealValue)]
struct InvitationRow {
    record_id: String,
    workspace_id: String,
    email: String,
    role: String,
    token_hash: String,
    invited_by: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvitationRow {
    fn try_into_invitation(self) -> Result<Invitation, DbError> {
        let role = self.role.parse::<Role>().map_err(DbError::Decode)?;
        Ok(Invitation {
            id: parse_uuid("invitation", &self.record_id)?,
            workspace_id: parse_uuid("workspace", &self.workspace_id)?,
            email: self.email,
            role,
            token_hash: self.token_hash,
            invited_by: parse_uuid("inviter", &self.invited_by)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Upsert guarded by a seat re-count. Seats are accepted members plus
/// unexpired invitations for other addresses: refreshing an address's
/// own invitation never takes an extra seat. When the workspace is full
/// nothing is written, which the caller detects through the unchanged
/// token hash.
///
/// The workspace row is written before counting, so two upserts for the
/// same workspace cannot both commit on a stale count; the loser fails
/// with a transaction conflict and is re-run.
const UPSERT_PENDING: &str = "\
BEGIN TRANSACTION;
UPDATE type::record('workspace', $workspace_id) SET updated_at = time::now();
LET $seats = array::len((SELECT VALUE id FROM membership \
    WHERE workspace_id = $workspace_id)) \
    + array::len((SELECT VALUE id FROM invitation \
    WHERE workspace_id = $workspace_id AND email != $email \
    AND expires_at > time::now()));
IF $seat_limit = NONE OR $seats < $seat_limit {
    IF array::len((SELECT VALUE id FROM invitation \
        WHERE workspace_id = $workspace_id AND email = $email)) > 0 {
        UPDATE invitation SET role = $role, token_hash = $token_hash, \
            invited_by = $invited_by, expires_at = $expires_at, \
            updated_at = time::now() \
            WHERE workspace_id = $workspace_id AND email = $email;
    } ELSE {
        CREATE type::record('invitation', $id) SET \
            workspace_id = $workspace_id, email = $email, role = $role, \
            token_hash = $token_hash, invited_by = $invited_by, \
            expires_at = $expires_at;
    };
};
COMMIT TRANSACTION;
";

/// Membership creation (if absent) and invitation deletion commit
/// together, so an invitation is consumed exactly once.
const CONSUME: &str = "\
BEGIN TRANSACTION;
IF array::len((SELECT VALUE id FROM membership \
    WHERE workspace_id = $workspace_id AND user_id = $user_id)) = 0 {
    CREATE type::record('membership', $membership_id) SET \
        workspace_id = $workspace_id, user_id = $user_id, \
        role = $role, permissions = [];
};
DELETE type::record('invitation', $invitation_id);
COMMIT TRANSACTION;
";

/// SurrealDB implementation of the Invitation repository.
#[derive(Clone)]
pub struct SurrealInvitationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInvitationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_email(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invitation \
                 WHERE workspace_id = $workspace_id AND email = $email",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("email", email.to_string()))
            .await?;

        let rows: Vec<InvitationRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(InvitationRow::try_into_invitation)
            .transpose()
    }

    async fn write_pending(
        &self,
        input: &UpsertInvitation,
        seat_limit: Option<u64>,
    ) -> Result<(), DbError> {
        self.db
            .query(UPSERT_PENDING)
            .bind(("id", Uuid::new_v4().to_string()))
            .bind(("workspace_id", input.workspace_id.to_string()))
            .bind(("email", input.email.clone()))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("token_hash", input.token_hash.clone()))
            .bind(("invited_by", input.invited_by.to_string()))
            .bind(("expires_at", input.expires_at))
            .bind(("seat_limit", seat_limit))
            .await
            .map_err(|e| DbError::from_statement("invitation", e))?
            .check()
            .map_err(|e| DbError::from_statement("invitation", e))?;
        Ok(())
    }
}

impl<C: Connection> InvitationRepository for SurrealInvitationRepository<C> {
    async fn upsert_pending(
        &self,
        input: UpsertInvitation,
        seat_limit: Limit,
    ) -> TesseraResult<Invitation> {
        let seat_limit_raw: Option<u64> = match seat_limit {
            Limit::Unlimited => None,
            Limit::Max(max) => Some(u64::from(max)),
        };

        let mut retries = 0;
        loop {
            match self.write_pending(&input, seat_limit_raw).await {
                Err(DbError::TransactionConflict { reason, .. })
                    if retries < MAX_CONFLICT_RETRIES =>
                {
                    retries += 1;
                    debug!(
                        workspace_id = %input.workspace_id,
                        retries,
                        %reason,
                        "Invitation upsert conflicted, re-counting seats"
                    );
                }
                result => break result?,
            }
        }

        let stored = self.find_by_email(input.workspace_id, &input.email).await?;
        match (stored, seat_limit) {
            (Some(invitation), _) if invitation.token_hash == input.token_hash => Ok(invitation),
            (_, Limit::Max(limit)) => Err(DbError::SeatLimitReached { limit }.into()),
            (_, Limit::Unlimited) => Err(DbError::Query(format!(
                "invitation for {} was not written",
                input.email
            ))
            .into()),
        }
    }

    async fn get_by_id(&self, workspace_id: Uuid, id: Uuid) -> TesseraResult<Invitation> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('invitation', $id) \
                 WHERE workspace_id = $workspace_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvitationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("invitation", id_str))?;

        Ok(row.try_into_invitation()?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> TesseraResult<Invitation> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invitation \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvitationRow> = result.take(0).map_err(DbError::from)?;
        // The hash itself is not echoed into the error.
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("invitation", "token"))?;

        Ok(row.try_into_invitation()?)
    }

    async fn find_pending(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> TesseraResult<Option<Invitation>> {
        Ok(self.find_by_email(workspace_id, email).await?)
    }

    async fn count_pending(&self, workspace_id: Uuid) -> TesseraResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM invitation \
                 WHERE workspace_id = $workspace_id \
                 AND expires_at > time::now() GROUP ALL",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(rows))
    }

    async fn list(&self, workspace_id: Uuid) -> TesseraResult<Vec<Invitation>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invitation \
                 WHERE workspace_id = $workspace_id \
                 ORDER BY created_at ASC",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvitationRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(InvitationRow::try_into_invitation)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn consume(&self, invitation: &Invitation, user_id: Uuid) -> TesseraResult<Membership> {
        self.db
            .query(CONSUME)
            .bind(("membership_id", Uuid::new_v4().to_string()))
            .bind(("invitation_id", invitation.id.to_string()))
            .bind(("workspace_id", invitation.workspace_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("role", invitation.role.as_str().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("membership", e))?;

        let membership = find_membership(&self.db, invitation.workspace_id, user_id)
            .await?
            .ok_or_else(|| {
                DbError::not_found(
                    "membership",
                    format!("workspace={},user={user_id}", invitation.workspace_id),
                )
            })?;

        Ok(membership)
    }

    async fn delete(&self, workspace_id: Uuid, id: Uuid) -> TesseraResult<()> {
        self.db
            .query(
                "DELETE type::record('invitation', $id) \
                 WHERE workspace_id = $workspace_id",
            )
            .bind(("id", id.to_string()))
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}
