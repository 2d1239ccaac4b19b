//! Row counts for plan-limited resources stored alongside workspaces.

use surrealdb::{Connection, Surreal};
use tessera_core::error::TesseraResult;
use tessera_core::models::plan::CountedResource;
use tessera_core::repository::ResourceCounter;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

fn count_query(resource: CountedResource) -> &'static str {
    match resource {
        CountedResource::ApiKeys => {
            "SELECT count() AS total FROM api_key \
             WHERE workspace_id = $workspace_id GROUP ALL"
        }
        CountedResource::Webhooks => {
            "SELECT count() AS total FROM webhook \
             WHERE workspace_id = $workspace_id GROUP ALL"
        }
    }
}

/// SurrealDB implementation of [`ResourceCounter`].
#[derive(Clone)]
pub struct SurrealResourceCounter<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceCounter<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceCounter for SurrealResourceCounter<C> {
    async fn count(&self, workspace_id: Uuid, resource: CountedResource) -> TesseraResult<u64> {
        let mut result = self
            .db
            .query(count_query(resource))
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(rows))
    }
}
