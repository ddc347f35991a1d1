//! Owner lookups against the identity provider's `users` table.

use crate::storage_error;
use boxoffice_core::{OwnerDirectory, OwnerSummary, Result, UserId};
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed [`OwnerDirectory`].
#[derive(Clone)]
pub struct PostgresOwnerDirectory {
    pool: PgPool,
}

impl PostgresOwnerDirectory {
    /// Create a directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OwnerDirectory for PostgresOwnerDirectory {
    fn summaries(
        &self,
        ids: Vec<UserId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<UserId, OwnerSummary>>> + Send + '_>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(HashMap::new());
            }
            let uuids: Vec<sqlx::types::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

            let rows: Vec<(sqlx::types::Uuid, String, String)> = sqlx::query_as(
                "SELECT id, user_name, email FROM users WHERE id = ANY($1)",
            )
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to resolve owners", &e))?;

            Ok(rows
                .into_iter()
                .map(|(id, name, email)| {
                    let id = UserId::from_uuid(id);
                    (id, OwnerSummary { id, name, email })
                })
                .collect())
        })
    }
}
