//! Startup reconciliation of the payment reference uniqueness index.
//!
//! Deployments that predate the partial index may carry a plain unique index
//! on `payment_reference`, together with rows storing `''` as a placeholder
//! for "no reference". Under that index a second placeholder collides with the
//! first, so a booking could never be created or updated once any placeholder
//! existed. Reconciliation turns placeholders into `NULL` and replaces the
//! index with the partial one, atomically.

use crate::PostgresBookingStore;
use std::fmt;

/// Name of the index that enforces payment reference uniqueness.
pub(crate) const INDEX_NAME: &str = "bookings_payment_reference_key";

/// Predicate the index must carry, in normalized form.
const EXPECTED_PREDICATE: &str = "payment_referenceisnotnull";

/// The only key column the index may cover.
const INDEXED_COLUMN: &str = "payment_reference";

/// What [`PostgresBookingStore::reconcile_payment_reference_index`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexReconciliation {
    /// The partial unique index was already in place.
    AlreadyCurrent,
    /// No index existed; the partial unique index was created.
    Created,
    /// An index with the wrong definition was dropped and recreated.
    Recreated,
    /// Reconciliation failed and the schema was left unchanged.
    Failed {
        /// Driver message
        reason: String,
    },
}

impl IndexReconciliation {
    /// Label used for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyCurrent => "already_current",
            Self::Created => "created",
            Self::Recreated => "recreated",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for IndexReconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Strip parentheses and whitespace so `((payment_reference IS NOT NULL))`
/// and `payment_reference is not null` compare equal.
fn normalize_predicate(predicate: &str) -> String {
    predicate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether an existing index already has the required shape.
///
/// `columns` lists the key columns in index order; expression keys do not
/// appear in it.
fn is_current(unique: bool, columns: &[String], predicate: Option<&str>) -> bool {
    unique
        && matches!(columns, [only] if only == INDEXED_COLUMN)
        && predicate.is_some_and(|p| normalize_predicate(p) == EXPECTED_PREDICATE)
}

impl PostgresBookingStore {
    /// Ensure payment references are unique only among bookings that hold one.
    ///
    /// Inspects the existing index and, if it is missing or not the partial
    /// unique index, normalizes blank references to `NULL` and recreates the
    /// index in a single transaction. Never returns an error: failures are
    /// logged, counted and reported as [`IndexReconciliation::Failed`], and
    /// startup continues.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_payment_reference_index(&self) -> IndexReconciliation {
        let outcome = match self.try_reconcile().await {
            Ok(outcome) => {
                tracing::info!(outcome = outcome.as_str(), "Payment reference index reconciled");
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "Payment reference index reconciliation failed");
                IndexReconciliation::Failed {
                    reason: e.to_string(),
                }
            }
        };

        metrics::counter!(
            "booking_store_index_reconciliations_total",
            "outcome" => outcome.as_str()
        )
        .increment(1);

        outcome
    }

    async fn try_reconcile(&self) -> Result<IndexReconciliation, sqlx::Error> {
        let existing: Option<(bool, i16, Vec<String>, Option<String>)> = sqlx::query_as(
            r"
            SELECT i.indisunique,
                   i.indnatts,
                   ARRAY(
                       SELECT a.attname::text
                       FROM unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                       JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = k.attnum
                       ORDER BY k.ord
                   ),
                   pg_get_expr(i.indpred, i.indrelid)
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indexrelid
            WHERE c.relname = $1
              AND i.indrelid = 'bookings'::regclass
            ",
        )
        .bind(INDEX_NAME)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((unique, key_count, columns, predicate)) = &existing {
            // An expression key leaves `columns` shorter than the key count.
            let named_keys_only = usize::try_from(*key_count).is_ok_and(|n| n == columns.len());
            if named_keys_only && is_current(*unique, columns, predicate.as_deref()) {
                return Ok(IndexReconciliation::AlreadyCurrent);
            }
            tracing::warn!(
                unique = unique,
                columns = ?columns,
                predicate = predicate.as_deref().unwrap_or("<none>"),
                "Payment reference index has the wrong definition"
            );
        }

        let mut tx = self.pool.begin().await?;

        let normalized = sqlx::query(
            "UPDATE bookings SET payment_reference = NULL WHERE btrim(payment_reference) = ''",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(&format!("DROP INDEX IF EXISTS {INDEX_NAME}"))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "CREATE UNIQUE INDEX {INDEX_NAME} ON bookings (payment_reference) \
             WHERE payment_reference IS NOT NULL"
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if normalized > 0 {
            tracing::warn!(rows = normalized, "Blank payment references cleared");
        }

        Ok(if existing.is_some() {
            IndexReconciliation::Recreated
        } else {
            IndexReconciliation::Created
        })
    }
}
