//! PostgreSQL booking store.

use crate::{cents_from_db, cents_to_db, minutes_from_db, minutes_to_db, storage_error};
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::{
    Booking, BookingDraft, BookingError, BookingId, BookingPatch, BookingStatus, BookingStore,
    BookingUpdate, CatalogItemId, CatalogStats, Money, PaymentReference, Result, ShowSnapshot,
    UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Columns selected for every booking read, in [`row_to_booking`] order.
const BOOKING_COLUMNS: &str = "id, owner_id, catalog_item_id, title, poster_path, runtime_minutes, \
     show_time, seats, scheduled_date, total_amount_cents, payment_reference, is_paid, status, \
     payment_confirmed_at, created_at, updated_at";

/// `PostgreSQL`-backed [`BookingStore`].
///
/// # Example
///
/// ```no_run
/// use boxoffice_postgres::PostgresBookingStore;
/// use boxoffice_core::BookingStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresBookingStore::new(pool);
/// store.migrate().await?;
/// let all = store.find_all().await?;
/// println!("{} bookings", all.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresBookingStore {
    pub(crate) pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresBookingStore {
    /// Create a store over `pool`, stamping rows with the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create a store over `pool`, stamping rows with `clock`.
    #[must_use]
    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BookingError::StorageUnavailable(format!("Migration failed: {e}")))?;
        Ok(())
    }

    async fn fetch(&self, id: BookingId) -> Result<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load booking", &e))?;
        row.as_ref().map(row_to_booking).transpose()
    }
}

fn map_write_error(context: &str, error: &sqlx::Error, reference: Option<&PaymentReference>) -> BookingError {
    if let sqlx::Error::Database(db_err) = error {
        if db_err.is_unique_violation() {
            let held = reference.map_or_else(|| "payment reference".to_string(), ToString::to_string);
            return BookingError::Conflict(format!(
                "payment reference {held} is already attached to another booking"
            ));
        }
    }
    storage_error(context, error)
}

fn decode<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| storage_error(&format!("Failed to decode bookings.{column}"), &e))
}

/// Convert a database row to a [`Booking`].
fn row_to_booking(row: &PgRow) -> Result<Booking> {
    let runtime: i32 = decode(row, "runtime_minutes")?;
    let reference: Option<String> = decode(row, "payment_reference")?;
    let status: String = decode(row, "status")?;

    Ok(Booking {
        id: BookingId::from_uuid(decode(row, "id")?),
        owner_id: UserId::from_uuid(decode(row, "owner_id")?),
        catalog_item_id: CatalogItemId::new(decode::<String>(row, "catalog_item_id")?),
        snapshot: ShowSnapshot {
            title: decode(row, "title")?,
            poster_path: decode(row, "poster_path")?,
            runtime_minutes: minutes_from_db(runtime)?,
            show_time: decode(row, "show_time")?,
        },
        seats: decode(row, "seats")?,
        scheduled_date: decode(row, "scheduled_date")?,
        total_amount: Money::from_cents(cents_from_db(decode(row, "total_amount_cents")?)?),
        // Legacy rows may still carry '' until the index is reconciled.
        payment_reference: reference.as_deref().and_then(PaymentReference::parse),
        is_paid: decode(row, "is_paid")?,
        status: BookingStatus::parse(&status)?,
        payment_confirmed_at: decode(row, "payment_confirmed_at")?,
        created_at: decode(row, "created_at")?,
        updated_at: decode(row, "updated_at")?,
    })
}

impl BookingStore for PostgresBookingStore {
    fn create(&self, draft: BookingDraft) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>> {
        Box::pin(async move {
            draft.validate()?;
            let booking = Booking::from_draft(BookingId::new(), draft, self.clock.now());
            let runtime = minutes_to_db(booking.snapshot.runtime_minutes)?;

            sqlx::query(
                r"
                INSERT INTO bookings (
                    id, owner_id, catalog_item_id, title, poster_path, runtime_minutes,
                    show_time, seats, scheduled_date, total_amount_cents,
                    is_paid, status, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $12, $12)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.owner_id.as_uuid())
            .bind(booking.catalog_item_id.as_str())
            .bind(&booking.snapshot.title)
            .bind(&booking.snapshot.poster_path)
            .bind(runtime)
            .bind(&booking.snapshot.show_time)
            .bind(&booking.seats)
            .bind(booking.scheduled_date)
            .bind(cents_to_db(booking.total_amount.cents())?)
            .bind(booking.status.as_str())
            .bind(booking.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to insert booking", &e))?;

            tracing::debug!(booking_id = %booking.id, owner_id = %booking.owner_id, "Booking inserted");
            Ok(booking)
        })
    }

    fn find_by_id(&self, id: BookingId) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>> {
        Box::pin(async move { self.fetch(id).await?.ok_or(BookingError::NotFound(id)) })
    }

    fn find_by_owner(
        &self,
        owner_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE owner_id = $1 \
                 ORDER BY created_at DESC, seq DESC"
            );
            let rows = sqlx::query(&sql)
                .bind(owner_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_error("Failed to list owner bookings", &e))?;
            rows.iter().map(row_to_booking).collect()
        })
    }

    fn find_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, seq DESC");
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_error("Failed to list bookings", &e))?;
            rows.iter().map(row_to_booking).collect()
        })
    }

    fn update(
        &self,
        id: BookingId,
        patch: BookingPatch,
    ) -> Pin<Box<dyn Future<Output = Result<BookingUpdate>> + Send + '_>> {
        Box::pin(async move {
            let confirm = patch.confirm_at.is_some();
            let sql = format!(
                r"
                UPDATE bookings
                SET payment_reference = COALESCE(payment_reference, $2::text),
                    is_paid = is_paid OR $3,
                    status = CASE WHEN $3 THEN 'confirmed' ELSE status END,
                    payment_confirmed_at = CASE WHEN $3 THEN $4::timestamptz ELSE payment_confirmed_at END,
                    updated_at = $5
                WHERE id = $1
                  AND is_paid = FALSE
                  AND ($3 OR (payment_reference IS NULL AND $2::text IS NOT NULL))
                RETURNING {BOOKING_COLUMNS}
                "
            );
            let row = sqlx::query(&sql)
                .bind(id.as_uuid())
                .bind(patch.payment_reference.as_ref().map(PaymentReference::as_str))
                .bind(confirm)
                .bind(patch.confirm_at)
                .bind(self.clock.now())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_write_error("Failed to update booking", &e, patch.payment_reference.as_ref()))?;

            if let Some(row) = row {
                return Ok(BookingUpdate {
                    booking: row_to_booking(&row)?,
                    applied: true,
                });
            }

            // Guard did not match: either missing, already paid, or nothing to change.
            let booking = self.fetch(id).await?.ok_or(BookingError::NotFound(id))?;
            Ok(BookingUpdate {
                booking,
                applied: false,
            })
        })
    }

    fn aggregate_by_catalog_item(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<CatalogItemId, CatalogStats>>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<(String, i64, i64)> = sqlx::query_as(
                r"
                SELECT catalog_item_id,
                       COUNT(*)::BIGINT,
                       COALESCE(SUM(total_amount_cents), 0)::BIGINT
                FROM bookings
                GROUP BY catalog_item_id
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to aggregate bookings", &e))?;

            rows.into_iter()
                .map(|(catalog_item_id, count, earnings)| {
                    Ok((
                        CatalogItemId::new(catalog_item_id),
                        CatalogStats {
                            total_bookings: u64::try_from(count).unwrap_or_default(),
                            earnings: Money::from_cents(cents_from_db(earnings)?),
                        },
                    ))
                })
                .collect()
        })
    }
}
