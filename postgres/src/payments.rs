//! PostgreSQL payment record store.

use crate::{cents_from_db, cents_to_db, storage_error};
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::{
    BookingId, Money, PaymentRecord, PaymentRecordStatus, PaymentRecordStore, PaymentSnapshot,
    Result, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type PaymentRow = (
    sqlx::types::Uuid,
    sqlx::types::Uuid,
    String,
    Vec<String>,
    i64,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// `PostgreSQL`-backed [`PaymentRecordStore`], keyed uniquely by booking id.
#[derive(Clone)]
pub struct PostgresPaymentRecordStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresPaymentRecordStore {
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

    fn row_to_record(row: PaymentRow) -> Result<PaymentRecord> {
        let (booking_id, owner_id, catalog_item_name, seats, cents, status, created_at, updated_at) =
            row;
        Ok(PaymentRecord {
            booking_id: BookingId::from_uuid(booking_id),
            owner_id: UserId::from_uuid(owner_id),
            catalog_item_name,
            seats,
            total_amount: Money::from_cents(cents_from_db(cents)?),
            status: PaymentRecordStatus::parse(&status)?,
            created_at,
            updated_at,
        })
    }
}

impl PaymentRecordStore for PostgresPaymentRecordStore {
    fn upsert_for_booking(
        &self,
        booking_id: BookingId,
        snapshot: PaymentSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentRecord>> + Send + '_>> {
        Box::pin(async move {
            let row: PaymentRow = sqlx::query_as(
                r"
                INSERT INTO payment_records (
                    booking_id, owner_id, catalog_item_name, seats,
                    total_amount_cents, status, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                ON CONFLICT (booking_id) DO UPDATE
                SET owner_id = EXCLUDED.owner_id,
                    catalog_item_name = EXCLUDED.catalog_item_name,
                    seats = EXCLUDED.seats,
                    total_amount_cents = EXCLUDED.total_amount_cents,
                    status = EXCLUDED.status,
                    updated_at = EXCLUDED.updated_at
                RETURNING booking_id, owner_id, catalog_item_name, seats,
                          total_amount_cents, status, created_at, updated_at
                ",
            )
            .bind(booking_id.as_uuid())
            .bind(snapshot.owner_id.as_uuid())
            .bind(&snapshot.catalog_item_name)
            .bind(&snapshot.seats)
            .bind(cents_to_db(snapshot.total_amount.cents())?)
            .bind(snapshot.status.as_str())
            .bind(self.clock.now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to upsert payment record", &e))?;

            tracing::debug!(booking_id = %booking_id, "Payment record upserted");
            Self::row_to_record(row)
        })
    }

    fn find_by_booking(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PaymentRecord>>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<PaymentRow> = sqlx::query_as(
                r"
                SELECT booking_id, owner_id, catalog_item_name, seats,
                       total_amount_cents, status, created_at, updated_at
                FROM payment_records
                WHERE booking_id = $1
                ",
            )
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load payment record", &e))?;

            row.map(Self::row_to_record).transpose()
        })
    }
}
