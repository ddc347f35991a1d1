//! `PostgreSQL` storage for the box office booking system.
//!
//! This crate implements the store traits from `boxoffice-core` on top of sqlx:
//!
//! - [`PostgresBookingStore`]: bookings, with a partial unique index on payment references
//! - [`PostgresPaymentRecordStore`]: one payment record per booking, upserted
//! - [`PostgresOwnerDirectory`]: batched owner lookups against the `users` table
//!
//! Every guarantee the booking lifecycle relies on is enforced here by a single
//! statement: conditional `UPDATE ... WHERE is_paid = false`, `COALESCE` on the
//! reference column, and `INSERT ... ON CONFLICT (booking_id) DO UPDATE`.
//!
//! # Example
//!
//! ```no_run
//! use boxoffice_postgres::{IndexReconciliation, PostgresBookingStore};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/boxoffice").await?;
//! let bookings = PostgresBookingStore::new(pool);
//! bookings.migrate().await?;
//!
//! if let IndexReconciliation::Failed { reason } = bookings.reconcile_payment_reference_index().await {
//!     eprintln!("payment reference index left as-is: {reason}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod index;
mod owners;
mod payments;

pub use bookings::PostgresBookingStore;
pub use index::IndexReconciliation;
pub use owners::PostgresOwnerDirectory;
pub use payments::PostgresPaymentRecordStore;

use boxoffice_core::BookingError;

/// Map a driver error onto the storage variant, keeping the driver message.
pub(crate) fn storage_error(context: &str, error: &sqlx::Error) -> BookingError {
    BookingError::StorageUnavailable(format!("{context}: {error}"))
}

/// Convert minor units to the `BIGINT` column type.
pub(crate) fn cents_to_db(cents: u64) -> Result<i64, BookingError> {
    i64::try_from(cents).map_err(|_| BookingError::Validation {
        fields: vec![boxoffice_core::FieldError::invalid(
            "total_amount",
            "amount is out of range",
        )],
    })
}

/// Convert a `BIGINT` column back to minor units.
pub(crate) fn cents_from_db(cents: i64) -> Result<u64, BookingError> {
    u64::try_from(cents)
        .map_err(|_| BookingError::StorageUnavailable(format!("Negative amount stored: {cents}")))
}

/// Convert a runtime in minutes to the `INTEGER` column type.
pub(crate) fn minutes_to_db(minutes: u32) -> Result<i32, BookingError> {
    i32::try_from(minutes).map_err(|_| BookingError::Validation {
        fields: vec![boxoffice_core::FieldError::invalid(
            "runtime_minutes",
            "runtime is out of range",
        )],
    })
}

/// Convert an `INTEGER` column back to a runtime in minutes.
pub(crate) fn minutes_from_db(minutes: i32) -> Result<u32, BookingError> {
    u32::try_from(minutes)
        .map_err(|_| BookingError::StorageUnavailable(format!("Negative runtime stored: {minutes}")))
}
