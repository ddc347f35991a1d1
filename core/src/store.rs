//! Storage abstractions for bookings, payment records and owner lookups.
//!
//! # Design
//!
//! The lifecycle holds no locks of its own. Every guarantee it gives under
//! concurrent or repeated calls comes from the atomicity of the operations
//! defined here:
//!
//! - [`BookingStore::update`] is a compare-and-set guarded by "not yet paid".
//! - A payment reference is attached only while none is held (first writer wins).
//! - A payment reference held by one booking is rejected for any other
//!   ([`BookingError::Conflict`](crate::error::BookingError::Conflict)); bookings
//!   without a reference never collide with each other.
//! - [`PaymentRecordStore::upsert_for_booking`] is keyed uniquely by booking id.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` / `PostgresPaymentRecordStore` (in `boxoffice-postgres`)
//! - `InMemoryBookingStore` / `InMemoryPaymentRecordStore` (in `boxoffice-testing`)
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! stores can be shared as `Arc<dyn BookingStore>` inside the service environment.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{
    Booking, BookingDraft, BookingId, BookingPatch, BookingUpdate, CatalogItemId, CatalogStats,
    OwnerSummary, PaymentRecord, PaymentSnapshot, UserId,
};

/// Durable table of bookings.
pub trait BookingStore: Send + Sync {
    /// Persist a new pending booking.
    ///
    /// The store assigns the id and timestamps. The new booking is unpaid,
    /// pending, and holds no payment reference.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`](crate::error::BookingError::Validation) if the draft lacks required fields
    /// - [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure
    fn create(&self, draft: BookingDraft) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>>;

    /// Load a booking by id.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`](crate::error::BookingError::NotFound) if no such booking exists
    /// - [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure
    fn find_by_id(&self, id: BookingId) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>>;

    /// All bookings of one owner, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn find_by_owner(
        &self,
        owner_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>>;

    /// Every booking, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn find_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>>;

    /// Apply `patch` if, and only if, the booking is not yet paid.
    ///
    /// A held payment reference is never replaced. When the booking is already
    /// paid (or the patch changes nothing) the stored booking is returned with
    /// `applied = false`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`](crate::error::BookingError::NotFound) if no such booking exists
    /// - [`BookingError::Conflict`](crate::error::BookingError::Conflict) if another booking holds the reference
    /// - [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure
    fn update(
        &self,
        id: BookingId,
        patch: BookingPatch,
    ) -> Pin<Box<dyn Future<Output = Result<BookingUpdate>> + Send + '_>>;

    /// Count and sum bookings per catalog item, paid or not.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn aggregate_by_catalog_item(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<CatalogItemId, CatalogStats>>> + Send + '_>>;
}

/// Durable table of payment confirmations, one per booking.
pub trait PaymentRecordStore: Send + Sync {
    /// Insert the record for `booking_id`, or replace its snapshot fields.
    ///
    /// Concurrent calls for the same booking leave exactly one record.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn upsert_for_booking(
        &self,
        booking_id: BookingId,
        snapshot: PaymentSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentRecord>> + Send + '_>>;

    /// Load the record for a booking, if payment was confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn find_by_booking(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PaymentRecord>>> + Send + '_>>;
}

/// Read access to the identity provider's user directory.
pub trait OwnerDirectory: Send + Sync {
    /// Resolve owner summaries in one batch. Unknown ids are left out.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`](crate::error::BookingError::StorageUnavailable) on infrastructure failure.
    fn summaries(
        &self,
        ids: Vec<UserId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<UserId, OwnerSummary>>> + Send + '_>>;
}
