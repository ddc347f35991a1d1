//! Booking lifecycle: create, initiate payment, confirm payment, list.
//!
//! The service holds no locks. Repeated or concurrent calls for one booking
//! converge because every mutation is a single store operation:
//!
//! - attaching a reference is first-writer-wins,
//! - confirming is a compare-and-set guarded by "not yet paid",
//! - the payment record is an upsert keyed by booking id.

use crate::requests::{ConfirmPaymentRequest, CreateBookingRequest};
use boxoffice_core::environment::Clock;
use boxoffice_core::{
    Booking, BookingError, BookingId, BookingPatch, BookingStore, BookingWithOwner,
    OwnerDirectory, PaymentRecord, PaymentRecordStore, PaymentReference, Principal, Result,
    UserId,
};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Environment
// ============================================================================

/// Dependencies injected into [`BookingService`]
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for confirmation timestamps
    pub clock: Arc<dyn Clock>,
    /// Booking table
    pub bookings: Arc<dyn BookingStore>,
    /// Payment record table
    pub payments: Arc<dyn PaymentRecordStore>,
    /// Identity provider lookups for the admin listing
    pub owners: Arc<dyn OwnerDirectory>,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentRecordStore>,
        owners: Arc<dyn OwnerDirectory>,
    ) -> Self {
        Self {
            clock,
            bookings,
            payments,
            owners,
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Orchestrates booking state transitions.
///
/// # Example
///
/// ```
/// use boxoffice::{BookingEnvironment, BookingService, ConfirmPaymentRequest, CreateBookingRequest};
/// use boxoffice_core::{environment::SystemClock, Money, Principal, UserId};
/// use boxoffice_testing::{InMemoryBookingStore, InMemoryOwnerDirectory, InMemoryPaymentRecordStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = BookingService::new(BookingEnvironment::new(
///     Arc::new(SystemClock),
///     Arc::new(InMemoryBookingStore::new()),
///     Arc::new(InMemoryPaymentRecordStore::new()),
///     Arc::new(InMemoryOwnerDirectory::new()),
/// ));
/// let alice = Principal::user(UserId::new());
///
/// let booking = service
///     .create_booking(&alice, CreateBookingRequest {
///         catalog_item_id: Some("show-1".into()),
///         title: Some("Metropolis".into()),
///         seats: vec!["A1".into()],
///         scheduled_date: Some(chrono::Utc::now()),
///         total_amount: Some(Money::from_cents(50_000)),
///         ..Default::default()
///     })
///     .await?;
///
/// let id = booking.id.to_string();
/// service.initiate_payment(&alice, &id, Some("PAY_1".into())).await?;
/// let record = service
///     .confirm_payment(&alice, &id, ConfirmPaymentRequest {
///         seats: vec!["A1".into()],
///         total_amount: Some(Money::from_cents(50_000)),
///         ..Default::default()
///     })
///     .await?;
/// assert_eq!(record.booking_id, booking.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BookingService {
    env: BookingEnvironment,
}

impl BookingService {
    /// Creates a new `BookingService`
    #[must_use]
    pub const fn new(env: BookingEnvironment) -> Self {
        Self { env }
    }

    /// Create a pending booking owned by `principal`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] listing every missing field
    /// - [`BookingError::StorageUnavailable`] on infrastructure failure
    #[tracing::instrument(skip(self, request), fields(owner_id = %principal.id))]
    pub async fn create_booking(
        &self,
        principal: &Principal,
        request: CreateBookingRequest,
    ) -> Result<Booking> {
        let draft = request.into_draft(principal)?;
        let booking = self.env.bookings.create(draft).await?;

        metrics::counter!("bookings_created_total").increment(1);
        tracing::info!(
            booking_id = %booking.id,
            catalog_item_id = %booking.catalog_item_id,
            seats = booking.seats.len(),
            "Booking created"
        );
        Ok(booking)
    }

    /// Attach a payment reference to an unpaid booking.
    ///
    /// Blank or absent candidates attach nothing. A booking that already holds
    /// a reference, or is already paid, is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidArgument`] if `booking_id` is malformed
    /// - [`BookingError::NotFound`] if the booking does not exist
    /// - [`BookingError::Conflict`] if another booking holds the reference
    /// - [`BookingError::StorageUnavailable`] on infrastructure failure
    #[tracing::instrument(skip(self, candidate), fields(principal_id = %principal.id))]
    pub async fn initiate_payment(
        &self,
        principal: &Principal,
        booking_id: &str,
        candidate: Option<String>,
    ) -> Result<Booking> {
        let id = BookingId::parse(booking_id)?;
        let booking = self.env.bookings.find_by_id(id).await?;

        if booking.is_paid {
            tracing::debug!(booking_id = %id, "Booking already paid, returning as-is");
            return Ok(booking);
        }
        let Some(reference) = candidate.as_deref().and_then(PaymentReference::parse) else {
            return Ok(booking);
        };
        if booking.payment_reference.is_some() {
            return Ok(booking);
        }

        let update = self
            .env
            .bookings
            .update(id, BookingPatch::attach_reference(reference))
            .await?;

        if update.applied {
            metrics::counter!("payments_initiated_total").increment(1);
            tracing::info!(booking_id = %id, "Payment reference attached");
        } else {
            tracing::debug!(booking_id = %id, "Reference already set by a concurrent call");
        }
        Ok(update.booking)
    }

    /// Confirm payment for a booking owned by `principal` and record it.
    ///
    /// The first confirmation flips the booking to paid, synthesizing a
    /// reference if none is held. Later confirmations leave the booking as-is
    /// and refresh the payment record, so retries converge.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] if seats or amount are missing
    /// - [`BookingError::InvalidArgument`] if `booking_id` is malformed
    /// - [`BookingError::NotFound`] if the booking does not exist
    /// - [`BookingError::PermissionDenied`] if `principal` does not own the booking
    /// - [`BookingError::StorageUnavailable`] on infrastructure failure
    #[tracing::instrument(skip(self, request), fields(principal_id = %principal.id))]
    pub async fn confirm_payment(
        &self,
        principal: &Principal,
        booking_id: &str,
        request: ConfirmPaymentRequest,
    ) -> Result<PaymentRecord> {
        request.validate()?;
        let id = BookingId::parse(booking_id)?;
        let booking = self.env.bookings.find_by_id(id).await?;

        if !booking.is_owned_by(principal) {
            tracing::warn!(booking_id = %id, owner_id = %booking.owner_id, "Confirmation by non-owner rejected");
            return Err(BookingError::permission_denied(
                "only the booking owner may confirm payment",
            ));
        }

        let booking = if booking.is_paid {
            metrics::counter!("payment_confirmations_replayed_total").increment(1);
            booking
        } else {
            let now = self.env.clock.now();
            let patch = BookingPatch::confirm(now, PaymentReference::synthesize(&id, now));
            let update = self.env.bookings.update(id, patch).await?;
            if update.applied {
                metrics::counter!("payments_confirmed_total").increment(1);
                tracing::info!(booking_id = %id, "Payment confirmed");
            } else {
                metrics::counter!("payment_confirmations_replayed_total").increment(1);
                tracing::debug!(booking_id = %id, "Booking confirmed by a concurrent call");
            }
            update.booking
        };

        let snapshot = request.snapshot(principal, &booking);
        self.env.payments.upsert_for_booking(id, snapshot).await
    }

    /// Bookings owned by `principal`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] on infrastructure failure.
    pub async fn list_bookings(&self, principal: &Principal) -> Result<Vec<Booking>> {
        self.env.bookings.find_by_owner(principal.id).await
    }

    /// Every booking with its owner's summary, newest first. Admin only.
    ///
    /// Owners unknown to the identity provider are reported as `None`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::PermissionDenied`] unless `principal` is an admin
    /// - [`BookingError::StorageUnavailable`] on infrastructure failure
    #[tracing::instrument(skip(self), fields(principal_id = %principal.id))]
    pub async fn list_all_bookings(&self, principal: &Principal) -> Result<Vec<BookingWithOwner>> {
        if !principal.is_admin() {
            return Err(BookingError::permission_denied("admin role required"));
        }

        let bookings = self.env.bookings.find_all().await?;
        let mut seen = HashSet::new();
        let owner_ids: Vec<UserId> = bookings
            .iter()
            .map(|b| b.owner_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let owners = self.env.owners.summaries(owner_ids).await?;

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithOwner {
                owner: owners.get(&booking.owner_id).cloned(),
                booking,
            })
            .collect())
    }
}
