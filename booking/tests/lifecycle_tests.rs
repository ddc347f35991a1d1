//! Booking lifecycle tests against the in-memory stores.
//!
//! Run with: `cargo test -p boxoffice --test lifecycle_tests`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use boxoffice::{BookingEnvironment, BookingService, ConfirmPaymentRequest, CreateBookingRequest};
use boxoffice_core::environment::Clock;
use boxoffice_core::{
    Booking, BookingError, BookingPatch, BookingStatus, BookingStore, Money,
    PaymentReference, Principal, UserId,
};
use boxoffice_testing::{
    FixedClock, InMemoryBookingStore, InMemoryOwnerDirectory, InMemoryPaymentRecordStore,
    fixtures, test_clock,
};
use std::sync::Arc;

/// Service wired to in-memory stores, with handles for inspection.
struct Harness {
    service: BookingService,
    clock: Arc<FixedClock>,
    bookings: InMemoryBookingStore,
    payments: InMemoryPaymentRecordStore,
    owners: InMemoryOwnerDirectory,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(test_clock());
        let bookings = InMemoryBookingStore::with_clock(clock.clone());
        let payments = InMemoryPaymentRecordStore::with_clock(clock.clone());
        let owners = InMemoryOwnerDirectory::new();
        let service = BookingService::new(BookingEnvironment::new(
            clock.clone(),
            Arc::new(bookings.clone()),
            Arc::new(payments.clone()),
            Arc::new(owners.clone()),
        ));
        Self {
            service,
            clock,
            bookings,
            payments,
            owners,
        }
    }

    async fn book(&self, principal: &Principal) -> Booking {
        self.service
            .create_booking(principal, create_request())
            .await
            .expect("create booking")
    }
}

fn create_request() -> CreateBookingRequest {
    CreateBookingRequest {
        catalog_item_id: Some("show-1".to_string()),
        title: Some("Metropolis".to_string()),
        seats: vec!["A1".to_string(), "A2".to_string()],
        scheduled_date: Some(fixtures::show_date()),
        total_amount: Some(Money::from_cents(50_000)),
        ..CreateBookingRequest::default()
    }
}

fn confirm_request() -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        seats: vec!["A1".to_string(), "A2".to_string()],
        total_amount: Some(Money::from_cents(50_000)),
        ..ConfirmPaymentRequest::default()
    }
}

fn reference(raw: &str) -> PaymentReference {
    PaymentReference::parse(raw).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_initiate_confirm_scenario() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());

    let booking = h.book(&alice).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert!(!booking.is_paid);
    assert!(booking.payment_reference.is_none());

    let id = booking.id.to_string();
    let initiated = h
        .service
        .initiate_payment(&alice, &id, Some("PAY_1".to_string()))
        .await
        .unwrap();
    assert_eq!(initiated.payment_reference, Some(reference("PAY_1")));
    assert_eq!(initiated.status, BookingStatus::Pending);
    assert!(!initiated.is_paid);

    let record = h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    assert_eq!(record.booking_id, booking.id);
    assert_eq!(record.owner_id, alice.id);
    assert_eq!(record.catalog_item_name, "Metropolis");
    assert_eq!(record.total_amount.cents(), 50_000);

    let stored = h.bookings.find_by_id(booking.id).await.unwrap();
    assert!(stored.is_paid);
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.payment_confirmed_at, Some(h.clock.now()));
    assert_eq!(stored.payment_reference, Some(reference("PAY_1")));
    assert!(stored.is_consistent());
    assert_eq!(h.payments.len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Create
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_reports_all_missing_fields() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());

    let request = CreateBookingRequest {
        title: Some("Metropolis".to_string()),
        ..CreateBookingRequest::default()
    };
    let Err(BookingError::Validation { fields }) = h.service.create_booking(&alice, request).await
    else {
        panic!("expected validation error");
    };

    let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(names, vec!["catalog_item_id", "seats", "scheduled_date"]);
    assert!(h.bookings.is_empty());
}

#[tokio::test]
async fn test_overlapping_seats_are_not_rejected() {
    let h = Harness::new();
    h.book(&Principal::user(UserId::new())).await;
    h.book(&Principal::user(UserId::new())).await;
    assert_eq!(h.bookings.len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════
// Initiate payment
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_initiate_never_overwrites_reference() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();

    h.service
        .initiate_payment(&alice, &id, Some("PAY_FIRST".to_string()))
        .await
        .unwrap();
    let again = h
        .service
        .initiate_payment(&alice, &id, Some("PAY_SECOND".to_string()))
        .await
        .unwrap();

    assert_eq!(again.payment_reference, Some(reference("PAY_FIRST")));
    assert_eq!(h.bookings.holder_of(&reference("PAY_SECOND")), None);
}

#[tokio::test]
async fn test_initiate_ignores_blank_or_absent_candidates() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();

    for candidate in [None, Some(String::new()), Some("   ".to_string())] {
        let booking = h.service.initiate_payment(&alice, &id, candidate).await.unwrap();
        assert!(booking.payment_reference.is_none());
    }
}

#[tokio::test]
async fn test_initiate_after_confirmation_is_a_no_op() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;
    let id = booking.id.to_string();

    h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    let confirmed = h.bookings.find_by_id(booking.id).await.unwrap();

    let after = h
        .service
        .initiate_payment(&alice, &id, Some("PAY_LATE".to_string()))
        .await
        .unwrap();
    assert_eq!(after, confirmed);
    assert_eq!(h.bookings.holder_of(&reference("PAY_LATE")), None);
}

#[tokio::test]
async fn test_initiate_rejects_malformed_and_unknown_ids() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());

    let err = h
        .service
        .initiate_payment(&alice, "not-a-booking", Some("PAY_1".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidArgument(_)));

    let unknown = boxoffice_core::BookingId::new();
    let err = h
        .service
        .initiate_payment(&alice, &unknown.to_string(), Some("PAY_1".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::NotFound(unknown));
}

#[tokio::test]
async fn test_reference_held_by_another_booking_is_conflict() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let first = h.book(&alice).await.id.to_string();
    let second = h.book(&alice).await.id.to_string();

    h.service
        .initiate_payment(&alice, &first, Some("PAY_SHARED".to_string()))
        .await
        .unwrap();
    let err = h
        .service
        .initiate_payment(&alice, &second, Some("PAY_SHARED".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Conflict(_)));
    assert!(!err.is_user_error());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_concurrent_initiations_have_one_winner() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();

    let attempts = (0..16).map(|i| {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move {
            service
                .initiate_payment(&alice, &id, Some(format!("PAY_{i}")))
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let references: Vec<_> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().payment_reference.unwrap())
        .collect();
    assert!(references.windows(2).all(|pair| pair[0] == pair[1]));
}

// ═══════════════════════════════════════════════════════════════════════
// Confirm payment
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_confirm_twice_is_idempotent() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();

    let first = h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    let booking_after_first = h.bookings.find_by_id(first.booking_id).await.unwrap();

    h.clock.advance(chrono::Duration::minutes(1));
    let second = h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    let booking_after_second = h.bookings.find_by_id(first.booking_id).await.unwrap();

    assert_eq!(booking_after_first, booking_after_second);
    assert_eq!(h.payments.len(), 1);
    assert_eq!(h.payments.upsert_count(), 2);
    assert_eq!(first.created_at, second.created_at);
}

#[tokio::test]
async fn test_confirm_synthesizes_reference_when_absent() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;

    h.service
        .confirm_payment(&alice, &booking.id.to_string(), confirm_request())
        .await
        .unwrap();

    let stored = h.bookings.find_by_id(booking.id).await.unwrap();
    let expected = PaymentReference::synthesize(&booking.id, h.clock.now());
    assert_eq!(stored.payment_reference, Some(expected));
}

#[tokio::test]
async fn test_confirm_by_non_owner_is_denied_and_leaves_booking_untouched() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let mallory = Principal::user(UserId::new());
    let booking = h.book(&alice).await;

    let err = h
        .service
        .confirm_payment(&mallory, &booking.id.to_string(), confirm_request())
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::PermissionDenied { .. }));
    assert_eq!(h.bookings.find_by_id(booking.id).await.unwrap(), booking);
    assert!(h.payments.is_empty());
}

#[tokio::test]
async fn test_admin_is_not_the_owner_when_confirming() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let admin = Principal::admin(UserId::new());
    let booking = h.book(&alice).await;

    let err = h
        .service
        .confirm_payment(&admin, &booking.id.to_string(), confirm_request())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_confirm_validates_before_touching_storage() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    h.bookings.set_offline(true);

    let err = h
        .service
        .confirm_payment(&alice, "not-even-an-id", ConfirmPaymentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation { .. }));
}

#[tokio::test]
async fn test_confirm_title_falls_back_to_booking_snapshot() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();

    let record = h
        .service
        .confirm_payment(
            &alice,
            &id,
            ConfirmPaymentRequest {
                catalog_item_name: Some("Metropolis (Restored)".to_string()),
                ..confirm_request()
            },
        )
        .await
        .unwrap();
    assert_eq!(record.catalog_item_name, "Metropolis (Restored)");

    let replay = h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    assert_eq!(replay.catalog_item_name, "Metropolis");
}

#[tokio::test]
async fn test_concurrent_confirmations_flip_once() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;
    let id = booking.id.to_string();

    let confirms = (0..32).map(|_| {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.confirm_payment(&alice, &id, confirm_request()).await })
    });
    for joined in futures::future::join_all(confirms).await {
        joined.unwrap().unwrap();
    }

    let stored = h.bookings.find_by_id(booking.id).await.unwrap();
    assert!(stored.is_paid);
    assert!(stored.is_consistent());
    assert_eq!(h.payments.len(), 1);
    assert_eq!(h.payments.upsert_count(), 32);
}

#[tokio::test]
async fn test_initiate_and_confirm_interleave_to_one_reference() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;
    let id = booking.id.to_string();

    let initiate = {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move {
            service
                .initiate_payment(&alice, &id, Some("PAY_RACE".to_string()))
                .await
        })
    };
    let confirm = {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.confirm_payment(&alice, &id, confirm_request()).await })
    };
    initiate.await.unwrap().unwrap();
    confirm.await.unwrap().unwrap();

    let stored = h.bookings.find_by_id(booking.id).await.unwrap();
    assert!(stored.is_paid);
    let held = stored.payment_reference.expect("reference present");
    assert_eq!(h.bookings.holder_of(&held), Some(booking.id));
    assert_eq!(h.payments.len(), 1);
}

#[tokio::test]
async fn test_storage_outage_surfaces_as_retryable() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let id = h.book(&alice).await.id.to_string();
    h.bookings.set_offline(true);

    let err = h
        .service
        .confirm_payment(&alice, &id, confirm_request())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.payments.is_empty());

    h.bookings.set_offline(false);
    h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
}

#[tokio::test]
async fn test_retry_after_failed_record_write_converges() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;
    let id = booking.id.to_string();
    h.payments.set_offline(true);

    let err = h
        .service
        .confirm_payment(&alice, &id, confirm_request())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::StorageUnavailable(_)));

    // The flip already happened; only the record is missing.
    let paid = h.bookings.find_by_id(booking.id).await.unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert!(h.payments.is_empty());

    h.payments.set_offline(false);
    h.clock.advance(chrono::Duration::seconds(30));
    let record = h.service.confirm_payment(&alice, &id, confirm_request()).await.unwrap();
    assert_eq!(record.booking_id, booking.id);
    assert_eq!(h.payments.len(), 1);

    let after_retry = h.bookings.find_by_id(booking.id).await.unwrap();
    assert_eq!(after_retry.payment_confirmed_at, paid.payment_confirmed_at);
    assert_eq!(after_retry.payment_reference, paid.payment_reference);
}

// ═══════════════════════════════════════════════════════════════════════
// Listings
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_bookings_returns_own_newest_first() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let bob = Principal::user(UserId::new());

    let older = h.book(&alice).await;
    h.clock.advance(chrono::Duration::seconds(5));
    let newer = h.book(&alice).await;
    h.book(&bob).await;

    let ids: Vec<_> = h
        .service
        .list_bookings(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[tokio::test]
async fn test_list_all_bookings_requires_admin() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());

    let err = h.service.list_all_bookings(&alice).await.unwrap_err();
    assert!(matches!(err, BookingError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_list_all_bookings_joins_owner_summaries() {
    let h = Harness::new();
    let alice = Principal::user(h.owners.register("Alice", "alice@example.com"));
    let ghost = Principal::user(UserId::new());
    let admin = Principal::admin(UserId::new());

    h.book(&alice).await;
    h.clock.advance(chrono::Duration::seconds(1));
    h.book(&ghost).await;

    let all = h.service.list_all_bookings(&admin).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].booking.owner_id, ghost.id);
    assert!(all[0].owner.is_none());
    let owner = all[1].owner.as_ref().expect("alice is known");
    assert_eq!((owner.name.as_str(), owner.email.as_str()), ("Alice", "alice@example.com"));
}

#[tokio::test]
async fn test_legacy_reference_attached_out_of_band_is_respected() {
    let h = Harness::new();
    let alice = Principal::user(UserId::new());
    let booking = h.book(&alice).await;

    h.bookings
        .update(booking.id, BookingPatch::attach_reference(reference("PAY_GATEWAY")))
        .await
        .unwrap();
    h.service
        .confirm_payment(&alice, &booking.id.to_string(), confirm_request())
        .await
        .unwrap();

    let stored = h.bookings.find_by_id(booking.id).await.unwrap();
    assert_eq!(stored.payment_reference, Some(reference("PAY_GATEWAY")));
}
