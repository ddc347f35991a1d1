//! Domain types for the box office booking core.
//!
//! This module contains the identifiers, value objects and records shared by the
//! stores and the booking lifecycle:
//!
//! - **Identifiers**: [`BookingId`], [`UserId`], [`CatalogItemId`]
//! - **Value objects**: [`Money`], [`PaymentReference`], [`ShowSnapshot`]
//! - **Records**: [`Booking`], [`PaymentRecord`]
//! - **Principals**: [`Principal`], [`Role`], [`OwnerSummary`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{BookingError, FieldError};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidArgument`] if `raw` is not a well-formed UUID.
    pub fn parse(raw: &str) -> Result<Self, BookingError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| BookingError::InvalidArgument(format!("Invalid booking id: {raw:?}")))
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user (issued by the identity provider)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a show in the external catalog.
///
/// Opaque to this crate: the catalog owns the format and existence is never checked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogItemId(String);

impl CatalogItemId {
    /// Creates a new `CatalogItemId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Amount of money in minor units (cents, paise, ...)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts, clamping at `u64::MAX`
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Payment Reference
// ============================================================================

/// Opaque token identifying an external payment transaction.
///
/// A reference is never empty: blank input does not produce a `PaymentReference`,
/// so "no reference" is always represented as `Option::None` and never takes part
/// in uniqueness checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Build a reference from caller input, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Synthesize a reference for a confirmation that arrived without one.
    ///
    /// Derived from the confirmation time and the booking id so two bookings
    /// confirmed in the same millisecond still get distinct references.
    #[must_use]
    pub fn synthesize(booking_id: &BookingId, at: DateTime<Utc>) -> Self {
        Self(format!(
            "PAY_{}_{}",
            at.timestamp_millis(),
            booking_id.as_uuid().simple()
        ))
    }

    /// Returns the reference as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PaymentReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "payment reference must not be blank".to_string())
    }
}

impl From<PaymentReference> for String {
    fn from(value: PaymentReference) -> Self {
        value.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Principals
// ============================================================================

/// Role carried by an authenticated principal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular customer
    #[default]
    User,
    /// Back-office administrator
    Admin,
}

/// The authenticated actor performing a request.
///
/// Supplied by the identity provider and trusted as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identity of the actor
    pub id: UserId,
    /// Role of the actor
    pub role: Role,
}

impl Principal {
    /// A principal with the `user` role
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self { id, role: Role::User }
    }

    /// A principal with the `admin` role
    #[must_use]
    pub const fn admin(id: UserId) -> Self {
        Self { id, role: Role::Admin }
    }

    /// Whether this principal may use administrative reads
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Minimal projection of a booking owner, used by the admin listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    /// Owner identity
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

// ============================================================================
// Bookings
// ============================================================================

/// Lifecycle status of a booking. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, payment not confirmed
    #[default]
    Pending,
    /// Payment confirmed
    Confirmed,
}

impl BookingStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] if the stored value is unknown.
    pub fn parse(s: &str) -> Result<Self, BookingError> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(BookingError::StorageUnavailable(format!(
                "Invalid booking status: {s}"
            ))),
        }
    }
}

/// Show details copied from the catalog when the booking is made
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSnapshot {
    /// Show title
    pub title: String,
    /// Poster image path
    pub poster_path: String,
    /// Runtime in minutes
    pub runtime_minutes: u32,
    /// Selected show time, as displayed to the customer
    pub show_time: String,
}

impl ShowSnapshot {
    /// Poster used when the catalog did not provide one
    pub const DEFAULT_POSTER_PATH: &'static str = "/default-poster.jpg";
    /// Runtime used when the catalog did not provide one
    pub const DEFAULT_RUNTIME_MINUTES: u32 = 120;
    /// Show time used when none was selected
    pub const DEFAULT_SHOW_TIME: &'static str = "Not specified";

    /// Snapshot with only a title; other fields take their defaults
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            poster_path: Self::DEFAULT_POSTER_PATH.to_string(),
            runtime_minutes: Self::DEFAULT_RUNTIME_MINUTES,
            show_time: Self::DEFAULT_SHOW_TIME.to_string(),
        }
    }
}

/// Validated input for [`BookingStore::create`](crate::store::BookingStore::create).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDraft {
    /// Principal creating the booking
    pub owner_id: UserId,
    /// Show being booked
    pub catalog_item_id: CatalogItemId,
    /// Denormalized show details
    pub snapshot: ShowSnapshot,
    /// Seat labels, in selection order
    pub seats: Vec<String>,
    /// Selected show date
    pub scheduled_date: DateTime<Utc>,
    /// Price total
    pub total_amount: Money,
}

impl BookingDraft {
    /// Check the fields every stored booking must have.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] listing every offending field.
    pub fn validate(&self) -> Result<(), BookingError> {
        let mut fields = Vec::new();
        if self.catalog_item_id.as_str().trim().is_empty() {
            fields.push(FieldError::missing("catalog_item_id"));
        }
        if self.seats.is_empty() {
            fields.push(FieldError::missing("seats"));
        } else if self.seats.iter().any(|seat| seat.trim().is_empty()) {
            fields.push(FieldError::invalid("seats", "seat labels must not be blank"));
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(BookingError::Validation { fields })
        }
    }
}

/// A seat reservation and its payment state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identity
    pub id: BookingId,
    /// Principal who created the booking
    pub owner_id: UserId,
    /// Show being booked
    pub catalog_item_id: CatalogItemId,
    /// Denormalized show details
    pub snapshot: ShowSnapshot,
    /// Seat labels
    pub seats: Vec<String>,
    /// Selected show date
    pub scheduled_date: DateTime<Utc>,
    /// Price total
    pub total_amount: Money,
    /// External payment reference, absent until a payment event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<PaymentReference>,
    /// Whether payment has been confirmed
    pub is_paid: bool,
    /// Lifecycle status
    pub status: BookingStatus,
    /// When payment was confirmed
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Materialize a fresh pending booking from a draft.
    #[must_use]
    pub fn from_draft(id: BookingId, draft: BookingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id: draft.owner_id,
            catalog_item_id: draft.catalog_item_id,
            snapshot: draft.snapshot,
            seats: draft.seats,
            scheduled_date: draft.scheduled_date,
            total_amount: draft.total_amount,
            payment_reference: None,
            is_paid: false,
            status: BookingStatus::Pending,
            payment_confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `principal` owns this booking
    #[must_use]
    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        self.owner_id == principal.id
    }

    /// Apply a patch in memory, honoring the same guards as the stores.
    ///
    /// Returns `false` (and leaves the booking untouched) once the booking is paid.
    /// A held reference is never replaced.
    pub fn apply(&mut self, patch: &BookingPatch) -> bool {
        if self.is_paid || patch.is_empty() {
            return false;
        }
        let mut changed = false;
        if self.payment_reference.is_none() {
            if let Some(reference) = &patch.payment_reference {
                self.payment_reference = Some(reference.clone());
                changed = true;
            }
        }
        if let Some(confirmed_at) = patch.confirm_at {
            self.is_paid = true;
            self.status = BookingStatus::Confirmed;
            self.payment_confirmed_at = Some(confirmed_at);
            changed = true;
        }
        changed
    }

    /// Check the status/payment invariants.
    ///
    /// Confirmed implies paid, and paid implies a confirmation time.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        let confirmed_implies_paid = !matches!(self.status, BookingStatus::Confirmed) || self.is_paid;
        let paid_implies_timestamp = !self.is_paid || self.payment_confirmed_at.is_some();
        confirmed_implies_paid && paid_implies_timestamp
    }
}

/// Partial mutation of a booking.
///
/// Stores apply a patch only while the booking is unpaid, and attach
/// `payment_reference` only if none is held yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingPatch {
    /// Reference to attach if the booking has none
    pub payment_reference: Option<PaymentReference>,
    /// Confirmation time; when set the booking becomes paid and confirmed
    pub confirm_at: Option<DateTime<Utc>>,
}

impl BookingPatch {
    /// Patch that only attaches a payment reference
    #[must_use]
    pub const fn attach_reference(reference: PaymentReference) -> Self {
        Self {
            payment_reference: Some(reference),
            confirm_at: None,
        }
    }

    /// Patch that confirms payment, attaching `fallback_reference` if none is held
    #[must_use]
    pub const fn confirm(confirmed_at: DateTime<Utc>, fallback_reference: PaymentReference) -> Self {
        Self {
            payment_reference: Some(fallback_reference),
            confirm_at: Some(confirmed_at),
        }
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.payment_reference.is_none() && self.confirm_at.is_none()
    }
}

/// Result of [`BookingStore::update`](crate::store::BookingStore::update).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingUpdate {
    /// The booking as stored after the call
    pub booking: Booking,
    /// Whether this call changed the booking
    pub applied: bool,
}

/// A booking joined with its owner's summary (admin listing)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWithOwner {
    /// The booking
    #[serde(flatten)]
    pub booking: Booking,
    /// Owner details; `None` if the identity provider no longer knows the owner
    pub owner: Option<OwnerSummary>,
}

// ============================================================================
// Payment records
// ============================================================================

/// Outcome recorded for a confirmed payment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    /// Payment succeeded
    #[default]
    Success,
}

impl PaymentRecordStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] if the stored value is unknown.
    pub fn parse(s: &str) -> Result<Self, BookingError> {
        match s {
            "success" => Ok(Self::Success),
            _ => Err(BookingError::StorageUnavailable(format!(
                "Invalid payment record status: {s}"
            ))),
        }
    }
}

/// Confirmation data denormalized into the payment record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// Principal who confirmed
    pub owner_id: UserId,
    /// Show title at confirmation time
    pub catalog_item_name: String,
    /// Seats paid for
    pub seats: Vec<String>,
    /// Amount paid
    pub total_amount: Money,
    /// Recorded outcome
    pub status: PaymentRecordStatus,
}

/// One payment confirmation per booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Booking this record confirms (unique)
    pub booking_id: BookingId,
    /// Principal who confirmed
    pub owner_id: UserId,
    /// Show title at confirmation time
    pub catalog_item_name: String,
    /// Seats paid for
    pub seats: Vec<String>,
    /// Amount paid
    pub total_amount: Money,
    /// Recorded outcome
    pub status: PaymentRecordStatus,
    /// First confirmation time
    pub created_at: DateTime<Utc>,
    /// Latest confirmation time
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build a record from a snapshot
    #[must_use]
    pub fn from_snapshot(booking_id: BookingId, snapshot: PaymentSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            booking_id,
            owner_id: snapshot.owner_id,
            catalog_item_name: snapshot.catalog_item_name,
            seats: snapshot.seats,
            total_amount: snapshot.total_amount,
            status: snapshot.status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the snapshot fields, keeping identity and creation time
    pub fn replace_snapshot(&mut self, snapshot: PaymentSnapshot, now: DateTime<Utc>) {
        self.owner_id = snapshot.owner_id;
        self.catalog_item_name = snapshot.catalog_item_name;
        self.seats = snapshot.seats;
        self.total_amount = snapshot.total_amount;
        self.status = snapshot.status;
        self.updated_at = now;
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-catalog-item booking totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of bookings, paid or not
    pub total_bookings: u64,
    /// Sum of booking totals
    pub earnings: Money,
}

impl CatalogStats {
    /// Fold one booking into the totals
    pub fn record(&mut self, amount: Money) {
        self.total_bookings += 1;
        self.earnings = self.earnings.saturating_add(amount);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> BookingDraft {
        BookingDraft {
            owner_id: UserId::new(),
            catalog_item_id: CatalogItemId::new("show-1"),
            snapshot: ShowSnapshot::titled("Metropolis"),
            seats: vec!["A1".to_string(), "A2".to_string()],
            scheduled_date: Utc.with_ymd_and_hms(2025, 3, 1, 19, 30, 0).unwrap(),
            total_amount: Money::from_cents(500),
        }
    }

    #[test]
    fn booking_id_rejects_malformed_input() {
        let err = BookingId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, BookingError::InvalidArgument(_)));

        let id = BookingId::new();
        assert_eq!(BookingId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn blank_payment_reference_is_absent() {
        assert_eq!(PaymentReference::parse(""), None);
        assert_eq!(PaymentReference::parse("   "), None);
        assert_eq!(PaymentReference::parse(" PAY_1 ").unwrap().as_str(), "PAY_1");
    }

    #[test]
    fn blank_payment_reference_fails_to_deserialize() {
        let parsed: Result<PaymentReference, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn synthesized_references_differ_per_booking() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = PaymentReference::synthesize(&BookingId::new(), at);
        let b = PaymentReference::synthesize(&BookingId::new(), at);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("PAY_1735689600000_"));
    }

    #[test]
    fn draft_validation_reports_every_field() {
        let mut bad = draft();
        bad.catalog_item_id = CatalogItemId::new(" ");
        bad.seats.clear();

        let Err(BookingError::Validation { fields }) = bad.validate() else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["catalog_item_id", "seats"]);
    }

    #[test]
    fn apply_never_overwrites_reference() {
        let now = Utc::now();
        let mut booking = Booking::from_draft(BookingId::new(), draft(), now);

        let first = PaymentReference::parse("PAY_1").unwrap();
        let second = PaymentReference::parse("PAY_2").unwrap();
        assert!(booking.apply(&BookingPatch::attach_reference(first.clone())));
        assert!(!booking.apply(&BookingPatch::attach_reference(second)));
        assert_eq!(booking.payment_reference, Some(first));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn apply_is_a_no_op_once_paid() {
        let now = Utc::now();
        let mut booking = Booking::from_draft(BookingId::new(), draft(), now);
        let fallback = PaymentReference::synthesize(&booking.id, now);

        assert!(booking.apply(&BookingPatch::confirm(now, fallback.clone())));
        assert!(booking.is_paid);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_reference, Some(fallback));
        assert!(booking.is_consistent());

        let later = now + chrono::Duration::minutes(5);
        let other = PaymentReference::parse("PAY_LATE").unwrap();
        assert!(!booking.apply(&BookingPatch::confirm(later, other)));
        assert_eq!(booking.payment_confirmed_at, Some(now));
    }

    #[test]
    fn booking_serializes_without_absent_reference() {
        let booking = Booking::from_draft(BookingId::new(), draft(), Utc::now());
        let json = serde_json::to_value(&booking).unwrap();
        assert!(json.get("payment_reference").is_none());
        assert_eq!(json["status"], "pending");
    }

    proptest::proptest! {
        #[test]
        fn parsed_references_are_never_blank(raw in "\\PC*") {
            if let Some(reference) = PaymentReference::parse(&raw) {
                proptest::prop_assert!(!reference.as_str().trim().is_empty());
                proptest::prop_assert_eq!(reference.as_str(), raw.trim());
            } else {
                proptest::prop_assert!(raw.trim().is_empty());
            }
        }
    }

    #[test]
    fn money_display_uses_minor_units() {
        assert_eq!(Money::from_cents(50_005).to_string(), "500.05");
        assert_eq!(Money::ZERO.saturating_add(Money::from_cents(7)), Money::from_cents(7));
    }
}
