//! Caller-facing request payloads.
//!
//! Every required field is optional at the type level so that a request with
//! several gaps reports all of them in one [`BookingError::Validation`].

use boxoffice_core::{
    Booking, BookingDraft, BookingError, CatalogItemId, DateTime, FieldError, Money,
    PaymentRecordStatus, PaymentSnapshot, Principal, ShowSnapshot, Utc,
};
use serde::{Deserialize, Serialize};

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn check_seats(seats: &[String], fields: &mut Vec<FieldError>) {
    if seats.is_empty() {
        fields.push(FieldError::missing("seats"));
    } else if seats.iter().any(|seat| seat.trim().is_empty()) {
        fields.push(FieldError::invalid("seats", "seat labels must not be blank"));
    }
}

/// Input for [`BookingService::create_booking`](crate::BookingService::create_booking).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Show being booked (required)
    pub catalog_item_id: Option<String>,
    /// Show title from the catalog (required)
    pub title: Option<String>,
    /// Poster image path; defaults to a placeholder
    pub poster_path: Option<String>,
    /// Runtime in minutes; defaults to 120
    pub runtime_minutes: Option<u32>,
    /// Selected show time; defaults to "Not specified"
    pub show_time: Option<String>,
    /// Seat labels (at least one)
    #[serde(default)]
    pub seats: Vec<String>,
    /// Selected show date (required)
    pub scheduled_date: Option<DateTime<Utc>>,
    /// Price total in minor units (`50000` is 500.00); defaults to zero
    pub total_amount: Option<Money>,
}

impl CreateBookingRequest {
    /// Validate the request and turn it into a draft owned by `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] listing every missing or blank field.
    pub fn into_draft(self, principal: &Principal) -> Result<BookingDraft, BookingError> {
        let mut fields = Vec::new();
        if is_blank(self.catalog_item_id.as_deref()) {
            fields.push(FieldError::missing("catalog_item_id"));
        }
        if is_blank(self.title.as_deref()) {
            fields.push(FieldError::missing("title"));
        }
        check_seats(&self.seats, &mut fields);
        if self.scheduled_date.is_none() {
            fields.push(FieldError::missing("scheduled_date"));
        }

        let (Some(catalog_item_id), Some(title), Some(scheduled_date), true) = (
            self.catalog_item_id,
            self.title,
            self.scheduled_date,
            fields.is_empty(),
        ) else {
            return Err(BookingError::Validation { fields });
        };

        Ok(BookingDraft {
            owner_id: principal.id,
            catalog_item_id: CatalogItemId::new(catalog_item_id.trim()),
            snapshot: ShowSnapshot {
                title,
                poster_path: self
                    .poster_path
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| ShowSnapshot::DEFAULT_POSTER_PATH.to_string()),
                runtime_minutes: self
                    .runtime_minutes
                    .unwrap_or(ShowSnapshot::DEFAULT_RUNTIME_MINUTES),
                show_time: self
                    .show_time
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| ShowSnapshot::DEFAULT_SHOW_TIME.to_string()),
            },
            seats: self.seats,
            scheduled_date,
            total_amount: self.total_amount.unwrap_or(Money::ZERO),
        })
    }
}

/// Input for [`BookingService::confirm_payment`](crate::BookingService::confirm_payment).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    /// Show title to record; falls back to the booking's title
    pub catalog_item_name: Option<String>,
    /// Seats paid for (at least one)
    #[serde(default)]
    pub seats: Vec<String>,
    /// Amount paid in minor units (required)
    pub total_amount: Option<Money>,
}

impl ConfirmPaymentRequest {
    /// Check the confirmation carries seats and an amount.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] listing every offending field.
    pub fn validate(&self) -> Result<(), BookingError> {
        let mut fields = Vec::new();
        check_seats(&self.seats, &mut fields);
        if self.total_amount.is_none() {
            fields.push(FieldError::missing("total_amount"));
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(BookingError::Validation { fields })
        }
    }

    /// Snapshot recorded in the payment record for `booking`.
    #[must_use]
    pub fn snapshot(self, principal: &Principal, booking: &Booking) -> PaymentSnapshot {
        PaymentSnapshot {
            owner_id: principal.id,
            catalog_item_name: self
                .catalog_item_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| booking.snapshot.title.clone()),
            seats: self.seats,
            total_amount: self.total_amount.unwrap_or(booking.total_amount),
            status: PaymentRecordStatus::Success,
        }
    }
}
