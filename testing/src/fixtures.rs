//! Builders for common test data.

use boxoffice_core::{
    BookingDraft, CatalogItemId, Money, PaymentRecordStatus, PaymentSnapshot, ShowSnapshot, UserId,
};
use chrono::{DateTime, TimeZone, Utc};

/// Show date used by every fixture (2025-03-01 19:30 UTC)
#[must_use]
pub fn show_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 19, 30, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Draft for two seats of `show-1` at 500
#[must_use]
pub fn draft(owner_id: UserId) -> BookingDraft {
    draft_for(owner_id, "show-1", 500)
}

/// Draft for two seats of `catalog_item_id` at `amount` minor units
#[must_use]
pub fn draft_for(owner_id: UserId, catalog_item_id: &str, amount: u64) -> BookingDraft {
    BookingDraft {
        owner_id,
        catalog_item_id: CatalogItemId::new(catalog_item_id),
        snapshot: ShowSnapshot::titled("Metropolis"),
        seats: vec!["A1".to_string(), "A2".to_string()],
        scheduled_date: show_date(),
        total_amount: Money::from_cents(amount),
    }
}

/// Successful payment snapshot for the fixture seats
#[must_use]
pub fn payment_snapshot(owner_id: UserId, amount: u64) -> PaymentSnapshot {
    PaymentSnapshot {
        owner_id,
        catalog_item_name: "Metropolis".to_string(),
        seats: vec!["A1".to_string(), "A2".to_string()],
        total_amount: Money::from_cents(amount),
        status: PaymentRecordStatus::Success,
    }
}
