//! Per-show booking statistics.

use boxoffice_core::{BookingError, BookingStore, CatalogItemId, CatalogStats, Principal, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only aggregation over the booking table.
///
/// Counts every booking, paid or not. Results are as fresh as the store's
/// read and are not joined transactionally with the catalog.
#[derive(Clone)]
pub struct StatsReporter {
    bookings: Arc<dyn BookingStore>,
}

impl StatsReporter {
    /// Creates a new `StatsReporter`
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    /// Booking count and earnings per catalog item that has bookings.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] on infrastructure failure.
    pub async fn stats_by_catalog_item(&self) -> Result<HashMap<CatalogItemId, CatalogStats>> {
        self.bookings.aggregate_by_catalog_item().await
    }

    /// Stats for each of `items`, in order, with zeros for items never booked.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::StorageUnavailable`] on infrastructure failure.
    pub async fn stats_for_catalog(
        &self,
        items: &[CatalogItemId],
    ) -> Result<Vec<(CatalogItemId, CatalogStats)>> {
        let stats = self.stats_by_catalog_item().await?;
        Ok(join_catalog(items, &stats))
    }

    /// [`Self::stats_for_catalog`] for the admin dashboard.
    ///
    /// # Errors
    ///
    /// - [`BookingError::PermissionDenied`] unless `principal` is an admin
    /// - [`BookingError::StorageUnavailable`] on infrastructure failure
    #[tracing::instrument(skip(self, items), fields(principal_id = %principal.id, items = items.len()))]
    pub async fn admin_stats(
        &self,
        principal: &Principal,
        items: &[CatalogItemId],
    ) -> Result<Vec<(CatalogItemId, CatalogStats)>> {
        if !principal.is_admin() {
            return Err(BookingError::permission_denied("admin role required"));
        }
        self.stats_for_catalog(items).await
    }
}

fn join_catalog(
    items: &[CatalogItemId],
    stats: &HashMap<CatalogItemId, CatalogStats>,
) -> Vec<(CatalogItemId, CatalogStats)> {
    items
        .iter()
        .map(|item| (item.clone(), stats.get(item).copied().unwrap_or_default()))
        .collect()
}
