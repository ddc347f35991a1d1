//! In-memory store implementations for fast, deterministic testing.
//!
//! - [`InMemoryBookingStore`]: `HashMap`-backed bookings with a partial unique
//!   index on payment references
//! - [`InMemoryPaymentRecordStore`]: one record per booking, upserted
//! - [`InMemoryOwnerDirectory`]: fixed set of owner summaries
//!
//! Every operation runs under a single write guard, which gives the same
//! atomicity the PostgreSQL stores get from conditional updates and upserts.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test panicked

use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::{
    Booking, BookingDraft, BookingError, BookingId, BookingPatch, BookingStore, BookingUpdate,
    CatalogItemId, CatalogStats, OwnerDirectory, OwnerSummary, PaymentRecord, PaymentRecordStore,
    PaymentReference, PaymentSnapshot, Result, UserId,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

const OFFLINE: &str = "in-memory store is offline";

#[derive(Debug, Default)]
struct BookingTable {
    rows: HashMap<BookingId, (u64, Booking)>,
    /// Partial unique index: only bookings holding a reference appear here.
    references: HashMap<PaymentReference, BookingId>,
    next_seq: u64,
}

impl BookingTable {
    fn sorted_newest_first<'a>(rows: impl Iterator<Item = &'a (u64, Booking)>) -> Vec<Booking> {
        let mut rows: Vec<_> = rows.collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, booking)| booking.clone()).collect()
    }
}

/// In-memory booking store.
///
/// # Example
///
/// ```
/// use boxoffice_testing::{InMemoryBookingStore, fixtures};
/// use boxoffice_core::{BookingStore, UserId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryBookingStore::new();
/// let booking = store.create(fixtures::draft(UserId::new())).await?;
/// assert!(!booking.is_paid);
/// assert_eq!(store.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBookingStore {
    table: Arc<RwLock<BookingTable>>,
    clock: Arc<dyn Clock>,
    offline: Arc<AtomicBool>,
}

impl InMemoryBookingStore {
    /// Create an empty store stamping rows with the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping rows with `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(RwLock::new(BookingTable::default())),
            clock,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail with `StorageUnavailable` (or recover)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored bookings
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().unwrap().rows.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().unwrap().rows.is_empty()
    }

    /// Booking currently holding `reference`, if any
    #[must_use]
    pub fn holder_of(&self, reference: &PaymentReference) -> Option<BookingId> {
        self.table.read().unwrap().references.get(reference).copied()
    }

    /// Insert a booking as-is, bypassing validation (for seeding legacy rows)
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] if its reference is already held.
    pub fn insert_raw(&self, booking: Booking) -> Result<()> {
        let mut table = self.table.write().unwrap();
        if let Some(reference) = &booking.payment_reference {
            if table.references.contains_key(reference) {
                return Err(duplicate_reference(reference));
            }
            table.references.insert(reference.clone(), booking.id);
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(booking.id, (seq, booking));
        Ok(())
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BookingError::StorageUnavailable(OFFLINE.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

fn duplicate_reference(reference: &PaymentReference) -> BookingError {
    BookingError::Conflict(format!(
        "payment reference {reference} is already attached to another booking"
    ))
}

impl BookingStore for InMemoryBookingStore {
    fn create(&self, draft: BookingDraft) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            draft.validate()?;
            let booking = Booking::from_draft(BookingId::new(), draft, self.clock.now());
            self.insert_raw(booking.clone())?;
            Ok(booking)
        })
    }

    fn find_by_id(&self, id: BookingId) -> Pin<Box<dyn Future<Output = Result<Booking>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            self.table
                .read()
                .unwrap()
                .rows
                .get(&id)
                .map(|(_, booking)| booking.clone())
                .ok_or(BookingError::NotFound(id))
        })
    }

    fn find_by_owner(
        &self,
        owner_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            let table = self.table.read().unwrap();
            Ok(BookingTable::sorted_newest_first(
                table.rows.values().filter(|(_, b)| b.owner_id == owner_id),
            ))
        })
    }

    fn find_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Booking>>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            let table = self.table.read().unwrap();
            Ok(BookingTable::sorted_newest_first(table.rows.values()))
        })
    }

    fn update(
        &self,
        id: BookingId,
        patch: BookingPatch,
    ) -> Pin<Box<dyn Future<Output = Result<BookingUpdate>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            let now = self.clock.now();
            let mut table = self.table.write().unwrap();
            let BookingTable { rows, references, .. } = &mut *table;

            let (_, booking) = rows.get_mut(&id).ok_or(BookingError::NotFound(id))?;

            // Check the partial unique index before touching the row.
            let attaching = if booking.is_paid || booking.payment_reference.is_some() {
                None
            } else {
                patch.payment_reference.as_ref()
            };
            if let Some(reference) = attaching {
                if references.get(reference).is_some_and(|holder| *holder != id) {
                    return Err(duplicate_reference(reference));
                }
            }

            let applied = booking.apply(&patch);
            if applied {
                booking.updated_at = now;
                if let Some(reference) = attaching {
                    references.insert(reference.clone(), id);
                }
            }
            Ok(BookingUpdate {
                booking: booking.clone(),
                applied,
            })
        })
    }

    fn aggregate_by_catalog_item(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<CatalogItemId, CatalogStats>>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            let table = self.table.read().unwrap();
            let mut stats: HashMap<CatalogItemId, CatalogStats> = HashMap::new();
            for (_, booking) in table.rows.values() {
                stats
                    .entry(booking.catalog_item_id.clone())
                    .or_default()
                    .record(booking.total_amount);
            }
            Ok(stats)
        })
    }
}

/// In-memory payment record store.
#[derive(Clone)]
pub struct InMemoryPaymentRecordStore {
    records: Arc<RwLock<HashMap<BookingId, PaymentRecord>>>,
    clock: Arc<dyn Clock>,
    upserts: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl InMemoryPaymentRecordStore {
    /// Create an empty store stamping rows with the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping rows with `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            clock,
            upserts: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail with `StorageUnavailable` (or recover)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BookingError::StorageUnavailable(OFFLINE.to_string()))
        } else {
            Ok(())
        }
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Number of upsert calls received so far
    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryPaymentRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentRecordStore for InMemoryPaymentRecordStore {
    fn upsert_for_booking(
        &self,
        booking_id: BookingId,
        snapshot: PaymentSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentRecord>> + Send + '_>> {
        Box::pin(async move {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.ensure_online()?;
            let now = self.clock.now();
            let mut records = self.records.write().unwrap();
            let record = records
                .entry(booking_id)
                .and_modify(|record| record.replace_snapshot(snapshot.clone(), now))
                .or_insert_with(|| PaymentRecord::from_snapshot(booking_id, snapshot, now));
            Ok(record.clone())
        })
    }

    fn find_by_booking(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PaymentRecord>>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_online()?;
            Ok(self.records.read().unwrap().get(&booking_id).cloned())
        })
    }
}

/// In-memory owner directory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOwnerDirectory {
    owners: Arc<RwLock<HashMap<UserId, OwnerSummary>>>,
}

impl InMemoryOwnerDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner and return its id
    pub fn register(&self, name: &str, email: &str) -> UserId {
        let id = UserId::new();
        self.owners.write().unwrap().insert(
            id,
            OwnerSummary {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        id
    }
}

impl OwnerDirectory for InMemoryOwnerDirectory {
    fn summaries(
        &self,
        ids: Vec<UserId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<UserId, OwnerSummary>>> + Send + '_>> {
        Box::pin(async move {
            let owners = self.owners.read().unwrap();
            Ok(ids
                .into_iter()
                .filter_map(|id| owners.get(&id).map(|owner| (id, owner.clone())))
                .collect())
        })
    }
}
