//! # Box Office Core
//!
//! Core types and traits for the box office booking system.
//!
//! This crate defines the vocabulary shared by the storage backends and the
//! booking lifecycle: a booking is created pending, may have a payment reference
//! attached, and is confirmed exactly once.
//!
//! ## Core Concepts
//!
//! - **Booking**: a seat reservation for one show, owned by one principal
//! - **Payment reference**: opaque token for an external payment, held by at most one booking
//! - **Payment record**: denormalized confirmation, at most one per booking
//! - **Stores**: traits whose atomic operations carry all concurrency guarantees
//! - **Environment**: injected dependencies (clock, stores) for testability
//!
//! ## Booking lifecycle
//!
//! ```text
//!   create ──► Pending ──(initiate: attach reference)──► Pending + reference
//!                 │                                          │
//!                 └──────────────(confirm)───────────────────┴──► Confirmed (is_paid)
//! ```
//!
//! Once a booking is paid it is frozen: further initiate/confirm calls return
//! the stored booking unchanged.

pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{BookingError, FieldError, Result};
pub use store::{BookingStore, OwnerDirectory, PaymentRecordStore};
pub use types::{
    Booking, BookingDraft, BookingId, BookingPatch, BookingStatus, BookingUpdate,
    BookingWithOwner, CatalogItemId, CatalogStats, Money, OwnerSummary, PaymentRecord,
    PaymentRecordStatus, PaymentReference, PaymentSnapshot, Principal, Role, ShowSnapshot, UserId,
};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the service environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
