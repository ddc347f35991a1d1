//! # Box Office Testing
//!
//! Testing utilities and helpers for the box office booking system.
//!
//! This crate provides:
//! - In-memory implementations of the store traits
//! - A fixed clock for deterministic timestamps
//! - Fixture builders for drafts and payment snapshots
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{test_clock, InMemoryBookingStore, InMemoryPaymentRecordStore};
//!
//! #[tokio::test]
//! async fn test_confirmation() {
//!     let clock = Arc::new(test_clock());
//!     let bookings = InMemoryBookingStore::with_clock(clock.clone());
//!     let payments = InMemoryPaymentRecordStore::with_clock(clock.clone());
//!     // build a BookingService over the stores ...
//! }
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod fixtures;
pub mod stores;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::RwLock;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time until advanced, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move the clock forward
        #[allow(clippy::unwrap_used)] // Test utility
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)] // Test utility
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use stores::{InMemoryBookingStore, InMemoryOwnerDirectory, InMemoryPaymentRecordStore};
