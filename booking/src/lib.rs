//! # Box Office
//!
//! Booking lifecycle and two-phase payment confirmation for cinema seats.
//!
//! - [`BookingService`]: create, initiate payment, confirm payment, list
//! - [`StatsReporter`]: per-show booking counts and earnings
//! - [`bootstrap`]: `PostgreSQL` wiring with startup index reconciliation
//! - [`config`], [`metrics`], [`retry`]: ambient plumbing
//!
//! Storage backends live in `boxoffice-postgres` (production) and
//! `boxoffice-testing` (in-memory).

pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod reporter;
pub mod requests;
pub mod retry;
pub mod service;

pub use config::Config;
pub use reporter::StatsReporter;
pub use requests::{ConfirmPaymentRequest, CreateBookingRequest};
pub use service::{BookingEnvironment, BookingService};
