//! Rota core — coordination of volunteer shifts, recurring tasks, and
//! photo-proof review.
//!
//! Pure domain crate: entities and their state machines in [`types`], typed
//! errors in [`error`], storage/notification port traits in [`ports`], and
//! the three engines on top — [`review`] (UserTask workflow and attempt
//! accounting), [`admission`] (request lifecycle and blocking policy), and
//! [`report`] (read-only aggregation). The Postgres adapter lives in
//! `rota-postgres`; [`memory`] provides the in-memory backend for tests.

pub mod admission;
pub mod error;
pub mod memory;
pub mod ports;
pub mod report;
pub mod review;
pub mod types;

pub use error::RotaError;
