//! Scheduled jobs of the regnskap service.
//!
//! This crate provides:
//! - The HTTP binding of the Skatt claim API, with retry and backoff
//! - One job per scheduled concern: krav transmission, status polling,
//!   resend, reconciliation export and the accrual run
//! - Storage and alert seams the jobs are written against
//! - The runner that drives each job on its own interval under a lease lock
//! - The line generator service shared with the inbound event endpoint

pub mod error;
pub mod generator;
pub mod guard;
pub mod jobs;
pub mod lager;
pub mod runner;
pub mod skatt;
pub mod tid;

#[cfg(test)]
mod testing;

pub use error::JobError;
pub use generator::KonteringGenerator;
pub use guard::OutageGuard;
pub use jobs::Job;
pub use runner::{Scheduler, Utfall};
pub use skatt::HttpSkattKlient;
