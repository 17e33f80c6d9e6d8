//! Core business logic for the regnskap service.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Domain types, planning rules and file formats live here.
//!
//! # Modules
//!
//! - `domain` - Obligations, transaction codes and accounting months
//! - `generator` - Planning of transaction lines from decision events
//! - `krav` - Claim grouping, eligibility and the external ledger interface
//! - `behandlingsstatus` - Failure report and its alert window
//! - `eksport` - Reconciliation and accrual files
//! - `storage` - Durable storage and remote delivery
//! - `metrics` - Per-pass job metrics

pub mod behandlingsstatus;
pub mod domain;
pub mod eksport;
pub mod generator;
pub mod krav;
pub mod metrics;
pub mod storage;
