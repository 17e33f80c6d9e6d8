//! Domain types for obligations and their transaction lines.
//!
//! - `transaksjonskode` - transaction codes with sign and correction semantics
//! - `oppdragstype` - obligation types and their originating codes
//! - `periode` - accounting months and the period resolver
//! - `kontering` - line kinds, claim subtypes and the transmission state machine
//! - `hendelse` - inbound decision events

pub mod hendelse;
pub mod kontering;
pub mod oppdragstype;
pub mod periode;
pub mod transaksjonskode;

pub use hendelse::{
    HendelseError, IDENT_MAKS, REFERANSE_MAKS, VedtakHendelse, VedtakPeriode, VedtakType,
};
pub use kontering::{KonteringStatus, KonteringType, Soknadstype};
pub use oppdragstype::Oppdragstype;
pub use periode::{Overforingsperiode, PeriodError, ResolvedMonths, resolve_months};
pub use transaksjonskode::Transaksjonskode;
