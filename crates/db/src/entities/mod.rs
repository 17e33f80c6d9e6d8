//! `SeaORM` entity definitions.

pub mod driftsavvik;
pub mod feilrapport;
pub mod konteringer;
pub mod oppdrag;
pub mod oppdragsperioder;
pub mod palop;
pub mod shedlock;
