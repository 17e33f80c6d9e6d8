//! File exports: the daily reconciliation files and the accrual file.

pub mod avstemming;
pub mod error;
pub mod palop;

#[cfg(test)]
mod avstemming_props;

pub use avstemming::{
    AvstemmingLinje, AvstemmingWriter, Summering, SummeringLinje, detaljer_filnavn,
    skriv_summering, summering_filnavn,
};
pub use error::FileError;
pub use palop::{PROGRESS_INTERVAL, PalopHeader, PalopTotal, PalopWriter, palop_filnavn};
