//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod driftsavvik;
pub mod error;
pub mod feilrapport;
pub mod kontering;
pub mod oppdrag;
pub mod palop;

pub use driftsavvik::{DriftsavvikRepository, NyttDriftsavvik};
pub use error::RepositoryError;
pub use feilrapport::FeilrapportRepository;
pub use kontering::{FeiletBatch, KonteringRad, KonteringRepository, PalopUtvalg};
pub use oppdrag::{LagretVedtak, OppdragRepository};
pub use palop::{PalopRepository, PalopStatus};
