//! Scheduled jobs.

use async_trait::async_trait;

use regnskap_shared::CallContext;

use crate::error::JobError;

mod avstemming;
mod behandlingsstatus;
mod palop;
mod resend_krav;
mod send_krav;

pub use avstemming::{AVSTEMMING_DAGER, AvstemmingJob};
pub use behandlingsstatus::BehandlingsstatusJob;
pub use palop::{PalopFil, PalopJob, PalopJobDeps, PalopProdusent};
pub use resend_krav::ResendKravJob;
pub use send_krav::{SendKravJob, velg_kandidater};

/// One scheduled concern. The runner handles cadence, locking and the
/// outage guard; `run` does a single pass.
#[async_trait]
pub trait Job: Send + Sync {
    /// Lock and log name.
    fn name(&self) -> &'static str;

    /// Whether the pass calls the ledger and must respect its maintenance flag.
    fn mot_skatt(&self) -> bool {
        false
    }

    /// Runs one pass.
    async fn run(&self, ctx: &CallContext) -> Result<(), JobError>;
}
