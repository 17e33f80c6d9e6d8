//! Resend of unconfirmed lines.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use regnskap_core::metrics::MetricsReporter;
use regnskap_db::KonteringRepository;
use regnskap_shared::CallContext;

use super::Job;
use crate::error::JobError;

/// Moves every sent but unconfirmed line back to unsent.
pub struct ResendKravJob {
    konteringer: KonteringRepository,
    metrics: Arc<dyn MetricsReporter>,
}

impl ResendKravJob {
    /// Creates the job.
    #[must_use]
    pub fn new(konteringer: KonteringRepository, metrics: Arc<dyn MetricsReporter>) -> Self {
        Self {
            konteringer,
            metrics,
        }
    }
}

#[async_trait]
impl Job for ResendKravJob {
    fn name(&self) -> &'static str {
        "resend_krav"
    }

    async fn run(&self, ctx: &CallContext) -> Result<(), JobError> {
        let antall = self.konteringer.tilbakestill_ubekreftede().await?;
        if antall > 0 {
            info!(konteringer = antall, correlation_id = %ctx, "Unconfirmed lines queued for resend");
        }
        self.metrics.konteringer_tilbakestilt(antall);
        Ok(())
    }
}
