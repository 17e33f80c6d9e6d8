//! Outage guard: decides whether a job pass may run at all.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use regnskap_core::krav::{SkattError, SkattKlient};
use regnskap_db::DriftsavvikRepository;
use regnskap_shared::CallContext;

use crate::error::JobError;

/// Why a pass is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hindring {
    /// A declared outage is in effect.
    Driftsavvik,
    /// The ledger has announced maintenance.
    Vedlikehold,
    /// The maintenance flag could not be read.
    SkattUtilgjengelig,
}

impl fmt::Display for Hindring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Driftsavvik => "active driftsavvik",
            Self::Vedlikehold => "Skatt maintenance mode",
            Self::SkattUtilgjengelig => "Skatt unreachable",
        })
    }
}

/// Checks declared outages and the ledger's maintenance flag.
#[derive(Clone)]
pub struct OutageGuard {
    driftsavvik: DriftsavvikRepository,
    klient: Arc<dyn SkattKlient>,
}

impl OutageGuard {
    /// Creates a guard.
    #[must_use]
    pub fn new(driftsavvik: DriftsavvikRepository, klient: Arc<dyn SkattKlient>) -> Self {
        Self { driftsavvik, klient }
    }

    /// Returns the reason to skip, or `None` when the pass may run.
    ///
    /// The maintenance flag is only consulted for jobs that call the ledger.
    pub async fn hindring(
        &self,
        ctx: &CallContext,
        mot_skatt: bool,
    ) -> Result<Option<Hindring>, JobError> {
        if self.driftsavvik.er_aktiv(Utc::now()).await? {
            return Ok(Some(Hindring::Driftsavvik));
        }
        if !mot_skatt {
            return Ok(None);
        }
        Ok(vurder_vedlikehold(
            ctx,
            self.klient.er_vedlikeholdsmodus(ctx).await,
        ))
    }
}

fn vurder_vedlikehold(ctx: &CallContext, svar: Result<bool, SkattError>) -> Option<Hindring> {
    match svar {
        Ok(true) => Some(Hindring::Vedlikehold),
        Ok(false) => None,
        Err(e) => {
            warn!(correlation_id = %ctx, error = %e, "Could not read Skatt maintenance flag");
            Some(Hindring::SkattUtilgjengelig)
        }
    }
}
