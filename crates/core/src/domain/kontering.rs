//! Transaction line classification and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::hendelse::VedtakType;
use super::oppdragstype::Oppdragstype;

/// Line kind of a Kontering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KonteringType {
    /// First line for this month on the obligation.
    Ny,
    /// A sibling period already has a line for this month.
    Endring,
}

impl KonteringType {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ny => "NY",
            Self::Endring => "ENDRING",
        }
    }

    /// Parses a persisted name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NY" => Some(Self::Ny),
            "ENDRING" => Some(Self::Endring),
            _ => None,
        }
    }
}

impl fmt::Display for KonteringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim subtype sent with each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Soknadstype {
    /// Index adjustment.
    Ir,
    /// Fee charged to the recipient.
    Fabm,
    /// Fee charged to the payer.
    Fabp,
    /// Everything else.
    En,
}

impl Soknadstype {
    /// Picks the subtype for a line.
    ///
    /// Rules are evaluated in order: an index adjustment on the first period
    /// of the event, then the two fee types, then the default.
    #[must_use]
    pub fn velg(
        vedtak_type: &VedtakType,
        oppdragstype: Oppdragstype,
        forste_periode: bool,
    ) -> Self {
        if matches!(vedtak_type, VedtakType::Indeksregulering) && forste_periode {
            Self::Ir
        } else if oppdragstype == Oppdragstype::GebyrMottaker {
            Self::Fabm
        } else if oppdragstype == Oppdragstype::GebyrSkyldner {
            Self::Fabp
        } else {
            Self::En
        }
    }

    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ir => "IR",
            Self::Fabm => "FABM",
            Self::Fabp => "FABP",
            Self::En => "EN",
        }
    }

    /// Parses a persisted name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IR" => Some(Self::Ir),
            "FABM" => Some(Self::Fabm),
            "FABP" => Some(Self::Fabp),
            "EN" => Some(Self::En),
            _ => None,
        }
    }
}

impl fmt::Display for Soknadstype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transmission state of a Kontering, derived from its two timestamps.
///
/// The valid transitions are:
/// - Unsent → Sent (krav transmission)
/// - Sent → Confirmed (behandlingsstatus)
/// - Sent → Unsent (resend)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KonteringStatus {
    /// Not transmitted yet.
    Unsent,
    /// Transmitted, waiting for confirmation.
    Sent,
    /// Confirmed by the external ledger.
    Confirmed,
}

impl KonteringStatus {
    /// Derives the state from the persisted timestamps.
    #[must_use]
    pub fn from_timestamps(
        overforingstidspunkt: Option<DateTime<Utc>>,
        behandlingsstatus_ok_tidspunkt: Option<DateTime<Utc>>,
    ) -> Self {
        match (overforingstidspunkt, behandlingsstatus_ok_tidspunkt) {
            (_, Some(_)) => Self::Confirmed,
            (Some(_), None) => Self::Sent,
            (None, None) => Self::Unsent,
        }
    }

    /// Whether a resend may move this line back to unsent.
    #[must_use]
    pub const fn can_resend(self) -> bool {
        matches!(self, Self::Sent)
    }
}
