//! Inbound decision events (vedtakshendelser).

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regnskap_shared::types::Currency;

use super::oppdragstype::Oppdragstype;

/// Placeholder ident used when the recipient is unknown.
pub const UKJENT_MOTTAKER: &str = "22222222226";

/// Longest case id or person ident that can be stored.
pub const IDENT_MAKS: usize = 32;

/// Longest caseworker id or external reference that can be stored.
pub const REFERANSE_MAKS: usize = 64;

/// Errors when reading a decision event.
#[derive(Debug, Error)]
pub enum HendelseError {
    /// The payload is not valid JSON for a decision event.
    #[error("Malformed decision event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required field is present but empty or inconsistent.
    #[error("Invalid decision event: {0}")]
    Invalid(String),
}

/// Decision type carried on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VedtakType {
    /// First decision on a case.
    Fastsettelse,
    /// Changed decision.
    Endring,
    /// Yearly index adjustment.
    Indeksregulering,
    /// Decision after appeal.
    Klage,
    /// Any other decision type.
    #[serde(other)]
    Annet,
}

impl VedtakType {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fastsettelse => "FASTSETTELSE",
            Self::Endring => "ENDRING",
            Self::Indeksregulering => "INDEKSREGULERING",
            Self::Klage => "KLAGE",
            Self::Annet => "ANNET",
        }
    }

    /// Reads a persisted name; unknown names become `Annet`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "FASTSETTELSE" => Self::Fastsettelse,
            "ENDRING" => Self::Endring,
            "INDEKSREGULERING" => Self::Indeksregulering,
            "KLAGE" => Self::Klage,
            _ => Self::Annet,
        }
    }
}

/// A decision on one obligation, with its amount periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VedtakHendelse {
    /// Decision id.
    pub vedtak_id: i64,
    /// Decision type.
    pub vedtak_type: VedtakType,
    /// Obligation type.
    pub stonad_type: Oppdragstype,
    /// Case id.
    pub sak_id: String,
    /// Payer.
    pub skyldner: String,
    /// Payee.
    pub kravhaver: String,
    /// Recipient, when resolved.
    #[serde(default)]
    pub mottaker: Option<String>,
    /// Beneficiary.
    pub gjelder: String,
    /// Decision date.
    pub vedtaksdato: NaiveDate,
    /// Who made the decision.
    pub opprettet_av: String,
    /// When the decision was created, if sent.
    #[serde(default)]
    pub opprettet_tidspunkt: Option<NaiveDateTime>,
    /// Amount periods, in order.
    pub perioder: Vec<VedtakPeriode>,
}

/// One amount period of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VedtakPeriode {
    /// Monthly amount, signed.
    pub belop: Decimal,
    /// Currency of the amount.
    pub valuta: Currency,
    /// First day covered.
    pub periode_fra: NaiveDate,
    /// Exclusive end, open-ended when absent.
    #[serde(default)]
    pub periode_til: Option<NaiveDate>,
    /// External line reference.
    #[serde(default)]
    pub ekstern_referanse: Option<String>,
}

impl VedtakHendelse {
    /// Parses and validates an event payload.
    ///
    /// # Errors
    ///
    /// Returns `HendelseError::Malformed` for invalid JSON and
    /// `HendelseError::Invalid` when required values are empty or too long,
    /// or a period ends before it starts.
    pub fn parse(payload: &[u8]) -> Result<Self, HendelseError> {
        let hendelse: Self = serde_json::from_slice(payload)?;
        hendelse.validate()?;
        Ok(hendelse)
    }

    fn validate(&self) -> Result<(), HendelseError> {
        for (name, value) in [
            ("sakId", &self.sak_id),
            ("skyldner", &self.skyldner),
            ("kravhaver", &self.kravhaver),
            ("gjelder", &self.gjelder),
        ] {
            if value.trim().is_empty() {
                return Err(HendelseError::Invalid(format!("{name} is empty")));
            }
        }

        let mut lengder = vec![
            ("sakId", self.sak_id.as_str(), IDENT_MAKS),
            ("skyldner", self.skyldner.as_str(), IDENT_MAKS),
            ("kravhaver", self.kravhaver.as_str(), IDENT_MAKS),
            ("gjelder", self.gjelder.as_str(), IDENT_MAKS),
            ("opprettetAv", self.opprettet_av.as_str(), REFERANSE_MAKS),
        ];
        if let Some(mottaker) = &self.mottaker {
            lengder.push(("mottaker", mottaker.as_str(), IDENT_MAKS));
        }
        for periode in &self.perioder {
            if let Some(referanse) = &periode.ekstern_referanse {
                lengder.push(("eksternReferanse", referanse.as_str(), REFERANSE_MAKS));
            }
        }
        for (name, value, maks) in lengder {
            if value.chars().count() > maks {
                return Err(HendelseError::Invalid(format!(
                    "{name} is longer than {maks} characters"
                )));
            }
        }

        for periode in &self.perioder {
            if let Some(til) = periode.periode_til
                && til < periode.periode_fra
            {
                return Err(HendelseError::Invalid(format!(
                    "period ends {til} before it starts {}",
                    periode.periode_fra
                )));
            }
        }

        Ok(())
    }

    /// Recipient ident, falling back to the placeholder.
    #[must_use]
    pub fn mottaker_eller_ukjent(&self) -> &str {
        self.mottaker
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(UKJENT_MOTTAKER)
    }
}
