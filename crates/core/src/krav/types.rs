//! Outbound claim records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use regnskap_shared::types::{Currency, KonteringId, OppdragId};

use crate::domain::{KonteringType, Overforingsperiode, Soknadstype, Transaksjonskode};

/// Opaque batch reference returned by the external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchUid(pub String);

impl BatchUid {
    /// Borrows the reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One transaction line as submitted, with the full claim field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KravKontering {
    /// Local line id, echoed back in status answers.
    pub kontering_id: KonteringId,
    /// Transaction code.
    pub transaksjonskode: Transaksjonskode,
    /// Target accounting month.
    pub periode: Overforingsperiode,
    /// Signed amount.
    pub belop: Decimal,
    /// Currency.
    pub valuta: Currency,
    /// Case id.
    pub sak_id: String,
    /// Payer.
    pub skyldner_ident: String,
    /// Payee.
    pub kravhaver_ident: String,
    /// Recipient.
    pub mottaker_ident: String,
    /// Beneficiary.
    pub gjelder_ident: String,
    /// Decision id.
    pub vedtak_id: i64,
    /// Decision date.
    pub vedtaksdato: NaiveDate,
    /// Who made the decision.
    pub saksbehandler_id: String,
    /// NY or ENDRING.
    #[serde(rename = "type")]
    pub kontering_type: KonteringType,
    /// Claim subtype.
    pub soknad_type: Soknadstype,
    /// External line reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ekstern_referanse: Option<String>,
}

/// All lines of one obligation in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Krav {
    /// Owning obligation.
    pub oppdrag_id: OppdragId,
    /// Lines, ordered by month.
    pub konteringer: Vec<KravKontering>,
}

/// One outbound batch: every eligible obligation of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KravRequest {
    /// Case id shared by all obligations.
    pub sak_id: String,
    /// Obligations, in first-seen order.
    pub krav: Vec<Krav>,
}

impl KravRequest {
    /// Number of lines across all obligations.
    #[must_use]
    pub fn antall_konteringer(&self) -> usize {
        self.krav.iter().map(|k| k.konteringer.len()).sum()
    }

    /// Ids of every line in the batch.
    pub fn kontering_ids(&self) -> impl Iterator<Item = KonteringId> + '_ {
        self.krav
            .iter()
            .flat_map(|k| k.konteringer.iter().map(|l| l.kontering_id))
    }
}

/// An unsent line loaded for transmission.
#[derive(Debug, Clone)]
pub struct KravKandidat {
    /// Owning obligation.
    pub oppdrag_id: OppdragId,
    /// The line.
    pub kontering: KravKontering,
}
