//! Failure report for rejected batches and its daily alert window.
//!
//! Entries are recorded when a batch fails and collected into one report
//! in the morning window, so a later resend does not hide them.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Europe::Oslo;
use rust_decimal::Decimal;

use crate::krav::ReskontroSammenligning;

/// Local hour the daily alert window starts.
pub const VARSEL_FRA_TIME: u32 = 7;

/// Local hour the daily alert window ends, exclusive.
pub const VARSEL_TIL_TIME: u32 = 8;

/// Whether `now` falls in [07:00, 08:00) Oslo time.
#[must_use]
pub fn i_varslingsvindu(now: DateTime<Utc>) -> bool {
    let time = now.with_timezone(&Oslo).hour();
    (VARSEL_FRA_TIME..VARSEL_TIL_TIME).contains(&time)
}

/// End of today's alert window as UTC, used as the lease expiry for the alert.
#[must_use]
pub fn varslingsvindu_slutt(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_timezone(&Oslo)
        .date_naive()
        .and_hms_opt(VARSEL_TIL_TIME, 0, 0)
        .and_then(|slutt| Oslo.from_local_datetime(&slutt).earliest())
        .map_or(now, |t| t.with_timezone(&Utc))
}

/// One failed batch as recorded when the failure was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeilrapportLinje {
    /// Batch reference.
    pub batch_uid: String,
    /// Case id of the batch.
    pub sak_id: String,
    /// Obligations flagged.
    pub antall_oppdrag: usize,
    /// Lines without confirmation.
    pub antall_konteringer: usize,
    /// Sum of those lines.
    pub sum: Decimal,
    /// Validation errors returned by the ledger.
    pub feilmeldinger: Vec<String>,
    /// Ledger mirror comparison, when it could be fetched.
    pub sammenligning: Option<ReskontroSammenligning>,
    /// When the failure was seen.
    pub oppdaget: DateTime<Utc>,
}

/// Aggregated failure report for one day.
#[derive(Debug, Clone)]
pub struct Feilrapport {
    dato: NaiveDate,
    linjer: Vec<FeilrapportLinje>,
}

impl Feilrapport {
    /// Starts an empty report.
    #[must_use]
    pub fn new(dato: NaiveDate) -> Self {
        Self {
            dato,
            linjer: Vec::new(),
        }
    }

    /// Adds a failed batch.
    pub fn legg_til(&mut self, linje: FeilrapportLinje) {
        self.linjer.push(linje);
    }

    /// True when nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.linjer.is_empty()
    }

    /// Number of failed batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.linjer.len()
    }

    /// Alert title.
    #[must_use]
    pub fn tittel(&self) -> String {
        format!("{} batcher med feilet behandlingsstatus {}", self.len(), self.dato)
    }

    /// Plain-text alert body, one block per case.
    #[must_use]
    pub fn tekst(&self) -> String {
        let mut body = format!("Feilrapport {}\n\n", self.dato);

        let mut saker: Vec<&str> = self.linjer.iter().map(|l| l.sak_id.as_str()).collect();
        saker.sort_unstable();
        saker.dedup();

        for sak_id in saker {
            body.push_str(&format!("Sak {sak_id}\n"));
            for l in self.linjer.iter().filter(|l| l.sak_id == sak_id) {
                body.push_str(&format!(
                    "  batch {} ({}): {} oppdrag, {} ubekreftede linjer, sum {}",
                    l.batch_uid,
                    l.oppdaget.with_timezone(&Oslo).format("%d.%m %H:%M"),
                    l.antall_oppdrag,
                    l.antall_konteringer,
                    l.sum
                ));
                match &l.sammenligning {
                    Some(s) => body.push_str(&format!(
                        ", i reskontro {} / mangler {} / differanse {}\n",
                        s.funnet, s.mangler, s.differanse
                    )),
                    None => body.push_str(", reskontro ikke tilgjengelig\n"),
                }
                for melding in &l.feilmeldinger {
                    body.push_str(&format!("    {melding}\n"));
                }
            }
        }

        body
    }
}
