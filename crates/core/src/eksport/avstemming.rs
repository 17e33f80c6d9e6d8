//! Daily reconciliation files.
//!
//! Both files are `;`-separated without a header. Amounts are written with
//! two decimals and summed with exact decimal arithmetic.
//!
//! Files are named by the reconciled day: the local day whose transmitted
//! lines they cover. Each detail record carries the export date, the day the
//! file was written. The two differ by one day in the normal run and by more
//! when a missed day is backfilled, and a backfilled day never takes the name
//! of another.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use csv::{Writer, WriterBuilder};
use rust_decimal::Decimal;

use super::error::FileError;
use crate::domain::{Overforingsperiode, Transaksjonskode};

/// One transmitted line as it appears in the detail file.
#[derive(Debug, Clone)]
pub struct AvstemmingLinje {
    /// Transaction code.
    pub transaksjonskode: Transaksjonskode,
    /// Case id.
    pub sak_id: String,
    /// Signed amount.
    pub belop: Decimal,
    /// Accounting month.
    pub overforingsperiode: Overforingsperiode,
    /// External line reference.
    pub ekstern_referanse: Option<String>,
    /// Beneficiary.
    pub gjelder_ident: String,
    /// Payee.
    pub kravhaver_ident: String,
}

/// Totals for one transaction code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummeringLinje {
    /// Transaction code.
    pub transaksjonskode: Transaksjonskode,
    /// Sum of amounts.
    pub sum: Decimal,
    /// Number of lines.
    pub antall: u64,
}

/// Totals for the summary file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summering {
    /// Per code, in code order.
    pub linjer: Vec<SummeringLinje>,
    /// Signed grand total.
    pub total: Decimal,
    /// Total number of lines.
    pub antall: u64,
}

/// Storage key of the detail file covering the lines transmitted on `dato`.
#[must_use]
pub fn detaljer_filnavn(dato: NaiveDate) -> String {
    format!(
        "avstemming/{}/avstemming_detaljer_{}.csv",
        dato.format("%Y/%m"),
        dato.format("%Y%m%d")
    )
}

/// Storage key of the summary file covering the lines transmitted on `dato`.
#[must_use]
pub fn summering_filnavn(dato: NaiveDate) -> String {
    format!(
        "avstemming/{}/avstemming_summering_{}.csv",
        dato.format("%Y/%m"),
        dato.format("%Y%m%d")
    )
}

fn belop(d: Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

fn dato(d: NaiveDate) -> String {
    d.format("%Y%m%d").to_string()
}

fn csv_writer<W: Write>(w: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(w)
}

/// Streams detail records and accumulates the per-code totals.
pub struct AvstemmingWriter<W: Write> {
    writer: Writer<W>,
    eksportdato: String,
    per_kode: BTreeMap<Transaksjonskode, (Decimal, u64)>,
}

impl<W: Write> AvstemmingWriter<W> {
    /// Starts a detail file whose records carry `eksportdato`.
    pub fn new(w: W, eksportdato: NaiveDate) -> Self {
        Self {
            writer: csv_writer(w),
            eksportdato: dato(eksportdato),
            per_kode: BTreeMap::new(),
        }
    }

    /// Writes one detail record.
    pub fn skriv(&mut self, linje: &AvstemmingLinje) -> Result<(), FileError> {
        let kode = linje.transaksjonskode;
        self.writer.write_record([
            kode.as_str(),
            linje.sak_id.as_str(),
            belop(linje.belop).as_str(),
            dato(linje.overforingsperiode.first_day()).as_str(),
            dato(linje.overforingsperiode.last_day()).as_str(),
            self.eksportdato.as_str(),
            kode.fortegn(),
            linje.ekstern_referanse.as_deref().unwrap_or(""),
            linje.gjelder_ident.as_str(),
            linje.kravhaver_ident.as_str(),
        ])?;

        let entry = self.per_kode.entry(kode).or_insert((Decimal::ZERO, 0));
        entry.0 += linje.belop.round_dp(2);
        entry.1 += 1;
        Ok(())
    }

    /// Flushes the detail file and returns the totals.
    pub fn ferdig(mut self) -> Result<(W, Summering), FileError> {
        self.writer.flush()?;
        let inner = self
            .writer
            .into_inner()
            .map_err(|e| FileError::Io(e.into_error()))?;

        let linjer: Vec<SummeringLinje> = self
            .per_kode
            .into_iter()
            .map(|(transaksjonskode, (sum, antall))| SummeringLinje {
                transaksjonskode,
                sum,
                antall,
            })
            .collect();
        let summering = Summering {
            total: linjer.iter().map(|l| l.sum).sum(),
            antall: linjer.iter().map(|l| l.antall).sum(),
            linjer,
        };

        Ok((inner, summering))
    }
}

/// Writes the summary file.
pub fn skriv_summering<W: Write>(w: W, summering: &Summering) -> Result<(), FileError> {
    let mut writer = csv_writer(w);
    for linje in &summering.linjer {
        writer.write_record([
            linje.transaksjonskode.as_str(),
            belop(linje.sum).as_str(),
            linje.transaksjonskode.tillegg_eller_fradrag(),
            linje.antall.to_string().as_str(),
        ])?;
    }
    writer.write_record([
        "Totalt",
        belop(summering.total).as_str(),
        "",
        summering.antall.to_string().as_str(),
    ])?;
    writer.flush()?;
    Ok(())
}
