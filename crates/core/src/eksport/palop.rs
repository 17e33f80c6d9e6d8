//! Streaming accrual (påløp) file.
//!
//! Lines must arrive ordered by case id; each case becomes one `<sak>` block.

use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use rust_decimal::Decimal;

use regnskap_shared::types::PalopId;

use super::error::{FileError, xml};
use crate::domain::Overforingsperiode;
use crate::krav::KravKontering;

/// Progress is reported every this many lines.
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Batch header of the accrual file.
#[derive(Debug, Clone)]
pub struct PalopHeader {
    /// Accrual run.
    pub palop_id: PalopId,
    /// Period being closed.
    pub periode: Overforingsperiode,
    /// When the file was created.
    pub opprettet: DateTime<Utc>,
}

/// Totals carried in the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PalopTotal {
    /// Signed sum of all lines.
    pub sum: Decimal,
    /// Number of lines.
    pub antall: u64,
    /// Number of case blocks.
    pub saker: u64,
}

/// Storage key of the accrual file for a run.
#[must_use]
pub fn palop_filnavn(header: &PalopHeader) -> String {
    format!("palop/palop_{}_{}.xml", header.periode, header.palop_id)
}

type Progress = Box<dyn FnMut(u64) + Send>;

/// Writes the accrual document one line at a time.
pub struct PalopWriter<W: Write> {
    writer: Writer<W>,
    aktiv_sak: Option<String>,
    total: PalopTotal,
    progress: Option<Progress>,
}

impl<W: Write> PalopWriter<W> {
    /// Writes the declaration and the header block.
    pub fn new(w: W, header: &PalopHeader) -> Result<Self, FileError> {
        let mut writer = Writer::new_with_indent(w, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml)?;
        writer
            .write_event(Event::Start(BytesStart::new("palop")))
            .map_err(xml)?;
        writer
            .write_event(Event::Start(BytesStart::new("header")))
            .map_err(xml)?;
        element(&mut writer, "palopId", &header.palop_id.to_string())?;
        element(&mut writer, "periode", &header.periode.to_string())?;
        element(&mut writer, "opprettet", &header.opprettet.to_rfc3339())?;
        writer
            .write_event(Event::End(BytesStart::new("header").to_end()))
            .map_err(xml)?;

        Ok(Self {
            writer,
            aktiv_sak: None,
            total: PalopTotal::default(),
            progress: None,
        })
    }

    /// Registers a callback receiving the running line count.
    #[must_use]
    pub fn with_progress(mut self, progress: impl FnMut(u64) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Writes one line, opening a new case block when the case changes.
    pub fn skriv(&mut self, linje: &KravKontering) -> Result<(), FileError> {
        if self.aktiv_sak.as_deref() != Some(linje.sak_id.as_str()) {
            self.lukk_sak()?;
            self.writer
                .write_event(Event::Start(
                    BytesStart::new("sak").with_attributes([("id", linje.sak_id.as_str())]),
                ))
                .map_err(xml)?;
            self.aktiv_sak = Some(linje.sak_id.clone());
            self.total.saker += 1;
        }

        let w = &mut self.writer;
        w.write_event(Event::Start(BytesStart::new("kontering")))
            .map_err(xml)?;
        element(w, "konteringId", &linje.kontering_id.to_string())?;
        element(w, "transaksjonskode", linje.transaksjonskode.as_str())?;
        element(w, "type", linje.kontering_type.as_str())?;
        element(w, "soknadType", linje.soknad_type.as_str())?;
        element(w, "periode", &linje.periode.to_string())?;
        element(w, "belop", &format!("{:.2}", linje.belop))?;
        element(w, "valuta", linje.valuta.code())?;
        element(w, "skyldnerIdent", &linje.skyldner_ident)?;
        element(w, "kravhaverIdent", &linje.kravhaver_ident)?;
        element(w, "mottakerIdent", &linje.mottaker_ident)?;
        element(w, "gjelderIdent", &linje.gjelder_ident)?;
        element(w, "vedtakId", &linje.vedtak_id.to_string())?;
        element(w, "vedtaksdato", &linje.vedtaksdato.to_string())?;
        element(w, "saksbehandlerId", &linje.saksbehandler_id)?;
        if let Some(referanse) = &linje.ekstern_referanse {
            element(w, "eksternReferanse", referanse)?;
        }
        w.write_event(Event::End(BytesStart::new("kontering").to_end()))
            .map_err(xml)?;

        self.total.sum += linje.belop;
        self.total.antall += 1;
        if self.total.antall % PROGRESS_INTERVAL == 0
            && let Some(progress) = self.progress.as_mut()
        {
            progress(self.total.antall);
        }
        Ok(())
    }

    /// The underlying sink, for draining a page buffer.
    pub fn inner_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    /// Running totals.
    #[must_use]
    pub fn total(&self) -> PalopTotal {
        self.total
    }

    /// Closes the last case block and writes the trailer.
    pub fn ferdig(mut self) -> Result<(W, PalopTotal), FileError> {
        self.lukk_sak()?;
        let w = &mut self.writer;
        w.write_event(Event::Start(BytesStart::new("trailer")))
            .map_err(xml)?;
        element(w, "sum", &format!("{:.2}", self.total.sum))?;
        element(w, "antall", &self.total.antall.to_string())?;
        w.write_event(Event::End(BytesStart::new("trailer").to_end()))
            .map_err(xml)?;
        w.write_event(Event::End(BytesStart::new("palop").to_end()))
            .map_err(xml)?;

        let mut inner = self.writer.into_inner();
        inner.flush()?;
        Ok((inner, self.total))
    }

    fn lukk_sak(&mut self) -> Result<(), FileError> {
        if self.aktiv_sak.take().is_some() {
            self.writer
                .write_event(Event::End(BytesStart::new("sak").to_end()))
                .map_err(xml)?;
        }
        Ok(())
    }
}

fn element<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> Result<(), FileError> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml)?;
    w.write_event(Event::Text(BytesText::new(value)))
        .map_err(xml)?;
    w.write_event(Event::End(BytesStart::new(name).to_end()))
        .map_err(xml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KonteringType, Soknadstype, Transaksjonskode};
    use chrono::NaiveDate;
    use regnskap_shared::types::{Currency, KonteringId};
    use rust_decimal_macros::dec;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    fn header() -> PalopHeader {
        PalopHeader {
            palop_id: PalopId::new(),
            periode: Overforingsperiode::from_str("2023-02").unwrap(),
            opprettet: Utc::now(),
        }
    }

    fn linje(sak_id: &str, belop: Decimal) -> KravKontering {
        KravKontering {
            kontering_id: KonteringId::new(),
            transaksjonskode: Transaksjonskode::B1,
            periode: Overforingsperiode::from_str("2023-02").unwrap(),
            belop,
            valuta: Currency::Nok,
            sak_id: sak_id.to_string(),
            skyldner_ident: "11111111111".to_string(),
            kravhaver_ident: "33333333333".to_string(),
            mottaker_ident: "22222222226".to_string(),
            gjelder_ident: "44444444444".to_string(),
            vedtak_id: 7,
            vedtaksdato: NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
            saksbehandler_id: "Z999999".to_string(),
            kontering_type: KonteringType::Ny,
            soknad_type: Soknadstype::En,
            ekstern_referanse: Some("a&b".to_string()),
        }
    }

    #[test]
    fn test_file_name() {
        let header = header();
        assert_eq!(
            palop_filnavn(&header),
            format!("palop/palop_2023-02_{}.xml", header.palop_id)
        );
    }

    #[test]
    fn test_document_structure() {
        let mut writer = PalopWriter::new(Vec::new(), &header()).unwrap();
        writer.skriv(&linje("111111", dec!(1000))).unwrap();
        writer.skriv(&linje("111111", dec!(-250.5))).unwrap();
        writer.skriv(&linje("222222", dec!(300))).unwrap();
        let (bytes, total) = writer.ferdig().unwrap();

        assert_eq!(total.antall, 3);
        assert_eq!(total.saker, 2);
        assert_eq!(total.sum, dec!(1049.5));

        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<sak id=").count(), 2);
        assert_eq!(xml.matches("</sak>").count(), 2);
        assert_eq!(xml.matches("<kontering>").count(), 3);
        assert!(xml.contains("<belop>-250.50</belop>"));
        assert!(xml.contains("<eksternReferanse>a&amp;b</eksternReferanse>"));
        assert!(xml.contains("<sum>1049.50</sum>"));
        assert!(xml.trim_end().ends_with("</palop>"));
    }

    #[test]
    fn test_empty_run_has_trailer() {
        let writer = PalopWriter::new(Vec::new(), &header()).unwrap();
        let (bytes, total) = writer.ferdig().unwrap();
        assert_eq!(total, PalopTotal::default());
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<antall>0</antall>"));
        assert!(!xml.contains("<sak"));
    }

    #[test]
    fn test_progress_every_ten_thousand_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut writer = PalopWriter::new(std::io::sink(), &header())
            .unwrap()
            .with_progress(move |n| sink.lock().unwrap().push(n));

        let l = linje("123456", dec!(1));
        for _ in 0..25_000 {
            writer.skriv(&l).unwrap();
        }
        writer.ferdig().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![10_000, 20_000]);
    }

    #[test]
    fn test_page_buffer_can_be_drained() {
        let mut writer = PalopWriter::new(Vec::new(), &header()).unwrap();
        writer.skriv(&linje("111111", dec!(1))).unwrap();
        let first = std::mem::take(writer.inner_mut());
        writer.skriv(&linje("111111", dec!(2))).unwrap();
        let (rest, _) = writer.ferdig().unwrap();

        let xml = String::from_utf8([first, rest].concat()).unwrap();
        assert_eq!(xml.matches("<sak id=").count(), 1);
        assert_eq!(xml.matches("<kontering>").count(), 2);
    }
}
