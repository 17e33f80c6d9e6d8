//! Property-based tests for the reconciliation files.
//!
//! Both files are parsed back and compared with exact decimals.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::domain::{Overforingsperiode, Transaksjonskode};
use crate::eksport::avstemming::{AvstemmingLinje, AvstemmingWriter, skriv_summering};

fn arb_kode() -> impl Strategy<Value = Transaksjonskode> {
    prop::sample::select(Transaksjonskode::ALL.to_vec())
}

fn arb_linje() -> impl Strategy<Value = AvstemmingLinje> {
    (arb_kode(), 0i64..10_000_000, 1u32..=12, 100_000u32..999_999).prop_map(
        |(kode, ore, month, sak)| {
            let ore = if kode.negative_amount() { -ore } else { ore };
            AvstemmingLinje {
                transaksjonskode: kode,
                sak_id: sak.to_string(),
                belop: Decimal::new(ore, 2),
                overforingsperiode: Overforingsperiode::new(2024, month).unwrap(),
                ekstern_referanse: None,
                gjelder_ident: "44444444444".to_string(),
                kravhaver_ident: "33333333333".to_string(),
            }
        },
    )
}

fn records(bytes: &[u8]) -> Vec<csv::StringRecord> {
    ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_reader(bytes)
        .records()
        .map(Result::unwrap)
        .collect()
}

fn write_files(linjer: &[AvstemmingLinje]) -> (Vec<u8>, Vec<u8>) {
    let mut writer =
        AvstemmingWriter::new(Vec::new(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    for linje in linjer {
        writer.skriv(linje).unwrap();
    }
    let (detaljer, summering) = writer.ferdig().unwrap();
    let mut oppsummert = Vec::new();
    skriv_summering(&mut oppsummert, &summering).unwrap();
    (detaljer, oppsummert)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Detail amounts summed per code equal the summary amount, to the øre.
    #[test]
    fn prop_detail_totals_match_summary(
        linjer in prop::collection::vec(arb_linje(), 10_000..10_200)
    ) {
        let (detaljer, oppsummert) = write_files(&linjer);

        let mut per_kode: BTreeMap<String, (Decimal, u64)> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        for record in records(&detaljer) {
            let belop = Decimal::from_str(&record[2]).unwrap();
            let entry = per_kode.entry(record[0].to_string()).or_insert((Decimal::ZERO, 0));
            entry.0 += belop;
            entry.1 += 1;
            total += belop;
        }

        let summary = records(&oppsummert);
        let (totalt, koder) = summary.split_last().unwrap();
        prop_assert_eq!(koder.len(), per_kode.len());
        for record in koder {
            let (sum, antall) = per_kode[&record[0]];
            prop_assert_eq!(Decimal::from_str(&record[1]).unwrap(), sum);
            prop_assert_eq!(record[3].parse::<u64>().unwrap(), antall);
        }

        prop_assert_eq!(&totalt[0], "Totalt");
        prop_assert_eq!(Decimal::from_str(&totalt[1]).unwrap(), total);
        prop_assert_eq!(totalt[3].parse::<usize>().unwrap(), linjer.len());
    }

    /// Each code's summary flag agrees with its counterpart and with the detail sign flag.
    #[test]
    fn prop_sign_consistency(linjer in prop::collection::vec(arb_linje(), 1..500)) {
        let (detaljer, oppsummert) = write_files(&linjer);

        let summary = records(&oppsummert);
        let mut flagg: BTreeMap<String, String> = BTreeMap::new();
        for record in &summary[..summary.len() - 1] {
            let kode = Transaksjonskode::from_str(&record[0]).unwrap();
            let expected = if kode.korreksjonskode().is_some() { "T" } else { "F" };
            prop_assert_eq!(&record[2], expected);
            flagg.insert(record[0].to_string(), record[2].to_string());
        }

        for record in records(&detaljer) {
            prop_assert_eq!(&record[6], flagg[&record[0]].as_str());
        }
    }
}
