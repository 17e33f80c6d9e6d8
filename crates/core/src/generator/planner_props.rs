//! Property-based tests for the kontering planner.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use regnskap_shared::types::{Currency, OppdragsperiodeId};

use crate::domain::{
    Oppdragstype, Overforingsperiode, VedtakHendelse, VedtakPeriode, VedtakType,
};
use crate::generator::planner::{EksisterendePeriode, HendelsePlan, plan_hendelse};

fn arb_periode() -> impl Strategy<Value = VedtakPeriode> {
    (
        2020i32..2024,
        1u32..=12,
        prop::option::of(1u32..30),
        -5_000i64..20_000,
    )
        .prop_map(|(year, month, lengde, ore)| {
            let fra = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            let til = lengde.map(|m| fra.checked_add_months(chrono::Months::new(m)).unwrap());
            VedtakPeriode {
                belop: Decimal::new(ore, 2),
                valuta: Currency::Nok,
                periode_fra: fra,
                periode_til: til,
                ekstern_referanse: None,
            }
        })
}

fn arb_hendelse() -> impl Strategy<Value = VedtakHendelse> {
    (
        1i64..1_000,
        prop::collection::vec(arb_periode(), 1..4),
        prop_oneof![
            Just(VedtakType::Fastsettelse),
            Just(VedtakType::Endring),
            Just(VedtakType::Indeksregulering),
        ],
    )
        .prop_map(|(vedtak_id, perioder, vedtak_type)| VedtakHendelse {
            vedtak_id,
            vedtak_type,
            stonad_type: Oppdragstype::Bidrag,
            sak_id: "123456".to_string(),
            skyldner: "11111111111".to_string(),
            kravhaver: "33333333333".to_string(),
            mottaker: None,
            gjelder: "44444444444".to_string(),
            vedtaksdato: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            opprettet_av: "Z999999".to_string(),
            opprettet_tidspunkt: None,
            perioder,
        })
}

fn arb_closed() -> impl Strategy<Value = Option<Overforingsperiode>> {
    prop::option::of((2020i32..2026, 1u32..=12))
        .prop_map(|v| v.map(|(y, m)| Overforingsperiode::new(y, m).unwrap()))
}

/// Stores a plan the way the generator does.
fn apply(
    hendelse: &VedtakHendelse,
    mut lagret: Vec<EksisterendePeriode>,
    planer: &[HendelsePlan],
) -> Vec<EksisterendePeriode> {
    for plan in planer {
        let maneder: BTreeSet<Overforingsperiode> = plan
            .plan
            .konteringer
            .iter()
            .map(|k| k.overforingsperiode)
            .collect();
        match plan.eksisterende {
            Some(id) => {
                if let Some(periode) = lagret.iter_mut().find(|p| p.id == id) {
                    periode.maneder.extend(maneder);
                }
            }
            None => {
                let periode = &hendelse.perioder[plan.indeks];
                lagret.push(EksisterendePeriode {
                    id: OppdragsperiodeId::new(),
                    vedtak_id: hendelse.vedtak_id,
                    periode_fra: periode.periode_fra,
                    periode_til: periode.periode_til,
                    maneder,
                });
            }
        }
    }
    lagret
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Replaying the same event adds no periods and no lines.
    #[test]
    fn prop_replay_is_noop(hendelse in arb_hendelse(), closed in arb_closed()) {
        let first = plan_hendelse(&hendelse, &[], closed);
        let lagret = apply(&hendelse, Vec::new(), &first);

        let second = plan_hendelse(&hendelse, &lagret, closed);
        prop_assert!(second.iter().all(|p| p.eksisterende.is_some()));
        prop_assert!(second.iter().all(|p| p.plan.konteringer.is_empty()));

        let etter = apply(&hendelse, lagret.clone(), &second);
        prop_assert_eq!(etter.len(), lagret.len());
    }

    /// No period gets two lines for the same month, and no line lands after the watermark.
    #[test]
    fn prop_months_unique_and_closed(hendelse in arb_hendelse(), closed in arb_closed()) {
        for plan in plan_hendelse(&hendelse, &[], closed) {
            let maneder: Vec<_> = plan.plan.konteringer.iter().map(|k| k.overforingsperiode).collect();
            let unike: BTreeSet<_> = maneder.iter().copied().collect();
            prop_assert_eq!(unike.len(), maneder.len());
            for maned in maneder {
                prop_assert!(closed.is_some_and(|c| maned <= c));
            }
        }
    }

    /// Moving the watermark forward only tops up, it never re-plans stored months.
    #[test]
    fn prop_top_up_only_adds_later_months(hendelse in arb_hendelse(), closed in arb_closed()) {
        let first = plan_hendelse(&hendelse, &[], closed);
        let lagret = apply(&hendelse, Vec::new(), &first);

        let later = closed.map(|c| c.next().next());
        for plan in plan_hendelse(&hendelse, &lagret, later) {
            for kontering in &plan.plan.konteringer {
                prop_assert!(closed.is_none_or(|c| kontering.overforingsperiode > c));
            }
        }
    }
}
