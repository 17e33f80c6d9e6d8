//! Kontering planner.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use regnskap_shared::types::OppdragsperiodeId;

use crate::domain::{
    KonteringType, Oppdragstype, Overforingsperiode, Soknadstype, Transaksjonskode,
    VedtakHendelse, VedtakType, resolve_months,
};

/// A stored period of the obligation together with the months it already has lines for.
#[derive(Debug, Clone)]
pub struct EksisterendePeriode {
    /// Period id.
    pub id: OppdragsperiodeId,
    /// Decision that created the period.
    pub vedtak_id: i64,
    /// First day covered.
    pub periode_fra: NaiveDate,
    /// Exclusive end.
    pub periode_til: Option<NaiveDate>,
    /// Months with an existing Kontering.
    pub maneder: BTreeSet<Overforingsperiode>,
}

/// What the planner needs to know about one period.
#[derive(Debug, Clone)]
pub struct Periodegrunnlag {
    /// Obligation type.
    pub oppdragstype: Oppdragstype,
    /// Decision type.
    pub vedtak_type: VedtakType,
    /// Whether this is the first period of its decision.
    pub forste_periode: bool,
    /// Monthly amount.
    pub belop: Decimal,
    /// First day covered.
    pub periode_fra: NaiveDate,
    /// Exclusive end.
    pub periode_til: Option<NaiveDate>,
}

/// A line to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanlagtKontering {
    /// Target month.
    pub overforingsperiode: Overforingsperiode,
    /// Transaction code.
    pub transaksjonskode: Transaksjonskode,
    /// NY or ENDRING.
    pub kontering_type: KonteringType,
    /// Claim subtype.
    pub soknadstype: Soknadstype,
}

/// Lines to create for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodePlan {
    /// New lines, ordered by month.
    pub konteringer: Vec<PlanlagtKontering>,
    /// True once every month of the period has a line.
    pub fullfort: bool,
}

/// Plan for one period of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HendelsePlan {
    /// Index of the period in the event.
    pub indeks: usize,
    /// Stored period matching this one, if the event was seen before.
    pub eksisterende: Option<OppdragsperiodeId>,
    /// Lines and completion.
    pub plan: PeriodePlan,
}

/// Plans the lines of a single period.
///
/// `egne` are months the period already has; `sosken` are months any other
/// period of the same obligation has. Months in `egne` are skipped, months in
/// `sosken` become ENDRING.
#[must_use]
pub fn plan_periode(
    grunnlag: &Periodegrunnlag,
    egne: &BTreeSet<Overforingsperiode>,
    sosken: &BTreeSet<Overforingsperiode>,
    siste_lukkede: Option<Overforingsperiode>,
) -> PeriodePlan {
    let resolved = resolve_months(grunnlag.periode_fra, grunnlag.periode_til, siste_lukkede);
    let transaksjonskode = grunnlag
        .oppdragstype
        .transaksjonskode_for(grunnlag.belop < Decimal::ZERO);
    let soknadstype = Soknadstype::velg(
        &grunnlag.vedtak_type,
        grunnlag.oppdragstype,
        grunnlag.forste_periode,
    );

    let konteringer = resolved
        .months
        .into_iter()
        .filter(|maned| !egne.contains(maned))
        .map(|overforingsperiode| PlanlagtKontering {
            overforingsperiode,
            transaksjonskode,
            kontering_type: if sosken.contains(&overforingsperiode) {
                KonteringType::Endring
            } else {
                KonteringType::Ny
            },
            soknadstype,
        })
        .collect();

    PeriodePlan {
        konteringer,
        fullfort: resolved.complete,
    }
}

/// Plans every period of a decision event against the obligation's stored periods.
///
/// A stored period with the same decision id and dates is reused, so a
/// redelivered event only fills in what is missing. Lines planned for an
/// earlier period of the same event count as siblings for the later ones.
#[must_use]
pub fn plan_hendelse(
    hendelse: &VedtakHendelse,
    eksisterende: &[EksisterendePeriode],
    siste_lukkede: Option<Overforingsperiode>,
) -> Vec<HendelsePlan> {
    let mut planlagt: Vec<(Option<OppdragsperiodeId>, BTreeSet<Overforingsperiode>)> =
        Vec::with_capacity(hendelse.perioder.len());
    let mut planer = Vec::with_capacity(hendelse.perioder.len());

    for (indeks, periode) in hendelse.perioder.iter().enumerate() {
        let treff = eksisterende.iter().find(|e| {
            e.vedtak_id == hendelse.vedtak_id
                && e.periode_fra == periode.periode_fra
                && e.periode_til == periode.periode_til
                && !planlagt.iter().any(|(id, _)| *id == Some(e.id))
        });

        let tom = BTreeSet::new();
        let egne = treff.map_or(&tom, |e| &e.maneder);

        let sosken: BTreeSet<Overforingsperiode> = eksisterende
            .iter()
            .filter(|e| treff.is_none_or(|t| t.id != e.id))
            .flat_map(|e| e.maneder.iter().copied())
            .chain(planlagt.iter().flat_map(|(_, m)| m.iter().copied()))
            .collect();

        let grunnlag = Periodegrunnlag {
            oppdragstype: hendelse.stonad_type,
            vedtak_type: hendelse.vedtak_type.clone(),
            forste_periode: indeks == 0,
            belop: periode.belop,
            periode_fra: periode.periode_fra,
            periode_til: periode.periode_til,
        };
        let plan = plan_periode(&grunnlag, egne, &sosken, siste_lukkede);

        let nye = plan.konteringer.iter().map(|k| k.overforingsperiode).collect();
        planlagt.push((treff.map(|e| e.id), nye));
        planer.push(HendelsePlan {
            indeks,
            eksisterende: treff.map(|e| e.id),
            plan,
        });
    }

    planer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VedtakPeriode;
    use regnskap_shared::types::Currency;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month(s: &str) -> Overforingsperiode {
        Overforingsperiode::from_str(s).unwrap()
    }

    fn hendelse(perioder: Vec<VedtakPeriode>) -> VedtakHendelse {
        VedtakHendelse {
            vedtak_id: 42,
            vedtak_type: VedtakType::Fastsettelse,
            stonad_type: Oppdragstype::Bidrag,
            sak_id: "123456".to_string(),
            skyldner: "11111111111".to_string(),
            kravhaver: "33333333333".to_string(),
            mottaker: None,
            gjelder: "44444444444".to_string(),
            vedtaksdato: date(2023, 1, 10),
            opprettet_av: "Z999999".to_string(),
            opprettet_tidspunkt: None,
            perioder,
        }
    }

    fn periode(belop: Decimal, fra: NaiveDate, til: Option<NaiveDate>) -> VedtakPeriode {
        VedtakPeriode {
            belop,
            valuta: Currency::Nok,
            periode_fra: fra,
            periode_til: til,
            ekstern_referanse: None,
        }
    }

    #[test]
    fn test_plan_scenario_january_february() {
        let h = hendelse(vec![periode(
            dec!(1500),
            date(2023, 1, 1),
            Some(date(2023, 3, 1)),
        )]);
        let planer = plan_hendelse(&h, &[], Some(month("2023-02")));
        assert_eq!(planer.len(), 1);
        let maneder: Vec<String> = planer[0]
            .plan
            .konteringer
            .iter()
            .map(|k| k.overforingsperiode.to_string())
            .collect();
        assert_eq!(maneder, vec!["2023-01", "2023-02"]);
        assert!(planer[0].plan.fullfort);
        assert!(planer[0].eksisterende.is_none());
        assert!(
            planer[0]
                .plan
                .konteringer
                .iter()
                .all(|k| k.kontering_type == KonteringType::Ny
                    && k.transaksjonskode == Transaksjonskode::B1
                    && k.soknadstype == Soknadstype::En)
        );
    }

    #[test]
    fn test_overlapping_existing_period_gives_endring() {
        let h = hendelse(vec![periode(dec!(1800), date(2023, 2, 1), None)]);
        let eksisterende = vec![EksisterendePeriode {
            id: OppdragsperiodeId::new(),
            vedtak_id: 7,
            periode_fra: date(2023, 1, 1),
            periode_til: None,
            maneder: [month("2023-01"), month("2023-02")].into_iter().collect(),
        }];
        let planer = plan_hendelse(&h, &eksisterende, Some(month("2023-03")));
        let typer: Vec<KonteringType> = planer[0]
            .plan
            .konteringer
            .iter()
            .map(|k| k.kontering_type)
            .collect();
        assert_eq!(typer, vec![KonteringType::Endring, KonteringType::Ny]);
        assert!(!planer[0].plan.fullfort);
    }

    #[test]
    fn test_earlier_period_in_same_event_counts_as_sibling() {
        let h = hendelse(vec![
            periode(dec!(1000), date(2023, 1, 1), Some(date(2023, 3, 1))),
            periode(dec!(1200), date(2023, 2, 1), Some(date(2023, 4, 1))),
        ]);
        let planer = plan_hendelse(&h, &[], Some(month("2023-12")));
        let andre = &planer[1].plan.konteringer;
        assert_eq!(andre[0].overforingsperiode, month("2023-02"));
        assert_eq!(andre[0].kontering_type, KonteringType::Endring);
        assert_eq!(andre[1].kontering_type, KonteringType::Ny);
    }

    #[test]
    fn test_negative_amount_uses_correction_code() {
        let h = hendelse(vec![periode(
            dec!(-250.50),
            date(2023, 1, 1),
            Some(date(2023, 2, 1)),
        )]);
        let planer = plan_hendelse(&h, &[], Some(month("2023-01")));
        assert_eq!(
            planer[0].plan.konteringer[0].transaksjonskode,
            Transaksjonskode::B3
        );
    }

    #[test]
    fn test_index_adjustment_only_on_first_period() {
        let mut h = hendelse(vec![
            periode(dec!(1000), date(2023, 1, 1), Some(date(2023, 2, 1))),
            periode(dec!(1000), date(2023, 2, 1), Some(date(2023, 3, 1))),
        ]);
        h.vedtak_type = VedtakType::Indeksregulering;
        let planer = plan_hendelse(&h, &[], Some(month("2023-12")));
        assert_eq!(planer[0].plan.konteringer[0].soknadstype, Soknadstype::Ir);
        assert_eq!(planer[1].plan.konteringer[0].soknadstype, Soknadstype::En);
    }

    #[test]
    fn test_no_closed_period_plans_nothing() {
        let h = hendelse(vec![periode(dec!(1000), date(2023, 1, 1), None)]);
        let planer = plan_hendelse(&h, &[], None);
        assert!(planer[0].plan.konteringer.is_empty());
        assert!(!planer[0].plan.fullfort);
    }
}
