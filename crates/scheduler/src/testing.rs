//! Shared test doubles.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use regnskap_core::krav::{
    BatchUid, Behandlingsstatus, KravKontering, KravRequest, ReskontroSammenligning, SkattError,
    SkattKlient,
};
use regnskap_db::repositories::KonteringRad;
use regnskap_shared::CallContext;

mockall::mock! {
    pub Skatt {}

    #[async_trait]
    impl SkattKlient for Skatt {
        async fn send_krav(&self, ctx: &CallContext, request: &KravRequest) -> Result<BatchUid, SkattError>;
        async fn hent_behandlingsstatus(&self, ctx: &CallContext, batch_uid: &BatchUid) -> Result<Behandlingsstatus, SkattError>;
        async fn sammenlign_med_reskontro(&self, ctx: &CallContext, sak_id: &str, konteringer: &[KravKontering]) -> Result<ReskontroSammenligning, SkattError>;
        async fn er_vedlikeholdsmodus(&self, ctx: &CallContext) -> Result<bool, SkattError>;
    }
}

/// An unsent B1 line for January 2023 created `alder` before `now`.
pub fn rad(sak_id: &str, oppdrag_id: Uuid, alder: TimeDelta, now: DateTime<Utc>) -> KonteringRad {
    KonteringRad {
        id: Uuid::new_v4(),
        transaksjonskode: "B1".to_string(),
        overforingsperiode: "2023-01".to_string(),
        kontering_type: "NY".to_string(),
        soknad_type: "FABP".to_string(),
        vedtak_id: 1,
        opprettet_tidspunkt: (now - alder).into(),
        overforingstidspunkt: None,
        siste_batch_uid: None,
        belop: dec!(1500.00),
        valuta: "NOK".to_string(),
        vedtaksdato: NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(),
        opprettet_av: "Z999999".to_string(),
        ekstern_referanse: None,
        oppdrag_id,
        sak_id: sak_id.to_string(),
        skyldner_ident: "01010112345".to_string(),
        kravhaver_ident: "02020212345".to_string(),
        mottaker_ident: "02020212345".to_string(),
        gjelder_ident: "03030312345".to_string(),
        utsatt_til_dato: None,
        har_feilet: false,
    }
}

/// The same line as transmitted at `tidspunkt`.
pub fn overfort(sak_id: &str, tidspunkt: DateTime<Utc>) -> KonteringRad {
    let mut rad = rad(sak_id, Uuid::new_v4(), TimeDelta::hours(1), tidspunkt);
    rad.overforingstidspunkt = Some(tidspunkt.into());
    rad.siste_batch_uid = Some("b-1".to_string());
    rad
}
