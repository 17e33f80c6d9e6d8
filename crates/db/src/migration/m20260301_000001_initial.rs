//! Initial schema: obligations, periods, transaction lines, accrual runs,
//! outage windows and the lease lock table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SCHEMA_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS shedlock, driftsavvik, palop, konteringer, oppdragsperioder, oppdrag CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
CREATE TABLE oppdrag (
    id UUID PRIMARY KEY,
    stonad_type VARCHAR(32) NOT NULL,
    sak_id VARCHAR(32) NOT NULL,
    skyldner_ident VARCHAR(32) NOT NULL,
    kravhaver_ident VARCHAR(32) NOT NULL,
    mottaker_ident VARCHAR(32) NOT NULL,
    gjelder_ident VARCHAR(32) NOT NULL,
    utsatt_til_dato DATE,
    har_feilet BOOLEAN NOT NULL DEFAULT FALSE,
    endret_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    opprettet_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_oppdrag_nokkel UNIQUE (stonad_type, kravhaver_ident, skyldner_ident, sak_id)
);

CREATE INDEX idx_oppdrag_sak ON oppdrag(sak_id);

CREATE TABLE oppdragsperioder (
    id UUID PRIMARY KEY,
    oppdrag_id UUID NOT NULL REFERENCES oppdrag(id),
    vedtak_id BIGINT NOT NULL,
    vedtak_type VARCHAR(32) NOT NULL,
    belop NUMERIC(19, 2) NOT NULL,
    valuta CHAR(3) NOT NULL,
    periode_fra DATE NOT NULL,
    periode_til DATE,
    vedtaksdato DATE NOT NULL,
    opprettet_av VARCHAR(64) NOT NULL,
    ekstern_referanse VARCHAR(64),
    konteringer_fullforte_opprettet BOOLEAN NOT NULL DEFAULT FALSE,
    opprettet_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_periode CHECK (periode_til IS NULL OR periode_til >= periode_fra)
);

CREATE INDEX idx_oppdragsperioder_oppdrag ON oppdragsperioder(oppdrag_id);

-- Periods still waiting for months after the watermark
CREATE INDEX idx_oppdragsperioder_ufullstendige ON oppdragsperioder(oppdrag_id)
    WHERE konteringer_fullforte_opprettet = FALSE;

CREATE TABLE konteringer (
    id UUID PRIMARY KEY,
    oppdragsperiode_id UUID NOT NULL REFERENCES oppdragsperioder(id),
    transaksjonskode CHAR(2) NOT NULL,
    overforingsperiode CHAR(7) NOT NULL,
    overforingstidspunkt TIMESTAMPTZ,
    behandlingsstatus_ok_tidspunkt TIMESTAMPTZ,
    siste_batch_uid VARCHAR(64),
    type VARCHAR(8) NOT NULL,
    soknad_type VARCHAR(8) NOT NULL,
    vedtak_id BIGINT NOT NULL,
    opprettet_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_kontering_periode_maned UNIQUE (oppdragsperiode_id, overforingsperiode)
);

-- Unsent lines (krav transmission and accrual)
CREATE INDEX idx_konteringer_usendt ON konteringer(overforingsperiode)
    WHERE overforingstidspunkt IS NULL;

-- Sent but unconfirmed lines (status polling and resend)
CREATE INDEX idx_konteringer_ubekreftet ON konteringer(siste_batch_uid)
    WHERE behandlingsstatus_ok_tidspunkt IS NULL;

-- Daily reconciliation
CREATE INDEX idx_konteringer_overfort ON konteringer(overforingstidspunkt);

CREATE TABLE palop (
    id UUID PRIMARY KEY,
    kjoredato TIMESTAMPTZ NOT NULL,
    for_periode CHAR(7) NOT NULL,
    startet_tidspunkt TIMESTAMPTZ,
    fullfort_tidspunkt TIMESTAMPTZ
);

CREATE INDEX idx_palop_ventende ON palop(kjoredato) WHERE fullfort_tidspunkt IS NULL;

CREATE TABLE driftsavvik (
    id UUID PRIMARY KEY,
    tidspunkt_fra TIMESTAMPTZ NOT NULL,
    tidspunkt_til TIMESTAMPTZ,
    palop_id UUID REFERENCES palop(id),
    arsak TEXT NOT NULL,
    opprettet_av VARCHAR(64) NOT NULL,
    opprettet_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_driftsavvik_periode CHECK (tidspunkt_til IS NULL OR tidspunkt_til >= tidspunkt_fra)
);

CREATE INDEX idx_driftsavvik_aktive ON driftsavvik(tidspunkt_fra, tidspunkt_til);

CREATE TABLE shedlock (
    name VARCHAR(64) PRIMARY KEY,
    lock_until TIMESTAMPTZ NOT NULL,
    locked_at TIMESTAMPTZ NOT NULL,
    locked_by VARCHAR(255) NOT NULL
);
";
