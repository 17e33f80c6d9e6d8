//! Failure report entries, stored when a batch fails and mailed in the
//! morning window.

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
        db.execute_unprepared("DROP TABLE IF EXISTS feilrapport;")
            .await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
CREATE TABLE feilrapport (
    id UUID PRIMARY KEY,
    batch_uid VARCHAR(64) NOT NULL,
    sak_id VARCHAR(32) NOT NULL,
    antall_oppdrag INTEGER NOT NULL,
    antall_konteringer INTEGER NOT NULL,
    sum NUMERIC(19, 2) NOT NULL,
    feilmeldinger TEXT NOT NULL,
    reskontro_funnet INTEGER,
    reskontro_mangler INTEGER,
    reskontro_differanse NUMERIC(19, 2),
    opprettet_tidspunkt TIMESTAMPTZ NOT NULL DEFAULT now(),
    rapportert_tidspunkt TIMESTAMPTZ
);

-- Entries waiting for the next morning report
CREATE INDEX idx_feilrapport_urapportert ON feilrapport(opprettet_tidspunkt)
    WHERE rapportert_tidspunkt IS NULL;
";
