//! Grouping by case and submission.

use std::collections::BTreeMap;

use regnskap_shared::CallContext;
use tracing::{error, info};

use super::klient::{SkattError, SkattKlient};
use super::types::{BatchUid, Krav, KravKandidat, KravRequest};

/// Result of submitting one case group.
#[derive(Debug)]
pub struct GruppeResultat {
    /// The submitted batch.
    pub request: KravRequest,
    /// Batch reference, or why the group was not accepted.
    pub utfall: Result<BatchUid, SkattError>,
}

/// Groups lines into one request per case, then per obligation.
///
/// Requests come out ordered by case id. Obligations keep the order they
/// were first seen in within their case.
#[must_use]
pub fn group_by_sak(kandidater: Vec<KravKandidat>) -> Vec<KravRequest> {
    let mut grupper: BTreeMap<String, Vec<Krav>> = BTreeMap::new();

    for kandidat in kandidater {
        let krav = grupper.entry(kandidat.kontering.sak_id.clone()).or_default();
        match krav.iter_mut().find(|k| k.oppdrag_id == kandidat.oppdrag_id) {
            Some(k) => k.konteringer.push(kandidat.kontering),
            None => krav.push(Krav {
                oppdrag_id: kandidat.oppdrag_id,
                konteringer: vec![kandidat.kontering],
            }),
        }
    }

    grupper
        .into_iter()
        .map(|(sak_id, krav)| KravRequest { sak_id, krav })
        .collect()
}

/// Submits each group once. A failing group does not stop the others.
pub async fn send_grupper<K>(
    klient: &K,
    ctx: &CallContext,
    grupper: Vec<KravRequest>,
) -> Vec<GruppeResultat>
where
    K: SkattKlient + ?Sized,
{
    let mut resultater = Vec::with_capacity(grupper.len());

    for request in grupper {
        let utfall = klient.send_krav(ctx, &request).await;
        match &utfall {
            Ok(batch_uid) => info!(
                sak_id = %request.sak_id,
                batch_uid = %batch_uid,
                konteringer = request.antall_konteringer(),
                correlation_id = %ctx,
                "Krav sent"
            ),
            Err(e) => error!(
                sak_id = %request.sak_id,
                konteringer = request.antall_konteringer(),
                correlation_id = %ctx,
                error = %e,
                "Failed to send krav"
            ),
        }
        resultater.push(GruppeResultat { request, utfall });
    }

    resultater
}
