//! Local-time rules. Schedules follow Europe/Oslo wall-clock time.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Europe::Oslo;

/// Hour after which the previous day is reconciled.
pub const AVSTEMMING_TIME: u32 = 1;

/// Today's date in Oslo.
#[must_use]
pub fn oslo_dato(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Oslo).date_naive()
}

/// The day to reconcile, once the local clock has passed 01:00.
#[must_use]
pub fn avstemmingsdato(now: DateTime<Utc>) -> Option<NaiveDate> {
    let lokal = now.with_timezone(&Oslo);
    if lokal.hour() < AVSTEMMING_TIME {
        return None;
    }
    lokal.date_naive().pred_opt()
}

/// Days the reconciliation export should have covered by `now`, oldest
/// first: up to `dager` days ending with [`avstemmingsdato`].
#[must_use]
pub fn avstemmingsdatoer(now: DateTime<Utc>, dager: u32) -> Vec<NaiveDate> {
    let Some(siste) = avstemmingsdato(now) else {
        return Vec::new();
    };
    (0..dager)
        .rev()
        .filter_map(|tilbake| siste.checked_sub_days(Days::new(u64::from(tilbake))))
        .collect()
}

/// Midnight at the end of today in Oslo, in UTC.
#[must_use]
pub fn dagslutt(now: DateTime<Utc>) -> DateTime<Utc> {
    oslo_dato(now)
        .succ_opt()
        .and_then(dagsgrenser)
        .map_or(now, |(start, _)| start)
}

/// `[start, end)` of a local calendar day, in UTC.
#[must_use]
pub fn dagsgrenser(dato: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Oslo
        .from_local_datetime(&dato.and_hms_opt(0, 0, 0)?)
        .earliest()?;
    let slutt = Oslo
        .from_local_datetime(&dato.succ_opt()?.and_hms_opt(0, 0, 0)?)
        .earliest()?;
    Some((start.with_timezone(&Utc), slutt.with_timezone(&Utc)))
}
