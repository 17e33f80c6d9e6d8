//! Transmission eligibility.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Lines younger than this are left for the next pass.
pub const GRACE_WINDOW: TimeDelta = TimeDelta::seconds(30);

/// Obligation state and line age relevant for one transmission pass.
#[derive(Debug, Clone, Copy)]
pub struct Kvalifisering {
    /// Deferral date on the obligation.
    pub utsatt_til_dato: Option<NaiveDate>,
    /// Failed-flag on the obligation.
    pub har_feilet: bool,
    /// When the line was created.
    pub opprettet: DateTime<Utc>,
}

/// Whether an unsent line may be transmitted now.
///
/// A deferral ending today is already over; the obligation must not be
/// failed-flagged; the line must be older than the grace window.
#[must_use]
pub fn er_kvalifisert(k: &Kvalifisering, now: DateTime<Utc>, today: NaiveDate) -> bool {
    if k.har_feilet {
        return false;
    }
    if k.utsatt_til_dato.is_some_and(|utsatt| utsatt > today) {
        return false;
    }
    k.opprettet <= now - GRACE_WINDOW
}
