//! Per-pass job metrics.
//!
//! Jobs recompute what they report on every pass and hand it to a reporter.
//! [`PrometheusMetrics`] keeps the values for scraping, [`TracingMetrics`]
//! only logs them.

use chrono::{DateTime, Utc};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::info;

/// Receives values computed by scheduled job passes.
pub trait MetricsReporter: Send + Sync {
    /// Lines transmitted in one krav pass.
    fn konteringer_sendt(&self, antall: u64);

    /// Batches confirmed and failed in one status pass.
    fn behandlingsstatus(&self, bekreftet: u64, feilet: u64);

    /// Lines reset by one resend pass.
    fn konteringer_tilbakestilt(&self, antall: u64);

    /// Next scheduled accrual run, if any.
    fn neste_palop(&self, tidspunkt: Option<DateTime<Utc>>);

    /// Lines written by an accrual run.
    fn palop_linjer(&self, antall: u64);
}

/// Reports through structured logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsReporter for TracingMetrics {
    fn konteringer_sendt(&self, antall: u64) {
        info!(metric = "konteringer_sendt", value = antall);
    }

    fn behandlingsstatus(&self, bekreftet: u64, feilet: u64) {
        info!(metric = "behandlingsstatus", bekreftet, feilet);
    }

    fn konteringer_tilbakestilt(&self, antall: u64) {
        info!(metric = "konteringer_tilbakestilt", value = antall);
    }

    fn neste_palop(&self, tidspunkt: Option<DateTime<Utc>>) {
        match tidspunkt {
            Some(t) => info!(metric = "neste_palop", value = %t.to_rfc3339()),
            None => info!(metric = "neste_palop", value = "none"),
        }
    }

    fn palop_linjer(&self, antall: u64) {
        info!(metric = "palop_linjer", value = antall);
    }
}

/// Prometheus collectors for the job metrics, under the `regnskap` prefix.
pub struct PrometheusMetrics {
    registry: Registry,
    konteringer_sendt: IntCounter,
    behandlingsstatus: IntCounterVec,
    konteringer_tilbakestilt: IntCounter,
    neste_palop: IntGauge,
    palop_linjer: IntCounter,
}

impl PrometheusMetrics {
    /// Creates and registers the collectors.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("regnskap".to_string()), None)?;

        let konteringer_sendt =
            IntCounter::new("konteringer_sendt_total", "Lines accepted by the ledger")?;
        registry.register(Box::new(konteringer_sendt.clone()))?;

        let behandlingsstatus = IntCounterVec::new(
            Opts::new("behandlingsstatus_total", "Batches by processing outcome"),
            &["utfall"],
        )?;
        registry.register(Box::new(behandlingsstatus.clone()))?;

        let konteringer_tilbakestilt = IntCounter::new(
            "konteringer_tilbakestilt_total",
            "Unconfirmed lines moved back to unsent",
        )?;
        registry.register(Box::new(konteringer_tilbakestilt.clone()))?;

        let neste_palop = IntGauge::new(
            "neste_palop_tidspunkt_sekunder",
            "Unix time of the next scheduled accrual run, 0 when none",
        )?;
        registry.register(Box::new(neste_palop.clone()))?;

        let palop_linjer =
            IntCounter::new("palop_linjer_total", "Lines written to accrual files")?;
        registry.register(Box::new(palop_linjer.clone()))?;

        Ok(Self {
            registry,
            konteringer_sendt,
            behandlingsstatus,
            konteringer_tilbakestilt,
            neste_palop,
            palop_linjer,
        })
    }

    /// Renders every collector in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsReporter for PrometheusMetrics {
    fn konteringer_sendt(&self, antall: u64) {
        self.konteringer_sendt.inc_by(antall);
    }

    fn behandlingsstatus(&self, bekreftet: u64, feilet: u64) {
        self.behandlingsstatus
            .with_label_values(&["bekreftet"])
            .inc_by(bekreftet);
        self.behandlingsstatus
            .with_label_values(&["feilet"])
            .inc_by(feilet);
    }

    fn konteringer_tilbakestilt(&self, antall: u64) {
        self.konteringer_tilbakestilt.inc_by(antall);
    }

    fn neste_palop(&self, tidspunkt: Option<DateTime<Utc>>) {
        self.neste_palop
            .set(tidspunkt.map_or(0, |t| t.timestamp()));
    }

    fn palop_linjer(&self, antall: u64) {
        self.palop_linjer.inc_by(antall);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_counters_accumulate_across_passes() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.konteringer_sendt(3);
        metrics.konteringer_sendt(2);
        metrics.behandlingsstatus(4, 1);
        metrics.palop_linjer(10);

        let output = metrics.export().unwrap();
        assert!(output.contains("regnskap_konteringer_sendt_total 5"));
        assert!(output.contains("regnskap_behandlingsstatus_total{utfall=\"bekreftet\"} 4"));
        assert!(output.contains("regnskap_behandlingsstatus_total{utfall=\"feilet\"} 1"));
        assert!(output.contains("regnskap_palop_linjer_total 10"));
    }

    #[test]
    fn test_next_run_gauge_resets_when_schedule_is_empty() {
        let metrics = PrometheusMetrics::new().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 4, 1, 4, 0, 0).unwrap();

        metrics.neste_palop(Some(t));
        assert!(
            metrics
                .export()
                .unwrap()
                .contains(&format!("regnskap_neste_palop_tidspunkt_sekunder {}", t.timestamp()))
        );

        metrics.neste_palop(None);
        assert!(
            metrics
                .export()
                .unwrap()
                .contains("regnskap_neste_palop_tidspunkt_sekunder 0")
        );
    }
}
