//! Prometheus-kompatible Metriken fuer Rendezvous
//!
//! Registrierte Metriken:
//! - `rendezvous_connections` – Gauge: Lebende Verbindungen
//! - `rendezvous_waiting` – Gauge: Verbindungen in der Warteschlange
//! - `rendezvous_matched` – Gauge: Gepaarte Verbindungen
//! - `rendezvous_matches_total` – Counter: Hergestellte Paarungen
//! - `rendezvous_skips_total` – Counter: Verarbeitete `skip`-Nachrichten
//! - `rendezvous_signals_relayed_total` – Counter: Weitergeleitete Signale
//! - `rendezvous_signals_rejected_total` – Counter: Abgelehnte Signale
//!
//! Die Werte werden beim Scrape aus der `KennzahlenQuelle` uebernommen.

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::{Kennzahlen, KennzahlenQuelle};

/// Alle Rendezvous-Prometheus-Metriken
#[derive(Clone)]
pub struct RendezvousMetrics {
    pub registry: Arc<Registry>,

    // Momentanwerte
    pub connections: IntGauge,
    pub waiting: IntGauge,
    pub matched: IntGauge,

    // Zaehler seit Start
    pub matches_total: IntCounter,
    pub skips_total: IntCounter,
    pub signals_relayed_total: IntCounter,
    pub signals_rejected_total: IntCounter,
}

fn gauge(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn counter(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Zieht einen Counter auf einen absoluten Stand nach
fn nachziehen(counter: &IntCounter, stand: u64) {
    let differenz = stand.saturating_sub(counter.get());
    if differenz > 0 {
        counter.inc_by(differenz);
    }
}

impl RendezvousMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections = gauge(&registry, "rendezvous_connections", "Anzahl lebender Verbindungen")?;
        let waiting = gauge(&registry, "rendezvous_waiting", "Anzahl wartender Verbindungen")?;
        let matched = gauge(&registry, "rendezvous_matched", "Anzahl gepaarter Verbindungen")?;

        let matches_total = counter(
            &registry,
            "rendezvous_matches_total",
            "Gesamtanzahl hergestellter Paarungen",
        )?;
        let skips_total = counter(
            &registry,
            "rendezvous_skips_total",
            "Gesamtanzahl verarbeiteter skip-Nachrichten",
        )?;
        let signals_relayed_total = counter(
            &registry,
            "rendezvous_signals_relayed_total",
            "Gesamtanzahl weitergeleiteter Signale",
        )?;
        let signals_rejected_total = counter(
            &registry,
            "rendezvous_signals_rejected_total",
            "Gesamtanzahl abgelehnter Signale",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            waiting,
            matched,
            matches_total,
            skips_total,
            signals_relayed_total,
            signals_rejected_total,
        })
    }

    /// Uebernimmt eine Kennzahlen-Momentaufnahme
    pub fn aktualisieren(&self, k: &Kennzahlen) {
        self.connections.set(k.verbindungen as i64);
        self.waiting.set(k.wartend as i64);
        self.matched.set(k.gepaart as i64);

        nachziehen(&self.matches_total, k.paarungen_gesamt);
        nachziehen(&self.skips_total, k.skips_gesamt);
        nachziehen(&self.signals_relayed_total, k.signale_weitergeleitet);
        nachziehen(&self.signals_rejected_total, k.signale_abgelehnt);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Clone)]
struct MetrikZustand {
    metriken: RendezvousMetrics,
    quelle: Arc<dyn KennzahlenQuelle>,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RendezvousMetrics, quelle: Arc<dyn KennzahlenQuelle>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetrikZustand { metriken, quelle })
}

async fn metrics_handler(State(zustand): State<MetrikZustand>) -> impl IntoResponse {
    zustand.metriken.aktualisieren(&zustand.quelle.kennzahlen());

    match zustand.metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
