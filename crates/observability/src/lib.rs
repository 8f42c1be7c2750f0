//! # rendezvous-observability
//!
//! Observability-Crate fuer Rendezvous:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber (Text oder JSON)
//!
//! Der Crate kennt die Vermittlung nicht direkt. Er liest Zahlen ueber den
//! `KennzahlenQuelle`-Trait, den der Server-Crate implementiert.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, RendezvousMetrics};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Momentaufnahme der Vermittlungs-Zahlen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kennzahlen {
    /// Lebende Verbindungen
    pub verbindungen: usize,
    /// Konfiguriertes Verbindungs-Limit
    pub max_verbindungen: usize,
    /// Verbindungen in der Warteschlange
    pub wartend: usize,
    /// Gepaarte Verbindungen (zwei pro Paarung)
    pub gepaart: usize,
    /// Hergestellte Paarungen seit Start
    pub paarungen_gesamt: u64,
    /// Verarbeitete `skip`-Nachrichten seit Start
    pub skips_gesamt: u64,
    /// Weitergeleitete Signale seit Start
    pub signale_weitergeleitet: u64,
    /// Abgelehnte Signale seit Start
    pub signale_abgelehnt: u64,
}

/// Liefert Kennzahlen fuer `/metrics` und `/health`
pub trait KennzahlenQuelle: Send + Sync + 'static {
    /// Aktuelle Kennzahlen
    fn kennzahlen(&self) -> Kennzahlen;

    /// Laufzeit des Dienstes in Sekunden
    fn uptime_sek(&self) -> u64;
}

/// Startet den Observability-HTTP-Server (Metriken + Health)
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
///
/// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    quelle: Arc<dyn KennzahlenQuelle>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let metriken = RendezvousMetrics::neu()?;

    let app = axum::Router::new()
        .merge(metrics_router(metriken, Arc::clone(&quelle)))
        .merge(health_router(quelle))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("Observability-Server gestoppt");
    Ok(())
}

#[cfg(test)]
pub(crate) mod testquelle {
    use super::*;

    /// Feste Kennzahlen fuer Handler-Tests
    pub(crate) struct FesteQuelle(pub Kennzahlen);

    impl KennzahlenQuelle for FesteQuelle {
        fn kennzahlen(&self) -> Kennzahlen {
            self.0
        }

        fn uptime_sek(&self) -> u64 {
            42
        }
    }
}
