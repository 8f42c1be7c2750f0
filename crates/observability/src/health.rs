//! Health-Check-Endpunkt fuer Rendezvous
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Anzahl der Verbindungen

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::KennzahlenQuelle;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Verbindungs-Limit erreicht, neue Verbindungen werden abgelehnt
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub verbindungen: usize,
}

impl HealthResponse {
    /// Baut die Antwort aus der aktuellen Kennzahlen-Quelle
    pub fn aus_quelle(quelle: &dyn KennzahlenQuelle) -> Self {
        let kennzahlen = quelle.kennzahlen();
        let status = if kennzahlen.max_verbindungen > 0
            && kennzahlen.verbindungen >= kennzahlen.max_verbindungen
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: quelle.uptime_sek(),
            verbindungen: kennzahlen.verbindungen,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(quelle: Arc<dyn KennzahlenQuelle>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(quelle)
}

/// `GET /health` – gibt den Serverstatus zurueck
///
/// Auch `degraded` antwortet mit 200, der Health-Check soll nicht fehlschlagen.
async fn health_handler(State(quelle): State<Arc<dyn KennzahlenQuelle>>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::aus_quelle(quelle.as_ref())))
}
