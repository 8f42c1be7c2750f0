//! rendezvous-server – Bibliotheks-Root
//!
//! Verdrahtet Vermittlung, Transporte und Observability zu einem Prozess.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use rendezvous_observability::{observability_server_starten, Kennzahlen, KennzahlenQuelle};
use rendezvous_signaling::{ws_router, SignalingServer, SignalingState};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

/// Liefert die Kennzahlen der laufenden Vermittlung an `/metrics` und `/health`
struct DienstKennzahlen(Arc<SignalingState>);

impl KennzahlenQuelle for DienstKennzahlen {
    fn kennzahlen(&self) -> Kennzahlen {
        let aufnahme = self.0.dienst.momentaufnahme();
        Kennzahlen {
            verbindungen: aufnahme.zahlen.gesamt,
            max_verbindungen: self.0.config.max_verbindungen,
            wartend: aufnahme.zahlen.wartend,
            gepaart: aufnahme.zahlen.gepaart,
            paarungen_gesamt: aufnahme.statistik.paarungen_gesamt,
            skips_gesamt: aufnahme.statistik.skips_gesamt,
            signale_weitergeleitet: aufnahme.statistik.signale_weitergeleitet,
            signale_abgelehnt: aufnahme.statistik.signale_abgelehnt,
        }
    }

    fn uptime_sek(&self) -> u64 {
        self.0.uptime_sek()
    }
}

/// Wartet bis der Shutdown-Kanal `true` meldet oder geschlossen wird
async fn auf_shutdown_warten(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
}

fn aufgabe_auswerten(ergebnis: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match ergebnis {
        Ok(inner) => inner,
        Err(e) => Err(anyhow::anyhow!("Subsystem-Task abgebrochen: {e}")),
    }
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Konfiguration pruefen
    /// 2. TCP-Transport starten
    /// 3. WebSocket-Transport starten (`GET /ws`)
    /// 4. Observability-Server starten (`/metrics`, `/health`)
    /// 5. Auf Ctrl-C warten oder bis ein Subsystem vorzeitig endet
    pub async fn starten(self) -> Result<()> {
        self.config.validieren()?;

        let state = SignalingState::neu(self.config.signaling_config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut subsysteme: JoinSet<Result<()>> = JoinSet::new();

        tracing::info!(
            server_name = %self.config.server.name,
            max_verbindungen = self.config.server.max_verbindungen,
            presence = self.config.vermittlung.presence_aktiviert,
            "Server startet"
        );

        if self.config.netzwerk.tcp_aktiviert {
            let adresse = self.config.tcp_bind_adresse()?;
            let server = SignalingServer::neu(Arc::clone(&state), adresse);
            let rx = shutdown_rx.clone();
            subsysteme.spawn(async move {
                server
                    .starten(rx)
                    .await
                    .with_context(|| format!("TCP-Transport auf {adresse}"))
            });
        }

        if self.config.netzwerk.ws_aktiviert {
            let adresse = self.config.ws_bind_adresse()?;
            let listener = tokio::net::TcpListener::bind(adresse)
                .await
                .with_context(|| format!("WebSocket-Listener auf {adresse}"))?;
            let router = ws_router(Arc::clone(&state), shutdown_rx.clone());
            let rx = shutdown_rx.clone();

            tracing::info!(adresse = %adresse, "WebSocket-Transport gestartet");
            subsysteme.spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(auf_shutdown_warten(rx))
                    .await
                    .context("WebSocket-Transport")?;
                tracing::info!("WebSocket-Transport gestoppt");
                Ok(())
            });
        }

        if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let quelle: Arc<dyn KennzahlenQuelle> = Arc::new(DienstKennzahlen(Arc::clone(&state)));
            subsysteme.spawn(observability_server_starten(adresse, quelle, shutdown_rx.clone()));
        }

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        let mut fehler = None;
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Ctrl-C-Handler")?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
            Some(ergebnis) = subsysteme.join_next() => {
                let ergebnis = aufgabe_auswerten(ergebnis);
                if let Err(ref e) = ergebnis {
                    tracing::error!(fehler = %e, "Subsystem vorzeitig beendet");
                }
                fehler = ergebnis.err();
            }
        }

        // Fehlende Empfaenger sind kein Fehler, dann laeuft nichts mehr
        let _ = shutdown_tx.send(true);

        while let Some(ergebnis) = subsysteme.join_next().await {
            if let Err(e) = aufgabe_auswerten(ergebnis) {
                tracing::error!(fehler = %e, "Subsystem mit Fehler beendet");
                fehler.get_or_insert(e);
            }
        }

        tracing::info!(
            uptime_sek = state.uptime_sek(),
            "Server beendet"
        );

        match fehler {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
