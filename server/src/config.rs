//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use rendezvous_core::{RendezvousError, Result};
use rendezvous_observability::logging::{log_format_gueltig, log_level_gueltig};
use rendezvous_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Vermittlung und Keepalive
    pub vermittlung: VermittlungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen ueber alle Transporte
    pub max_verbindungen: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Rendezvous".into(),
            max_verbindungen: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// Port fuer den TCP-Transport
    pub tcp_port: u16,
    /// Port fuer den WebSocket-Transport (`GET /ws`)
    pub http_port: u16,
    pub tcp_aktiviert: bool,
    pub ws_aktiviert: bool,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 9987,
            http_port: 3000,
            tcp_aktiviert: true,
            ws_aktiviert: true,
        }
    }
}

/// Vermittlung und Keepalive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VermittlungsEinstellungen {
    /// Presence-Zahlen an alle Verbindungen verteilen
    pub presence_aktiviert: bool,
    /// Weitergeleitete Signale dem Absender mit `signalDelivered` bestaetigen
    pub zustellbestaetigung: bool,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Trennung nach so vielen Sekunden ohne eingehenden Verkehr
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Maximale Frame- bzw. Nachrichtengroesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for VermittlungsEinstellungen {
    fn default() -> Self {
        Self {
            presence_aktiviert: true,
            zustellbestaetigung: true,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            sende_queue_groesse: 64,
            max_frame_groesse: 64 * 1024,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft die Konfiguration auf widerspruechliche Werte
    pub fn validieren(&self) -> Result<()> {
        let v = &self.vermittlung;

        if self.server.max_verbindungen == 0 {
            return Err(RendezvousError::konfiguration(
                "server.max_verbindungen muss groesser als 0 sein",
            ));
        }
        if v.keepalive_sek == 0 {
            return Err(RendezvousError::konfiguration(
                "vermittlung.keepalive_sek muss groesser als 0 sein",
            ));
        }
        if v.verbindungs_timeout_sek <= v.keepalive_sek {
            return Err(RendezvousError::konfiguration(format!(
                "vermittlung.verbindungs_timeout_sek ({}) muss groesser als keepalive_sek ({}) sein",
                v.verbindungs_timeout_sek, v.keepalive_sek
            )));
        }
        if v.sende_queue_groesse == 0 {
            return Err(RendezvousError::konfiguration(
                "vermittlung.sende_queue_groesse muss groesser als 0 sein",
            ));
        }
        if v.max_frame_groesse == 0 {
            return Err(RendezvousError::konfiguration(
                "vermittlung.max_frame_groesse muss groesser als 0 sein",
            ));
        }
        if !self.netzwerk.tcp_aktiviert && !self.netzwerk.ws_aktiviert {
            return Err(RendezvousError::konfiguration(
                "mindestens ein Transport (tcp oder ws) muss aktiviert sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(RendezvousError::konfiguration(format!(
                "unbekanntes Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(RendezvousError::konfiguration(format!(
                "unbekanntes Log-Format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Uebersetzt die Datei-Konfiguration fuer den Signaling-Crate
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_verbindungen: self.server.max_verbindungen,
            keepalive_sek: self.vermittlung.keepalive_sek,
            verbindungs_timeout_sek: self.vermittlung.verbindungs_timeout_sek,
            sende_queue_groesse: self.vermittlung.sende_queue_groesse,
            max_frame_groesse: self.vermittlung.max_frame_groesse,
            presence_aktiviert: self.vermittlung.presence_aktiviert,
            zustellbestaetigung: self.vermittlung.zustellbestaetigung,
        }
    }

    fn adresse(&self, port: u16) -> Result<SocketAddr> {
        let text = format!("{}:{}", self.netzwerk.bind_adresse, port);
        text.parse()
            .map_err(|e| RendezvousError::konfiguration(format!("ungueltige Adresse '{text}': {e}")))
    }

    /// Bind-Adresse fuer den TCP-Transport
    pub fn tcp_bind_adresse(&self) -> Result<SocketAddr> {
        self.adresse(self.netzwerk.tcp_port)
    }

    /// Bind-Adresse fuer den WebSocket-Transport
    pub fn ws_bind_adresse(&self) -> Result<SocketAddr> {
        self.adresse(self.netzwerk.http_port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> Result<SocketAddr> {
        self.adresse(self.observability.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_verbindungen, 512);
        assert_eq!(cfg.netzwerk.tcp_port, 9987);
        assert_eq!(cfg.vermittlung.keepalive_sek, 25);
        assert_eq!(cfg.vermittlung.verbindungs_timeout_sek, 60);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse().unwrap().to_string(), "0.0.0.0:9987");
        assert_eq!(cfg.ws_bind_adresse().unwrap().to_string(), "0.0.0.0:3000");
        assert_eq!(
            cfg.observability_bind_adresse().unwrap().to_string(),
            "0.0.0.0:9300"
        );
    }

    #[test]
    fn ungueltige_bind_adresse() {
        let mut cfg = ServerConfig::default();
        cfg.netzwerk.bind_adresse = "kein-host".into();
        assert!(matches!(
            cfg.tcp_bind_adresse(),
            Err(RendezvousError::Konfiguration(_))
        ));
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Testlauf"
            max_verbindungen = 100

            [netzwerk]
            tcp_port = 10000
            ws_aktiviert = false

            [vermittlung]
            keepalive_sek = 10
            verbindungs_timeout_sek = 30
            zustellbestaetigung = false
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Testlauf");
        assert_eq!(cfg.server.max_verbindungen, 100);
        assert_eq!(cfg.netzwerk.tcp_port, 10000);
        assert!(!cfg.netzwerk.ws_aktiviert);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.http_port, 3000);
        assert_eq!(cfg.vermittlung.sende_queue_groesse, 64);
        assert!(cfg.validieren().is_ok());

        let signaling = cfg.signaling_config();
        assert_eq!(signaling.max_verbindungen, 100);
        assert_eq!(signaling.keepalive_sek, 10);
        assert!(signaling.presence_aktiviert);
        assert!(!signaling.zustellbestaetigung);
    }

    #[test]
    fn timeout_muss_groesser_als_keepalive_sein() {
        let mut cfg = ServerConfig::default();
        cfg.vermittlung.verbindungs_timeout_sek = cfg.vermittlung.keepalive_sek;
        assert!(matches!(
            cfg.validieren(),
            Err(RendezvousError::Konfiguration(_))
        ));
    }

    #[test]
    fn null_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.vermittlung.sende_queue_groesse = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.server.max_verbindungen = 0;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn kein_transport_aktiviert() {
        let mut cfg = ServerConfig::default();
        cfg.netzwerk.tcp_aktiviert = false;
        cfg.netzwerk.ws_aktiviert = false;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn unbekanntes_log_format() {
        let toml = r#"
            [logging]
            format = "xml"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn laden_ohne_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/rendezvous.toml").unwrap();
        assert_eq!(cfg.netzwerk.tcp_port, 9987);
    }
}
