//! Fehlertypen fuer Rendezvous
//!
//! Zentraler Fehler-Enum. Die Vermittlungslogik selbst kennt keine Fehler
//! (alle Abweichungen werden lokal behandelt), hier landen nur Probleme an
//! den Raendern: ungueltige Eingaben, Konfiguration, Interna.

use thiserror::Error;

/// Globaler Result-Alias fuer Rendezvous
pub type Result<T> = std::result::Result<T, RendezvousError>;

/// Alle moeglichen Fehler im Rendezvous-System
#[derive(Debug, Error)]
pub enum RendezvousError {
    // --- Eingaben ---
    #[error("Ungueltige Verbindungs-ID: {0}")]
    UngueltigeId(String),

    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RendezvousError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

impl From<serde_json::Error> for RendezvousError {
    fn from(e: serde_json::Error) -> Self {
        Self::UngueltigeNachricht(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = RendezvousError::konfiguration("Timeout zu klein");
        assert_eq!(e.to_string(), "Konfigurationsfehler: Timeout zu klein");
    }

    #[test]
    fn json_fehler_wird_ungueltige_nachricht() {
        let json_fehler = serde_json::from_str::<serde_json::Value>("{kaputt").unwrap_err();
        let e: RendezvousError = json_fehler.into();
        assert!(matches!(e, RendezvousError::UngueltigeNachricht(_)));
    }
}
