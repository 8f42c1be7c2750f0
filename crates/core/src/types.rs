//! Identifikationstypen fuer Rendezvous
//!
//! Eine `ConnectionId` steht fuer genau eine Transport-Sitzung. Sie wird beim
//! Annehmen der Verbindung erzeugt und nach dem Trennen nie wieder vergeben.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RendezvousError;

/// Eindeutige Verbindungs-ID
///
/// Auf dem Draht als nackter UUID-String serialisiert, damit Clients sie
/// unveraendert in `signal.to` zurueckschicken koennen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = RendezvousError;

    /// Akzeptiert sowohl die nackte UUID als auch die `conn:`-Anzeigeform
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roh = s.strip_prefix("conn:").unwrap_or(s);
        Uuid::parse_str(roh)
            .map(Self)
            .map_err(|e| RendezvousError::UngueltigeId(format!("{s}: {e}")))
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert_eq!(id.to_string(), "conn:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn connection_id_wire_format_ist_nackte_uuid() {
        let id = ConnectionId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
        let zurueck: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, id);
    }

    #[test]
    fn connection_id_parsen() {
        let id = ConnectionId::new();
        assert_eq!(id.inner().to_string().parse::<ConnectionId>().unwrap(), id);
        assert_eq!(id.to_string().parse::<ConnectionId>().unwrap(), id);
    }

    #[test]
    fn connection_id_parsen_ungueltig() {
        let fehler = "kein-uuid".parse::<ConnectionId>().unwrap_err();
        assert!(matches!(fehler, RendezvousError::UngueltigeId(_)));
    }
}
