//! Message-Dispatcher – Routet Client-Nachrichten an Vermittlung und Relay
//!
//! Transport-unabhaengig: TCP- und WebSocket-Verbindungen melden sich hier
//! an, reichen dekodierte `ClientMessage`s durch und rufen beim Ende
//! `client_cleanup` auf. Antworten gehen nie direkt zurueck, sondern
//! ausschliesslich ueber die Send-Queue der Verbindung.

use rendezvous_core::ConnectionId;
use rendezvous_protocol::{ClientMessage, ServerEvent};
use std::sync::Arc;

use crate::broadcast::ClientEmpfang;
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Meldet eine neu angenommene Verbindung an
    ///
    /// Reihenfolge: Send-Queue anlegen, `connected` einreihen, dann erst im
    /// Register eintragen. So ist `connected` garantiert das erste Ereignis.
    pub fn client_anmelden(&self, id: ConnectionId) -> ClientEmpfang {
        let rx = self
            .state
            .broadcaster
            .client_registrieren(id, self.state.config.sende_queue_groesse);
        self.state
            .broadcaster
            .an_verbindung_senden(&id, ServerEvent::Connected { id });
        self.state.dienst.verbindung_registrieren(id);
        rx
    }

    /// Verarbeitet eine eingehende Client-Nachricht
    pub fn dispatch(&self, id: ConnectionId, nachricht: ClientMessage) {
        tracing::trace!(connection = %id, nachricht = nachricht.name(), "Nachricht empfangen");

        match nachricht {
            ClientMessage::Ready => {
                self.state.dienst.bereit(id);
            }
            ClientMessage::Skip => {
                self.state.dienst.ueberspringen(id);
            }
            ClientMessage::Signal { to, signal } => {
                self.state.relay.signal(id, to, signal);
            }
            ClientMessage::Pong { timestamp_ms } => {
                tracing::trace!(connection = %id, timestamp_ms, "Pong empfangen");
            }
        }
    }

    /// Raeumt eine beendete Verbindung auf
    ///
    /// Wird auf jedem Ausgangspfad des Verbindungs-Tasks aufgerufen.
    pub fn client_cleanup(&self, id: &ConnectionId) {
        self.state.dienst.verbindung_getrennt(*id);
        self.state.broadcaster.client_entfernen(id);
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use rendezvous_protocol::{SignalPayload, SignalZiel};

    fn naechstes_kernereignis(rx: &mut ClientEmpfang) -> Option<ServerEvent> {
        rx.ereignisse.try_recv().ok()
    }

    fn kernereignisse(rx: &mut ClientEmpfang) -> Vec<ServerEvent> {
        std::iter::from_fn(|| naechstes_kernereignis(rx)).collect()
    }

    fn dispatcher_mit(config: SignalingConfig) -> MessageDispatcher {
        MessageDispatcher::neu(SignalingState::neu(config))
    }

    fn dispatcher() -> MessageDispatcher {
        dispatcher_mit(SignalingConfig::default())
    }

    #[tokio::test]
    async fn connected_ist_erstes_ereignis() {
        let d = dispatcher();
        let id = ConnectionId::new();
        let mut rx = d.client_anmelden(id);

        assert_eq!(rx.naechstes().await, Some(ServerEvent::Connected { id }));
        assert!(d.state().dienst.ist_aktiv(&id));
    }

    #[tokio::test]
    async fn ready_und_signal_ueber_dispatcher() {
        let d = dispatcher();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut rx_a = d.client_anmelden(a);
        let mut rx_b = d.client_anmelden(b);

        d.dispatch(a, ClientMessage::Ready);
        d.dispatch(b, ClientMessage::Ready);

        assert_eq!(naechstes_kernereignis(&mut rx_a), Some(ServerEvent::Connected { id: a }));
        assert_eq!(naechstes_kernereignis(&mut rx_a), Some(ServerEvent::Waiting));
        assert_eq!(
            naechstes_kernereignis(&mut rx_a),
            Some(ServerEvent::Matched { partner_id: b })
        );
        assert_eq!(naechstes_kernereignis(&mut rx_b), Some(ServerEvent::Connected { id: b }));
        assert_eq!(
            naechstes_kernereignis(&mut rx_b),
            Some(ServerEvent::Matched { partner_id: a })
        );

        let nutzlast = SignalPayload(serde_json::json!({"candidate": "a=1"}));
        d.dispatch(
            a,
            ClientMessage::Signal {
                to: b.into(),
                signal: nutzlast.clone(),
            },
        );
        assert_eq!(
            naechstes_kernereignis(&mut rx_b),
            Some(ServerEvent::Signal {
                from: a,
                signal: nutzlast
            })
        );
        assert_eq!(
            naechstes_kernereignis(&mut rx_a),
            Some(ServerEvent::SignalDelivered { to: b })
        );
    }

    #[tokio::test]
    async fn signal_an_ungueltige_id_meldet_peer_unavailable() {
        let d = dispatcher();
        let a = ConnectionId::new();
        let mut rx_a = d.client_anmelden(a);
        d.dispatch(a, ClientMessage::Ready);
        kernereignisse(&mut rx_a);

        let nachricht = ClientMessage::from_json(r#"{"event":"signal","to":"???","signal":{}}"#)
            .expect("ungueltige Ziel-ID muss lesbar bleiben");
        d.dispatch(a, nachricht);

        assert_eq!(
            kernereignisse(&mut rx_a),
            vec![ServerEvent::PeerUnavailable {
                peer_id: SignalZiel::Unbekannt("???".into())
            }]
        );
        assert_eq!(d.state().dienst.wartende(), vec![a]);
    }

    #[tokio::test]
    async fn presence_verdraengt_kein_matched() {
        let d = dispatcher_mit(SignalingConfig {
            sende_queue_groesse: 8,
            ..Default::default()
        });
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut rx_a = d.client_anmelden(a);
        d.dispatch(a, ClientMessage::Ready);

        // Viele Anmeldungen, waehrend a nichts liest
        let _weitere: Vec<_> = (0..10)
            .map(|_| d.client_anmelden(ConnectionId::new()))
            .collect();

        let _rx_b = d.client_anmelden(b);
        d.dispatch(b, ClientMessage::Ready);

        assert_eq!(d.state().dienst.partner_von(&a), Some(b));
        assert_eq!(
            kernereignisse(&mut rx_a),
            vec![
                ServerEvent::Connected { id: a },
                ServerEvent::Waiting,
                ServerEvent::Matched { partner_id: b },
            ]
        );
        assert_eq!(
            *rx_a.presence.borrow(),
            Some(ServerEvent::UserCount {
                total: 12,
                waiting: 0,
                matched: 2
            })
        );
    }

    #[tokio::test]
    async fn volle_queue_trennt_und_loest_paarung() {
        let d = dispatcher_mit(SignalingConfig {
            sende_queue_groesse: 2,
            ..Default::default()
        });
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut rx_a = d.client_anmelden(a);
        let mut rx_b = d.client_anmelden(b);

        // a liest nicht: connected + waiting fuellen die Queue
        d.dispatch(a, ClientMessage::Ready);
        d.dispatch(b, ClientMessage::Ready);
        assert!(!d.state().broadcaster.ist_registriert(&a), "a muss getrennt werden");
        assert_eq!(
            kernereignisse(&mut rx_b),
            vec![
                ServerEvent::Connected { id: b },
                ServerEvent::Matched { partner_id: a },
            ]
        );

        // Der Transport-Task von a sieht das Queue-Ende und raeumt auf
        assert_eq!(rx_a.naechstes().await, Some(ServerEvent::Connected { id: a }));
        assert_eq!(rx_a.naechstes().await, Some(ServerEvent::Waiting));
        assert_eq!(rx_a.naechstes().await, None);
        d.client_cleanup(&a);

        assert_eq!(d.state().dienst.partner_von(&b), None);
        assert_eq!(
            kernereignisse(&mut rx_b),
            vec![ServerEvent::PartnerDisconnected, ServerEvent::Waiting]
        );
    }

    #[tokio::test]
    async fn cleanup_benachrichtigt_partner_und_schliesst_queue() {
        let d = dispatcher();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut rx_a = d.client_anmelden(a);
        let mut rx_b = d.client_anmelden(b);
        d.dispatch(a, ClientMessage::Ready);
        d.dispatch(b, ClientMessage::Ready);
        while naechstes_kernereignis(&mut rx_a).is_some() {}

        d.client_cleanup(&b);

        assert_eq!(
            naechstes_kernereignis(&mut rx_a),
            Some(ServerEvent::PartnerDisconnected)
        );
        assert_eq!(naechstes_kernereignis(&mut rx_a), Some(ServerEvent::Waiting));
        assert!(!d.state().broadcaster.ist_registriert(&b));

        kernereignisse(&mut rx_b);
        assert!(rx_b.ereignisse.recv().await.is_none());
    }
}
