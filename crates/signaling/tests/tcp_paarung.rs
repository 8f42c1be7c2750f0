//! Ende-zu-Ende-Tests ueber den TCP-Transport
//!
//! Startet einen echten `SignalingServer` auf einem freien Port und spricht
//! ihn mit `ClientCodec`-Frames an.

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::ConnectionId;
use rendezvous_protocol::{ClientCodec, ClientMessage, ServerEvent, SignalPayload};
use rendezvous_signaling::{SignalingConfig, SignalingServer, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;

const WARTEZEIT: Duration = Duration::from_secs(5);

struct TestClient {
    id: ConnectionId,
    framed: Framed<TcpStream, ClientCodec>,
}

impl TestClient {
    async fn verbinden(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Verbindung fehlgeschlagen");
        let mut framed = Framed::new(stream, ClientCodec::new());

        let erstes = tokio::time::timeout(WARTEZEIT, framed.next())
            .await
            .expect("Timeout beim Warten auf connected")
            .expect("Verbindung geschlossen")
            .expect("Frame-Fehler");
        let id = match erstes {
            ServerEvent::Connected { id } => id,
            anderes => panic!("connected erwartet, erhalten: {anderes:?}"),
        };
        Self { id, framed }
    }

    async fn senden(&mut self, nachricht: ClientMessage) {
        self.framed.send(nachricht).await.expect("Senden fehlgeschlagen");
    }

    /// Naechstes Ereignis ohne `userCount` und `ping`
    async fn erwarten(&mut self) -> ServerEvent {
        loop {
            let ereignis = tokio::time::timeout(WARTEZEIT, self.framed.next())
                .await
                .expect("Timeout beim Warten auf Ereignis")
                .expect("Verbindung geschlossen")
                .expect("Frame-Fehler");
            match ereignis {
                ServerEvent::UserCount { .. } | ServerEvent::Ping { .. } => continue,
                anderes => return anderes,
            }
        }
    }
}

async fn server_starten() -> (SocketAddr, watch::Sender<bool>, Arc<SignalingState>) {
    server_starten_mit(SignalingConfig::default()).await
}

async fn server_starten_mit(
    config: SignalingConfig,
) -> (SocketAddr, watch::Sender<bool>, Arc<SignalingState>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let state = SignalingState::neu(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind fehlgeschlagen");
    let addr = listener.local_addr().expect("Lokale Adresse");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = SignalingServer::neu(Arc::clone(&state), addr);
    tokio::spawn(server.mit_listener(listener, shutdown_rx));

    (addr, shutdown_tx, state)
}

/// Verbindet zwei Clients und paart sie
async fn gepaartes_paar(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut a = TestClient::verbinden(addr).await;
    a.senden(ClientMessage::Ready).await;
    assert_eq!(a.erwarten().await, ServerEvent::Waiting);

    let mut b = TestClient::verbinden(addr).await;
    b.senden(ClientMessage::Ready).await;
    assert_eq!(a.erwarten().await, ServerEvent::Matched { partner_id: b.id });
    assert_eq!(b.erwarten().await, ServerEvent::Matched { partner_id: a.id });
    (a, b)
}

#[tokio::test]
async fn zwei_clients_werden_gepaart() {
    let (addr, _shutdown, state) = server_starten().await;
    let (a, b) = gepaartes_paar(addr).await;

    assert_eq!(state.dienst.partner_von(&a.id), Some(b.id));
    assert!(state.dienst.wartende().is_empty());
}

#[tokio::test]
async fn skip_paart_mit_wartendem_dritten() {
    let (addr, _shutdown, _state) = server_starten().await;
    let (mut a, mut b) = gepaartes_paar(addr).await;

    let mut c = TestClient::verbinden(addr).await;
    c.senden(ClientMessage::Ready).await;
    assert_eq!(c.erwarten().await, ServerEvent::Waiting);

    a.senden(ClientMessage::Skip).await;

    assert_eq!(b.erwarten().await, ServerEvent::Skipped);
    assert_eq!(a.erwarten().await, ServerEvent::Waiting);
    assert_eq!(a.erwarten().await, ServerEvent::Matched { partner_id: c.id });
    assert_eq!(c.erwarten().await, ServerEvent::Matched { partner_id: a.id });
}

#[tokio::test]
async fn trennung_meldet_partner_und_reiht_ein() {
    let (addr, _shutdown, state) = server_starten().await;
    let (mut a, b) = gepaartes_paar(addr).await;
    let b_id = b.id;

    drop(b);

    assert_eq!(a.erwarten().await, ServerEvent::PartnerDisconnected);
    assert_eq!(a.erwarten().await, ServerEvent::Waiting);
    assert_eq!(state.dienst.wartende(), vec![a.id]);
    assert!(!state.dienst.ist_aktiv(&b_id));
}

#[tokio::test]
async fn signal_wird_unveraendert_weitergeleitet() {
    let (addr, _shutdown, _state) = server_starten().await;
    let (mut a, mut b) = gepaartes_paar(addr).await;

    let angebot = SignalPayload(serde_json::json!({
        "type": "offer",
        "sdp": "v=0\r\ns=-\r\nt=0 0\r\n",
        "zahlen": [1, 2.25, -3],
    }));
    a.senden(ClientMessage::Signal {
        to: b.id.into(),
        signal: angebot.clone(),
    })
    .await;

    assert_eq!(
        b.erwarten().await,
        ServerEvent::Signal {
            from: a.id,
            signal: angebot
        }
    );
    assert_eq!(a.erwarten().await, ServerEvent::SignalDelivered { to: b.id });
}

#[tokio::test]
async fn signal_an_fremden_wird_abgelehnt() {
    let (addr, _shutdown, state) = server_starten().await;
    let (mut a, b) = gepaartes_paar(addr).await;
    let fremd = ConnectionId::new();

    a.senden(ClientMessage::Signal {
        to: fremd.into(),
        signal: SignalPayload(serde_json::json!({"candidate": null})),
    })
    .await;

    assert_eq!(
        a.erwarten().await,
        ServerEvent::PeerUnavailable {
            peer_id: fremd.into()
        }
    );
    assert_eq!(state.dienst.partner_von(&a.id), Some(b.id));
}

#[tokio::test]
async fn ungueltiges_frame_trennt_verbindung() {
    let (addr, _shutdown, _state) = server_starten().await;
    let (mut a, mut b) = gepaartes_paar(addr).await;

    let muell = b"kein json";
    let mut frame = (muell.len() as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(muell);
    b.framed.get_mut().write_all(&frame).await.expect("Schreiben");
    b.framed.get_mut().flush().await.expect("Flush");

    assert_eq!(a.erwarten().await, ServerEvent::PartnerDisconnected);
    assert_eq!(a.erwarten().await, ServerEvent::Waiting);
}

#[tokio::test]
async fn shutdown_beendet_verbindungen() {
    let (addr, shutdown, state) = server_starten().await;
    let mut a = TestClient::verbinden(addr).await;

    shutdown.send(true).expect("Shutdown senden");

    let ende = tokio::time::timeout(WARTEZEIT, async {
        while let Some(Ok(_)) = a.framed.next().await {}
    })
    .await;
    assert!(ende.is_ok(), "Verbindung muss nach Shutdown enden");

    // Cleanup laeuft nach dem Schliessen des Sockets
    tokio::time::timeout(WARTEZEIT, async {
        while state.dienst.verbindungs_anzahl() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Verbindung muss abgemeldet werden");
}

#[tokio::test]
async fn stiller_client_wird_nach_timeout_getrennt() {
    let (addr, _shutdown, state) = server_starten_mit(SignalingConfig {
        keepalive_sek: 1,
        verbindungs_timeout_sek: 2,
        ..Default::default()
    })
    .await;
    let (mut a, b) = gepaartes_paar(addr).await;
    let b_id = b.id;

    // b sendet nichts mehr, a antwortet auf jeden Ping
    let ende = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let ereignis = a.framed.next().await.expect("offen").expect("Frame");
            match ereignis {
                ServerEvent::Ping { timestamp_ms } => {
                    a.senden(ClientMessage::Pong { timestamp_ms }).await;
                }
                ServerEvent::PartnerDisconnected => return,
                _ => {}
            }
        }
    })
    .await;
    assert!(ende.is_ok(), "Partner muss per Timeout getrennt werden");

    assert!(!state.dienst.ist_aktiv(&b_id));
    assert!(state.dienst.ist_aktiv(&a.id));
    drop(b);
}

#[tokio::test]
async fn voller_server_lehnt_weitere_verbindung_ab() {
    let (addr, _shutdown, state) = server_starten_mit(SignalingConfig {
        max_verbindungen: 1,
        ..Default::default()
    })
    .await;
    let _a = TestClient::verbinden(addr).await;
    assert_eq!(state.freie_plaetze(), 0);

    let stream = TcpStream::connect(addr).await.expect("TCP-Connect");
    let mut framed = Framed::new(stream, ClientCodec::new());
    let antwort = tokio::time::timeout(WARTEZEIT, framed.next())
        .await
        .expect("Server muss den Socket schliessen");
    assert!(!matches!(antwort, Some(Ok(_))), "Kein connected erwartet");
    assert_eq!(state.dienst.verbindungs_anzahl(), 1);
}
