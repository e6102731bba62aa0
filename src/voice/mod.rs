pub mod discord;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::events::OrchestratorEvent;
use crate::error::PlaybackError;

/// Destino de conexión: un canal de voz dentro de un guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRef {
    pub guild: GuildId,
    pub channel: ChannelId,
}

/// Capacidad externa de transporte de voz.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, dest: &ChannelRef) -> Result<Box<dyn VoiceConn>, PlaybackError>;
}

/// Conexión de voz viva; destruirla más de una vez es inofensivo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceConn: Send + Sync {
    async fn destroy(&self);
}

/// Dueño del ciclo de vida de la conexión de voz: a lo sumo una viva.
///
/// Distingue la re-señalización transitoria de una caída real: la señal de
/// desconexión abre una ventana de gracia numerada; si antes del plazo llega
/// señalización o reconexión, la conexión se conserva. El temporizador no
/// toca estado: postea un evento de vencimiento que el actor procesa en turno.
pub struct ConnectionLifecycle {
    transport: Arc<dyn VoiceTransport>,
    conn: Option<Box<dyn VoiceConn>>,
    grace: Duration,
    events: mpsc::Sender<OrchestratorEvent>,
    pending_drop: Option<u64>,
    next_window: u64,
}

impl ConnectionLifecycle {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        grace: Duration,
        events: mpsc::Sender<OrchestratorEvent>,
    ) -> Self {
        Self {
            transport,
            conn: None,
            grace,
            events,
            pending_drop: None,
            next_window: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// No-op si ya hay conexión viva; si no, establece una.
    pub async fn ensure_connected(
        &mut self,
        dest: Option<&ChannelRef>,
    ) -> Result<(), PlaybackError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let dest = dest.ok_or(PlaybackError::NoChannelSpecified)?;
        let conn = self.transport.connect(dest).await?;
        self.conn = Some(conn);
        self.pending_drop = None;
        info!("🔊 Conectado al canal de voz {}", dest.channel);
        Ok(())
    }

    /// Derriba cualquier conexión previa y establece una nueva.
    pub async fn force_join(&mut self, dest: &ChannelRef) -> Result<(), PlaybackError> {
        self.teardown().await;
        self.ensure_connected(Some(dest)).await
    }

    /// Idempotente: derribar sin conexión es un no-op.
    pub async fn teardown(&mut self) {
        self.pending_drop = None;
        if let Some(conn) = self.conn.take() {
            conn.destroy().await;
            info!("👋 Conexión de voz destruida");
        }
    }

    /// Señal de desconexión del transporte: abre la ventana de gracia.
    pub fn on_disconnected(&mut self) {
        if self.conn.is_none() {
            return;
        }

        let window = self.next_window;
        self.next_window += 1;
        self.pending_drop = Some(window);
        warn!(
            "🔌 Transporte de voz desconectado; esperando re-señalización ({}s)",
            self.grace.as_secs()
        );

        let events = self.events.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = events
                .send(OrchestratorEvent::ReconnectDeadline { window })
                .await;
        });
    }

    /// Señalización o reconexión durante la ventana: renegociación benigna.
    pub fn on_renegotiating(&mut self) {
        if self.pending_drop.take().is_some() {
            info!("📡 Re-señalización detectada; se conserva la conexión");
        }
    }

    /// Venció la ventana de gracia: si sigue abierta, la caída fue real.
    pub async fn on_deadline(&mut self, window: u64) {
        if self.pending_drop != Some(window) {
            debug!("Ventana de gracia {} ya cerrada; vencimiento ignorado", window);
            return;
        }

        self.pending_drop = None;
        warn!("⏰ Sin re-señalización dentro del plazo; la desconexión fue real");
        if let Some(conn) = self.conn.take() {
            conn.destroy().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeConn {
        destroyed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl VoiceConn for FakeConn {
        async fn destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        issued: StdMutex<Vec<Arc<AtomicBool>>>,
    }

    #[async_trait]
    impl VoiceTransport for FakeTransport {
        async fn connect(&self, _dest: &ChannelRef) -> Result<Box<dyn VoiceConn>, PlaybackError> {
            let destroyed = Arc::new(AtomicBool::new(false));
            self.issued.lock().unwrap().push(destroyed.clone());
            Ok(Box::new(FakeConn { destroyed }))
        }
    }

    impl FakeTransport {
        fn connects(&self) -> usize {
            self.issued.lock().unwrap().len()
        }

        fn destroyed(&self, index: usize) -> bool {
            self.issued.lock().unwrap()[index].load(Ordering::SeqCst)
        }
    }

    fn dest() -> ChannelRef {
        ChannelRef {
            guild: GuildId::new(1),
            channel: ChannelId::new(2),
        }
    }

    fn lifecycle() -> (
        ConnectionLifecycle,
        Arc<FakeTransport>,
        mpsc::Receiver<OrchestratorEvent>,
    ) {
        let (tx, rx) = crate::audio::events::channel(8);
        let transport = Arc::new(FakeTransport::default());
        let lifecycle =
            ConnectionLifecycle::new(transport.clone(), Duration::from_millis(20), tx);
        (lifecycle, transport, rx)
    }

    async fn recv_deadline(rx: &mut mpsc::Receiver<OrchestratorEvent>) -> u64 {
        match rx.recv().await.expect("expected a deadline event") {
            OrchestratorEvent::ReconnectDeadline { window } => window,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_connected_is_a_noop_when_live() {
        let (mut lifecycle, transport, _rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();
        assert_eq!(transport.connects(), 1);
        assert!(lifecycle.is_connected());
    }

    #[tokio::test]
    async fn ensure_connected_without_destination_fails() {
        let (mut lifecycle, _transport, _rx) = lifecycle();
        let err = lifecycle.ensure_connected(None).await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoChannelSpecified));
    }

    #[tokio::test]
    async fn force_join_replaces_the_previous_connection() {
        let (mut lifecycle, transport, _rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();
        lifecycle.force_join(&dest()).await.unwrap();

        assert_eq!(transport.connects(), 2);
        assert!(transport.destroyed(0));
        assert!(!transport.destroyed(1));
        assert!(lifecycle.is_connected());
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let (mut lifecycle, transport, _rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();
        lifecycle.teardown().await;
        lifecycle.teardown().await;
        assert!(!lifecycle.is_connected());
        assert!(transport.destroyed(0));
    }

    #[tokio::test]
    async fn resignalling_within_grace_keeps_the_connection() {
        let (mut lifecycle, transport, mut rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();

        lifecycle.on_disconnected();
        lifecycle.on_renegotiating();

        let window = recv_deadline(&mut rx).await;
        lifecycle.on_deadline(window).await;

        assert!(lifecycle.is_connected());
        assert!(!transport.destroyed(0));
    }

    #[tokio::test]
    async fn silence_until_the_deadline_destroys_the_connection() {
        let (mut lifecycle, transport, mut rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();

        lifecycle.on_disconnected();
        let window = recv_deadline(&mut rx).await;
        lifecycle.on_deadline(window).await;

        assert!(!lifecycle.is_connected());
        assert!(transport.destroyed(0));
    }

    #[tokio::test]
    async fn a_second_drop_signal_invalidates_the_old_window() {
        let (mut lifecycle, transport, mut rx) = lifecycle();
        lifecycle.ensure_connected(Some(&dest())).await.unwrap();

        lifecycle.on_disconnected();
        lifecycle.on_renegotiating();
        lifecycle.on_disconnected();

        let a = recv_deadline(&mut rx).await;
        let b = recv_deadline(&mut rx).await;
        let (stale, live) = if a < b { (a, b) } else { (b, a) };

        // El vencimiento de la ventana vieja no debe destruir nada.
        lifecycle.on_deadline(stale).await;
        assert!(lifecycle.is_connected());

        // El de la vigente sí.
        lifecycle.on_deadline(live).await;
        assert!(!lifecycle.is_connected());
        assert!(transport.destroyed(0));
    }

    #[tokio::test]
    async fn drop_signal_without_a_connection_is_ignored() {
        let (mut lifecycle, _transport, mut rx) = lifecycle();
        lifecycle.on_disconnected();

        // Sin conexión no se programa ningún vencimiento.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
