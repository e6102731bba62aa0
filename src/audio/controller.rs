//! The playback controller: one actor, one song at a time.
//!
//! Resolution is a long suspend point, so it runs in spawned tasks that post
//! their outcome back as [`OrchestratorEvent::Resolved`]; the gate stays held
//! from the moment a start-resolution is dispatched until its outcome has been
//! processed, which is what closes the race between two `play` requests that
//! would otherwise both observe an idle player.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use super::events::{Command, ConnectionSignal, OrchestratorEvent, PlayerSignal, ResolveIntent};
use super::gate::PlaybackGate;
use super::queue::SongQueue;
use super::{Notifier, PlayerLink};
use crate::error::PlaybackError;
use crate::sources::{Song, TrackResolver};
use crate::voice::{ChannelRef, ConnectionLifecycle};

/// Fases observables del controlador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Playing,
}

/// La pista activa; nunca es miembro de la cola.
#[derive(Debug)]
struct ActiveTrack {
    title: String,
    #[allow(dead_code)]
    url: Url,
}

pub struct Orchestrator {
    resolver: Arc<dyn TrackResolver>,
    player: Arc<dyn PlayerLink>,
    notifier: Arc<dyn Notifier>,
    lifecycle: ConnectionLifecycle,
    queue: SongQueue,
    gate: PlaybackGate,
    current: Option<ActiveTrack>,
    /// Sube en cada desconexión; resultados en vuelo de épocas viejas se
    /// descartan al llegar.
    epoch: u64,
    /// Tickets de encolado: la cola se arma en orden de envío aunque las
    /// resoluciones terminen desordenadas.
    enqueue_seq: u64,
    enqueue_waitlist: VecDeque<u64>,
    enqueue_early: HashMap<u64, Song>,
    events: mpsc::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        player: Arc<dyn PlayerLink>,
        notifier: Arc<dyn Notifier>,
        lifecycle: ConnectionLifecycle,
        queue: SongQueue,
        events: mpsc::Sender<OrchestratorEvent>,
    ) -> Self {
        Self {
            resolver,
            player,
            notifier,
            lifecycle,
            queue,
            gate: PlaybackGate::new(),
            current: None,
            epoch: 0,
            enqueue_seq: 0,
            enqueue_waitlist: VecDeque::new(),
            enqueue_early: HashMap::new(),
            events,
        }
    }

    /// Fase derivada del estado dueño: pista activa = reproduciendo,
    /// compuerta tomada = arrancando.
    pub fn phase(&self) -> Phase {
        if self.current.is_some() {
            Phase::Playing
        } else if self.gate.is_held() {
            Phase::Starting
        } else {
            Phase::Idle
        }
    }

    /// Bucle del actor: procesa eventos uno a la vez, en orden de llegada.
    pub async fn run(mut self, mut events: mpsc::Receiver<OrchestratorEvent>) {
        info!("🎛️ Orquestador de reproducción iniciado");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("🎛️ Orquestador detenido");
    }

    async fn handle(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::Command(cmd) => self.on_command(cmd).await,
            OrchestratorEvent::Resolved {
                intent,
                epoch,
                outcome,
            } => self.on_resolved(intent, epoch, outcome).await,
            OrchestratorEvent::Player(PlayerSignal::Idle) => self.on_player_idle().await,
            OrchestratorEvent::Player(PlayerSignal::Errored(detail)) => {
                self.on_player_error(detail).await
            }
            OrchestratorEvent::Connection(signal) => self.on_connection_signal(signal),
            OrchestratorEvent::ReconnectDeadline { window } => {
                self.lifecycle.on_deadline(window).await
            }
        }
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Play { input, dest } => self.on_play(input, dest).await,
            Command::Skip => self.on_skip().await,
            Command::Disconnect => self.on_disconnect().await,
            Command::List => self.on_list().await,
            Command::Join { dest, force } => self.on_join(dest, force).await,
        }
    }

    /// Regla central: ocupado → encolar; libre → tomar la compuerta y arrancar.
    async fn on_play(&mut self, input: String, dest: Option<ChannelRef>) {
        if let Err(e) = self.lifecycle.ensure_connected(dest.as_ref()).await {
            self.notifier.notify(&e.to_string()).await;
            return;
        }

        // La compuerta queda tomada durante toda la resolución: otro Play que
        // llegue mientras tanto cae en la rama de encolado.
        let intent = if self.current.is_some() || !self.gate.try_acquire() {
            let seq = self.enqueue_seq;
            self.enqueue_seq += 1;
            self.enqueue_waitlist.push_back(seq);
            ResolveIntent::Enqueue { seq }
        } else {
            ResolveIntent::StartPlayback
        };
        self.spawn_resolution(input, intent);
    }

    fn spawn_resolution(&self, input: String, intent: ResolveIntent) {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let outcome = resolver.resolve(&input).await;
            if events
                .send(OrchestratorEvent::Resolved {
                    intent,
                    epoch,
                    outcome,
                })
                .await
                .is_err()
            {
                warn!("Resolución terminada pero el orquestador ya no existe");
            }
        });
    }

    async fn on_resolved(
        &mut self,
        intent: ResolveIntent,
        epoch: u64,
        outcome: Result<Song, PlaybackError>,
    ) {
        if epoch != self.epoch {
            debug!("Resultado de resolución de una época vieja; descartado");
            return;
        }

        match (intent, outcome) {
            (ResolveIntent::Enqueue { seq }, Ok(song)) => {
                self.enqueue_early.insert(seq, song);
                self.drain_ready_enqueues().await;
            }
            (ResolveIntent::Enqueue { seq }, Err(e)) => {
                warn!("No se pudo resolver la canción a encolar: {e}");
                self.enqueue_waitlist.retain(|pending| *pending != seq);
                self.notifier.notify(&e.to_string()).await;
                self.drain_ready_enqueues().await;
            }
            (ResolveIntent::StartPlayback, Ok(song)) => self.start_song(song).await,
            (ResolveIntent::StartPlayback, Err(e)) => {
                // El arranque falló antes de tocar el reproductor.
                self.gate.release();
                warn!("Resolución de arranque fallida: {e}");
                self.notifier.notify(&e.to_string()).await;
            }
        }
    }

    /// Vuelca a la cola los encolados ya resueltos, en orden de envío.
    ///
    /// Un ticket todavía sin resolver frena a los que llegaron después.
    /// Si mientras tanto el reproductor quedó en reposo, la canción del
    /// frente arranca directo en lugar de quedar varada en la cola.
    async fn drain_ready_enqueues(&mut self) {
        while let Some(front) = self.enqueue_waitlist.front().copied() {
            let Some(song) = self.enqueue_early.remove(&front) else {
                break;
            };
            self.enqueue_waitlist.pop_front();

            if self.current.is_none() && self.gate.try_acquire() {
                self.start_song(song).await;
                continue;
            }

            let title = song.title.clone();
            match self.queue.enqueue(song) {
                Ok(()) => self.notifier.notify(&format!("queued **{title}**")).await,
                Err(e) => self.notifier.notify(&e.to_string()).await,
            }
        }
    }

    /// Entrega la canción al reproductor. La compuerta se suelta en toda
    /// salida, éxito o fallo.
    async fn start_song(&mut self, song: Song) {
        let Song {
            title,
            source_url,
            media,
            ..
        } = song;

        match self.player.play(media).await {
            Ok(()) => {
                info!("▶️ Reproduciendo: {title} ({source_url})");
                self.current = Some(ActiveTrack {
                    title: title.clone(),
                    url: source_url,
                });
                self.notifier.notify(&format!("playing **{title}**")).await;
            }
            Err(e) => {
                error!("❌ El reproductor rechazó la pista: {e}");
                self.current = None;
                self.notifier.notify(&e.to_string()).await;
            }
        }
        self.gate.release();
    }

    /// Transición idle del reproductor: avanzar la cola.
    async fn on_player_idle(&mut self) {
        let Some(finished) = self.current.take() else {
            // Eco de un stop tras la desconexión, o idle sin pista.
            debug!("Señal idle sin pista activa; ignorada");
            return;
        };
        debug!("⏹️ Pista terminada: {}", finished.title);

        match self.queue.dequeue_next() {
            Some(song) => {
                // La canción ya viene resuelta: se reutiliza el camino de
                // arranque con la compuerta tomada, sin volver a resolver.
                let _ = self.gate.try_acquire();
                self.start_song(song).await;
            }
            None => info!("📭 Cola vacía; reproductor en reposo"),
        }
    }

    async fn on_player_error(&mut self, detail: String) {
        // Solo se reporta: el avance de cola lo dispara la transición idle,
        // que llega como señal separada.
        error!("❌ Error del reproductor: {detail}");
        self.notifier
            .notify("the player reported an error during playback")
            .await;
    }

    async fn on_skip(&mut self) {
        match self.phase() {
            Phase::Playing => {
                // stop() dispara la señal idle de forma asíncrona; el avance
                // de cola llega por esa vía.
                self.player.stop().await;
                self.notifier.notify("skipped").await;
            }
            Phase::Starting => {
                self.notifier
                    .notify("still getting the next song ready, try again in a moment")
                    .await;
            }
            Phase::Idle => {
                // Nada que saltar no es un error.
                self.notifier.notify("nothing to skip").await;
            }
        }
    }

    async fn on_disconnect(&mut self) {
        self.player.stop().await;
        self.queue.clear();
        self.lifecycle.teardown().await;
        self.current = None;
        self.gate.release();
        // Cualquier resolución en vuelo pertenece a la sesión anterior.
        self.epoch += 1;
        self.enqueue_waitlist.clear();
        self.enqueue_early.clear();
        self.notifier.notify("have a good time, fren").await;
    }

    async fn on_list(&mut self) {
        if self.queue.is_empty() {
            self.notifier.notify("queue is empty").await;
            return;
        }

        let lines: Vec<String> = self
            .queue
            .peek_all()
            .enumerate()
            .map(|(index, song)| format!("{}. **{}**", index + 1, song.title))
            .collect();
        self.notifier
            .notify(&format!("queue:\n{}", lines.join("\n")))
            .await;
    }

    async fn on_join(&mut self, dest: Option<ChannelRef>, force: bool) {
        let result = match (dest, force) {
            (Some(dest), true) => self.lifecycle.force_join(&dest).await,
            (None, true) => Err(PlaybackError::NoChannelSpecified),
            (dest, false) => self.lifecycle.ensure_connected(dest.as_ref()).await,
        };

        match result {
            Ok(()) => self.notifier.notify("joined").await,
            Err(e) => self.notifier.notify(&e.to_string()).await,
        }
    }

    fn on_connection_signal(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Disconnected => self.lifecycle.on_disconnected(),
            ConnectionSignal::Renegotiating | ConnectionSignal::Connected => {
                self.lifecycle.on_renegotiating()
            }
        }
    }

    #[cfg(test)]
    fn queue_titles(&self) -> Vec<String> {
        self.queue.peek_all().map(|s| s.title.clone()).collect()
    }
}
