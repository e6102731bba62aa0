use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::events::CoreEvent;
use songbird::input::Input;
use songbird::tracks::TrackHandle;
use songbird::{
    Call, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler, Songbird,
    TrackEvent,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use super::{ChannelRef, VoiceConn, VoiceTransport};
use crate::audio::events::{ConnectionSignal, OrchestratorEvent, PlayerSignal};
use crate::audio::PlayerLink;
use crate::error::PlaybackError;
use crate::sources::MediaHandle;

/// Enlace songbird: una sola sesión de voz y su pista activa.
///
/// Implementa las dos capacidades externas del actor (transporte y
/// reproductor) sobre el mismo manager; los eventos de songbird vuelven al
/// actor como eventos posteados, nunca como mutaciones directas.
pub struct DiscordVoice {
    manager: Arc<Songbird>,
    events: mpsc::Sender<OrchestratorEvent>,
    active: Arc<Mutex<Option<ActiveCall>>>,
}

struct ActiveCall {
    call: Arc<Mutex<Call>>,
    track: Option<TrackHandle>,
}

impl DiscordVoice {
    pub fn new(manager: Arc<Songbird>, events: mpsc::Sender<OrchestratorEvent>) -> Self {
        Self {
            manager,
            events,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Registra los relés de eventos de pista y de driver en el call.
    async fn register_relays(&self, call: &Arc<Mutex<Call>>) {
        let mut handler = call.lock().await;
        handler.add_global_event(
            VoiceEvent::Track(TrackEvent::End),
            TrackEndRelay {
                events: self.events.clone(),
            },
        );
        handler.add_global_event(
            VoiceEvent::Track(TrackEvent::Error),
            TrackErrorRelay {
                events: self.events.clone(),
            },
        );
        handler.add_global_event(
            VoiceEvent::Core(CoreEvent::DriverDisconnect),
            DriverRelay {
                signal: ConnectionSignal::Disconnected,
                events: self.events.clone(),
            },
        );
        handler.add_global_event(
            VoiceEvent::Core(CoreEvent::DriverReconnect),
            DriverRelay {
                signal: ConnectionSignal::Renegotiating,
                events: self.events.clone(),
            },
        );
        handler.add_global_event(
            VoiceEvent::Core(CoreEvent::DriverConnect),
            DriverRelay {
                signal: ConnectionSignal::Connected,
                events: self.events.clone(),
            },
        );
    }
}

#[async_trait]
impl VoiceTransport for DiscordVoice {
    async fn connect(&self, dest: &ChannelRef) -> Result<Box<dyn VoiceConn>, PlaybackError> {
        let call = self
            .manager
            .join(dest.guild, dest.channel)
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;

        self.register_relays(&call).await;
        *self.active.lock().await = Some(ActiveCall { call, track: None });
        info!("🔊 Sesión songbird abierta en guild {}", dest.guild);

        Ok(Box::new(DiscordConn {
            manager: self.manager.clone(),
            guild: dest.guild,
            active: self.active.clone(),
        }))
    }
}

#[async_trait]
impl PlayerLink for DiscordVoice {
    async fn play(&self, media: MediaHandle) -> Result<(), PlaybackError> {
        let mut active = self.active.lock().await;
        let session = active
            .as_mut()
            .ok_or_else(|| PlaybackError::PlayerRuntime("no hay sesión de voz activa".into()))?;

        let input = Input::from(media.into_bytes());
        let handle = session.call.lock().await.play_input(input);
        session.track = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(session) = self.active.lock().await.as_mut() {
            if let Some(track) = session.track.take() {
                let _ = track.stop();
            }
        }
    }
}

/// Handle de la conexión viva; destruirla dos veces es inofensivo.
struct DiscordConn {
    manager: Arc<Songbird>,
    guild: GuildId,
    active: Arc<Mutex<Option<ActiveCall>>>,
}

#[async_trait]
impl VoiceConn for DiscordConn {
    async fn destroy(&self) {
        self.active.lock().await.take();
        if let Err(e) = self.manager.remove(self.guild).await {
            debug!("La sesión de voz ya no existía: {:?}", e);
        }
    }
}

// Relés: traducen eventos de songbird a eventos del actor.

struct TrackEndRelay {
    events: mpsc::Sender<OrchestratorEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if self
            .events
            .send(OrchestratorEvent::Player(PlayerSignal::Idle))
            .await
            .is_err()
        {
            error!("El orquestador ya no recibe eventos de pista");
        }
        None
    }
}

struct TrackErrorRelay {
    events: mpsc::Sender<OrchestratorEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorRelay {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                let _ = self
                    .events
                    .send(OrchestratorEvent::Player(PlayerSignal::Errored(format!(
                        "{:?}",
                        state.playing
                    ))))
                    .await;
            }
        }
        None
    }
}

struct DriverRelay {
    signal: ConnectionSignal,
    events: mpsc::Sender<OrchestratorEvent>,
}

#[async_trait]
impl VoiceEventHandler for DriverRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        debug!("Señal del driver de voz: {:?}", self.signal);
        let _ = self
            .events
            .send(OrchestratorEvent::Connection(self.signal))
            .await;
        None
    }
}
