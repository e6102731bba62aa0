use tokio::sync::mpsc;

use crate::error::PlaybackError;
use crate::sources::Song;
use crate::voice::ChannelRef;

/// Comandos entrantes del front-end.
#[derive(Debug)]
pub enum Command {
    Play {
        input: String,
        dest: Option<ChannelRef>,
    },
    Skip,
    Disconnect,
    List,
    Join {
        dest: Option<ChannelRef>,
        force: bool,
    },
}

/// Qué hacer con el resultado de una resolución en vuelo.
///
/// Los encolados llevan un ticket de envío: las resoluciones pueden terminar
/// en cualquier orden, pero la cola se arma en orden de envío.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveIntent {
    StartPlayback,
    Enqueue { seq: u64 },
}

/// Señales del reproductor externo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSignal {
    Idle,
    Errored(String),
}

/// Señales del transporte de voz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    Connected,
    Renegotiating,
    Disconnected,
}

/// Todo lo que procesa el actor, en orden de llegada.
#[derive(Debug)]
pub enum OrchestratorEvent {
    Command(Command),
    Resolved {
        intent: ResolveIntent,
        epoch: u64,
        outcome: Result<Song, PlaybackError>,
    },
    Player(PlayerSignal),
    Connection(ConnectionSignal),
    ReconnectDeadline {
        window: u64,
    },
}

/// Canal acotado de eventos del orquestador.
pub fn channel(
    capacity: usize,
) -> (
    mpsc::Sender<OrchestratorEvent>,
    mpsc::Receiver<OrchestratorEvent>,
) {
    mpsc::channel(capacity)
}
