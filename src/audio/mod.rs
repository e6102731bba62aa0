//! # Audio Module
//!
//! Playback orchestration core for tonearm.
//!
//! One actor ([`controller::Orchestrator`]) owns all playback state and
//! consumes commands, resolution outcomes, player signals and transport
//! signals from a single bounded channel, in arrival order:
//!
//! - [`queue`] - FIFO of pending, already-resolved songs
//! - [`gate`] - the exclusive start gate that serializes playback starts
//! - [`events`] - the event vocabulary the actor consumes
//! - [`controller`] - the state machine that ties it all together
//!
//! The player itself is an external capability behind [`PlayerLink`]; chat
//! notifications go out through [`Notifier`]. Both are mockable in tests.

pub mod controller;
pub mod events;
pub mod gate;
pub mod queue;

use async_trait::async_trait;

use crate::error::PlaybackError;
use crate::sources::MediaHandle;

/// Capacidad externa del reproductor de audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerLink: Send + Sync {
    /// Entrega un audio al reproductor.
    async fn play(&self, media: MediaHandle) -> Result<(), PlaybackError>;

    /// Detiene la pista activa; sin pista activa es un no-op.
    async fn stop(&self);
}

/// Canal de avisos legibles hacia el front-end de chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}
