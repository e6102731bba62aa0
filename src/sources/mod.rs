pub mod resolver;
pub mod ytdlp;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

pub use resolver::Resolver;
pub use ytdlp::YtDlpClient;

use crate::error::PlaybackError;

/// Referencia opaca a un audio listo para reproducir.
///
/// El archivo de staging ya no existe cuando este handle circula: los bytes
/// viven acá hasta que el reproductor los consume.
#[derive(Clone)]
pub struct MediaHandle {
    bytes: Bytes,
}

impl MediaHandle {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaHandle({} bytes)", self.bytes.len())
    }
}

/// Una canción ya resuelta: título y audio descargado.
///
/// Se resuelve una sola vez, al encolar; de ahí en adelante es inmutable.
#[derive(Debug, Clone)]
pub struct Song {
    pub title: String,
    pub source_url: Url,
    pub media: MediaHandle,
    #[allow(dead_code)]
    pub added_at: DateTime<Utc>,
}

impl Song {
    pub fn new(title: String, source_url: Url, media: MediaHandle) -> Self {
        Self {
            title,
            source_url,
            media,
            added_at: Utc::now(),
        }
    }
}

/// Capacidad externa de resolución: título y descarga de audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Obtiene el título del recurso.
    async fn fetch_title(&self, url: &Url) -> anyhow::Result<String>;

    /// Descarga el audio del recurso dentro del directorio de staging.
    async fn download_media(&self, url: &Url, staging: &Path) -> anyhow::Result<()>;
}

/// Convierte la entrada del usuario en una canción lista para reproducir.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, raw: &str) -> Result<Song, PlaybackError>;
}
