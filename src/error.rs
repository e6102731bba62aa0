use thiserror::Error;

/// Taxonomía de errores del orquestador.
///
/// Todos son locales al comando que los produjo; ninguno tumba el bucle del
/// actor. El `Display` es el texto que se releva al front-end de chat.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// La entrada del usuario no es una URL bien formada.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// La búsqueda de título o la descarga externa falló.
    #[error("could not resolve {url}: {source}")]
    ResolutionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// La herramienta externa terminó bien pero no dejó ningún artefacto.
    #[error("the downloader finished without producing any media")]
    NoMediaProduced,

    /// El invocante no tiene destino elegible para la conexión de voz.
    #[error("join a voice channel first")]
    NoChannelSpecified,

    /// La cola llegó a su capacidad máxima.
    #[error("the queue is full ({0} songs)")]
    QueueFull(usize),

    /// Error reportado por el reproductor externo.
    #[error("player error: {0}")]
    PlayerRuntime(String),

    /// Error del transporte de voz al conectar.
    #[error("voice transport error: {0}")]
    Transport(String),
}
