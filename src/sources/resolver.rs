use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::{MediaHandle, Song, SourceClient, TrackResolver};
use crate::error::PlaybackError;

/// Adaptador de resolución: valida la URL y une título + descarga.
///
/// Sin estado mutable compartido: puede correr varias resoluciones a la vez,
/// cada una con su propio directorio de staging.
pub struct Resolver {
    client: Arc<dyn SourceClient>,
    staging_root: PathBuf,
}

impl Resolver {
    pub fn new(client: Arc<dyn SourceClient>, staging_root: PathBuf) -> Self {
        Self {
            client,
            staging_root,
        }
    }
}

#[async_trait]
impl TrackResolver for Resolver {
    async fn resolve(&self, raw: &str) -> Result<Song, PlaybackError> {
        // La URL se valida antes de tocar cualquier subproceso.
        let url = Url::parse(raw.trim()).map_err(|_| PlaybackError::InvalidUrl(raw.to_string()))?;

        // El TempDir limpia el staging en cualquier salida, éxito o fallo.
        let staging = tempfile::Builder::new()
            .prefix("tonearm-")
            .tempdir_in(&self.staging_root)
            .map_err(|e| PlaybackError::ResolutionFailed {
                url: url.to_string(),
                source: e.into(),
            })?;

        // Título y audio se piden en paralelo; si uno falla, falla todo.
        let (title, ()) = tokio::try_join!(
            self.client.fetch_title(&url),
            self.client.download_media(&url, staging.path()),
        )
        .map_err(|e| PlaybackError::ResolutionFailed {
            url: url.to_string(),
            source: e.into(),
        })?;

        let artifact = first_artifact(staging.path())
            .await
            .ok_or(PlaybackError::NoMediaProduced)?;
        let bytes = tokio::fs::read(&artifact)
            .await
            .map_err(|e| PlaybackError::ResolutionFailed {
                url: url.to_string(),
                source: e.into(),
            })?;

        let title = title.trim().to_string();
        info!("🎶 Resuelto: {} ({} bytes)", title, bytes.len());
        Ok(Song::new(title, url, MediaHandle::new(bytes)))
    }
}

/// Primer archivo producido en el staging, si la herramienta dejó alguno.
async fn first_artifact(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Some(entry) = entries.next_entry().await.ok()? {
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => return Some(entry.path()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSourceClient;
    use pretty_assertions::assert_eq;

    fn staging_is_empty(root: &Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn rejects_malformed_input_before_any_lookup() {
        let mut client = MockSourceClient::new();
        client.expect_fetch_title().times(0);
        client.expect_download_media().times(0);

        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(Arc::new(client), root.path().to_path_buf());

        let err = resolver.resolve("definitely not a url").await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn joins_title_and_media_and_cleans_staging() {
        let mut client = MockSourceClient::new();
        client
            .expect_fetch_title()
            .returning(|_| Ok("  My Song \n".to_string()));
        client.expect_download_media().returning(|_, staging| {
            std::fs::write(staging.join("media.opus"), b"opusdata").unwrap();
            Ok(())
        });

        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(Arc::new(client), root.path().to_path_buf());

        let song = resolver.resolve("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(song.title, "My Song");
        assert_eq!(song.media.len(), 8);
        assert_eq!(song.source_url.as_str(), "https://youtu.be/dQw4w9WgXcQ");
        assert!(staging_is_empty(root.path()));
    }

    #[tokio::test]
    async fn lookup_failure_fails_the_whole_resolution() {
        let mut client = MockSourceClient::new();
        client
            .expect_fetch_title()
            .returning(|_| Err(anyhow::anyhow!("title lookup exploded")));
        client.expect_download_media().returning(|_, staging| {
            std::fs::write(staging.join("media.opus"), b"opusdata").unwrap();
            Ok(())
        });

        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(Arc::new(client), root.path().to_path_buf());

        let err = resolver.resolve("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, PlaybackError::ResolutionFailed { .. }));
        assert!(staging_is_empty(root.path()));
    }

    #[tokio::test]
    async fn missing_artifact_is_a_distinct_error() {
        let mut client = MockSourceClient::new();
        client
            .expect_fetch_title()
            .returning(|_| Ok("Ghost".to_string()));
        client.expect_download_media().returning(|_, _| Ok(()));

        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(Arc::new(client), root.path().to_path_buf());

        let err = resolver.resolve("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoMediaProduced));
        assert!(staging_is_empty(root.path()));
    }
}
