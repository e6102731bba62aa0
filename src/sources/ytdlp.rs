use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::SourceClient;
use crate::config::Config;

/// Cliente yt-dlp: títulos y descargas de audio por subproceso.
pub struct YtDlpClient {
    bin: String,
    use_oauth_plugin: bool,
}

impl YtDlpClient {
    pub fn new(bin: impl Into<String>, use_oauth_plugin: bool) -> Self {
        Self {
            bin: bin.into(),
            use_oauth_plugin,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ytdlp_bin.clone(), config.ytdlp_use_oauth_plugin)
    }

    /// Verifica que el binario de yt-dlp pueda ejecutarse.
    #[allow(dead_code)]
    pub async fn verify_availability(&self) -> Result<()> {
        let output = Command::new(&self.bin).arg("--version").output().await?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no puede ejecutarse correctamente");
        }

        info!(
            "✅ yt-dlp versión: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    /// Detecta URLs de YouTube por host.
    pub fn is_youtube_url(url: &Url) -> bool {
        matches!(
            url.host_str(),
            Some("www.youtube.com" | "youtube.com" | "youtu.be" | "m.youtube.com" | "music.youtube.com")
        )
    }

    /// El plugin OAuth solo aplica a YouTube y solo si está habilitado.
    fn wants_oauth(&self, url: &Url) -> bool {
        self.use_oauth_plugin && Self::is_youtube_url(url)
    }
}

#[async_trait]
impl SourceClient for YtDlpClient {
    async fn fetch_title(&self, url: &Url) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        // Si la descarga hermana falla, este futuro se suelta: matar el
        // subproceso en el drop evita huérfanos escribiendo en el staging.
        cmd.kill_on_drop(true);
        if self.wants_oauth(url) {
            cmd.args(["--username", "oauth2", "--password", "unused"]);
        }
        cmd.args(["--get-title", "--no-playlist", "--"]).arg(url.as_str());

        let output = cmd.output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "yt-dlp --get-title falló: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if title.is_empty() {
            anyhow::bail!("yt-dlp no devolvió ningún título");
        }
        Ok(title)
    }

    async fn download_media(&self, url: &Url, staging: &Path) -> Result<()> {
        let template = staging.join("media.%(ext)s");
        debug!("⬇️ Descargando audio en {}", staging.display());

        let mut cmd = Command::new(&self.bin);
        cmd.kill_on_drop(true);
        if self.wants_oauth(url) {
            cmd.args(["--username", "oauth2", "--password", "unused"]);
            cmd.args(["--extractor-args", "youtube:player-client=default,mweb"]);
        }
        cmd.args(["--extract-audio", "--no-playlist", "-o"])
            .arg(&template)
            .arg("--")
            .arg(url.as_str());

        let output = cmd.output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "yt-dlp --extract-audio falló: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        let youtube = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=test",
            "https://m.youtube.com/watch?v=test",
        ];
        for raw in youtube {
            assert!(YtDlpClient::is_youtube_url(&Url::parse(raw).unwrap()));
        }

        assert!(!YtDlpClient::is_youtube_url(
            &Url::parse("https://example.com/video").unwrap()
        ));
        assert!(!YtDlpClient::is_youtube_url(
            &Url::parse("https://notyoutube.com/watch?v=x").unwrap()
        ));
    }

    #[test]
    fn test_oauth_only_for_youtube() {
        let client = YtDlpClient::new("yt-dlp", true);
        assert!(client.wants_oauth(&Url::parse("https://youtu.be/x").unwrap()));
        assert!(!client.wants_oauth(&Url::parse("https://example.com/a.mp3").unwrap()));

        let disabled = YtDlpClient::new("yt-dlp", false);
        assert!(!disabled.wants_oauth(&Url::parse("https://youtu.be/x").unwrap()));
    }
}
