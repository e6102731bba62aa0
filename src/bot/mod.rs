//! # Bot Module
//!
//! Discord front-end for tonearm.
//!
//! This layer only parses prefix commands out of messages, figures out the
//! author's voice channel, and posts [`Command`]s into the orchestrator's
//! event channel. Replies travel the other way through [`ChannelNotifier`],
//! bound to the configured music channel. All playback decisions live in the
//! orchestrator; nothing here touches the queue or the player directly.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, Message, Ready},
    async_trait,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::audio::controller::Orchestrator;
use crate::audio::events::{self, Command, OrchestratorEvent};
use crate::audio::queue::SongQueue;
use crate::audio::Notifier;
use crate::config::Config;
use crate::sources::{Resolver, YtDlpClient};
use crate::voice::discord::DiscordVoice;
use crate::voice::{ChannelRef, ConnectionLifecycle};

/// Front-end de Discord: parsea comandos por prefijo y los postea al actor.
pub struct TonearmBot {
    config: Arc<Config>,
    commands: OnceLock<mpsc::Sender<OrchestratorEvent>>,
}

impl TonearmBot {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            commands: OnceLock::new(),
        }
    }

    /// Arma el orquestador con sus capacidades reales y lo deja corriendo.
    async fn spawn_orchestrator(&self, ctx: &Context) -> Result<mpsc::Sender<OrchestratorEvent>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let (tx, rx) = events::channel(self.config.event_buffer);

        let voice = Arc::new(DiscordVoice::new(manager, tx.clone()));
        let client = Arc::new(YtDlpClient::from_config(&self.config));
        let resolver = Arc::new(Resolver::new(client, self.config.staging_dir.clone()));
        let notifier = Arc::new(ChannelNotifier {
            http: ctx.http.clone(),
            channel: ChannelId::new(self.config.music_channel_id),
        });
        let lifecycle = ConnectionLifecycle::new(
            voice.clone(),
            std::time::Duration::from_secs(self.config.reconnect_grace_secs),
            tx.clone(),
        );

        let orchestrator = Orchestrator::new(
            resolver,
            voice,
            notifier,
            lifecycle,
            SongQueue::new(self.config.max_queue_size),
            tx.clone(),
        );
        tokio::spawn(orchestrator.run(rx));

        Ok(tx)
    }
}

#[async_trait]
impl EventHandler for TonearmBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);

        match self.spawn_orchestrator(&ctx).await {
            Ok(tx) => {
                if self.commands.set(tx).is_err() {
                    debug!("Orquestador ya iniciado; se conserva el primero");
                }
            }
            Err(e) => error!("❌ No se pudo iniciar el orquestador: {e:?}"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(parsed) = parse_command(&msg.content, &self.config.command_prefix) else {
            return;
        };
        let Some(commands) = self.commands.get() else {
            debug!("Comando recibido antes de que el orquestador esté listo");
            return;
        };

        debug!("📝 Comando {:?} de {}", parsed, msg.author.name);
        let dest = author_voice_channel(&ctx, &msg);

        let command = match parsed {
            ParsedCommand::Play { input: Some(input) } => Command::Play { input, dest },
            ParsedCommand::Play { input: None } => {
                let _ = msg.channel_id.say(&ctx.http, "provide a url").await;
                return;
            }
            ParsedCommand::Skip => Command::Skip,
            ParsedCommand::List => Command::List,
            ParsedCommand::Disconnect => Command::Disconnect,
            ParsedCommand::Join { force } => Command::Join { dest, force },
        };

        if commands
            .send(OrchestratorEvent::Command(command))
            .await
            .is_err()
        {
            error!("El orquestador dejó de recibir comandos");
        }
    }
}

/// Canal de voz actual del autor del mensaje, si está en uno.
fn author_voice_channel(ctx: &Context, msg: &Message) -> Option<ChannelRef> {
    let guild_id = msg.guild_id?;
    let guild = ctx.cache.guild(guild_id)?;
    let channel = guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|state| state.channel_id)?;
    Some(ChannelRef {
        guild: guild_id,
        channel,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum ParsedCommand {
    Play { input: Option<String> },
    Skip,
    List,
    Disconnect,
    Join { force: bool },
}

/// Parsea un comando con prefijo; texto ajeno y comandos desconocidos se
/// ignoran en silencio.
fn parse_command(content: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = content.strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();

    let command = match parts.next()? {
        "play" => ParsedCommand::Play {
            input: parts.next().map(str::to_owned),
        },
        "skip" => ParsedCommand::Skip,
        "list" | "queue" => ParsedCommand::List,
        "disconnect" | "stop" => ParsedCommand::Disconnect,
        "join" => ParsedCommand::Join { force: false },
        "move" => ParsedCommand::Join { force: true },
        _ => return None,
    };
    Some(command)
}

/// Avisos del orquestador hacia el canal de música configurado.
struct ChannelNotifier {
    http: Arc<serenity::http::Http>,
    channel: ChannelId,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, message: &str) {
        if let Err(e) = self.channel.say(&self.http, message).await {
            error!("❌ No se pudo enviar el aviso: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_known_commands() {
        assert_eq!(
            parse_command("/play https://youtu.be/x", "/"),
            Some(ParsedCommand::Play {
                input: Some("https://youtu.be/x".to_string())
            })
        );
        assert_eq!(
            parse_command("/play", "/"),
            Some(ParsedCommand::Play { input: None })
        );
        assert_eq!(parse_command("/skip", "/"), Some(ParsedCommand::Skip));
        assert_eq!(parse_command("/list", "/"), Some(ParsedCommand::List));
        assert_eq!(parse_command("/queue", "/"), Some(ParsedCommand::List));
        assert_eq!(
            parse_command("/disconnect", "/"),
            Some(ParsedCommand::Disconnect)
        );
        assert_eq!(
            parse_command("/join", "/"),
            Some(ParsedCommand::Join { force: false })
        );
        assert_eq!(
            parse_command("/move", "/"),
            Some(ParsedCommand::Join { force: true })
        );
    }

    #[test]
    fn ignores_unprefixed_and_unknown_input() {
        assert_eq!(parse_command("hola", "/"), None);
        assert_eq!(parse_command("/fastforward", "/"), None);
        assert_eq!(parse_command("!play x", "/"), None);
    }

    #[test]
    fn respects_a_custom_prefix() {
        assert_eq!(parse_command("!skip", "!"), Some(ParsedCommand::Skip));
        assert_eq!(parse_command("/skip", "!"), None);
    }
}
