//! hackchat: terminal client for hack.chat-style rooms.
//!
//! Lines starting with the configured prefix (default `@`) go to the room.
//! Commands:
//!
//!   /connect      Open the connection
//!   /disconnect   Close it
//!   /status       Show connection state, nick and queued messages
//!   /reload       Re-read the config file and reconnect
//!   /set <k> <v>  Change a setting, save it and reconnect
//!   /quit         Leave (EOF and Ctrl-C work too)

mod config;
mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use hackchat_sdk::outgoing::{OutgoingRoute, route_outgoing};
use hackchat_sdk::{ChatClient, ChatError, ChatEvent, ChatListener, Event, Settings};
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long the close handshake gets before the process exits.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug, Default)]
#[command(name = "hackchat", about = "Terminal client for hack.chat-style chat rooms")]
struct Cli {
    /// Config file (default: ~/.config/hackchat/config.toml)
    #[arg(long, env = "HACKCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the chat server
    #[arg(long, env = "HACKCHAT_SERVER")]
    server: Option<String>,

    /// Channel to join
    #[arg(long, env = "HACKCHAT_CHANNEL")]
    channel: Option<String>,

    /// Nickname (default: system user name)
    #[arg(long, env = "HACKCHAT_NICK")]
    nick: Option<String>,

    /// Channel password
    #[arg(long, env = "HACKCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Don't connect on startup, even if the config says so
    #[arg(long)]
    no_connect: bool,
}

impl Cli {
    /// CLI flags override file values.
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(server) = &self.server {
            settings.server_url = server.clone();
        }
        if let Some(channel) = &self.channel {
            settings.channel = channel.clone();
        }
        if let Some(nick) = &self.nick {
            settings.nick = nick.clone();
        }
        if let Some(password) = &self.password {
            settings.password = password.clone();
        }
        if self.no_connect {
            settings.auto_connect = false;
        }
        settings.normalized()
    }
}

/// Prints every notification to stdout.
struct Printer;

impl Printer {
    fn print(&self, event: Event) {
        if let Some(line) = display::format_event(&event) {
            println!("{line}");
        }
    }
}

impl ChatListener for Printer {
    fn on_message(&self, event: &ChatEvent) {
        self.print(Event::Message(event.clone()));
    }

    fn on_connected(&self) {
        self.print(Event::Connected);
    }

    fn on_disconnected(&self, code: u16, reason: &str) {
        tracing::debug!(code, reason, "Session closed");
        self.print(Event::Disconnected {
            code,
            reason: reason.to_string(),
        });
    }

    fn on_error(&self, error: &ChatError) {
        self.print(Event::Error {
            message: error.to_string(),
        });
    }
}

fn fallback_nick() -> String {
    whoami::fallible::username().unwrap_or_else(|_| "guest".to_string())
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Host {
    cli: Cli,
    path: PathBuf,
    settings: Settings,
    client: Option<ChatClient>,
}

impl Host {
    fn start(cli: Cli) -> Result<Self> {
        let path = cli.config.clone().unwrap_or_else(config::default_path);
        let settings = cli.apply(config::load_or_create(&path)?);
        let mut host = Self {
            cli,
            path,
            settings,
            client: None,
        };
        host.rebuild();
        Ok(host)
    }

    fn rebuild(&mut self) {
        self.client = None;
        if !self.settings.has_target() {
            println!("{}", display::system(display::MISSING_TARGET));
            return;
        }
        match ChatClient::from_settings(&self.settings, &fallback_nick()) {
            Ok(client) => {
                client.add_listener(Arc::new(Printer));
                tracing::info!(
                    url = %self.settings.server_url,
                    channel = %client.channel(),
                    nick = %client.current_nick(),
                    "Client ready"
                );
                self.client = Some(client);
                if self.settings.auto_connect {
                    self.connect();
                }
            }
            Err(e) => println!("{}", display::system(&format!("IRC error: {e}"))),
        }
    }

    fn connect(&self) {
        let Some(client) = &self.client else {
            println!("{}", display::system(display::MISSING_TARGET));
            return;
        };
        if client.is_connected() || client.is_connecting() {
            return;
        }
        println!("{}", display::system(display::CONNECTING));
        client.connect();
    }

    fn disconnect(&self) {
        match &self.client {
            Some(client) if client.is_connected() => client.disconnect(),
            _ => println!("{}", display::system(display::NOT_CONNECTED)),
        }
    }

    fn status(&self) {
        let Some(client) = &self.client else {
            println!("{}", display::system(display::MISSING_TARGET));
            return;
        };
        let state = if client.is_connected() {
            "connected"
        } else if client.is_connecting() {
            "connecting"
        } else {
            "disconnected"
        };
        println!(
            "{}",
            display::system(&format!(
                "{state} to {} as {} ({} queued)",
                client.channel(),
                client.current_nick(),
                client.pending_len()
            ))
        );
    }

    /// Drop the current connection and start over with `settings`.
    fn restart(&mut self, settings: Settings) {
        self.settings = settings;
        if let Some(client) = &self.client {
            client.disconnect();
        }
        self.rebuild();
    }

    fn reload(&mut self) -> Result<()> {
        let settings = self.cli.apply(config::load_or_create(&self.path)?);
        self.restart(settings);
        Ok(())
    }

    /// `/set <field> <value>`: update the file, then apply the change on top
    /// of the running settings so it wins over startup flags.
    fn set(&mut self, args: &str) -> Result<()> {
        let (field, value) = args.trim().split_once(' ').unwrap_or((args.trim(), ""));
        let mut file = config::load_or_create(&self.path)?;
        config::set_field(&mut file, field, value)?;
        config::save(&self.path, &file.normalized())?;

        let mut settings = self.settings.clone();
        config::set_field(&mut settings, field, value)?;
        tracing::info!(field, path = %self.path.display(), "Setting saved");
        println!("{}", display::system(&format!("Saved {field}.")));
        self.restart(settings.normalized());
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match line.trim() {
            "/quit" => return Ok(Flow::Quit),
            "/connect" => self.connect(),
            "/disconnect" => self.disconnect(),
            "/status" => self.status(),
            "/reload" => self.reload()?,
            cmd if cmd == "/set" || cmd.starts_with("/set ") => {
                if let Err(e) = self.set(&cmd["/set".len()..]) {
                    println!("{}", display::system(&format!("{e:#}")));
                }
            }
            _ => self.route(line),
        }
        Ok(Flow::Continue)
    }

    fn route(&self, line: &str) {
        match route_outgoing(&self.settings, line) {
            OutgoingRoute::NotForChat => {
                if !line.trim().is_empty() {
                    println!(
                        "{}",
                        display::system(&format!("Room messages start with {}", self.settings.prefix))
                    );
                }
            }
            OutgoingRoute::Blank => {}
            OutgoingRoute::TooLong { max } => println!("{}", display::too_long(max)),
            OutgoingRoute::Send(text) => match &self.client {
                Some(client) => {
                    if !client.is_connected() && !client.is_connecting() {
                        println!("{}", display::system(display::CONNECTING));
                    }
                    client.send_message(&text);
                }
                None => println!("{}", display::system(display::MISSING_TARGET)),
            },
        }
    }

    async fn shutdown(self) {
        if let Some(client) = self.client {
            if client.is_connected() {
                client.disconnect();
                tokio::time::sleep(CLOSE_GRACE).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut host = Host::start(Cli::parse())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if host.handle_line(&line)? == Flow::Quit {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    host.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli {
            server: Some(" ws://localhost:6060/chat-ws ".into()),
            channel: Some("lobby".into()),
            no_connect: true,
            ..Cli::default()
        };
        let settings = cli.apply(Settings::default());
        assert_eq!(settings.server_url, "ws://localhost:6060/chat-ws");
        assert_eq!(settings.channel, "lobby");
        assert!(!settings.auto_connect);
        assert_eq!(settings.prefix, "@");
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let file = Settings {
            nick: "bob".into(),
            password: "pw".into(),
            ..Settings::default()
        };
        assert_eq!(Cli::default().apply(file.clone()), file);
    }

    #[test]
    fn parses_long_flags() {
        let cli = Cli::try_parse_from(["hackchat", "--channel", "lobby", "--nick", "bob", "--no-connect"])
            .unwrap();
        assert_eq!(cli.channel.as_deref(), Some("lobby"));
        assert_eq!(cli.nick.as_deref(), Some("bob"));
        assert!(cli.no_connect);
    }

    fn offline_host(name: &str) -> (Host, PathBuf) {
        let path = std::env::temp_dir()
            .join(format!("hackchat-main-test-{}-{name}", std::process::id()))
            .join("config.toml");
        let _ = std::fs::remove_file(&path);
        let cli = Cli {
            config: Some(path.clone()),
            no_connect: true,
            ..Cli::default()
        };
        (Host::start(cli).unwrap(), path)
    }

    #[test]
    fn set_saves_and_rebuilds_client() {
        let (mut host, path) = offline_host("set");
        assert_eq!(host.handle_line("/set channel lobby").unwrap(), Flow::Continue);

        assert_eq!(host.settings.channel, "lobby");
        assert_eq!(host.client.as_ref().unwrap().channel(), "lobby");
        assert!(!host.client.as_ref().unwrap().is_connecting());
        assert_eq!(config::load_or_create(&path).unwrap().channel, "lobby");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn bad_set_is_reported_not_fatal() {
        let (mut host, path) = offline_host("badset");
        assert_eq!(host.handle_line("/set colour red").unwrap(), Flow::Continue);
        assert_eq!(host.handle_line("/set").unwrap(), Flow::Continue);
        assert_eq!(host.settings.channel, hackchat_sdk::settings::DEFAULT_CHANNEL);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
