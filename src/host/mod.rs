//! # Host Adapter
//!
//! Drives a [`Coordinator`] from text commands, standing in for the
//! platform navigator: it delivers external addresses (`open`), in-app
//! navigation (`push`), system back, and prints what is on screen.
//!
//! ```text
//!   stdin ──lines──▶ parse_command ──▶ execute ──▶ Coordinator
//!                                          │
//!   stdout ◀── reply + "@ <address>" ◀─────┘
//! ```
//!
//! Routes come from the `[[routes]]` config table, see [`routes`].

pub mod command;
pub mod routes;

use std::fmt::Write as _;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::core::config::ResolvedConfig;
use crate::core::coordinator::Coordinator;
use crate::core::inspect::{diagnose, snapshot};
use crate::core::path::{Navigation, NavigationPath};
use crate::core::render::destinations;
use command::{HELP, HostCommand, parse_command};
use routes::RouteTable;

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Print(String),
    Quit,
}

pub struct Host {
    nav: Coordinator,
    routes: RouteTable,
}

impl Host {
    pub fn new(config: &ResolvedConfig) -> Self {
        let routes = RouteTable::new(config.routes.clone());
        let parser = routes.clone();
        let nav = Coordinator::with_settings(move |a| parser.parse(a), config.settings());
        nav.register_known(routes.known_screens());
        Self { nav, routes }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.nav
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Logs every path change until the coordinator goes away.
    pub fn watch_changes(&self) -> JoinHandle<()> {
        let mut rx = self.nav.changes();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => debug!("Path '{}' now at v{}", change.path, change.version),
                    Err(RecvError::Lagged(n)) => warn!("Change log skipped {} events", n),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn execute(&self, command: HostCommand) -> Effect {
        let text = match command {
            HostCommand::Open(address) => match self.nav.open(&address).await {
                Ok(outcome) => self.describe(outcome, &address.to_string()),
                Err(e) => format!("error: {e}"),
            },
            HostCommand::Push(address) => match self.nav.navigate(&address).await {
                Ok(outcome) => self.describe(outcome, &address.to_string()),
                Err(e) => format!("error: {e}"),
            },
            HostCommand::Pop(result) => match self.nav.pop(result).await {
                Ok(true) => "popped".to_string(),
                Ok(false) => "nothing popped".to_string(),
                Err(e) => format!("error: {e}"),
            },
            HostCommand::Back => match self.nav.back().await {
                Ok(true) => "back".to_string(),
                Ok(false) => "nothing popped".to_string(),
                Err(e) => format!("error: {e}"),
            },
            HostCommand::Lock => {
                self.routes.set_locked(true);
                "locked".to_string()
            }
            HostCommand::Unlock => {
                self.routes.set_locked(false);
                "unlocked".to_string()
            }
            HostCommand::Show => self.show(),
            HostCommand::Json => serde_json::to_string_pretty(&snapshot(&self.nav))
                .unwrap_or_else(|e| format!("error: {e}")),
            HostCommand::Diag => {
                let found = diagnose(&self.nav);
                if found.is_empty() {
                    "no problems found".to_string()
                } else {
                    found
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            HostCommand::Help => HELP.to_string(),
            HostCommand::Quit => return Effect::Quit,
        };
        Effect::Print(text)
    }

    fn describe(&self, outcome: Navigation, target: &str) -> String {
        match outcome {
            Navigation::Pushed(handle) => {
                let target = target.to_string();
                tokio::spawn(async move {
                    if let Some(result) = handle.await {
                        info!("{} returned {}", target, result);
                    }
                });
                "pushed".to_string()
            }
            Navigation::Moved => "moved to top".to_string(),
            Navigation::Selected(index) => format!("selected {index}"),
            Navigation::Replaced => "replaced".to_string(),
            Navigation::Handled => "handled by deep link".to_string(),
            Navigation::Aborted => "aborted by redirect".to_string(),
            Navigation::Denied => "denied by guard".to_string(),
        }
    }

    /// Every path through the rendering boundary; `>` marks the active screen.
    fn show(&self) -> String {
        let mut out = String::new();
        for path in self.nav.paths() {
            let active = path.active();
            let kind = if path.is_fixed() { "fixed" } else { "stack" };
            let _ = writeln!(out, "{} ({kind}, v{})", path.key(), path.version());
            let rows = destinations(path.as_ref(), |screen| {
                screen
                    .address()
                    .map_or_else(|| "-".to_string(), |a| a.to_string())
            });
            for row in rows {
                let marker = if active.as_ref() == Some(&row.key) { '>' } else { ' ' };
                let _ = writeln!(out, "  {marker} {:<20} {}", row.view, row.key);
            }
        }
        out.trim_end().to_string()
    }

    /// Reads commands line by line until `quit` or end of input.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Host loop started with {} routes", self.routes.len());
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    output.write_all(format!("{e}\n").as_bytes()).await?;
                    continue;
                }
            };
            debug!("Command: {:?}", command);

            match self.execute(command).await {
                Effect::Quit => break,
                Effect::Print(text) => {
                    let reply = format!("{text}\n@ {}\n", self.nav.current_address());
                    output.write_all(reply.as_bytes()).await?;
                    output.flush().await?;
                }
            }
        }
        info!("Host loop finished");
        Ok(())
    }
}
