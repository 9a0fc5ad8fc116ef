use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::{
    app,
    daemon_response::{self, DaemonResponseReceiver},
};

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<std::path::PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq)]
#[command(author = "imnotify contributors", version, about = "Unread instant-message indicator for status bars")]
pub(super) struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Override path to the configuration directory (directory that contains imnotify.json)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Defaults to `daemon`.
    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Action {
    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::shells::Shell,
    },

    /// Run the daemon in the foreground. The indicator state is printed to stdout as one JSON
    /// object per line, e.g. for an eww `deflisten` variable.
    #[command(name = "daemon", alias = "d")]
    Daemon,

    #[command(flatten)]
    WithServer(ActionWithServer),
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionWithServer {
    /// Ping the imnotify daemon, checking if it is reachable.
    #[command(name = "ping")]
    Ping,

    /// Act as if the indicator was clicked: focus the conversation window of the most recent
    /// backend with unread messages.
    #[command(name = "activate", alias = "a")]
    Activate,

    /// Print the current indicator state as JSON.
    #[command(name = "state")]
    ShowState,

    /// Kill the imnotify daemon
    #[command(name = "kill", alias = "k")]
    KillServer,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { action, log_debug, config } = other;
        Opt { action: action.unwrap_or(Action::Daemon), log_debug, config_path: config }
    }
}

impl ActionWithServer {
    pub fn into_daemon_command(self) -> (app::DaemonCommand, Option<DaemonResponseReceiver>) {
        let command = match self {
            ActionWithServer::Ping => {
                let (sender, recv) = daemon_response::create_pair();
                let _ = sender.send_success("pong".to_owned());
                return (app::DaemonCommand::NoOp, Some(recv));
            }
            ActionWithServer::KillServer => app::DaemonCommand::KillServer,
            ActionWithServer::Activate => return with_response_channel(app::DaemonCommand::Activate),
            ActionWithServer::ShowState => return with_response_channel(app::DaemonCommand::PrintState),
        };
        (command, None)
    }
}

fn with_response_channel<O, F>(f: F) -> (O, Option<DaemonResponseReceiver>)
where
    F: FnOnce(daemon_response::DaemonResponseSender) -> O,
{
    let (sender, recv) = daemon_response::create_pair();
    (f(sender), Some(recv))
}
