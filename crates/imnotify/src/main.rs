use anyhow::{Context, Result};
use clap::CommandFactory as _;
use daemon_response::DaemonResponse;
use opts::ActionWithServer;
use paths::ImnotifyPaths;
use std::{os::unix::net, path::Path, time::Duration};

mod app;
mod application_lifecycle;
mod client;
mod config;
mod daemon_response;
mod ipc_server;
mod opts;
mod output;
mod paths;
mod server;
mod util;
mod window_tracker;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("imnotify"), log_level_filter)
            .filter(Some("im_notifier"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = opts
        .config_path
        .map(ImnotifyPaths::from_config_dir)
        .unwrap_or_else(ImnotifyPaths::default)
        .context("Failed to initialize imnotify paths")?;

    match opts.action {
        opts::Action::ShellCompletions { shell } => {
            clap_complete::generate(shell, &mut opts::RawOpt::command(), "imnotify", &mut std::io::stdout());
        }

        // make sure that there isn't already an imnotify daemon running.
        opts::Action::Daemon if check_server_running(paths.get_ipc_socket_file()) => {
            eprintln!("imnotify daemon already running.");
        }
        opts::Action::Daemon => {
            log::info!("Initializing imnotify daemon. ({})", paths.get_ipc_socket_file().display());
            let _ = std::fs::remove_file(paths.get_ipc_socket_file());
            server::initialize_server(paths)?;
        }

        opts::Action::WithServer(action) => {
            if let Some(response) = handle_server_command(&paths, &action, 5)? {
                handle_daemon_response(response);
            }
        }
    }
    Ok(())
}

/// attempt to connect to the daemon and send it the given action.
fn handle_server_command(paths: &ImnotifyPaths, action: &ActionWithServer, connect_attempts: usize) -> Result<Option<DaemonResponse>> {
    log::debug!("Trying to find server process at socket {}", paths.get_ipc_socket_file().display());
    let mut stream = attempt_connect(paths.get_ipc_socket_file(), connect_attempts).context("Failed to connect to daemon")?;
    log::debug!("Connected to imnotify daemon ({}).", &paths.get_ipc_socket_file().display());
    client::do_server_call(&mut stream, action).context("Error while forwarding command to server")
}

fn handle_daemon_response(res: DaemonResponse) {
    match res {
        DaemonResponse::Success(x) => println!("{}", x),
        DaemonResponse::Failure(x) => {
            eprintln!("{}", x);
            std::process::exit(1);
        }
    }
}

fn attempt_connect(socket_path: impl AsRef<Path>, attempts: usize) -> Option<net::UnixStream> {
    for _ in 0..attempts {
        if let Ok(mut con) = net::UnixStream::connect(&socket_path) {
            if client::do_server_call(&mut con, &opts::ActionWithServer::Ping).is_ok() {
                return net::UnixStream::connect(&socket_path).ok();
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    None
}

/// Check if an imnotify daemon is currently running by trying to send a ping message to it.
fn check_server_running(socket_path: impl AsRef<Path>) -> bool {
    let response = net::UnixStream::connect(socket_path)
        .ok()
        .and_then(|mut stream| client::do_server_call(&mut stream, &opts::ActionWithServer::Ping).ok());
    response.is_some()
}
