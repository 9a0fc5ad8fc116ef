use crate::{
    app::App,
    application_lifecycle,
    config::{self, ImnotifyConfig},
    ipc_server,
    output::JsonLineSink,
    window_tracker, ImnotifyPaths,
};
use anyhow::{Context, Result};
use im_notifier::{dbus::ZbusTransport, BackendIdentity, Notifier};

pub fn initialize_server(paths: ImnotifyPaths) -> Result<()> {
    log::info!("Loading paths: {}", &paths);

    let imnotify_config = match config::read_from_file(&paths.get_config_file()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{:?}", err);
            log::warn!("Falling back to the default configuration");
            ImnotifyConfig::default()
        }
    };
    let backends = imnotify_config.backends()?;

    application_lifecycle::exit_on_signals();

    let rt = tokio::runtime::Builder::new_current_thread()
        .thread_name("imnotify-daemon")
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")?;
    let result = rt.block_on(run(&paths, &imnotify_config, backends));

    let _ = std::fs::remove_file(paths.get_ipc_socket_file());
    log::info!("imnotify daemon finished");
    result
}

async fn run(paths: &ImnotifyPaths, imnotify_config: &ImnotifyConfig, backends: Vec<&'static BackendIdentity>) -> Result<()> {
    // subscribed before anything is enabled, so no exit signal gets lost
    let mut exit_recv = application_lifecycle::subscribe_exit();
    let (bus_send, mut bus_recv) = tokio::sync::mpsc::unbounded_channel();
    let (command_send, mut command_recv) = tokio::sync::mpsc::unbounded_channel();

    let transport = ZbusTransport::session(bus_send).await.context("Failed to connect to the session bus")?;
    let windows = window_tracker::create(imnotify_config.window_tracking);

    let mut notifier = Notifier::new(transport, windows, backends);
    notifier.enable(Box::new(JsonLineSink::stdout()));
    let mut app = App::new(notifier);

    let ipc_server_join_handle = {
        let socket_path = paths.get_ipc_socket_file().to_path_buf();
        tokio::spawn(async move {
            let result = ipc_server::run_server(command_send, socket_path).await;
            crate::print_result_err!("in IPC server", &result);
        })
    };

    crate::loop_select_exiting! {
        exit = exit_recv;
        Some(envelope) = bus_recv.recv() => app.handle_bus_event(envelope),
        Some(command) = command_recv.recv() => {
            app.handle_command(command);
            // a kill command disables the notifier, which ends the daemon
            if !app.notifier.is_enabled() {
                break;
            }
        },
        else => break,
    }

    app.stop_application();
    ipc_server_join_handle.abort();
    Ok(())
}
