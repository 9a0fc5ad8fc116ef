use crate::{app, opts};
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    sync::mpsc::*,
};

/// Actions are a few bytes; anything bigger isn't from an imnotify client.
const MAX_MESSAGE_LENGTH: u32 = 64 * 1024;

pub async fn run_server<P: AsRef<std::path::Path>>(evt_send: UnboundedSender<app::DaemonCommand>, socket_path: P) -> Result<()> {
    let socket_path = socket_path.as_ref();
    let listener = tokio::net::UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind IPC socket at {}", socket_path.display()))?;
    log::info!("IPC server initialized");
    crate::loop_select_exiting! {
        connection = listener.accept() => match connection {
            Ok((stream, _addr)) => {
                let evt_send = evt_send.clone();
                tokio::spawn(async move {
                    let result = handle_connection(stream, evt_send).await;
                    crate::print_result_err!("while handling IPC connection with client", result);
                });
            },
            Err(e) => log::error!("Failed to connect to client: {:?}", e),
        }
    }
    Ok(())
}

/// Handle a single IPC connection from start to end.
async fn handle_connection(mut stream: tokio::net::UnixStream, evt_send: UnboundedSender<app::DaemonCommand>) -> Result<()> {
    let (mut stream_read, mut stream_write) = stream.split();

    let action: opts::ActionWithServer = read_action_from_stream(&mut stream_read).await?;

    log::debug!("received command from IPC: {:?}", &action);

    let (command, maybe_response_recv) = action.into_daemon_command();

    evt_send.send(command)?;

    if let Some(mut response_recv) = maybe_response_recv {
        log::debug!("Waiting for response for IPC client");
        if let Ok(Some(response)) = tokio::time::timeout(Duration::from_millis(100), response_recv.recv()).await {
            let response = bincode::serialize(&response)?;
            let result = &stream_write.write_all(&response).await;
            crate::print_result_err!("sending text response to ipc client", &result);
        }
    }
    stream_write.shutdown().await?;
    Ok(())
}

/// Frame an action for the daemon: a 4 byte big-endian length header followed by the
/// bincode-encoded action.
pub fn encode_action(action: &opts::ActionWithServer) -> Result<Vec<u8>> {
    let message_bytes = bincode::serialize(action)?;
    let mut framed = Vec::with_capacity(4 + message_bytes.len());
    framed.extend_from_slice(&(message_bytes.len() as u32).to_be_bytes());
    framed.extend_from_slice(&message_bytes);
    Ok(framed)
}

/// Read a single message framed by [`encode_action`].
async fn read_action_from_stream(stream_read: &mut (impl AsyncRead + Unpin)) -> Result<opts::ActionWithServer> {
    let mut message_byte_length = [0u8; 4];
    stream_read.read_exact(&mut message_byte_length).await.context("Failed to read message size header in IPC message")?;
    let message_byte_length = u32::from_be_bytes(message_byte_length);
    if message_byte_length > MAX_MESSAGE_LENGTH {
        bail!("IPC message of {} bytes exceeds the limit of {} bytes", message_byte_length, MAX_MESSAGE_LENGTH);
    }
    let mut raw_message = vec![0u8; message_byte_length as usize];
    stream_read.read_exact(&mut raw_message).await.context("Failed to read actual IPC message")?;

    bincode::deserialize(&raw_message).context("Failed to parse client message")
}
