use crate::{daemon_response::DaemonResponse, ipc_server, opts};
use anyhow::*;
use std::{
    io::{Read, Write},
    os::unix::net::UnixStream,
};

/// Connect to the daemon and send the given request.
/// Returns the response from the daemon, or None if the daemon did not provide any useful response. An Ok(None) response does _not_ indicate failure.
pub fn do_server_call(stream: &mut UnixStream, action: &opts::ActionWithServer) -> Result<Option<DaemonResponse>> {
    log::debug!("Forwarding options to server");
    stream.set_nonblocking(false).context("Failed to set stream to blocking")?;

    let message = ipc_server::encode_action(action)?;
    stream.write_all(&message).context("Failed to write command to IPC stream")?;

    let mut buf = Vec::new();
    stream.set_read_timeout(Some(std::time::Duration::from_millis(200))).context("Failed to set read timeout")?;
    stream.read_to_end(&mut buf).context("Error reading response from server")?;

    Ok(if buf.is_empty() { None } else { Some(bincode::deserialize(&buf)?) })
}
