use anyhow::*;

/// Response that the daemon sends back to an IPC client.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_more::Display)]
pub enum DaemonResponse {
    Success(String),
    Failure(String),
}

#[derive(Debug)]
pub struct DaemonResponseSender(tokio::sync::mpsc::UnboundedSender<DaemonResponse>);

pub fn create_pair() -> (DaemonResponseSender, DaemonResponseReceiver) {
    let (sender, recv) = tokio::sync::mpsc::unbounded_channel();
    (DaemonResponseSender(sender), recv)
}

impl DaemonResponseSender {
    pub fn send_success(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Success(s)).context("Failed to send success response from the control loop")
    }

    pub fn send_failure(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Failure(s)).context("Failed to send failure response from the control loop")
    }

    /// Respond with `value` serialized as JSON.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        match serde_json::to_string(value) {
            std::result::Result::Ok(json) => self.send_success(json),
            Err(e) => self.send_failure(format!("Failed to serialize response: {}", e)),
        }
    }
}

pub type DaemonResponseReceiver = tokio::sync::mpsc::UnboundedReceiver<DaemonResponse>;
