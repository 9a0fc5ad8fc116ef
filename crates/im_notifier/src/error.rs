use thiserror::Error;

use crate::BackendTag;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Backend {0} is already being watched")]
    AlreadyStarted(BackendTag),
    #[error("Unknown backend {0:?}")]
    UnknownBackend(String),
    #[error("Window tracker error: {0}")]
    WindowTracker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
