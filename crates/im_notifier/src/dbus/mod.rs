//! # DBus side of the notifier
//!
//! The chat clients don't ship introspection XML we could generate proxies from, so the proxies
//! in [`proxy`] are written by hand after the signals the clients emit. [`ZbusTransport`] drives
//! them and implements [`Transport`][crate::Transport] for the session bus.

mod proxy;
pub use proxy::*;

mod transport;
pub use transport::*;
