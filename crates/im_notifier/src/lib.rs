pub mod dbus;

mod backend;
pub use backend::*;

mod error;
pub use error::*;

mod event;
pub use event::*;

mod host;
pub use host::*;

mod indicator;
pub use indicator::*;

mod reconciler;
pub use reconciler::*;

mod watcher;
pub use watcher::*;

mod window;
pub use window::*;

#[cfg(test)]
mod test_util;
