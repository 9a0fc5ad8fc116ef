use crate::Result;

/// An opaque handle to a toplevel window, as understood by the [`WindowTracker`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub struct WindowId(pub u64);

/// Access to the window manager, used to suppress notifications for the focused client and to
/// bring a client's conversation window to the front.
pub trait WindowTracker {
    /// Desktop-file id of the currently focused application, if it can be determined.
    fn focused_app_id(&self) -> Option<String>;

    /// All windows of `app_id`, restricted to windows carrying `role` if one is given.
    fn find_windows(&self, app_id: &str, role: Option<&str>) -> Vec<WindowId>;

    fn focus(&self, window: WindowId) -> Result<()>;
}

/// A tracker for sessions where windows can't be inspected. Nothing is ever focused, and there
/// are no windows to activate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWindowTracker;

impl WindowTracker for NoWindowTracker {
    fn focused_app_id(&self) -> Option<String> {
        None
    }

    fn find_windows(&self, _app_id: &str, _role: Option<&str>) -> Vec<WindowId> {
        Vec::new()
    }

    fn focus(&self, window: WindowId) -> Result<()> {
        Err(crate::Error::WindowTracker(format!("can't focus window {} without a window tracker", window)))
    }
}
