use im_notifier::{NoWindowTracker, WindowId, WindowTracker};

use crate::config::WindowTracking;

/// Build the window tracker for the configured tracking mode, falling back to no tracking if the
/// window system can't be reached.
pub fn create(tracking: WindowTracking) -> Box<dyn WindowTracker> {
    match tracking {
        WindowTracking::None => Box::new(NoWindowTracker),
        #[cfg(feature = "x11")]
        WindowTracking::X11 => match platform::X11WindowTracker::new() {
            Ok(tracker) => Box::new(tracker),
            Err(err) => {
                log::warn!("Failed to connect to the X server, window tracking disabled: {:?}", err);
                Box::new(NoWindowTracker)
            }
        },
        #[cfg(not(feature = "x11"))]
        WindowTracking::X11 => {
            log::warn!("imnotify compiled without x11 support, window tracking disabled");
            Box::new(NoWindowTracker)
        }
    }
}

/// `WM_CLASS` holds two NUL-terminated strings, instance and class. Desktop-file ids are the
/// lowercased class with a `.desktop` suffix for the clients we know (`Pidgin` -> `pidgin.desktop`).
pub fn app_id_from_wm_class(wm_class: &[u8]) -> Option<String> {
    let mut parts = wm_class.split(|b| *b == 0).filter(|part| !part.is_empty());
    let instance = parts.next()?;
    let class = parts.next().unwrap_or(instance);
    Some(format!("{}.desktop", String::from_utf8_lossy(class).to_lowercase()))
}

/// Keep the windows `matches` accepts. A window that can't be inspected (e.g. destroyed between
/// listing the clients and reading its properties) is skipped.
#[cfg_attr(not(feature = "x11"), allow(dead_code))]
fn collect_matching(windows: impl IntoIterator<Item = u32>, matches: impl Fn(u32) -> anyhow::Result<bool>) -> Vec<WindowId> {
    windows
        .into_iter()
        .filter(|window| match matches(*window) {
            Ok(matching) => matching,
            Err(err) => {
                log::debug!("Skipping window {}: {:?}", window, err);
                false
            }
        })
        .map(|window| WindowId(window as u64))
        .collect()
}

#[cfg(feature = "x11")]
mod platform {
    use anyhow::{Context, Result};
    use im_notifier::{WindowId, WindowTracker};
    use x11rb::{
        connection::Connection,
        protocol::xproto::*,
        rust_connection::{DefaultStream, RustConnection},
        CURRENT_TIME,
    };

    /// EWMH `_NET_ACTIVE_WINDOW` source indication for pagers and other direct user actions.
    const SOURCE_PAGER: u32 = 2;

    pub struct X11WindowTracker {
        conn: RustConnection<DefaultStream>,
        root_window: u32,
        atoms: AtomCollection,
    }

    impl X11WindowTracker {
        pub fn new() -> Result<Self> {
            let (conn, screen_num) = RustConnection::connect(None)?;
            let screen = conn.setup().roots[screen_num].clone();
            let atoms = AtomCollection::new(&conn)?.reply()?;
            Ok(X11WindowTracker { conn, root_window: screen.root, atoms })
        }

        fn property(&self, window: u32, property: u32, type_: impl Into<u32>) -> Result<GetPropertyReply> {
            Ok(self.conn.get_property(false, window, property, type_, 0, u32::MAX)?.reply()?)
        }

        fn active_window(&self) -> Result<Option<u32>> {
            let reply = self.property(self.root_window, self.atoms._NET_ACTIVE_WINDOW, AtomEnum::WINDOW)?;
            Ok(reply.value32().and_then(|mut values| values.next()).filter(|window| *window != 0))
        }

        fn app_id_of(&self, window: u32) -> Result<Option<String>> {
            let reply = self.property(window, self.atoms.WM_CLASS, AtomEnum::STRING)?;
            Ok(super::app_id_from_wm_class(&reply.value))
        }

        fn role_of(&self, window: u32) -> Result<Option<String>> {
            let reply = self.property(window, self.atoms.WM_WINDOW_ROLE, AtomEnum::ANY)?;
            let role = String::from_utf8_lossy(&reply.value).trim_end_matches('\0').to_string();
            Ok(if role.is_empty() { None } else { Some(role) })
        }

        fn client_windows(&self) -> Result<Vec<u32>> {
            let reply = self.property(self.root_window, self.atoms._NET_CLIENT_LIST, AtomEnum::WINDOW)?;
            Ok(reply.value32().map(|values| values.collect()).unwrap_or_default())
        }

        fn matching_windows(&self, app_id: &str, role: Option<&str>) -> Result<Vec<WindowId>> {
            Ok(super::collect_matching(self.client_windows()?, |window| self.window_matches(window, app_id, role)))
        }

        fn window_matches(&self, window: u32, app_id: &str, role: Option<&str>) -> Result<bool> {
            if self.app_id_of(window)?.as_deref() != Some(app_id) {
                return Ok(false);
            }
            Ok(role.is_none() || self.role_of(window)?.as_deref() == role)
        }

        fn activate(&self, window: u32) -> Result<()> {
            let event = ClientMessageEvent::new(32, window, self.atoms._NET_ACTIVE_WINDOW, [SOURCE_PAGER, CURRENT_TIME, 0, 0, 0]);
            self.conn
                .send_event(false, self.root_window, EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY, event)?
                .check()?;
            self.conn.flush().context("Failed to send requests to X server")
        }
    }

    impl WindowTracker for X11WindowTracker {
        fn focused_app_id(&self) -> Option<String> {
            let result = (|| -> Result<Option<String>> {
                match self.active_window()? {
                    Some(window) => self.app_id_of(window),
                    None => Ok(None),
                }
            })();
            result.unwrap_or_else(|err| {
                log::warn!("Failed to determine the focused application: {:?}", err);
                None
            })
        }

        fn find_windows(&self, app_id: &str, role: Option<&str>) -> Vec<WindowId> {
            self.matching_windows(app_id, role).unwrap_or_else(|err| {
                log::warn!("Failed to list windows of {}: {:?}", app_id, err);
                Vec::new()
            })
        }

        fn focus(&self, window: WindowId) -> im_notifier::Result<()> {
            let xid = u32::try_from(window.0).map_err(|_| im_notifier::Error::WindowTracker(format!("{} is not an X11 window", window)))?;
            self.activate(xid).map_err(|err| im_notifier::Error::WindowTracker(format!("{:?}", err)))
        }
    }

    x11rb::atom_manager! {
        pub AtomCollection: AtomCollectionCookie {
            _NET_ACTIVE_WINDOW,
            _NET_CLIENT_LIST,
            WM_CLASS,
            WM_WINDOW_ROLE,
        }
    }
}
