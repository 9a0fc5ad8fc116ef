use crate::{Error, Result};

/// Short, stable name of a chat backend. Used as the contributor key of the
/// [`IndicatorState`][crate::IndicatorState] and to route bus events to their watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, serde::Serialize)]
pub struct BackendTag(pub &'static str);

/// The wire dialect a backend speaks on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// libpurple's `DisplayedImMsg` / `ConversationUpdated` signals.
    Purple,
    /// Gajim's remote-control `NewMessage` signal.
    Gajim,
}

/// Static description of one chat client on the session bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendIdentity {
    pub tag: BackendTag,
    pub bus_name: &'static str,
    pub object_path: &'static str,
    pub interface: &'static str,
    /// Desktop-file id of the client, compared against the focused application.
    pub app_id: &'static str,
    /// Window role of the client's conversation windows, used when focusing.
    pub conversation_window_role: Option<&'static str>,
    /// Whether clicking the indicator can bring one of this backend's windows to the front.
    pub focusable: bool,
    pub protocol: Protocol,
    /// Style token the indicator carries while this backend has unseen messages.
    pub style_class: &'static str,
    /// The client never reports conversations as seen, so activating the indicator counts as
    /// reading them.
    pub clears_on_activate: bool,
}

pub const PURPLE: BackendIdentity = BackendIdentity {
    tag: BackendTag("purple"),
    bus_name: "im.pidgin.purple.PurpleService",
    object_path: "/im/pidgin/purple/PurpleObject",
    interface: "im.pidgin.purple.PurpleInterface",
    app_id: "pidgin.desktop",
    conversation_window_role: Some("conversation"),
    focusable: true,
    protocol: Protocol::Purple,
    style_class: "pidgin-notification",
    clears_on_activate: false,
};

pub const GAJIM: BackendIdentity = BackendIdentity {
    tag: BackendTag("gajim"),
    bus_name: "org.gajim.dbus",
    object_path: "/org/gajim/dbus/RemoteObject",
    interface: "org.gajim.dbus.RemoteInterface",
    app_id: "gajim.desktop",
    conversation_window_role: Some("messages"),
    focusable: true,
    protocol: Protocol::Gajim,
    style_class: "gajim-notification",
    clears_on_activate: true,
};

/// Every backend this crate knows how to watch.
pub static KNOWN_BACKENDS: [&BackendIdentity; 2] = [&PURPLE, &GAJIM];

impl BackendIdentity {
    /// Look up a known backend by its tag, or by a common alias (`pidgin` for `purple`).
    pub fn by_name(name: &str) -> Result<&'static BackendIdentity> {
        let name = name.trim().to_lowercase();
        let name = match name.as_str() {
            "pidgin" | "libpurple" => "purple",
            other => other,
        };
        KNOWN_BACKENDS
            .iter()
            .copied()
            .find(|backend| backend.tag.0 == name)
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))
    }
}
