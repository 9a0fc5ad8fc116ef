use zbus::{dbus_proxy, zvariant::Value};

use crate::ConversationEvent;

/// libpurple's DBus interface, as exported by Pidgin and Finch.
#[dbus_proxy(
    interface = "im.pidgin.purple.PurpleInterface",
    default_service = "im.pidgin.purple.PurpleService",
    default_path = "/im/pidgin/purple/PurpleObject"
)]
trait Purple {
    /// DisplayedImMsg signal
    #[dbus_proxy(signal)]
    fn displayed_im_msg(&self, account: i32, who: &str, message: &str, conversation: i32, flags: i32) -> zbus::Result<()>;

    /// ConversationUpdated signal
    #[dbus_proxy(signal)]
    fn conversation_updated(&self, conversation: i32, flags: u32) -> zbus::Result<()>;
}

/// Gajim's remote-control interface.
#[dbus_proxy(
    interface = "org.gajim.dbus.RemoteInterface",
    default_service = "org.gajim.dbus",
    default_path = "/org/gajim/dbus/RemoteObject"
)]
trait GajimRemote {
    /// NewMessage signal
    #[dbus_proxy(signal)]
    fn new_message(&self, payload: Vec<zbus::zvariant::OwnedValue>) -> zbus::Result<()>;
}

/// Decode the body of Gajim's `NewMessage` signal.
///
/// The payload is `[account, [jid, message, timestamp, ...]]`, with every element wrapped in a
/// variant. Gajim doesn't number its conversations, so the conversation id is always 0 and the
/// sender's jid is the only identification.
pub fn decode_new_message<'v, 'a: 'v>(payload: impl IntoIterator<Item = &'v Value<'a>>) -> Option<ConversationEvent> {
    let mut payload = payload.into_iter();
    let account = payload.next().and_then(as_str)?.to_string();
    let details = payload.next().and_then(as_array)?;
    let who = details.first().and_then(as_str)?.to_string();
    let text = details.get(1).and_then(as_str).unwrap_or_default().to_string();
    Some(ConversationEvent { account, who, text, conversation_id: 0, flags: 0 })
}

fn as_str<'v>(value: &'v Value<'_>) -> Option<&'v str> {
    match value {
        Value::Str(s) => Some(s.as_str()),
        Value::Value(inner) => as_str(inner),
        _ => None,
    }
}

fn as_array<'v, 'a>(value: &'v Value<'a>) -> Option<&'v [Value<'a>]> {
    match value {
        Value::Array(array) => Some(array.get()),
        Value::Value(inner) => as_array(inner),
        _ => None,
    }
}
