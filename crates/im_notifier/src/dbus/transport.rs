use tokio::sync::mpsc::UnboundedSender;
use zbus::export::ordered_stream::{self, OrderedStreamExt};

use super::{GajimRemoteProxy, PurpleProxy};
use crate::*;

/// Owns a forwarding task; the task is aborted when the guard is dropped.
#[derive(Debug)]
pub struct TaskGuard(tokio::task::JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// [`Transport`] on a zbus connection.
///
/// Every watch and subscription runs as its own tokio task that forwards into a single channel,
/// which the control loop drains. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct ZbusTransport {
    con: zbus::Connection,
    events: UnboundedSender<Envelope>,
}

impl ZbusTransport {
    pub fn new(con: zbus::Connection, events: UnboundedSender<Envelope>) -> Self {
        ZbusTransport { con, events }
    }

    /// Connect to the session bus.
    pub async fn session(events: UnboundedSender<Envelope>) -> Result<Self> {
        let con = zbus::Connection::session().await?;
        Ok(Self::new(con, events))
    }
}

impl Transport for ZbusTransport {
    type Watch = TaskGuard;
    type Subscription = TaskGuard;

    fn watch_presence(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<TaskGuard> {
        let con = self.con.clone();
        let events = self.events.clone();
        Ok(TaskGuard(tokio::spawn(async move {
            if let Err(e) = forward_presence(&con, backend, id, &events).await {
                log::error!("[{}] failed to watch {}: {}", backend.tag, backend.bus_name, e);
            }
        })))
    }

    fn subscribe(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<TaskGuard> {
        let con = self.con.clone();
        let events = self.events.clone();
        Ok(TaskGuard(tokio::spawn(async move {
            let result = match backend.protocol {
                Protocol::Purple => forward_purple(&con, backend, id, &events).await,
                Protocol::Gajim => forward_gajim(&con, backend, id, &events).await,
            };
            if let Err(e) = result {
                log::error!("[{}] lost signals of {}: {}", backend.tag, backend.interface, e);
            }
        })))
    }
}

/// Report the current owner of the backend's bus name, then every change of it.
async fn forward_presence(
    con: &zbus::Connection,
    backend: &'static BackendIdentity,
    watch: HandleId,
    events: &UnboundedSender<Envelope>,
) -> zbus::Result<()> {
    let send = |change| events.send(Envelope { backend: backend.tag, payload: Payload::Presence { watch, change } }).is_ok();

    let dbus = zbus::fdo::DBusProxy::new(con).await?;
    // listen before asking for the current owner, so no change in between gets lost
    let mut owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, backend.bus_name)]).await?;

    match dbus.get_name_owner(zbus::names::BusName::try_from(backend.bus_name)?).await {
        Ok(owner) => {
            if !send(owner_change(Some(&*owner))) {
                return Ok(());
            }
        }
        Err(zbus::fdo::Error::NameHasNoOwner(_)) => log::debug!("[{}] {} isn't running yet", backend.tag, backend.bus_name),
        Err(e) => return Err(e.into()),
    }

    while let Some(sig) = owner_changes.next().await {
        let args = match sig.args() {
            Ok(args) => args,
            Err(e) => {
                log::warn!("[{}] ignoring undecodable NameOwnerChanged: {}", backend.tag, e);
                continue;
            }
        };
        let new_owner: &Option<zbus::names::UniqueName<'_>> = args.new_owner();
        if !send(owner_change(new_owner.as_ref())) {
            break;
        }
    }

    Ok(())
}

fn owner_change(new_owner: Option<&zbus::names::UniqueName<'_>>) -> PresenceChange {
    match new_owner {
        Some(owner) => PresenceChange::Appeared { owner: owner.to_string() },
        None => PresenceChange::Vanished,
    }
}

enum PurpleSignal {
    Displayed(super::DisplayedImMsg),
    Updated(super::ConversationUpdated),
}

fn purple_event(signal: &PurpleSignal) -> zbus::Result<SignalEvent> {
    Ok(match signal {
        PurpleSignal::Displayed(sig) => {
            let args = sig.args()?;
            SignalEvent::MessageDisplayed(ConversationEvent {
                account: args.account.to_string(),
                who: args.who.to_string(),
                text: args.message.to_string(),
                conversation_id: args.conversation,
                flags: args.flags,
            })
        }
        PurpleSignal::Updated(sig) => {
            let args = sig.args()?;
            SignalEvent::ConversationUpdated(ConversationUpdateEvent { conversation_id: args.conversation, flags: args.flags })
        }
    })
}

/// `Ok(None)` for a well-formed signal whose payload doesn't describe a message.
fn gajim_event(sig: &super::NewMessage) -> zbus::Result<Option<SignalEvent>> {
    let args = sig.args()?;
    Ok(super::decode_new_message(args.payload.iter().map(|value| &**value)).map(SignalEvent::MessageDisplayed))
}

/// Send a decoded signal to the control loop. A signal that failed to decode is logged and
/// skipped; the subscription stays alive. Returns false once the control loop is gone.
fn deliver(
    events: &UnboundedSender<Envelope>,
    backend: &'static BackendIdentity,
    subscription: HandleId,
    decoded: zbus::Result<Option<SignalEvent>>,
) -> bool {
    match decoded {
        Ok(Some(event)) => events.send(Envelope { backend: backend.tag, payload: Payload::Signal { subscription, event } }).is_ok(),
        Ok(None) => {
            log::warn!("[{}] ignoring signal without a message", backend.tag);
            true
        }
        Err(e) => {
            log::warn!("[{}] ignoring undecodable signal from {}: {}", backend.tag, backend.interface, e);
            true
        }
    }
}

async fn forward_purple(
    con: &zbus::Connection,
    backend: &'static BackendIdentity,
    subscription: HandleId,
    events: &UnboundedSender<Envelope>,
) -> zbus::Result<()> {
    let purple = PurpleProxy::builder(con)
        .destination(backend.bus_name)?
        .path(backend.object_path)?
        .cache_properties(zbus::CacheProperties::No)
        .build()
        .await?;

    // both signals come from the same connection; joining them keeps the order the client sent them in
    let displayed = purple.receive_displayed_im_msg().await?;
    let updated = purple.receive_conversation_updated().await?;
    let mut signals = ordered_stream::join(
        OrderedStreamExt::map(displayed, PurpleSignal::Displayed),
        OrderedStreamExt::map(updated, PurpleSignal::Updated),
    );

    while let Some(signal) = signals.next().await {
        if !deliver(events, backend, subscription, purple_event(&signal).map(Some)) {
            break;
        }
    }

    Ok(())
}

async fn forward_gajim(
    con: &zbus::Connection,
    backend: &'static BackendIdentity,
    subscription: HandleId,
    events: &UnboundedSender<Envelope>,
) -> zbus::Result<()> {
    let gajim = GajimRemoteProxy::builder(con)
        .destination(backend.bus_name)?
        .path(backend.object_path)?
        .cache_properties(zbus::CacheProperties::No)
        .build()
        .await?;
    let mut messages = gajim.receive_new_message().await?;

    while let Some(sig) = messages.next().await {
        if !deliver(events, backend, subscription, gajim_event(&sig)) {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        io::{BufRead, BufReader},
        process::{Child, Command, Stdio},
        time::Duration,
    };

    use super::*;
    use crate::dbus::{ConversationUpdated, DisplayedImMsg, NewMessage};
    use pretty_assertions::assert_eq;
    use zbus::zvariant::{DynamicType, Value};

    fn signal_message(backend: &BackendIdentity, member: &str, body: &(impl serde::Serialize + DynamicType)) -> zbus::Message {
        zbus::MessageBuilder::signal(backend.object_path, backend.interface, member).unwrap().build(body).unwrap()
    }

    fn displayed(body: &(impl serde::Serialize + DynamicType)) -> PurpleSignal {
        PurpleSignal::Displayed(DisplayedImMsg::from_message(signal_message(&PURPLE, "DisplayedImMsg", body)).unwrap())
    }

    fn updated(body: &(impl serde::Serialize + DynamicType)) -> PurpleSignal {
        PurpleSignal::Updated(ConversationUpdated::from_message(signal_message(&PURPLE, "ConversationUpdated", body)).unwrap())
    }

    fn new_message(body: &(impl serde::Serialize + DynamicType)) -> NewMessage {
        NewMessage::from_message(signal_message(&GAJIM, "NewMessage", body)).unwrap()
    }

    fn displayed_event(who: &str, text: &str) -> SignalEvent {
        SignalEvent::MessageDisplayed(ConversationEvent {
            account: "1".to_string(),
            who: who.to_string(),
            text: text.to_string(),
            conversation_id: 7,
            flags: 0,
        })
    }

    fn drain(recv: &mut tokio::sync::mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
        std::iter::from_fn(|| recv.try_recv().ok()).collect()
    }

    #[test]
    fn test_undecodable_purple_signal_is_skipped() {
        let (events, mut recv) = tokio::sync::mpsc::unbounded_channel();
        let subscription = HandleId::next();
        let signals = [
            displayed(&(1i32, "bob", "first", 7i32, 0i32)),
            displayed(&("oops",)),
            updated(&(7i32, 0u32)),
            displayed(&(1i32, "bob", "second", 7i32, 0i32)),
        ];
        for signal in &signals {
            assert!(deliver(&events, &PURPLE, subscription, purple_event(signal).map(Some)));
        }

        let payloads: Vec<Payload> = drain(&mut recv).into_iter().map(|envelope| envelope.payload).collect();
        assert_eq!(
            payloads,
            vec![
                Payload::Signal { subscription, event: displayed_event("bob", "first") },
                Payload::Signal {
                    subscription,
                    event: SignalEvent::ConversationUpdated(ConversationUpdateEvent { conversation_id: 7, flags: 0 }),
                },
                Payload::Signal { subscription, event: displayed_event("bob", "second") },
            ]
        );
    }

    #[test]
    fn test_undecodable_gajim_signal_is_skipped() {
        let (events, mut recv) = tokio::sync::mpsc::unbounded_channel();
        let subscription = HandleId::next();
        let valid = (vec![Value::from("work"), Value::from(vec!["alice@example.org", "hello"])],);
        let signals = [new_message(&("oops",)), new_message(&(Vec::<Value>::new(),)), new_message(&valid)];
        for signal in &signals {
            assert!(deliver(&events, &GAJIM, subscription, gajim_event(signal)));
        }

        let delivered = drain(&mut recv);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].backend, GAJIM.tag);
        assert!(matches!(
            &delivered[0].payload,
            Payload::Signal { event: SignalEvent::MessageDisplayed(event), .. } if event.who == "alice@example.org" && event.text == "hello"
        ));
    }

    #[test]
    fn test_deliver_stops_once_the_control_loop_is_gone() {
        let (events, recv) = tokio::sync::mpsc::unbounded_channel();
        drop(recv);
        assert!(!deliver(&events, &PURPLE, HandleId::next(), Ok(Some(displayed_event("bob", "hi")))));
        // decode failures never end the subscription on their own
        assert!(deliver(&events, &PURPLE, HandleId::next(), Err(zbus::Error::InvalidReply)));
    }

    #[test]
    fn test_owner_change() {
        let owner = zbus::names::UniqueName::try_from(":1.7").unwrap();
        assert_eq!(owner_change(Some(&owner)), PresenceChange::Appeared { owner: ":1.7".to_string() });
        assert_eq!(owner_change(None), PresenceChange::Vanished);
    }

    /// A `dbus-daemon` of our own, killed on drop.
    struct PrivateBus {
        daemon: Child,
        address: String,
    }

    impl PrivateBus {
        fn spawn() -> Option<Self> {
            let mut daemon = Command::new("dbus-daemon")
                .args(["--session", "--nofork", "--print-address"])
                .stdout(Stdio::piped())
                .spawn()
                .ok()?;
            let mut address = String::new();
            BufReader::new(daemon.stdout.take()?).read_line(&mut address).ok()?;
            Some(PrivateBus { daemon, address: address.trim().to_string() })
        }

        fn connect(&self) -> zbus::ConnectionBuilder<'static> {
            zbus::ConnectionBuilder::address(self.address.as_str()).unwrap()
        }
    }

    impl Drop for PrivateBus {
        fn drop(&mut self) {
            let _ = self.daemon.kill();
            let _ = self.daemon.wait();
        }
    }

    async fn emit(con: &zbus::Connection, member: &str, body: &(impl serde::Serialize + DynamicType)) {
        con.emit_signal(None::<zbus::names::BusName<'_>>, PURPLE.object_path, PURPLE.interface, member, body).await.unwrap();
    }

    async fn next_payload(recv: &mut tokio::sync::mpsc::UnboundedReceiver<Envelope>) -> Payload {
        let envelope = tokio::time::timeout(Duration::from_secs(5), recv.recv()).await.unwrap().unwrap();
        assert_eq!(envelope.backend, PURPLE.tag);
        envelope.payload
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_forwarding_on_a_session_bus() {
        let Some(bus) = PrivateBus::spawn() else {
            eprintln!("dbus-daemon not available, skipping");
            return;
        };
        let con = bus.connect().build().await.unwrap();
        let (events, mut recv) = tokio::sync::mpsc::unbounded_channel();
        let mut transport = ZbusTransport::new(con, events);

        let watch = HandleId::next();
        let _watch = transport.watch_presence(&PURPLE, watch).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let pidgin = bus.connect().name(PURPLE.bus_name).unwrap().build().await.unwrap();
        let owner = pidgin.unique_name().unwrap().to_string();
        assert_eq!(next_payload(&mut recv).await, Payload::Presence { watch, change: PresenceChange::Appeared { owner } });

        let subscription = HandleId::next();
        let _subscription = transport.subscribe(&PURPLE, subscription).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        emit(&pidgin, "DisplayedImMsg", &(1i32, "bob", "first", 7i32, 0i32)).await;
        emit(&pidgin, "DisplayedImMsg", &("oops",)).await;
        emit(&pidgin, "ConversationUpdated", &(7i32, 0u32)).await;
        emit(&pidgin, "DisplayedImMsg", &(1i32, "bob", "second", 7i32, 0i32)).await;

        assert_eq!(next_payload(&mut recv).await, Payload::Signal { subscription, event: displayed_event("bob", "first") });
        assert_eq!(
            next_payload(&mut recv).await,
            Payload::Signal { subscription, event: SignalEvent::ConversationUpdated(ConversationUpdateEvent { conversation_id: 7, flags: 0 }) }
        );
        assert_eq!(next_payload(&mut recv).await, Payload::Signal { subscription, event: displayed_event("bob", "second") });

        pidgin.release_name(PURPLE.bus_name).await.unwrap();
        assert_eq!(next_payload(&mut recv).await, Payload::Presence { watch, change: PresenceChange::Vanished });
    }
}
