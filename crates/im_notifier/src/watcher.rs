use crate::*;

/// The bus side of a [`BackendWatcher`].
///
/// Both methods return guards: dropping a guard must stop any further delivery through its
/// handle. Events produced through a handle are sent back to the control loop as [`Envelope`]s
/// tagged with the handle's [`HandleId`].
pub trait Transport {
    type Watch;
    type Subscription;

    /// Start reporting [`PresenceChange`]s for `backend.bus_name`, including its current state.
    fn watch_presence(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<Self::Watch>;

    /// Connect to the backend's message and conversation signals.
    fn subscribe(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<Self::Subscription>;
}

#[derive(Debug)]
struct Held<G> {
    id: HandleId,
    _guard: G,
}

/// Tracks one chat backend on the bus, holding exactly one live subscription while it is present.
pub struct BackendWatcher<T: Transport> {
    backend: &'static BackendIdentity,
    watch: Option<Held<T::Watch>>,
    subscription: Option<Held<T::Subscription>>,
}

impl<T: Transport> std::fmt::Debug for BackendWatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendWatcher")
            .field("backend", &self.backend.tag)
            .field("watch", &self.watch.as_ref().map(|w| w.id))
            .field("subscription", &self.subscription.as_ref().map(|s| s.id))
            .finish()
    }
}

impl<T: Transport> BackendWatcher<T> {
    pub fn new(backend: &'static BackendIdentity) -> Self {
        BackendWatcher { backend, watch: None, subscription: None }
    }

    pub fn backend(&self) -> &'static BackendIdentity {
        self.backend
    }

    pub fn is_started(&self) -> bool {
        self.watch.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Register the presence watch. Starting a watcher that is already started is rejected.
    pub fn start(&mut self, transport: &mut T) -> Result<()> {
        if self.watch.is_some() {
            log::warn!("[{}] watcher started twice, ignoring", self.backend.tag);
            return Err(Error::AlreadyStarted(self.backend.tag));
        }
        let id = HandleId::next();
        let guard = transport.watch_presence(self.backend, id)?;
        log::debug!("[{}] watching {} (watch {})", self.backend.tag, self.backend.bus_name, id);
        self.watch = Some(Held { id, _guard: guard });
        Ok(())
    }

    /// Release the subscription and the presence watch. Safe to call in any state.
    pub fn stop(&mut self) {
        self.release_subscription();
        if let Some(watch) = self.watch.take() {
            log::debug!("[{}] stopped watching (watch {})", self.backend.tag, watch.id);
        }
    }

    /// Handle an event addressed to this watcher. Events that arrive through a handle this watcher
    /// no longer holds are dropped.
    pub fn handle(&mut self, payload: Payload, transport: &mut T, reconciler: &mut Reconciler, windows: &dyn WindowTracker) {
        match payload {
            Payload::Presence { watch, change } => {
                if self.watch.as_ref().map(|w| w.id) != Some(watch) {
                    log::debug!("[{}] dropping presence change from stale watch {}", self.backend.tag, watch);
                    return;
                }
                match change {
                    PresenceChange::Appeared { owner } => self.on_appeared(&owner, transport),
                    PresenceChange::Vanished => {
                        self.on_vanished();
                        reconciler.backend_gone(self.backend);
                    }
                }
            }
            Payload::Signal { subscription, event } => {
                if self.subscription.as_ref().map(|s| s.id) != Some(subscription) {
                    log::debug!("[{}] dropping signal from stale subscription {}", self.backend.tag, subscription);
                    return;
                }
                match event {
                    SignalEvent::MessageDisplayed(event) => {
                        reconciler.message_displayed(self.backend, &event, windows);
                    }
                    SignalEvent::ConversationUpdated(event) => {
                        reconciler.conversation_updated(self.backend, &event);
                    }
                }
            }
        }
    }

    fn on_appeared(&mut self, owner: &str, transport: &mut T) {
        log::info!("[{}] {} appeared on the bus ({})", self.backend.tag, self.backend.bus_name, owner);
        if self.release_subscription() {
            log::debug!("[{}] reconnecting, previous owner left unnoticed", self.backend.tag);
        }
        let id = HandleId::next();
        match transport.subscribe(self.backend, id) {
            Ok(guard) => {
                log::debug!("[{}] subscribed (subscription {})", self.backend.tag, id);
                self.subscription = Some(Held { id, _guard: guard });
            }
            Err(err) => log::error!("[{}] failed to subscribe to {}: {}", self.backend.tag, self.backend.interface, err),
        }
    }

    fn on_vanished(&mut self) {
        log::info!("[{}] {} left the bus", self.backend.tag, self.backend.bus_name);
        self.release_subscription();
    }

    fn release_subscription(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => {
                log::debug!("[{}] released subscription {}", self.backend.tag, subscription.id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{message, FakeTransport, FakeWindows, RecordingSink};
    use pretty_assertions::assert_eq;

    struct Fixture {
        transport: FakeTransport,
        watcher: BackendWatcher<FakeTransport>,
        reconciler: Reconciler,
        windows: FakeWindows,
    }

    impl Fixture {
        fn new() -> Self {
            let mut transport = FakeTransport::default();
            let mut watcher = BackendWatcher::new(&PURPLE);
            watcher.start(&mut transport).unwrap();
            Fixture {
                transport,
                watcher,
                reconciler: Reconciler::new(IndicatorState::new(Box::new(RecordingSink::default()))),
                windows: FakeWindows::default(),
            }
        }

        fn deliver(&mut self, payload: Payload) {
            self.watcher.handle(payload, &mut self.transport, &mut self.reconciler, &self.windows);
        }

        fn appear(&mut self) {
            let watch = self.transport.last_watch(PURPLE.tag).unwrap();
            self.deliver(Payload::Presence { watch, change: PresenceChange::Appeared { owner: ":1.42".to_string() } });
        }

        fn vanish(&mut self) {
            let watch = self.transport.last_watch(PURPLE.tag).unwrap();
            self.deliver(Payload::Presence { watch, change: PresenceChange::Vanished });
        }

        fn signal(&mut self, subscription: HandleId, event: SignalEvent) {
            self.deliver(Payload::Signal { subscription, event });
        }
    }

    #[test]
    fn test_duplicate_start_is_rejected() {
        let mut fixture = Fixture::new();
        assert!(matches!(fixture.watcher.start(&mut fixture.transport), Err(Error::AlreadyStarted(tag)) if tag == PURPLE.tag));
        assert_eq!(fixture.transport.live_watches(), 1);
    }

    #[test]
    fn test_stop_without_appearing() {
        let mut fixture = Fixture::new();
        fixture.watcher.stop();
        fixture.watcher.stop();
        assert_eq!(fixture.transport.live_watches(), 0);
        assert_eq!(fixture.transport.live_subscriptions(), 0);

        // can be started again after stopping
        fixture.watcher.start(&mut fixture.transport).unwrap();
        assert_eq!(fixture.transport.live_watches(), 1);
    }

    #[test]
    fn test_appear_twice_reconnects_once() {
        let mut fixture = Fixture::new();
        fixture.appear();
        assert_eq!(fixture.transport.live_subscriptions(), 1);
        let first = fixture.transport.last_subscription(PURPLE.tag).unwrap();

        fixture.appear();
        assert_eq!(fixture.transport.live_subscriptions(), 1);
        assert_eq!(fixture.transport.subscribe_calls(), 2);
        let second = fixture.transport.last_subscription(PURPLE.tag).unwrap();
        assert_ne!(first, second);

        // deliveries through the replaced handle are not processed
        fixture.signal(first, SignalEvent::MessageDisplayed(message(1, "bob", "hi", 5, 0)));
        assert!(!fixture.reconciler.indicator().is_visible());
        fixture.signal(second, SignalEvent::MessageDisplayed(message(1, "bob", "hi", 5, 0)));
        assert!(fixture.reconciler.indicator().is_visible());
    }

    #[test]
    fn test_vanish_releases_and_clears() {
        let mut fixture = Fixture::new();
        fixture.appear();
        let subscription = fixture.transport.last_subscription(PURPLE.tag).unwrap();
        fixture.signal(subscription, SignalEvent::MessageDisplayed(message(1, "bob", "hi", 5, 0)));
        assert!(fixture.reconciler.indicator().is_visible());

        fixture.vanish();
        assert!(!fixture.watcher.is_subscribed());
        assert_eq!(fixture.transport.live_subscriptions(), 0);
        assert!(!fixture.reconciler.indicator().is_visible());

        // an event that was already queued before the backend left
        fixture.signal(subscription, SignalEvent::MessageDisplayed(message(1, "bob", "late", 5, 0)));
        assert!(!fixture.reconciler.indicator().is_visible());

        fixture.appear();
        assert_eq!(fixture.transport.live_subscriptions(), 1);
        assert_eq!(fixture.transport.subscribe_calls(), 2);
    }

    #[test]
    fn test_presence_from_stale_watch_is_dropped() {
        let mut fixture = Fixture::new();
        let old_watch = fixture.transport.last_watch(PURPLE.tag).unwrap();
        fixture.watcher.stop();
        fixture.watcher.start(&mut fixture.transport).unwrap();

        fixture.deliver(Payload::Presence { watch: old_watch, change: PresenceChange::Appeared { owner: ":1.7".to_string() } });
        assert!(!fixture.watcher.is_subscribed());
        assert_eq!(fixture.transport.subscribe_calls(), 0);
    }

    #[test]
    fn test_failed_subscribe_leaves_watcher_unsubscribed() {
        let mut fixture = Fixture::new();
        fixture.transport.fail_next_subscribe();
        fixture.appear();
        assert!(!fixture.watcher.is_subscribed());
        assert!(fixture.watcher.is_started());

        fixture.appear();
        assert!(fixture.watcher.is_subscribed());
    }
}
