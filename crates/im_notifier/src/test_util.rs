use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::*;

pub fn message(account: i32, who: &str, text: &str, conversation_id: i32, flags: i32) -> ConversationEvent {
    ConversationEvent { account: account.to_string(), who: who.to_string(), text: text.to_string(), conversation_id, flags }
}

/// Sink that remembers every view it was handed.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink(Rc<RefCell<Vec<IndicatorView>>>);

impl RecordingSink {
    pub fn views(&self) -> Vec<IndicatorView> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> IndicatorView {
        self.0.borrow().last().cloned().unwrap_or_default()
    }
}

impl IndicatorSink for RecordingSink {
    fn render(&mut self, view: &IndicatorView) {
        self.0.borrow_mut().push(view.clone());
    }
}

#[derive(Debug, Default)]
struct FakeBus {
    live_watches: usize,
    live_subscriptions: usize,
    subscribe_calls: usize,
    fail_next_subscribe: bool,
    last_watch: HashMap<BackendTag, HandleId>,
    last_subscription: HashMap<BackendTag, HandleId>,
}

/// In-memory transport that counts live handles. Clones share their state.
#[derive(Debug, Default, Clone)]
pub struct FakeTransport(Rc<RefCell<FakeBus>>);

#[derive(Debug, Clone, Copy)]
enum GuardKind {
    Watch,
    Subscription,
}

#[derive(Debug)]
pub struct FakeGuard {
    bus: Rc<RefCell<FakeBus>>,
    kind: GuardKind,
}

impl Drop for FakeGuard {
    fn drop(&mut self) {
        let mut bus = self.bus.borrow_mut();
        match self.kind {
            GuardKind::Watch => bus.live_watches -= 1,
            GuardKind::Subscription => bus.live_subscriptions -= 1,
        }
    }
}

impl FakeTransport {
    pub fn live_watches(&self) -> usize {
        self.0.borrow().live_watches
    }

    pub fn live_subscriptions(&self) -> usize {
        self.0.borrow().live_subscriptions
    }

    pub fn subscribe_calls(&self) -> usize {
        self.0.borrow().subscribe_calls
    }

    pub fn fail_next_subscribe(&self) {
        self.0.borrow_mut().fail_next_subscribe = true;
    }

    pub fn last_watch(&self, tag: BackendTag) -> Option<HandleId> {
        self.0.borrow().last_watch.get(&tag).copied()
    }

    pub fn last_subscription(&self, tag: BackendTag) -> Option<HandleId> {
        self.0.borrow().last_subscription.get(&tag).copied()
    }

    /// Build the envelope the bus would send when `tag`'s name gets an owner.
    pub fn appeared(&self, tag: BackendTag) -> Envelope {
        let watch = self.last_watch(tag).expect("backend isn't watched");
        Envelope { backend: tag, payload: Payload::Presence { watch, change: PresenceChange::Appeared { owner: ":1.42".to_string() } } }
    }

    pub fn vanished(&self, tag: BackendTag) -> Envelope {
        let watch = self.last_watch(tag).expect("backend isn't watched");
        Envelope { backend: tag, payload: Payload::Presence { watch, change: PresenceChange::Vanished } }
    }

    pub fn signal(&self, tag: BackendTag, event: SignalEvent) -> Envelope {
        let subscription = self.last_subscription(tag).expect("backend isn't subscribed");
        Envelope { backend: tag, payload: Payload::Signal { subscription, event } }
    }
}

impl Transport for FakeTransport {
    type Watch = FakeGuard;
    type Subscription = FakeGuard;

    fn watch_presence(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<FakeGuard> {
        let mut bus = self.0.borrow_mut();
        bus.live_watches += 1;
        bus.last_watch.insert(backend.tag, id);
        Ok(FakeGuard { bus: self.0.clone(), kind: GuardKind::Watch })
    }

    fn subscribe(&mut self, backend: &'static BackendIdentity, id: HandleId) -> Result<FakeGuard> {
        let mut bus = self.0.borrow_mut();
        bus.subscribe_calls += 1;
        if std::mem::take(&mut bus.fail_next_subscribe) {
            return Err(Error::DbusError(zbus::Error::Failure("subscription refused".to_string())));
        }
        bus.live_subscriptions += 1;
        bus.last_subscription.insert(backend.tag, id);
        Ok(FakeGuard { bus: self.0.clone(), kind: GuardKind::Subscription })
    }
}

#[derive(Debug, Default)]
struct FakeDesktop {
    focused: Option<String>,
    windows: Vec<(WindowId, String, Option<String>)>,
    focus_calls: Vec<WindowId>,
}

/// Window tracker backed by a hand-written list of windows. Clones share their state.
#[derive(Debug, Default, Clone)]
pub struct FakeWindows(Rc<RefCell<FakeDesktop>>);

impl FakeWindows {
    pub fn set_focused(&self, app_id: Option<&str>) {
        self.0.borrow_mut().focused = app_id.map(str::to_string);
    }

    pub fn add_window(&self, id: WindowId, app_id: &str, role: Option<&str>) {
        self.0.borrow_mut().windows.push((id, app_id.to_string(), role.map(str::to_string)));
    }

    pub fn focused_windows(&self) -> Vec<WindowId> {
        self.0.borrow().focus_calls.clone()
    }
}

impl WindowTracker for FakeWindows {
    fn focused_app_id(&self) -> Option<String> {
        self.0.borrow().focused.clone()
    }

    fn find_windows(&self, app_id: &str, role: Option<&str>) -> Vec<WindowId> {
        self.0
            .borrow()
            .windows
            .iter()
            .filter(|(_, app, window_role)| app == app_id && (role.is_none() || window_role.as_deref() == role))
            .map(|(id, ..)| *id)
            .collect()
    }

    fn focus(&self, window: WindowId) -> Result<()> {
        self.0.borrow_mut().focus_calls.push(window);
        Ok(())
    }
}
