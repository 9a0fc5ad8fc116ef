use crate::*;

struct Active<T: Transport> {
    watchers: Vec<BackendWatcher<T>>,
    reconciler: Reconciler,
}

/// The enable/disable lifecycle around the watchers and the indicator.
///
/// Everything an activation creates (watchers, their subscriptions, the indicator) is dropped by
/// [`Notifier::disable`]; events that reach the notifier while it is disabled are discarded.
pub struct Notifier<T: Transport> {
    transport: T,
    windows: Box<dyn WindowTracker>,
    backends: Vec<&'static BackendIdentity>,
    active: Option<Active<T>>,
}

impl<T: Transport> std::fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("backends", &self.backends.iter().map(|b| b.tag).collect::<Vec<_>>())
            .field("watchers", &self.active.as_ref().map(|a| &a.watchers))
            .field("indicator", &self.active.as_ref().map(|a| a.reconciler.indicator()))
            .finish()
    }
}

impl<T: Transport> Notifier<T> {
    pub fn new(transport: T, windows: Box<dyn WindowTracker>, backends: impl IntoIterator<Item = &'static BackendIdentity>) -> Self {
        let mut unique: Vec<&'static BackendIdentity> = Vec::new();
        for backend in backends {
            if unique.iter().any(|known| known.tag == backend.tag) {
                log::warn!("backend {} configured more than once", backend.tag);
            } else {
                unique.push(backend);
            }
        }
        Notifier { transport, windows, backends: unique, active: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Create the indicator and start watching every configured backend. Enabling an enabled
    /// notifier does nothing.
    pub fn enable(&mut self, sink: Box<dyn IndicatorSink>) {
        if self.active.is_some() {
            log::debug!("notifier already enabled");
            return;
        }
        let reconciler = Reconciler::new(IndicatorState::new(sink));
        let mut watchers = Vec::with_capacity(self.backends.len());
        for backend in self.backends.iter().copied() {
            let mut watcher = BackendWatcher::new(backend);
            if let Err(err) = watcher.start(&mut self.transport) {
                log::error!("failed to watch {}: {}", backend.bus_name, err);
            }
            watchers.push(watcher);
        }
        log::info!("watching {} backend(s)", watchers.len());
        self.active = Some(Active { watchers, reconciler });
    }

    /// Stop all watchers and tear down the indicator. Disabling a disabled notifier does nothing.
    pub fn disable(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        for watcher in &mut active.watchers {
            watcher.stop();
        }
        active.reconciler.teardown();
        log::info!("notifier disabled");
    }

    /// Route an event from the transport to the watcher of its backend.
    pub fn dispatch(&mut self, envelope: Envelope) {
        let Some(active) = &mut self.active else {
            log::debug!("dropping event for {} while disabled", envelope.backend);
            return;
        };
        match active.watchers.iter_mut().find(|watcher| watcher.backend().tag == envelope.backend) {
            Some(watcher) => watcher.handle(envelope.payload, &mut self.transport, &mut active.reconciler, &*self.windows),
            None => log::warn!("received event for unknown backend {}", envelope.backend),
        }
    }

    /// The indicator was clicked.
    pub fn activate(&mut self) -> Option<Activation> {
        let active = self.active.as_mut()?;
        let activation = active.reconciler.activate(&*self.windows);
        log::debug!("activated: {:?}", activation);
        activation
    }

    pub fn indicator(&self) -> Option<&IndicatorState> {
        self.active.as_ref().map(|active| active.reconciler.indicator())
    }

    pub fn watchers(&self) -> &[BackendWatcher<T>] {
        self.active.as_ref().map(|active| active.watchers.as_slice()).unwrap_or_default()
    }
}

impl<T: Transport> Drop for Notifier<T> {
    fn drop(&mut self) {
        self.disable();
    }
}
