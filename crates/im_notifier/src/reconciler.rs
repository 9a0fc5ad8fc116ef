use crate::{BackendIdentity, ConversationEvent, ConversationUpdateEvent, IndicatorState, WindowId, WindowTracker};

/// What the reconciler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The backend now contributes to the indicator.
    Shown,
    /// The backend's contribution was withdrawn.
    Hidden,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SystemMessage,
    AppFocused,
    StillUnseen,
    NotContributing,
}

/// Result of clicking the indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub backend: crate::BackendTag,
    pub focused: Option<WindowId>,
    pub decision: Decision,
}

/// Turns raw backend events into indicator decisions.
///
/// The reconciler owns the [`IndicatorState`]; nothing else mutates it.
#[derive(Debug)]
pub struct Reconciler {
    indicator: IndicatorState,
}

impl Reconciler {
    pub fn new(indicator: IndicatorState) -> Self {
        Reconciler { indicator }
    }

    pub fn indicator(&self) -> &IndicatorState {
        &self.indicator
    }

    pub fn message_displayed(
        &mut self,
        backend: &'static BackendIdentity,
        event: &ConversationEvent,
        windows: &dyn WindowTracker,
    ) -> Decision {
        let decision = if event.is_system() {
            Decision::Ignored(IgnoreReason::SystemMessage)
        } else if windows.focused_app_id().as_deref() == Some(backend.app_id) {
            Decision::Ignored(IgnoreReason::AppFocused)
        } else {
            self.indicator.show(backend);
            Decision::Shown
        };
        log::debug!(
            "[{}] message in conversation {} from {:?} (flags {:#x}): {:?}",
            backend.tag,
            event.conversation_id,
            event.who,
            event.flags,
            decision
        );
        decision
    }

    pub fn conversation_updated(&mut self, backend: &'static BackendIdentity, event: &ConversationUpdateEvent) -> Decision {
        let decision = if event.is_unseen() { Decision::Ignored(IgnoreReason::StillUnseen) } else { self.withdraw(backend) };
        log::debug!("[{}] conversation {} updated (flags {:#x}): {:?}", backend.tag, event.conversation_id, event.flags, decision);
        decision
    }

    /// The backend left the bus. Its remaining unseen state can't be queried anymore, so its
    /// contribution is withdrawn unconditionally.
    pub fn backend_gone(&mut self, backend: &'static BackendIdentity) -> Decision {
        let decision = self.withdraw(backend);
        log::debug!("[{}] backend gone: {:?}", backend.tag, decision);
        decision
    }

    /// Handle a click on the indicator: focus a window of the click target, and for backends that
    /// never report conversations as seen, treat the click as reading them.
    pub fn activate(&mut self, windows: &dyn WindowTracker) -> Option<Activation> {
        let backend = self.indicator.click_backend()?;

        let focused = windows.find_windows(backend.app_id, backend.conversation_window_role).into_iter().next();
        match focused {
            Some(window) => {
                if let Err(err) = windows.focus(window) {
                    log::error!("[{}] failed to focus window {}: {}", backend.tag, window, err);
                }
            }
            None => log::info!("[{}] no {} window to focus", backend.tag, backend.app_id),
        }

        let decision = if backend.clears_on_activate { self.withdraw(backend) } else { Decision::Ignored(IgnoreReason::StillUnseen) };
        Some(Activation { backend: backend.tag, focused, decision })
    }

    /// Release the indicator at the end of an enable/disable cycle.
    pub fn teardown(&mut self) {
        self.indicator.teardown();
    }

    fn withdraw(&mut self, backend: &'static BackendIdentity) -> Decision {
        if self.indicator.hide(backend.tag) {
            Decision::Hidden
        } else {
            Decision::Ignored(IgnoreReason::NotContributing)
        }
    }
}
