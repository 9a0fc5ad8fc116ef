//! Events flowing from the bus transport into the control loop.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::BackendTag;

/// `PURPLE_MESSAGE_SYSTEM`: the message was generated by the client, not typed by a person.
pub const MESSAGE_SYSTEM: i32 = 0x04;

/// `PURPLE_CONV_UPDATE_UNSEEN`: the conversation still has content the user has not looked at.
pub const CONV_UPDATE_UNSEEN: u32 = 0x04;

/// A message was displayed in one of the backend's conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEvent {
    pub account: String,
    pub who: String,
    pub text: String,
    pub conversation_id: i32,
    pub flags: i32,
}

impl ConversationEvent {
    pub fn is_system(&self) -> bool {
        self.flags & MESSAGE_SYSTEM != 0
    }
}

/// The unseen-state of a conversation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationUpdateEvent {
    pub conversation_id: i32,
    pub flags: u32,
}

impl ConversationUpdateEvent {
    pub fn is_unseen(&self) -> bool {
        self.flags & CONV_UPDATE_UNSEEN != 0
    }
}

/// Identifies one presence watch or one signal subscription of a watcher.
///
/// Ids are never reused, so an event carrying an id that the watcher no longer holds
/// was sent through a handle that has since been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct HandleId(pub u64);

impl HandleId {
    /// Allocate an id that is unique for the lifetime of the process, so that no handle of a
    /// previous enable/disable cycle can be mistaken for a current one.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HandleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// The backend's bus name got an owner (or changed owner).
    Appeared { owner: String },
    /// The backend's bus name lost its owner.
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    MessageDisplayed(ConversationEvent),
    ConversationUpdated(ConversationUpdateEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Presence { watch: HandleId, change: PresenceChange },
    Signal { subscription: HandleId, event: SignalEvent },
}

/// A single event, addressed to the watcher of `backend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub backend: BackendTag,
    pub payload: Payload,
}
