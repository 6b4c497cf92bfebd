use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::model::EntityKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// The whole collection was written at once.
    Replaced,
    Imported,
    /// The cache entry was dropped; nothing was written.
    Invalidated,
}

/// Published after a collection changed, before the writer regains control.
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidationEvent {
    pub kind: EntityKind,
    pub change: ChangeKind,
    pub ids: Vec<String>,
    pub at: DateTime<Utc>,
}

impl InvalidationEvent {
    pub fn new(kind: EntityKind, change: ChangeKind, ids: Vec<String>) -> Self {
        Self {
            kind,
            change,
            ids,
            at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Which collections a subscriber wants to hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interest {
    All,
    Kinds(Vec<EntityKind>),
}

impl Interest {
    pub fn only(kind: EntityKind) -> Self {
        Self::Kinds(vec![kind])
    }

    fn matches(&self, kind: EntityKind) -> bool {
        match self {
            Self::All => true,
            Self::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

type Callback = Box<dyn FnMut(&InvalidationEvent)>;

enum Sink {
    Callback(Callback),
    Channel(Sender<InvalidationEvent>),
}

struct Subscriber {
    id: SubscriptionId,
    interest: Interest,
    sink: Sink,
}

/// Synchronous publish/subscribe for collection changes.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, interest: Interest, callback: F) -> SubscriptionId
    where
        F: FnMut(&InvalidationEvent) + 'static,
    {
        self.push(interest, Sink::Callback(Box::new(callback)))
    }

    /// Channel-backed subscription. The subscription ends when the receiver
    /// is dropped.
    pub fn subscribe_channel(
        &mut self,
        interest: Interest,
    ) -> (SubscriptionId, Receiver<InvalidationEvent>) {
        let (tx, rx) = mpsc::channel();
        let id = self.push(interest, Sink::Channel(tx));
        (id, rx)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivers `event` to every interested subscriber and returns how many
    /// received it.
    pub fn publish(&mut self, event: &InvalidationEvent) -> usize {
        let mut delivered = 0usize;
        self.subscribers.retain_mut(|subscriber| {
            if !subscriber.interest.matches(event.kind) {
                return true;
            }

            match &mut subscriber.sink {
                Sink::Callback(callback) => {
                    callback(event);
                    delivered += 1;
                    true
                }
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                        true
                    } else {
                        trace!(id = subscriber.id.0, "dropping closed channel subscriber");
                        false
                    }
                }
            }
        });
        delivered
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    fn push(&mut self, interest: Interest, sink: Sink) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber { id, interest, sink });
        id
    }
}
