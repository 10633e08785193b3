//! Single-owner registry of live subscribers.
//!
//! The hub runs as one task that owns the subscriber map outright; everything
//! else talks to it through a [`HubHandle`]. Publishing never waits on a
//! subscriber: a full queue gets that subscriber evicted, and a full hub inbox
//! drops the event.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::event::DomainEvent;

pub type SubscriberId = Uuid;

/// The hub's end of one subscriber's outbound queue.
///
/// Once the hub drops it the queue closes, which is how the connection learns
/// it has been evicted.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    outbound: mpsc::Sender<Arc<str>>,
}

impl Subscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (outbound, rx) = mpsc::channel(capacity);
        (
            Self {
                id: Uuid::new_v4(),
                outbound,
            },
            rx,
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

enum Command {
    Register(Subscriber),
    Unregister(SubscriberId),
    Publish(DomainEvent),
    Count(oneshot::Sender<usize>),
}

pub struct Hub {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
    inbox: mpsc::Receiver<Command>,
}

impl Hub {
    /// Starts the hub task and returns the only way to reach it.
    pub fn spawn(inbox_capacity: usize) -> HubHandle {
        let (tx, rx) = mpsc::channel(inbox_capacity);
        let hub = Hub {
            subscribers: HashMap::new(),
            inbox: rx,
        };
        tokio::spawn(hub.run());
        HubHandle { inbox: tx }
    }

    async fn run(mut self) {
        info!("Event hub started");
        while let Some(command) = self.inbox.recv().await {
            self.handle(command);
        }
        info!(
            subscribers = self.subscribers.len(),
            "Event hub stopped, closing subscriber queues"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register(subscriber) => {
                let id = subscriber.id;
                if self.subscribers.contains_key(&id) {
                    debug!(subscriber_id = %id, "Subscriber already registered");
                    return;
                }
                self.subscribers.insert(id, subscriber.outbound);
                info!(subscriber_id = %id, total = self.subscribers.len(), "Subscriber registered");
            }
            Command::Unregister(id) => {
                if self.subscribers.remove(&id).is_some() {
                    info!(subscriber_id = %id, total = self.subscribers.len(), "Subscriber unregistered");
                }
            }
            Command::Publish(event) => self.broadcast(&event),
            Command::Count(reply) => {
                let _ = reply.send(self.subscribers.len());
            }
        }
    }

    fn broadcast(&mut self, event: &DomainEvent) {
        if self.subscribers.is_empty() {
            debug!(event = event.name(), "No subscribers, event discarded");
            return;
        }

        let payload: Arc<str> = match event.to_wire() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, event = event.name(), "Failed to serialize event");
                return;
            }
        };

        let mut evicted = Vec::new();
        for (id, queue) in &self.subscribers {
            match queue.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber_id = %id, event = event.name(), "Subscriber queue full, evicting");
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = %id, "Subscriber queue closed, evicting");
                    evicted.push(*id);
                }
            }
        }
        for id in &evicted {
            self.subscribers.remove(id);
        }

        debug!(
            event = event.name(),
            delivered = self.subscribers.len(),
            evicted = evicted.len(),
            "Event broadcast"
        );
    }
}

/// Cheap, cloneable sender side of the hub.
#[derive(Clone)]
pub struct HubHandle {
    inbox: mpsc::Sender<Command>,
}

impl HubHandle {
    pub async fn register(&self, subscriber: Subscriber) {
        if self.inbox.send(Command::Register(subscriber)).await.is_err() {
            warn!("Event hub is not running, subscriber not registered");
        }
    }

    /// Safe to call more than once for the same id.
    pub async fn unregister(&self, id: SubscriberId) {
        if self.inbox.send(Command::Unregister(id)).await.is_err() {
            debug!(subscriber_id = %id, "Event hub is not running, nothing to unregister");
        }
    }

    /// Hands the event to the hub without waiting. Never fails the caller.
    pub fn publish(&self, event: DomainEvent) {
        let name = event.name();
        match self.inbox.try_send(Command::Publish(event)) {
            Ok(()) => debug!(event = name, "Event queued for broadcast"),
            Err(TrySendError::Full(_)) => {
                warn!(event = name, "Event hub inbox full, dropping event")
            }
            Err(TrySendError::Closed(_)) => {
                warn!(event = name, "Event hub is not running, dropping event")
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.inbox.send(Command::Count(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
