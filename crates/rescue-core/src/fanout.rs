//! Notification fanout hub.
//!
//! Routes every committed [`DispatchEvent`] to the shared dispatch audience
//! and mirrors call events to the audience of the responder bound to that
//! call. Delivery is best-effort over in-memory broadcast channels:
//! publishing never blocks and never fails the mutation that produced the
//! event.
//!
//! Membership is explicit. [`FanoutHub::subscribe_dispatch`] and
//! [`FanoutHub::subscribe_responder`] return a [`Subscription`] guard, and
//! dropping the guard ends membership. A responder audience with no members
//! left is pruned.
//!
//! A member that (re)connects subscribes first, then reads a snapshot, then
//! runs every event through a [`ResyncFilter`] seeded from that snapshot.
//! Events the snapshot already reflects are dropped instead of replayed.
//! A member that falls further behind than the buffer gets [`Feed::Lagged`]
//! and must resync from a fresh snapshot before forwarding anything else.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use rescue_types::{DispatchEvent, EntityKey, ResponderId, Snapshot};
use tokio::sync::broadcast;
use tracing::{debug, warn};

type Sender = broadcast::Sender<Arc<DispatchEvent>>;
type ResponderChannels = Arc<Mutex<BTreeMap<ResponderId, Sender>>>;

/// Which audience a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every dispatch console.
    Dispatch,
    /// One responder's devices.
    Responder(ResponderId),
}

/// What a subscription yields next.
#[derive(Debug, Clone)]
pub enum Feed {
    /// The next event for this member.
    Event(Arc<DispatchEvent>),
    /// The member fell behind and this many events were dropped. Its view
    /// is stale until it reads a fresh snapshot.
    Lagged(u64),
}

/// How many members an event reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Dispatch audience members.
    pub dispatch: usize,
    /// Members of the bound responder's audience.
    pub responder: usize,
}

/// The fanout hub.
#[derive(Debug)]
pub struct FanoutHub {
    capacity: usize,
    dispatch: Sender,
    responders: ResponderChannels,
}

impl FanoutHub {
    /// Create a hub whose audiences buffer up to `capacity` events per
    /// member. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (dispatch, _) = broadcast::channel(capacity);
        Self {
            capacity,
            dispatch,
            responders: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Enqueue an event for its audiences.
    ///
    /// Returns how many members it reached; zero members is not an error.
    pub fn publish(&self, event: DispatchEvent) -> Delivery {
        let event = Arc::new(event);
        // send only fails when the audience is empty.
        let dispatch = self.dispatch.send(Arc::clone(&event)).unwrap_or(0);
        let responder = event.responder().map_or(0, |id| {
            lock(&self.responders)
                .get(&id)
                .map_or(0, |tx| tx.send(Arc::clone(&event)).unwrap_or(0))
        });
        debug!(
            kind = ?event.kind,
            action = ?event.action,
            dispatch,
            responder,
            "event published"
        );
        Delivery { dispatch, responder }
    }

    /// Join the dispatch audience.
    pub fn subscribe_dispatch(&self) -> Subscription {
        debug!("dispatch member joined");
        Subscription {
            audience: Audience::Dispatch,
            rx: self.dispatch.subscribe(),
            responders: Arc::clone(&self.responders),
        }
    }

    /// Join one responder's audience, creating it if needed.
    pub fn subscribe_responder(&self, id: ResponderId) -> Subscription {
        let rx = lock(&self.responders)
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!(responder = %id, "responder member joined");
        Subscription {
            audience: Audience::Responder(id),
            rx,
            responders: Arc::clone(&self.responders),
        }
    }

    /// Members of the dispatch audience.
    pub fn dispatch_members(&self) -> usize {
        self.dispatch.receiver_count()
    }

    /// Members of one responder's audience.
    pub fn responder_members(&self, id: ResponderId) -> usize {
        lock(&self.responders)
            .get(&id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Responder audiences with at least one member.
    pub fn responder_audiences(&self) -> usize {
        lock(&self.responders).len()
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Membership in one audience. Dropping it leaves the audience.
#[derive(Debug)]
pub struct Subscription {
    audience: Audience,
    rx: broadcast::Receiver<Arc<DispatchEvent>>,
    responders: ResponderChannels,
}

impl Subscription {
    /// The audience this subscription belongs to.
    pub const fn audience(&self) -> Audience {
        self.audience
    }

    /// Wait for the next event.
    ///
    /// A member that fell behind gets [`Feed::Lagged`] once; the following
    /// call resumes at the oldest event still buffered. Returns `None` once
    /// the hub is gone.
    pub async fn recv(&mut self) -> Option<Feed> {
        match self.rx.recv().await {
            Ok(event) => Some(Feed::Event(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(audience = ?self.audience, skipped, "member lagged, resync required");
                Some(Feed::Lagged(skipped))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Audience::Responder(id) = self.audience {
            let mut channels = lock(&self.responders);
            // Our own receiver is still counted until this body returns.
            if channels.get(&id).is_some_and(|tx| tx.receiver_count() <= 1) {
                channels.remove(&id);
                debug!(responder = %id, "responder audience pruned");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops events a member's snapshot already reflects.
///
/// Tracks the highest revision seen per entity. An event passes only if it
/// carries a newer revision than anything the member has already been sent.
#[derive(Debug, Clone, Default)]
pub struct ResyncFilter {
    seen: BTreeMap<EntityKey, u64>,
}

impl ResyncFilter {
    /// Seed a filter from the snapshot just sent to the member.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut filter = Self::default();
        filter.absorb(snapshot);
        filter
    }

    /// Fold a fresh snapshot into the filter.
    pub fn absorb(&mut self, snapshot: &Snapshot) {
        for (key, revision) in snapshot.revisions() {
            let seen = self.seen.entry(key).or_insert(0);
            *seen = (*seen).max(revision);
        }
    }

    /// Whether `event` should be forwarded. Admitted events are recorded.
    pub fn admit(&mut self, event: &DispatchEvent) -> bool {
        let revision = event.payload.revision();
        let seen = self.seen.entry(event.payload.key()).or_insert(0);
        if revision <= *seen {
            return false;
        }
        *seen = revision;
        true
    }
}
