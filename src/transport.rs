//! Broadcast channel contract and an in-process implementation.
//!
//! The channel is fire-and-forget pub/sub scoped to a named room. A published
//! message reaches every *other* connected subscriber of the room at most once.
//! Nothing is persisted: a subscriber that is disconnected while a message is
//! published never sees it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::TransportError;
use crate::wire::MAX_PAYLOAD_BYTES;

/// Default per-subscriber queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Channel name for a lobby code.
#[must_use]
pub fn room_channel(code: &str) -> String {
    format!("battle:{code}")
}

/// One message as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Event name, e.g. `player_move`.
    pub event: String,
    /// Raw JSON payload.
    pub payload: Vec<u8>,
}

/// Publishing half of a room subscription.
pub trait BroadcastChannel: Send {
    /// Fire-and-forget publish to every other subscriber of the room.
    ///
    /// # Errors
    ///
    /// `Unavailable` while disconnected; `PayloadTooLarge` above the limit.
    fn publish(&self, event: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Whether publishes can currently go out.
    fn is_connected(&self) -> bool;
}

impl<C: BroadcastChannel + ?Sized> BroadcastChannel for Box<C> {
    fn publish(&self, event: &str, payload: &[u8]) -> Result<(), TransportError> {
        (**self).publish(event, payload)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: Uuid,
    tx: Sender<Envelope>,
    connected: Arc<AtomicBool>,
}

#[derive(Debug)]
struct BusInner {
    rooms: Mutex<HashMap<String, Vec<Subscriber>>>,
    capacity: usize,
    dropped: AtomicU64,
}

/// In-process room hub.
///
/// Cloning yields another handle to the same hub.
#[derive(Debug, Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalBus {
    /// Creates a hub whose subscriber queues hold `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                rooms: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes to `room`, returning the publisher and the delivery queue.
    pub fn join(&self, room: &str) -> (LocalChannel, Receiver<Envelope>) {
        let (tx, rx) = bounded(self.inner.capacity);
        let id = Uuid::new_v4();
        let connected = Arc::new(AtomicBool::new(true));

        self.inner
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room.to_string())
            .or_default()
            .push(Subscriber {
                id,
                tx,
                connected: Arc::clone(&connected),
            });
        debug!(room, subscriber = %id, "joined room");

        let channel = LocalChannel {
            bus: self.clone(),
            room: room.to_string(),
            id,
            connected,
        };
        (channel, rx)
    }

    /// Current subscriber count of `room`.
    #[must_use]
    pub fn subscribers(&self, room: &str) -> usize {
        self.inner
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room)
            .map_or(0, Vec::len)
    }

    /// Deliveries dropped because a subscriber queue was full or gone.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, room: &str, from: Uuid, envelope: &Envelope) {
        let mut rooms = self.inner.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = rooms.get_mut(room) else {
            return;
        };

        for sub in subs.iter().filter(|s| s.id != from) {
            if !sub.connected.load(Ordering::Acquire) {
                trace!(room, subscriber = %sub.id, "skipping disconnected subscriber");
                continue;
            }
            match sub.tx.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn leave(&self, room: &str, id: Uuid) {
        let mut rooms = self.inner.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subs) = rooms.get_mut(room) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                rooms.remove(room);
            }
        }
    }
}

/// A subscriber's handle on a [`LocalBus`] room.
///
/// Dropping it leaves the room.
pub struct LocalChannel {
    bus: LocalBus,
    room: String,
    id: Uuid,
    connected: Arc<AtomicBool>,
}

impl fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChannel")
            .field("room", &self.room)
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl LocalChannel {
    /// Subscriber id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Room name.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Simulates a dropped connection: publishes fail and deliveries are missed.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        debug!(room = %self.room, subscriber = %self.id, "disconnected");
    }

    /// Restores the connection. Messages published meanwhile are not replayed.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::Release);
        debug!(room = %self.room, subscriber = %self.id, "reconnected");
    }

    /// A second handle sharing this subscription's connection state.
    ///
    /// Useful for toggling the connection from outside the thread that owns
    /// the channel. Only the original handle leaves the room on drop.
    #[must_use]
    pub fn link(&self) -> ConnectionLink {
        ConnectionLink {
            connected: Arc::clone(&self.connected),
        }
    }
}

impl BroadcastChannel for LocalChannel {
    fn publish(&self, event: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Unavailable {
                channel: self.room.clone(),
            });
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }

        let envelope = Envelope {
            event: event.to_string(),
            payload: payload.to_vec(),
        };
        self.bus.deliver(&self.room, self.id, &envelope);
        trace!(room = %self.room, event, bytes = payload.len(), "published");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.bus.leave(&self.room, self.id);
    }
}

/// Remote control over a [`LocalChannel`]'s connection flag.
#[derive(Debug, Clone)]
pub struct ConnectionLink {
    connected: Arc<AtomicBool>,
}

impl ConnectionLink {
    /// See [`LocalChannel::disconnect`].
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// See [`LocalChannel::reconnect`].
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Current state.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
