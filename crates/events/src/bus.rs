//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`CatalogEvent`]s.
//! Share one bus via `Arc<EventBus>` between publishers and the
//! invalidation listener.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CatalogEventKind
// ---------------------------------------------------------------------------

/// What happened to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogEventKind {
    CharacterCreated,
    CharacterUpdated,
    CharacterDeleted,
    CharacterPhotosUpdated,
}

impl CatalogEventKind {
    pub const ALL: [CatalogEventKind; 4] = [
        CatalogEventKind::CharacterCreated,
        CatalogEventKind::CharacterUpdated,
        CatalogEventKind::CharacterDeleted,
        CatalogEventKind::CharacterPhotosUpdated,
    ];

    /// Wire name, e.g. `"character-created"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogEventKind::CharacterCreated => "character-created",
            CatalogEventKind::CharacterUpdated => "character-updated",
            CatalogEventKind::CharacterDeleted => "character-deleted",
            CatalogEventKind::CharacterPhotosUpdated => "character-photos-updated",
        }
    }

    /// How long to wait after the last event of this kind before refetching,
    /// giving the backend time to invalidate its own caches.
    pub fn debounce_delay(self) -> Duration {
        match self {
            CatalogEventKind::CharacterCreated => Duration::from_millis(1000),
            CatalogEventKind::CharacterUpdated => Duration::from_millis(500),
            CatalogEventKind::CharacterDeleted => Duration::from_millis(300),
            CatalogEventKind::CharacterPhotosUpdated => Duration::from_millis(2500),
        }
    }
}

impl fmt::Display for CatalogEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown catalog event: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for CatalogEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CatalogEvent
// ---------------------------------------------------------------------------

/// A catalog mutation observed somewhere in the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub kind: CatalogEventKind,

    /// Id of the affected character, when known.
    pub character_id: Option<String>,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl CatalogEvent {
    pub fn new(kind: CatalogEventKind) -> Self {
        Self {
            kind,
            character_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the affected character.
    pub fn with_character(mut self, id: impl Into<String>) -> Self {
        self.character_id = Some(id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// ```rust
/// use charfeed_events::bus::{CatalogEvent, CatalogEventKind, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(CatalogEvent::new(CatalogEventKind::CharacterCreated));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Bus with room for `capacity` undelivered events per receiver.
    ///
    /// A receiver that falls more than `capacity` events behind loses the
    /// oldest ones and sees `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fan an event out to every current subscriber.
    ///
    /// Dropped without error when nobody is subscribed.
    pub fn publish(&self, event: CatalogEvent) {
        tracing::debug!(kind = %event.kind, character_id = ?event.character_id, "Catalog event");
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(CatalogEvent::new(CatalogEventKind::CharacterUpdated).with_character("42"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.kind, CatalogEventKind::CharacterUpdated);
        assert_eq!(received.character_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(CatalogEvent::new(CatalogEventKind::CharacterDeleted));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.kind, CatalogEventKind::CharacterDeleted);
        assert_eq!(e2.kind, CatalogEventKind::CharacterDeleted);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(CatalogEvent::new(CatalogEventKind::CharacterCreated));
    }

    #[test]
    fn wire_names_round_trip() {
        for kind in CatalogEventKind::ALL {
            assert_eq!(kind.as_str().parse::<CatalogEventKind>().unwrap(), kind);
        }
        assert!("character-renamed".parse::<CatalogEventKind>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&CatalogEventKind::CharacterPhotosUpdated).unwrap();
        assert_eq!(json, "\"character-photos-updated\"");
    }

    #[test]
    fn debounce_delays_stay_within_bounds() {
        for kind in CatalogEventKind::ALL {
            let delay = kind.debounce_delay();
            assert!(delay >= Duration::from_millis(300) && delay <= Duration::from_millis(2500));
        }
    }
}
