//! Debounced delivery of catalog invalidations.
//!
//! Mutation events tend to arrive in bursts (a create followed by a photo
//! upload, several edits in a row). [`run_invalidation_listener`] restarts
//! a per-kind timer on every event and tells the [`CatalogObserver`] once
//! the timer for that kind runs out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::bus::{CatalogEvent, CatalogEventKind};

// ---------------------------------------------------------------------------
// InvalidationReason / CatalogObserver
// ---------------------------------------------------------------------------

/// Why the catalog must be refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InvalidationReason {
    /// One or more mutation events of `kind`, coalesced by the debouncer.
    Event {
        kind: CatalogEventKind,
        coalesced: usize,
    },
    /// Periodic background reload.
    Poll,
    /// Explicitly requested by the caller.
    Manual,
}

impl InvalidationReason {
    /// Whether the backend should be asked to bypass its caches.
    pub fn forces_refresh(self) -> bool {
        !matches!(self, InvalidationReason::Poll)
    }
}

/// Receives catalog invalidations.
#[async_trait]
pub trait CatalogObserver: Send + Sync {
    async fn on_catalog_invalidated(&self, reason: InvalidationReason);
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    count: usize,
}

/// Per-kind trailing-edge debounce state.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: HashMap<CatalogEventKind, Pending>,
}

impl Debouncer {
    /// Record an event at `now`, restarting the timer for its kind.
    pub fn push(&mut self, kind: CatalogEventKind, now: Instant) {
        let deadline = now + kind.debounce_delay();
        self.pending
            .entry(kind)
            .and_modify(|p| {
                p.deadline = deadline;
                p.count += 1;
            })
            .or_insert(Pending { deadline, count: 1 });
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every kind whose deadline is at or before `now`,
    /// ordered by deadline.
    pub fn take_due(&mut self, now: Instant) -> Vec<InvalidationReason> {
        let mut due: Vec<(CatalogEventKind, Pending)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (*k, *p))
            .collect();
        due.sort_by_key(|(kind, p)| (p.deadline, *kind));

        due.into_iter()
            .map(|(kind, p)| {
                self.pending.remove(&kind);
                InvalidationReason::Event {
                    kind,
                    coalesced: p.count,
                }
            })
            .collect()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Listener loop
// ---------------------------------------------------------------------------

/// Consume bus events until `cancel` fires or the bus is dropped.
///
/// A lagged receiver has missed events of unknown kind; it schedules a
/// `character-updated` invalidation so the catalog is refetched anyway.
pub async fn run_invalidation_listener<O>(
    mut events: broadcast::Receiver<CatalogEvent>,
    observer: Arc<O>,
    cancel: CancellationToken,
) where
    O: CatalogObserver + ?Sized,
{
    let mut debouncer = Debouncer::default();

    loop {
        let deadline = debouncer.next_deadline();
        let wait = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Invalidation listener cancelled");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => debouncer.push(event.kind, Instant::now()),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Invalidation listener lagged behind the bus");
                    debouncer.push(CatalogEventKind::CharacterUpdated, Instant::now());
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Event bus closed, stopping invalidation listener");
                    break;
                }
            },
            _ = wait => {
                for reason in debouncer.take_due(Instant::now()) {
                    tracing::info!(?reason, "Catalog invalidated");
                    observer.on_catalog_invalidated(reason).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        reasons: Mutex<Vec<InvalidationReason>>,
    }

    impl Recorder {
        fn reasons(&self) -> Vec<InvalidationReason> {
            self.reasons.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogObserver for Recorder {
        async fn on_catalog_invalidated(&self, reason: InvalidationReason) {
            self.reasons.lock().unwrap().push(reason);
        }
    }

    #[test]
    fn push_restarts_the_timer_and_counts() {
        let start = Instant::now();
        let mut d = Debouncer::default();
        d.push(CatalogEventKind::CharacterCreated, start);
        d.push(CatalogEventKind::CharacterCreated, start + Duration::from_millis(400));

        assert!(d.take_due(start + Duration::from_millis(1000)).is_empty());
        let due = d.take_due(start + Duration::from_millis(1400));
        assert_eq!(
            due,
            vec![InvalidationReason::Event {
                kind: CatalogEventKind::CharacterCreated,
                coalesced: 2
            }]
        );
        assert!(d.is_idle());
    }

    #[test]
    fn kinds_fire_in_deadline_order() {
        let start = Instant::now();
        let mut d = Debouncer::default();
        d.push(CatalogEventKind::CharacterPhotosUpdated, start);
        d.push(CatalogEventKind::CharacterDeleted, start);
        d.push(CatalogEventKind::CharacterUpdated, start);

        assert_eq!(d.next_deadline(), Some(start + Duration::from_millis(300)));
        let kinds: Vec<_> = d
            .take_due(start + Duration::from_secs(3))
            .into_iter()
            .map(|r| match r {
                InvalidationReason::Event { kind, .. } => kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                CatalogEventKind::CharacterDeleted,
                CatalogEventKind::CharacterUpdated,
                CatalogEventKind::CharacterPhotosUpdated,
            ]
        );
    }

    #[test]
    fn poll_does_not_force_refresh() {
        assert!(!InvalidationReason::Poll.forces_refresh());
        assert!(InvalidationReason::Manual.forces_refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn listener_coalesces_bursts() {
        let bus = EventBus::default();
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_invalidation_listener(
            bus.subscribe(),
            recorder.clone(),
            cancel.clone(),
        ));

        bus.publish(CatalogEvent::new(CatalogEventKind::CharacterCreated));
        tokio::time::sleep(Duration::from_millis(500)).await;
        bus.publish(CatalogEvent::new(CatalogEventKind::CharacterCreated));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(recorder.reasons().is_empty(), "timer restarted by second event");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            recorder.reasons(),
            vec![InvalidationReason::Event {
                kind: CatalogEventKind::CharacterCreated,
                coalesced: 2
            }]
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn listener_stops_when_bus_is_dropped() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        drop(bus);

        run_invalidation_listener(rx, Arc::new(Recorder::default()), CancellationToken::new()).await;
    }
}
