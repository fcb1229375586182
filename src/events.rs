//! Site event fan-out for connected clients.
//!
//! One [`EventHub`] is built at startup and handed to the router as an
//! extension. Publishers never block: a slow subscriber lags and skips events
//! rather than holding up writers. Subscriptions are filtered by the
//! subscriber's [`SiteScope`], so a client only hears about its own site.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SiteScope;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AnnouncementCreated,
    AnnouncementDeleted,
    ComplaintCreated,
    ComplaintUpdated,
    DueCreated,
    DuePaid,
    ExpenseCreated,
    VoteCreated,
    BallotCast,
}

/// Notification that something changed in a site. Carries ids only; clients
/// refetch through the scoped API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteEvent {
    pub site_id: Uuid,
    pub kind: EventKind,
    pub resource_id: Uuid,
    pub at: DateTime<Utc>,
}

impl SiteEvent {
    #[must_use]
    pub fn now(site_id: Uuid, kind: EventKind, resource_id: Uuid) -> Self {
        Self {
            site_id,
            kind,
            resource_id,
            at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<SiteEvent>,
    shutdown: watch::Sender<bool>,
}

impl EventHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self { sender, shutdown }
    }

    /// Returns how many subscribers were listening; zero is not an error.
    pub fn publish(&self, event: SiteEvent) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self, scope: SiteScope) -> Subscription {
        Subscription {
            scope,
            events: self.sender.subscribe(),
            shutdown: self.shutdown.subscribe(),
        }
    }

    /// Ends every open subscription; later publishes are dropped.
    pub fn shutdown(&self) {
        debug!(
            subscribers = self.sender.receiver_count(),
            "shutting down event hub"
        );
        self.shutdown.send_replace(true);
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[derive(Debug)]
pub struct Subscription {
    scope: SiteScope,
    events: broadcast::Receiver<SiteEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Subscription {
    /// Next event inside this subscription's scope, or `None` once the hub
    /// shuts down.
    pub async fn next(&mut self) -> Option<SiteEvent> {
        loop {
            if *self.shutdown.borrow_and_update() {
                return None;
            }
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                received = self.events.recv() => match received {
                    Ok(event) if self.scope.contains(event.site_id) => return Some(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }
}
