//! Outbound ports: the collaborators the core consumes but does not own.
//!
//! - [`PolicyGate`]: who may invoke which transition
//! - [`NotificationSink`]: fire-and-forget event delivery
//! - [`AttachmentStore`]: resolves proof references to artifacts
//!
//! The bundled implementations cover tests and single-process use.
//! [`RolePolicy`](crate::RolePolicy) lives in its own module.

use std::collections::HashMap;

use dealbook_types::{Action, EntityRef, MarketEvent, UserId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Policy gate
// ---------------------------------------------------------------------------

/// Authorization capability consulted before every mutating call.
///
/// The core trusts the answer. Ownership rules (only the request owner
/// accepts, only a deal party withdraws) are checked by the core on top.
pub trait PolicyGate: Send + Sync {
    fn is_authorized(&self, actor: UserId, action: Action, entity: EntityRef) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PolicyGate for AllowAll {
    fn is_authorized(&self, _actor: UserId, _action: Action, _entity: EntityRef) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Notification sink
// ---------------------------------------------------------------------------

/// Receives events after their commit has landed. Delivery failures are
/// the sink's problem; `emit` cannot fail the transition.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &MarketEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit(&self, _event: &MarketEvent) {}
}

/// Logs every event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&self, event: &MarketEvent) {
        tracing::info!(
            event = event.kind(),
            subject = %event.subject(),
            "Market event"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MarketEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }

    /// Event names in emission order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(MarketEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl NotificationSink for MemorySink {
    fn emit(&self, event: &MarketEvent) {
        self.events.lock().push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Attachment store
// ---------------------------------------------------------------------------

/// A retrievable artifact behind a proof reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: Option<String>,
}

/// Resolves proof references. The core stores only the reference.
pub trait AttachmentStore: Send + Sync {
    fn resolve(&self, url: &str) -> Option<Attachment>;
}

/// Accepts any well-formed `http`/`https` URL with a host.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlAttachmentStore;

impl AttachmentStore for UrlAttachmentStore {
    fn resolve(&self, url: &str) -> Option<Attachment> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return None;
        }
        Some(Attachment {
            url: parsed.to_string(),
            content_type: None,
        })
    }
}

/// Resolves only references that were explicitly stored.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    items: RwLock<HashMap<String, Attachment>>,
}

impl MemoryAttachmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, url: impl Into<String>, content_type: Option<&str>) {
        let url = url.into();
        let attachment = Attachment {
            url: url.clone(),
            content_type: content_type.map(str::to_string),
        };
        self.items.write().insert(url, attachment);
    }

    pub fn remove(&self, url: &str) -> Option<Attachment> {
        self.items.write().remove(url)
    }
}

impl AttachmentStore for MemoryAttachmentStore {
    fn resolve(&self, url: &str) -> Option<Attachment> {
        self.items.read().get(url).cloned()
    }
}
