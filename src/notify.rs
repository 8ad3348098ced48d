//! Notification fan-out.
//!
//! State machines push typed events to affected users through the `Notifier`
//! port. Delivery is best-effort, at-most-once, fire-and-forget: it runs only
//! after the owning transaction committed, is never retried, and a failure is
//! logged and swallowed. A disconnected recipient simply misses the event and
//! reconciles by re-reading on the next connect.

use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{UserId, transfer::TransferStatus};

/// Closed set of push payloads. Serialized with an internal `type` tag so
/// clients can dispatch without sniffing fields.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The recipient's collection changed; a full re-read is required.
    MaterialsUpdated,
    ProfileViewRequest {
        requester_id: UserId,
        request_id: Uuid,
    },
    ProfileViewApproved {
        target_id: UserId,
        request_id: Uuid,
        photo_ids: Vec<i64>,
        is_update: bool,
        old_photo_ids: Vec<i64>,
        target_user_name: Option<String>,
    },
    ProfileViewRejected {
        target_id: UserId,
        request_id: Uuid,
        target_user_name: Option<String>,
    },
    /// Instant copy landed; sent to both the owner and the scanner.
    TransferCompleted {
        file_id: String,
        photo_id: Option<i64>,
    },
    /// Confirm-first transfer decided.
    TransferStatus {
        transfer_id: Uuid,
        status: TransferStatus,
        photo_id: i64,
    },
}

/// Addressed-message port between the state machines and whatever carries
/// events to clients. Production wires in `ConnectionRegistry`; tests wire in
/// a recording stub.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: UserId, event: Event);
}

/// Registry of live websocket connections, one outbound channel per user.
/// A reconnect replaces the previous channel; send failures evict the entry.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, mpsc::UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, user_id: UserId, sender: mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.lock().expect("registry lock poisoned");
        if connections.insert(user_id, sender).is_some() {
            tracing::info!("replaced live connection for user {user_id}");
        } else {
            tracing::info!("registered connection for user {user_id}");
        }
    }

    /// Remove the user's entry, but only if it still is `sender`'s channel.
    /// A reconnect replaces the entry and must not be evicted by the old
    /// socket's teardown.
    pub fn deregister_channel(&self, user_id: UserId, sender: &mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.lock().expect("registry lock poisoned");
        if let Some(current) = connections.get(&user_id) {
            if current.same_channel(sender) {
                connections.remove(&user_id);
                tracing::info!("deregistered connection for user {user_id}");
            }
        }
    }
}

impl Notifier for ConnectionRegistry {
    fn notify(&self, user_id: UserId, event: Event) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("failed to serialize event for user {user_id}: {err}");
                return;
            }
        };

        let mut connections = self.connections.lock().expect("registry lock poisoned");
        match connections.get(&user_id) {
            Some(sender) => {
                if sender.send(payload).is_err() {
                    tracing::warn!("dropping broken connection for user {user_id}");
                    connections.remove(&user_id);
                } else {
                    tracing::debug!("queued event for user {user_id}");
                }
            }
            None => {
                tracing::debug!("no live connection for user {user_id}, event dropped");
            }
        }
    }
}
