//! Connection Registry
//!
//! The set of currently connected viewers and their interest filters. The
//! only structure mutated by more than one concurrent actor: supervisors
//! register and unregister connections, readers mutate their own
//! connection's filter, and the dispatcher takes snapshots to broadcast
//! over. All access goes through an async `RwLock`; every membership or
//! filter change is atomic under the write lock, so a snapshot never
//! observes a torn entry.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Unique identifier for a viewer connection.
///
/// Derived by hashing the peer address and an accept sequence number to a
/// fixed-width hex string. Used for log correlation only; uniqueness is
/// best-effort, not a security property.
pub type ConnectionId = String;

static NEXT_ACCEPT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Derive a connection id from the peer's socket address.
pub fn connection_id(peer: SocketAddr) -> ConnectionId {
    let seq = NEXT_ACCEPT_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    peer.hash(&mut hasher);
    seq.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// One registered viewer.
///
/// `interfaces` is written only by the connection's own reader and read by
/// the dispatcher; an empty set means "receive every interface".
pub struct ConnectionHandle {
    /// Outbound handle; the connection's writer task drains the other end.
    pub sender: mpsc::UnboundedSender<String>,
    /// Interest filter: interface names this viewer wants.
    pub interfaces: HashSet<String>,
}

/// Point-in-time copy of one registry entry, taken for a broadcast pass.
#[derive(Clone)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub interfaces: HashSet<String>,
    pub sender: mpsc::UnboundedSender<String>,
}

impl ConnectionSnapshot {
    /// Whether this connection should receive a sample for `device`.
    pub fn wants(&self, device: &str) -> bool {
        self.interfaces.is_empty() || self.interfaces.contains(device)
    }
}

/// Result of a filter mutation, for logging the viewer's full current set.
pub struct FilterChange {
    /// False when the mutation was a no-op (idempotent add/remove).
    pub changed: bool,
    /// The full interest set after the mutation, sorted for stable logs.
    pub interfaces: Vec<String>,
}

/// Manages the membership set for the broadcast hub.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register a new viewer connection with an empty interest filter.
    ///
    /// Fails when the connection limit has been reached; the caller should
    /// close the transport session without registering.
    pub async fn register(
        &self,
        id: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<(), HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return Err(HubError::TooManyConnections(self.max_connections));
        }

        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                interfaces: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "viewer registered");
        Ok(())
    }

    /// Remove a connection from the broadcast set. Idempotent.
    pub async fn unregister(&self, id: &str) {
        if self.connections.write().await.remove(id).is_some() {
            tracing::info!(connection_id = %id, "viewer unregistered");
        }
    }

    /// Add an interface to a connection's interest filter. Idempotent.
    pub async fn add_interface(&self, id: &str, interface: &str) -> Result<FilterChange, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let changed = handle.interfaces.insert(interface.to_string());
        Ok(FilterChange {
            changed,
            interfaces: sorted(&handle.interfaces),
        })
    }

    /// Remove an interface from a connection's interest filter. Idempotent.
    pub async fn remove_interface(
        &self,
        id: &str,
        interface: &str,
    ) -> Result<FilterChange, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let changed = handle.interfaces.remove(interface);
        Ok(FilterChange {
            changed,
            interfaces: sorted(&handle.interfaces),
        })
    }

    /// Take a consistent point-in-time copy of the membership set.
    ///
    /// The copy is taken under the read lock, so no partially registered or
    /// partially removed connection can appear; changes that race a
    /// broadcast pass resolve either way.
    pub async fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| ConnectionSnapshot {
                id: id.clone(),
                interfaces: handle.interfaces.clone(),
                sender: handle.sender.clone(),
            })
            .collect()
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn sorted(interfaces: &HashSet<String>) -> Vec<String> {
    let mut list: Vec<String> = interfaces.iter().cloned().collect();
    list.sort();
    list
}

/// Errors that can occur in the connection registry
#[derive(Debug, Error)]
pub enum HubError {
    #[error("too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("connection not found")]
    ConnectionNotFound,
}
