//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::hub::ConnectionRegistry;

/// Shared application state for all handlers
pub struct AppState {
    /// The broadcast hub's connection registry
    pub registry: Arc<ConnectionRegistry>,
    /// Server configuration
    pub config: ServerConfig,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Cleared when the dispatcher exits; readiness then fails
    dispatcher_alive: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        config: ServerConfig,
        dispatcher_alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            config,
            start_time: Instant::now(),
            dispatcher_alive,
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Whether the broadcast dispatcher is still draining the sample queue
    pub fn dispatcher_alive(&self) -> bool {
        self.dispatcher_alive.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_alive_flag() {
        let alive = Arc::new(AtomicBool::new(true));
        let state = AppState::new(
            Arc::new(ConnectionRegistry::new(16)),
            ServerConfig::default(),
            Arc::clone(&alive),
        );

        assert!(state.dispatcher_alive());
        alive.store(false, Ordering::SeqCst);
        assert!(!state.dispatcher_alive());
    }
}
