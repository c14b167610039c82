//! # Bandcast
//!
//! Real-time per-process network bandwidth broadcast hub. A blocking
//! measurement engine feeds usage samples through a hand-off queue into a
//! single async dispatcher, which fans each sample out to every connected
//! WebSocket viewer whose interest filter matches the sample's interface.
//!
//! ## Modules
//!
//! - [`bridge`]: hand-off queue between the measurement thread and the runtime
//! - [`source`]: measurement-engine boundary (blocking sample producers)
//! - [`hub`]: connection registry and broadcast dispatcher
//! - [`server`]: Axum WebSocket server and per-connection supervisors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bandcast::bridge::SampleQueue;
//! use bandcast::config::ServerConfig;
//! use bandcast::hub::{ConnectionRegistry, Dispatcher};
//! use bandcast::server::{serve, AppState};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sample_tx, sample_rx) = SampleQueue::channel(10_000);
//!     let registry = Arc::new(ConnectionRegistry::new(1000));
//!
//!     // Feed sample_tx from a measurement thread, e.g. via
//!     // bandcast::source::spawn_source.
//!     sample_tx.push(r#"{"device_name": "eth0", "sent": 1.5}"#.to_string())?;
//!
//!     let dispatcher = Dispatcher::new(sample_rx, Arc::clone(&registry));
//!     let alive = Arc::new(AtomicBool::new(true));
//!     let alive_flag = Arc::clone(&alive);
//!     tokio::spawn(async move {
//!         dispatcher.run().await;
//!         alive_flag.store(false, Ordering::SeqCst);
//!     });
//!
//!     let config = ServerConfig::default();
//!     let state = AppState::new(registry, config.clone(), alive);
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod hub;
pub mod server;
pub mod source;

// Re-export top-level types for convenience
pub use bridge::{QueueClosed, SampleQueue, SampleReceiver, SampleSender};

pub use hub::{
    connection_id, CommandError, ConnectionId, ConnectionRegistry, ConnectionSnapshot, Dispatcher,
    FilterChange, FilterCommand, HubError,
};

pub use server::{build_router, serve, websocket_handler, AppState, ServerError};

pub use source::{spawn_source, CommandSource, SampleSource, SourceError};

pub use config::{
    Config, ConfigError, LoggingConfig, QueueConfig, ServerConfig, SourceConfig,
};
