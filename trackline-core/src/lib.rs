//! # trackline-core
//!
//! Core library for trackline - client-side analytics event dispatch for
//! Matomo-compatible collectors.
//!
//! This library provides:
//! - A [`Tracker`] that injects session and visitor parameters into every event
//! - A background [`Dispatcher`] that batches events into packets, retries with
//!   backoff and survives offline periods through a SQLite-backed cache
//! - Persisted tracker settings behind a [`KeyValueStore`]
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! caller ─► Tracker ─► Dispatcher ─► EventCache ─► PacketFactory ─► PacketSender
//!           (session,   (worker       (memory |      (GET |           (HTTP |
//!            params)     thread)       disk)          bulk POST)       dry run)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use trackline_core::helper::{TrackHelper, TrackRequest};
//! use trackline_core::{Trackline, TrackerBuilder};
//!
//! let context = Trackline::open_default("com.example.app").expect("failed to open store");
//! let tracker = TrackerBuilder::new("https://analytics.example.com/matomo.php", 1)
//!     .build(&context)
//!     .expect("failed to build tracker");
//!
//! TrackHelper::track()
//!     .screen("/welcome")
//!     .title("Welcome")
//!     .with(&tracker)
//!     .expect("invalid screen view");
//! tracker.dispatch_blocking();
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use connectivity::{Connectivity, LinkType, ManualConnectivity};
pub use context::{DeviceInfo, Trackline};
pub use dispatch::{DispatchMode, Dispatcher, DryRunSink, Packet};
pub use error::{Error, Result};
pub use query::{QueryParam, TrackMe};
pub use store::{KeyValueStore, MemoryStore, Preferences, SqliteStore};
pub use tracker::{Tracker, TrackerBuilder};

// Public modules
pub mod config;
pub mod connectivity;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod helper;
pub mod logging;
pub mod query;
pub mod store;
pub mod tracker;
