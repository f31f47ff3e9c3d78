//! Event dispatch engine
//!
//! ```text
//! TrackMe ──submit──► EventCache ──drain──► PacketFactory ──► PacketSender
//!                     (memory | disk)         (GET | bulk POST)   (HTTP | dry run)
//! ```
//!
//! The [`Dispatcher`] owns a background worker that moves events through
//! the pipeline; everything else here is a building block it drives.

pub mod cache;
pub mod disk;
pub mod dispatcher;
pub mod event;
pub mod mode;
pub mod packet;
pub mod sender;

pub use cache::EventCache;
pub use disk::DiskCache;
pub use dispatcher::{backoff_sleep, DispatchStats, Dispatcher, DryRunSink, FailureCallback};
pub use event::Event;
pub use mode::DispatchMode;
pub use packet::{BulkRequest, Packet, PacketFactory, PAGE_SIZE};
pub use sender::{HttpPacketSender, PacketSender, SendOptions};
