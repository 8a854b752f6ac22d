//! Delta-compressed snapshot archive.
//!
//! A [`Record`] stores a timeline of snapshots as one raw reference
//! snapshot plus a chain of binary patches and rebuilds every frame on
//! [`Record::compile`]. An [`Archive`] pairs a session and an events record
//! and persists both to a single gzip-compressed JSON file.

pub mod archive;
pub mod config;
pub mod container;
pub mod delta;
mod error;
pub mod io_utils;
pub mod progress;
pub mod record;
pub mod timestamp;

pub use archive::{Archive, Stream};
pub use config::{Config, FrameRetention};
pub use delta::{BsdiffCodec, DeltaCodec};
pub use error::ArchiveError;
pub use progress::{LoadProgress, ProgressAggregator, ProgressSink, ProgressState};
pub use record::Record;
pub use timestamp::Timestamp;
