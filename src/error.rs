use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Load requested for a path with no existing file.
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compressed container is malformed or truncated.
    #[error("decompress error: {0}")]
    Decompress(String),

    /// Structured payload does not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Delta diff/apply failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// Frame timestamp field missing or unparsable.
    #[error("timestamp error in frame {index}: {reason}")]
    Timestamp { index: usize, reason: String },

    /// Frames were read before a successful compile, or after an append
    /// invalidated them.
    #[error("record is not compiled")]
    NotCompiled,

    /// Cursor or frame index outside the materialized range.
    #[error("index {index} out of range for {len} frames")]
    IndexOutOfRange { index: usize, len: usize },

    /// `next()` called after the last frame was handed out.
    #[error("record exhausted")]
    Exhausted,

    /// Frame already handed out and dropped under `FrameRetention::DropConsumed`.
    #[error("frame {0} was released after being consumed")]
    FrameReleased(usize),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}
