use crate::ArchiveError;

/// Frame field holding the RFC 3339 capture time.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "polled_at";
/// gzip level used when persisting archives.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// What happens to a materialized frame once `next()` has returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRetention {
    /// Every frame stays resident until the next compile.
    #[default]
    KeepAll,
    /// Frames are moved out to the caller and released, trading random
    /// access for a flat memory profile during a single forward replay.
    DropConsumed,
}

/// Runtime configuration shared by an archive and its records.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON field queried by `Record::time_of`.
    pub timestamp_field: String,
    /// Retention policy for compiled frames.
    pub retention: FrameRetention,
    /// gzip compression level, 0..=9.
    pub compression_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            retention: FrameRetention::KeepAll,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.timestamp_field.is_empty() {
            return Err(ArchiveError::Config("timestamp field must not be empty".into()));
        }
        if self.compression_level > 9 {
            return Err(ArchiveError::Config(format!(
                "compression level {} out of range 0..=9",
                self.compression_level
            )));
        }
        Ok(())
    }
}
