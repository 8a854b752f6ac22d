//! One linear chain of snapshots for a single timeline.
//!
//! A record stores its first snapshot raw (`head`) and every following one
//! as a patch against its predecessor. Reading requires a compile, which
//! replays the chain once and materializes every frame so they can be
//! accessed by index afterwards.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::config::{Config, FrameRetention};
use crate::delta::{BsdiffCodec, DeltaCodec};
use crate::progress::ProgressSink;
use crate::timestamp::{parse_timestamp_field, Timestamp};
use crate::ArchiveError;

struct RecordState {
    head: Option<Vec<u8>>,
    patches: Vec<Vec<u8>>,
    /// Latest raw snapshot, the base for the next diff. Never persisted.
    current: Option<Vec<u8>>,
    /// Materialized frames; `None` until compiled or after an append.
    frames: Option<Vec<Option<Vec<u8>>>>,
    cursor: usize,
    progress: Option<Arc<dyn ProgressSink>>,
    timestamp_field: String,
    retention: FrameRetention,
}

impl RecordState {
    fn frame_count(&self) -> usize {
        if self.head.is_some() {
            self.patches.len() + 1
        } else {
            0
        }
    }

    fn compiled(&self) -> Result<&Vec<Option<Vec<u8>>>, ArchiveError> {
        self.frames.as_ref().ok_or(ArchiveError::NotCompiled)
    }

    fn frame(&self, index: usize) -> Result<&[u8], ArchiveError> {
        let frames = self.compiled()?;
        match frames.get(index) {
            Some(Some(frame)) => Ok(frame),
            Some(None) => Err(ArchiveError::FrameReleased(index)),
            None => Err(ArchiveError::IndexOutOfRange { index, len: frames.len() }),
        }
    }
}

/// Delta-chain frame store. Every public operation holds the record lock
/// for its whole duration, compile included.
pub struct Record {
    state: Mutex<RecordState>,
    codec: Arc<dyn DeltaCodec>,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Empty record using the default bsdiff codec.
    pub fn new() -> Self {
        Self::with_codec(Arc::new(BsdiffCodec))
    }

    pub fn with_codec(codec: Arc<dyn DeltaCodec>) -> Self {
        let cfg = Config::default();
        Self {
            state: Mutex::new(RecordState {
                head: None,
                patches: Vec::new(),
                current: None,
                frames: None,
                cursor: 0,
                progress: None,
                timestamp_field: cfg.timestamp_field,
                retention: cfg.retention,
            }),
            codec,
        }
    }

    /// Rebuild an uncompiled record from its persisted parts.
    pub fn from_parts(head: Option<Vec<u8>>, patches: Vec<Vec<u8>>) -> Result<Self, ArchiveError> {
        if head.is_none() && !patches.is_empty() {
            return Err(ArchiveError::Decode(format!(
                "record has {} patches but no reference snapshot",
                patches.len()
            )));
        }
        let record = Self::new();
        {
            let mut state = record.state.lock();
            state.head = head;
            state.patches = patches;
        }
        Ok(record)
    }

    /// Apply the timestamp field and retention policy from `config`.
    pub fn configure(&self, config: &Config) {
        let mut state = self.state.lock();
        state.timestamp_field = config.timestamp_field.clone();
        state.retention = config.retention;
    }

    /// Install the sink notified for each frame materialized by `compile`.
    pub fn set_progress(&self, sink: Option<Arc<dyn ProgressSink>>) {
        self.state.lock().progress = sink;
    }

    /// Add a snapshot to the end of the chain.
    ///
    /// The first snapshot becomes the reference; later ones are stored as a
    /// patch against the previous snapshot. Any compiled frames are
    /// invalidated and must be rebuilt with [`Record::compile`].
    pub fn append(&self, snapshot: &[u8]) -> Result<(), ArchiveError> {
        let mut state = self.state.lock();
        if state.head.is_none() {
            state.head = Some(snapshot.to_vec());
        } else {
            // a loaded record only learns its latest snapshot by compiling
            let current = state.current.as_deref().ok_or(ArchiveError::NotCompiled)?;
            let patch = self.codec.diff(current, snapshot).map_err(|e| {
                warn!("diff failed after {} patches: {e}", state.patches.len());
                e
            })?;
            state.patches.push(patch);
        }
        state.current = Some(snapshot.to_vec());
        state.frames = None;
        state.cursor = 0;
        Ok(())
    }

    /// Replay the whole chain and materialize every frame.
    ///
    /// The new frame list replaces the old one only when every patch
    /// applied cleanly.
    pub fn compile(&self) -> Result<(), ArchiveError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let sink = state.progress.clone();
        let report = |n: usize| {
            if let Some(sink) = &sink {
                sink.frames_done(n);
            }
        };

        let Some(head) = state.head.clone() else {
            state.current = None;
            state.frames = Some(Vec::new());
            state.cursor = 0;
            return Ok(());
        };

        let mut frames: Vec<Vec<u8>> = Vec::with_capacity(state.patches.len() + 1);
        frames.push(head);
        report(1);
        for (i, patch) in state.patches.iter().enumerate() {
            let next = self.codec.apply(&frames[i], patch).map_err(|e| {
                warn!("patch {i} failed to apply: {e}");
                e
            })?;
            frames.push(next);
            report(1);
        }

        debug!("compiled {} frames", frames.len());
        state.current = frames.last().cloned();
        state.frames = Some(frames.into_iter().map(Some).collect());
        state.cursor = 0;
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.state.lock().frames.is_some()
    }

    /// Reference frame plus one frame per patch; zero for an empty record.
    pub fn frame_count(&self) -> usize {
        self.state.lock().frame_count()
    }

    /// 1-based cursor position for display.
    pub fn current_index(&self) -> usize {
        self.state.lock().cursor + 1
    }

    pub fn rewind(&self) {
        self.state.lock().cursor = 0;
    }

    /// Move the cursor to `from`; `frame_count()` positions it past the end.
    pub fn seek(&self, from: usize) -> Result<(), ArchiveError> {
        let mut state = self.state.lock();
        let len = state.frame_count();
        if from > len {
            return Err(ArchiveError::IndexOutOfRange { index: from, len });
        }
        state.cursor = from;
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        let state = self.state.lock();
        state.cursor >= state.frame_count()
    }

    /// Return the frame under the cursor and advance.
    pub fn next(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let index = state.cursor;
        let retention = state.retention;
        let frames = state.frames.as_mut().ok_or(ArchiveError::NotCompiled)?;
        let slot = frames.get_mut(index).ok_or(ArchiveError::Exhausted)?;
        let frame = match retention {
            FrameRetention::KeepAll => slot.clone(),
            FrameRetention::DropConsumed => slot.take(),
        }
        .ok_or(ArchiveError::FrameReleased(index))?;
        state.cursor += 1;
        Ok(frame)
    }

    /// Random access into the compiled frames without moving the cursor.
    pub fn frame(&self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        self.state.lock().frame(index).map(<[u8]>::to_vec)
    }

    pub fn head(&self) -> Option<Vec<u8>> {
        self.state.lock().head.clone()
    }

    pub fn patches(&self) -> Vec<Vec<u8>> {
        self.state.lock().patches.clone()
    }

    /// Persisted fields only: reference snapshot and patch chain.
    pub(crate) fn parts(&self) -> (Option<Vec<u8>>, Vec<Vec<u8>>) {
        let state = self.state.lock();
        (state.head.clone(), state.patches.clone())
    }

    /// Capture time stored in frame `index`.
    pub fn time_of(&self, index: usize) -> Result<Timestamp, ArchiveError> {
        let state = self.state.lock();
        parse_timestamp_field(state.frame(index)?, &state.timestamp_field, index)
    }

    pub fn started_at(&self) -> Result<Timestamp, ArchiveError> {
        self.time_of(0)
    }

    pub fn stopped_at(&self) -> Result<Timestamp, ArchiveError> {
        let last = self.frame_count().saturating_sub(1);
        self.time_of(last)
    }

    pub fn duration(&self) -> Result<chrono::Duration, ArchiveError> {
        Ok(self.stopped_at()? - self.started_at()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_invalidates_frames() {
        let rec = Record::new();
        rec.append(b"a").unwrap();
        rec.compile().unwrap();
        assert!(rec.is_compiled());
        rec.append(b"ab").unwrap();
        assert!(!rec.is_compiled());
        assert!(matches!(rec.next(), Err(ArchiveError::NotCompiled)));
        rec.compile().unwrap();
        assert_eq!(rec.next().unwrap(), b"a");
        assert_eq!(rec.next().unwrap(), b"ab");
    }

    #[test]
    fn seek_is_validated() {
        let rec = Record::new();
        for s in [&b"x"[..], b"xy", b"xyz"] {
            rec.append(s).unwrap();
        }
        rec.compile().unwrap();
        rec.seek(2).unwrap();
        assert_eq!(rec.current_index(), 3);
        assert_eq!(rec.next().unwrap(), b"xyz");
        assert!(rec.is_exhausted());
        rec.seek(3).unwrap();
        assert!(rec.is_exhausted());
        assert!(matches!(rec.seek(4), Err(ArchiveError::IndexOutOfRange { index: 4, len: 3 })));
    }

    #[test]
    fn headless_parts_are_rejected() {
        assert!(matches!(
            Record::from_parts(None, vec![vec![0, 1]]),
            Err(ArchiveError::Decode(_))
        ));
    }

    #[test]
    fn drop_consumed_releases_frames() {
        let rec = Record::new();
        rec.configure(&Config { retention: FrameRetention::DropConsumed, ..Config::default() });
        rec.append(b"one").unwrap();
        rec.append(b"two").unwrap();
        rec.compile().unwrap();
        assert_eq!(rec.next().unwrap(), b"one");
        assert!(matches!(rec.frame(0), Err(ArchiveError::FrameReleased(0))));
        assert_eq!(rec.frame(1).unwrap(), b"two");
        rec.rewind();
        assert!(matches!(rec.next(), Err(ArchiveError::FrameReleased(0))));
        // a fresh compile brings everything back
        rec.compile().unwrap();
        assert_eq!(rec.next().unwrap(), b"one");
    }

    #[test]
    fn loaded_record_needs_compile_before_append() {
        let rec = Record::from_parts(Some(b"base".to_vec()), Vec::new()).unwrap();
        assert!(matches!(rec.append(b"more"), Err(ArchiveError::NotCompiled)));
        rec.compile().unwrap();
        rec.append(b"more").unwrap();
        rec.compile().unwrap();
        assert_eq!(rec.frame(1).unwrap(), b"more");
    }
}
