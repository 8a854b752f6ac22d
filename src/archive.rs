//! Dual-stream persisted container.
//!
//! An [`Archive`] pairs a session record and an events record, persists
//! both to one compressed file and reports combined progress while
//! compiling them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::config::Config;
use crate::container::{self, ArchiveView, RecordView};
use crate::progress::{LoadProgress, ProgressAggregator, ProgressSink, ProgressState};
use crate::record::Record;
use crate::ArchiveError;

/// Selects one of the two timelines of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Session,
    Events,
}

impl FromStr for Stream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(Stream::Session),
            "events" => Ok(Stream::Events),
            other => Err(format!("unknown stream '{other}', expected 'session' or 'events'")),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Session => f.write_str("session"),
            Stream::Events => f.write_str("events"),
        }
    }
}

pub struct Archive {
    session: Record,
    events: Record,
    path: PathBuf,
    config: Config,
    progress: Arc<ProgressAggregator>,
    /// Serializes appends, flushes, compiles and views so none of them sees
    /// half an append.
    write_lock: Mutex<()>,
}

impl Archive {
    /// Empty archive that will persist to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::assemble(path.as_ref(), Config::default(), Record::new(), Record::new())
    }

    pub fn with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self, ArchiveError> {
        config.validate()?;
        Ok(Self::assemble(path.as_ref(), config, Record::new(), Record::new()))
    }

    fn assemble(path: &Path, config: Config, session: Record, events: Record) -> Self {
        let progress = Arc::new(ProgressAggregator::new());
        for record in [&session, &events] {
            record.configure(&config);
            record.set_progress(Some(progress.clone() as Arc<dyn ProgressSink>));
        }
        Self {
            session,
            events,
            path: path.to_path_buf(),
            config,
            progress,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the archive at `path` and compile both streams, reporting
    /// `(percentage, done, total)` to `on_progress` after every frame.
    pub fn load<P, F>(path: P, on_progress: F) -> Result<Self, ArchiveError>
    where
        P: AsRef<Path>,
        F: Fn(f64, usize, usize) + Send + Sync + 'static,
    {
        Self::load_with_config(path, Config::default(), Some(Box::new(on_progress)))
    }

    pub fn load_with_config<P: AsRef<Path>>(
        path: P,
        config: Config,
        on_progress: Option<LoadProgress>,
    ) -> Result<Self, ArchiveError> {
        config.validate()?;
        let path = path.as_ref();
        let view = container::read_file(path)?;
        let session = Record::from_parts(view.session.head, view.session.patches)?;
        let events = Record::from_parts(view.events.head, view.events.patches)?;

        let archive = Self::assemble(path, config, session, events);
        archive.progress.set_callback(on_progress);
        archive.compile()?;
        info!(
            "loaded {} ({} session frames, {} event frames)",
            path.display(),
            archive.session.frame_count(),
            archive.events.frame_count()
        );
        Ok(archive)
    }

    /// Recompile both streams, session first, restarting progress at zero.
    pub fn compile(&self) -> Result<(), ArchiveError> {
        let _guard = self.write_lock.lock();
        self.progress.reset(self.session.frame_count() + self.events.frame_count());
        self.session.compile()?;
        self.events.compile()?;
        Ok(())
    }

    /// Append one state to each stream and persist.
    ///
    /// A failure on the session stream leaves events untouched; a failure on
    /// events leaves the session append in place. Either way nothing is
    /// written and the archive should be discarded or the call retried.
    pub fn append_state(&self, session: &[u8], events: &[u8]) -> Result<(), ArchiveError> {
        let _guard = self.write_lock.lock();
        self.session.append(session)?;
        self.events.append(events)?;
        self.save()
    }

    /// Persist the reference snapshots and patch chains of both streams.
    pub fn flush(&self) -> Result<(), ArchiveError> {
        let _guard = self.write_lock.lock();
        self.save()
    }

    fn save(&self) -> Result<(), ArchiveError> {
        let view = self.view_unlocked();
        container::write_file(&self.path, &view, self.config.compression_level)?;
        debug!(
            "flushed {} ({} + {} patches)",
            self.path.display(),
            view.session.patches.len(),
            view.events.patches.len()
        );
        Ok(())
    }

    /// Persisted view of both streams, never between the two halves of an
    /// `append_state`.
    pub fn view(&self) -> ArchiveView {
        let _guard = self.write_lock.lock();
        self.view_unlocked()
    }

    fn view_unlocked(&self) -> ArchiveView {
        let (head, patches) = self.session.parts();
        let session = RecordView { head, patches };
        let (head, patches) = self.events.parts();
        let events = RecordView { head, patches };
        ArchiveView { session, events }
    }

    pub fn session(&self) -> &Record {
        &self.session
    }

    pub fn events(&self) -> &Record {
        &self.events
    }

    pub fn record(&self, stream: Stream) -> &Record {
        match stream {
            Stream::Session => &self.session,
            Stream::Events => &self.events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names() {
        assert_eq!("Session".parse::<Stream>().unwrap(), Stream::Session);
        assert_eq!("events".parse::<Stream>().unwrap(), Stream::Events);
        assert!("both".parse::<Stream>().is_err());
        assert_eq!(Stream::Events.to_string(), "events");
    }

    #[test]
    fn append_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.record");
        let archive = Archive::new(&path);
        assert!(!path.exists());
        archive.append_state(b"s0", b"e0").unwrap();
        let view = container::read_file(&path).unwrap();
        assert_eq!(view.session.head.as_deref(), Some(&b"s0"[..]));
        assert_eq!(view.events.head.as_deref(), Some(&b"e0"[..]));
        archive.append_state(b"s01", b"e01").unwrap();
        assert_eq!(container::read_file(&path).unwrap(), archive.view());
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = Config { compression_level: 11, ..Config::default() };
        assert!(matches!(Archive::with_config("x.record", cfg), Err(ArchiveError::Config(_))));
    }
}
