//! Error reporting helpers shared by the command-line tools.
use std::fmt;
use std::io;
use std::path::Path;

use crate::ArchiveError;

#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Format a user friendly I/O error message with suggestions.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound => "No archive at this path. Pass the .record file written by `deltarec append`.",
        PermissionDenied => "The archive and its directory must be readable, and writable for appends.",
        UnexpectedEof => "Archive is truncated. Restore it from a backup or record the session again.",
        WriteZero => "Disk is full. The previous archive was left in place; free space and append again.",
        _ if err.raw_os_error() == Some(28) => {
            "Disk is full. The previous archive was left in place; free space and append again."
        }
        _ => "The archive on disk is unchanged. Retry once the underlying problem is fixed.",
    };
    format!(
        "Error {} '{}': {}. {}",
        operation,
        path.display(),
        err,
        suggestion
    )
}

/// Convert an I/O error into a CLI error with context.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        source: Some(Box::new(err)),
    }
}

/// Simple CLI error from string.
pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        source: None,
    }
}

/// Convert an archive error into a CLI error with a hint.
pub fn archive_cli_error(context: &str, err: ArchiveError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for an archive error variant.
pub fn cli_hint(err: &ArchiveError) -> String {
    use ArchiveError::*;
    match err {
        NotFound(path) => format!("{} does not exist. Check the path.", path.display()),
        Io(io) => format!("{io}"),
        Decompress(msg) => format!("{msg}. File appears truncated or is not an archive."),
        Decode(msg) => format!("{msg}. Verify the file is intact."),
        Codec(msg) => format!("{msg}. Patch chain is corrupt."),
        Timestamp { index, reason } => format!("frame {index}: {reason}"),
        NotCompiled => "record must be compiled before reading. This is a bug.".to_string(),
        IndexOutOfRange { index, len } => format!("index {index} is past the last frame ({len} frames)."),
        Exhausted => "no frames left to read.".to_string(),
        FrameReleased(i) => format!("frame {i} was already consumed."),
        Config(msg) => format!("{msg}. Invalid configuration."),
    }
}
