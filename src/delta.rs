//! Binary delta codec used to chain snapshots.
//!
//! Every patch starts with a one byte tag followed by its payload:
//!
//! ```text
//! [tag][payload]
//! ```
//!
//! * `PATCH_LITERAL` – the payload is the new buffer verbatim. Used when
//!   either side is empty or when a bsdiff patch would not be shorter.
//! * `PATCH_BSDIFF` – the payload is a deflated bsdiff patch against the old
//!   buffer. Raw bsdiff output carries one diff byte per matched byte, so it
//!   only becomes smaller than the snapshot once compressed.
//!
//! A patch is only meaningful against the exact buffer it was computed from,
//! so chains must be replayed strictly in order.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::ArchiveError;

/// Tag marking a literal replacement patch.
pub const PATCH_LITERAL: u8 = 0x00;
/// Tag marking a bsdiff patch.
pub const PATCH_BSDIFF: u8 = 0x01;

/// Contract for the diff/patch primitive behind a [`crate::Record`].
///
/// Implementations must satisfy `apply(old, &diff(old, new)?)? == new` for
/// every pair of buffers, empty ones included.
pub trait DeltaCodec: Send + Sync {
    fn diff(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>, ArchiveError>;
    fn apply(&self, old: &[u8], patch: &[u8]) -> Result<Vec<u8>, ArchiveError>;
}

/// Default codec backed by the `bsdiff` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BsdiffCodec;

fn literal(new: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + new.len());
    out.push(PATCH_LITERAL);
    out.extend_from_slice(new);
    out
}

impl DeltaCodec for BsdiffCodec {
    fn diff(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        if old.is_empty() || new.is_empty() {
            return Ok(literal(new));
        }
        let mut raw = Vec::new();
        bsdiff::diff(old, new, &mut raw).map_err(|e| ArchiveError::Codec(format!("diff failed: {e}")))?;
        let mut enc = DeflateEncoder::new(vec![PATCH_BSDIFF], Compression::best());
        enc.write_all(&raw)?;
        let out = enc.finish()?;
        if out.len() > new.len() + 1 {
            return Ok(literal(new));
        }
        Ok(out)
    }

    fn apply(&self, old: &[u8], patch: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let (tag, payload) = patch
            .split_first()
            .ok_or_else(|| ArchiveError::Codec("empty patch".into()))?;
        match *tag {
            PATCH_LITERAL => Ok(payload.to_vec()),
            PATCH_BSDIFF => {
                if old.is_empty() {
                    return Err(ArchiveError::Codec("bsdiff patch against empty buffer".into()));
                }
                let mut raw = Vec::new();
                DeflateDecoder::new(payload)
                    .read_to_end(&mut raw)
                    .map_err(|e| ArchiveError::Codec(format!("inflating patch failed: {e}")))?;
                let mut reader = raw.as_slice();
                let mut out = Vec::with_capacity(old.len());
                bsdiff::patch(old, &mut reader, &mut out)
                    .map_err(|e| ArchiveError::Codec(format!("patch failed: {e}")))?;
                Ok(out)
            }
            other => Err(ArchiveError::Codec(format!("unknown patch tag 0x{other:02x}"))),
        }
    }
}
