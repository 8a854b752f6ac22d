//! On-disk container: gzip-compressed JSON holding both record chains.
//!
//! ```text
//! gzip({ "session": { "head": <b64|null>, "patches": [<b64>, ...] },
//!        "events":  { "head": <b64|null>, "patches": [<b64>, ...] } })
//! ```
//!
//! Only the reference snapshot and the patch chain are written. Frames,
//! cursors and progress are runtime state. The reader also accepts the
//! legacy field names `data` and `states`.

use std::io::{Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::ArchiveError;

/// Persisted fields of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    #[serde(alias = "data", with = "b64_opt", default)]
    pub head: Option<Vec<u8>>,
    #[serde(alias = "states", with = "b64_list", default)]
    pub patches: Vec<Vec<u8>>,
}

/// Persisted fields of an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveView {
    pub session: RecordView,
    pub events: RecordView,
}

mod b64_opt {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod b64_list {
    use super::*;
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(value.len()))?;
        for bytes in value {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Option::<Vec<String>>::deserialize(d)?
            .unwrap_or_default()
            .into_iter()
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Serialize and gzip a view.
pub fn encode(view: &ArchiveView, level: u32) -> Result<Vec<u8>, ArchiveError> {
    let json = serde_json::to_vec(view).map_err(|e| ArchiveError::Decode(format!("encoding view: {e}")))?;
    let mut gz = GzEncoder::new(Vec::new(), Compression::new(level));
    gz.write_all(&json)?;
    Ok(gz.finish()?)
}

/// Inflate and parse a container produced by [`encode`].
pub fn decode(compressed: &[u8]) -> Result<ArchiveView, ArchiveError> {
    let mut raw = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| ArchiveError::Decompress(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| ArchiveError::Decode(e.to_string()))
}

/// Read and decode the container at `path`.
pub fn read_file(path: &Path) -> Result<ArchiveView, ArchiveError> {
    if !path.exists() {
        return Err(ArchiveError::NotFound(path.to_path_buf()));
    }
    let compressed = std::fs::read(path)?;
    decode(&compressed)
}

/// Encode `view` and replace the file at `path`.
///
/// The bytes are written to a temporary file in the same directory and
/// renamed over `path`, so readers never observe a half-written container.
pub fn write_file(path: &Path, view: &ArchiveView, level: u32) -> Result<(), ArchiveError> {
    let data = encode(view, level)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveView {
        ArchiveView {
            session: RecordView { head: Some(b"{\"a\":1}".to_vec()), patches: vec![vec![0, 1, 2], Vec::new()] },
            events: RecordView::default(),
        }
    }

    #[test]
    fn json_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["session"]["head"], "eyJhIjoxfQ==");
        assert_eq!(json["session"]["patches"][0], "AAEC");
        assert_eq!(json["session"]["patches"][1], "");
        assert!(json["events"]["head"].is_null());
        assert_eq!(json["events"]["patches"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let raw = br#"{"session":{"data":"eA==","states":["AAEC"]},"events":{"data":null,"states":null}}"#;
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(raw).unwrap();
        let view = decode(&gz.finish().unwrap()).unwrap();
        assert_eq!(view.session.head.as_deref(), Some(&b"x"[..]));
        assert_eq!(view.session.patches, vec![vec![0, 1, 2]]);
        assert_eq!(view.events, RecordView::default());
    }

    #[test]
    fn error_classes() {
        assert!(matches!(decode(b"plainly not gzip"), Err(ArchiveError::Decompress(_))));

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b"{\"session\": 3}").unwrap();
        assert!(matches!(decode(&gz.finish().unwrap()), Err(ArchiveError::Decode(_))));

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(br#"{"session":{"head":"***"},"events":{}}"#).unwrap();
        assert!(matches!(decode(&gz.finish().unwrap()), Err(ArchiveError::Decode(_))));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.record");
        write_file(&path, &sample(), 9).unwrap();
        assert_eq!(read_file(&path).unwrap(), sample());
        assert!(matches!(
            read_file(&dir.path().join("missing.record")),
            Err(ArchiveError::NotFound(_))
        ));
    }
}
