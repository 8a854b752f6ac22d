use std::io::Write;

use deltarec::container::{decode, encode, ArchiveView, RecordView};
use deltarec::{Archive, ArchiveError};
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

fn sample_archive_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fuzz.record");
    let archive = Archive::new(&path);
    let mut rng = StdRng::seed_from_u64(7);
    let mut state = vec![0u8; 256];
    for _ in 0..8 {
        rng.fill_bytes(&mut state[..64]);
        archive.append_state(&state, &state[..128]).unwrap();
    }
    std::fs::read(&path).unwrap()
}

fn gzip(raw: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(raw).unwrap();
    gz.finish().unwrap()
}

#[test]
fn every_truncation_fails() {
    let data = sample_archive_bytes();
    for cut in 1..data.len() {
        let res = decode(&data[..data.len() - cut]);
        assert!(
            matches!(res, Err(ArchiveError::Decompress(_)) | Err(ArchiveError::Decode(_))),
            "truncating {cut} bytes was accepted"
        );
    }
}

#[test]
fn single_bit_flip_fuzz() {
    let data = sample_archive_bytes();
    let total_bits = data.len() * 8;
    let mut rng = StdRng::seed_from_u64(42);
    let mut failures = 0u32;
    let trials = 200u32;
    for _ in 0..trials {
        let mut buf = data.clone();
        let bit = rng.gen_range(0..total_bits);
        buf[bit / 8] ^= 1u8 << (7 - (bit % 8));
        if decode(&buf).is_err() {
            failures += 1;
        }
    }
    // only the gzip mtime/xfl/os header bytes are not covered by a check
    assert!(failures as f64 / trials as f64 >= 0.9);
}

#[test]
fn headless_chain_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("headless.record");
    let view = ArchiveView {
        session: RecordView { head: None, patches: vec![vec![0, b'x']] },
        events: RecordView::default(),
    };
    std::fs::write(&path, encode(&view, 6).unwrap()).unwrap();
    assert!(matches!(Archive::load(&path, |_, _, _| {}), Err(ArchiveError::Decode(_))));
}

#[test]
fn corrupt_patch_is_codec_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("badpatch.record");
    let view = ArchiveView {
        session: RecordView { head: Some(b"{}".to_vec()), patches: vec![vec![0xEE, 1, 2, 3]] },
        events: RecordView::default(),
    };
    std::fs::write(&path, encode(&view, 6).unwrap()).unwrap();
    assert!(matches!(Archive::load(&path, |_, _, _| {}), Err(ArchiveError::Codec(_))));
}

#[test]
fn wrong_shape_is_decode_error() {
    for raw in [&b"[]"[..], b"{\"session\":\"x\",\"events\":{}}", b"{\"session\":{\"patches\":[1]},\"events\":{}}"] {
        assert!(matches!(decode(&gzip(raw)), Err(ArchiveError::Decode(_))));
    }
}
