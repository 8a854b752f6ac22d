use deltarec::{BsdiffCodec, DeltaCodec};
use honggfuzz::fuzz;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if data.len() < 2 {
                return;
            }
            let split = data[0] as usize % data.len();
            let (old, new) = data[1..].split_at(split.min(data.len() - 1));
            if let Ok(patch) = BsdiffCodec.diff(old, new) {
                assert_eq!(BsdiffCodec.apply(old, &patch).ok().as_deref(), Some(new));
            }
        });
    }
}
