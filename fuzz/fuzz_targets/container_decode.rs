use deltarec::container::decode;
use deltarec::Record;
use honggfuzz::fuzz;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if let Ok(view) = decode(data) {
                for part in [view.session, view.events] {
                    if let Ok(record) = Record::from_parts(part.head, part.patches) {
                        let _ = record.compile();
                    }
                }
            }
        });
    }
}
