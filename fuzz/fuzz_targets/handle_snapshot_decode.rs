#![no_main]

use libfuzzer_sys::fuzz_target;
use self_protect::{HandleRecordLayout, HandleSnapshot};

fuzz_target!(|data: &[u8]| {
    for layout in [HandleRecordLayout::WIDE_64, HandleRecordLayout::WIDE_32] {
        let records = layout.decode(data);
        if let Some(count) = layout.reported_count(data) {
            assert!(records.len() as u64 <= count);
        }
        assert!(layout.header_len() + records.len() * layout.record_len() <= data.len().max(layout.header_len()));

        let snapshot = HandleSnapshot::from_records(records);
        let _ = snapshot.iter().filter(|r| r.owning_pid == 4).count();
    }
});
