#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;

use self_protect::{
    HandleRecordLayout, HandleTableSource, ProcessInspector, QueryOutcome, RawHandleValue,
    SystemHandleRecord, ThreadHandleSource,
};

pub const PSEUDO_THREAD_HANDLE: RawHandleValue = 0xFFFF_FFFF_FFFF_FFFE;
pub const FIRST_REAL_HANDLE: RawHandleValue = 0x2a4;
pub const THREAD_OBJECT_TYPE: u16 = 8;

/// In-memory host: a handle table, a process tree and a handle allocator.
#[derive(Debug)]
pub struct FakePlatform {
    pid: u32,
    layout: HandleRecordLayout,
    fail_duplicate: bool,
    next_handle: Mutex<RawHandleValue>,
    closed: Mutex<Vec<RawHandleValue>>,
    table: Mutex<Vec<SystemHandleRecord>>,
    parents: Mutex<HashMap<u32, u32>>,
    images: Mutex<HashMap<u32, String>>,
    scripted: Mutex<VecDeque<QueryOutcome>>,
    offered: Mutex<Vec<usize>>,
}

impl FakePlatform {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            layout: HandleRecordLayout::native(),
            fail_duplicate: false,
            next_handle: Mutex::new(FIRST_REAL_HANDLE),
            closed: Mutex::new(Vec::new()),
            table: Mutex::new(Vec::new()),
            parents: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
            scripted: Mutex::new(VecDeque::new()),
            offered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_duplicate(mut self) -> Self {
        self.fail_duplicate = true;
        self
    }

    pub fn with_layout(mut self, layout: HandleRecordLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_parent(self, child: u32, parent: u32) -> Self {
        self.set_parent(child, parent);
        self
    }

    pub fn with_image(self, pid: u32, path: &str) -> Self {
        self.images
            .lock()
            .expect("images lock")
            .insert(pid, path.to_string());
        self
    }

    pub fn set_parent(&self, child: u32, parent: u32) {
        self.parents
            .lock()
            .expect("parents lock")
            .insert(child, parent);
    }

    pub fn remove_process(&self, pid: u32) {
        self.parents.lock().expect("parents lock").remove(&pid);
        self.table
            .lock()
            .expect("table lock")
            .retain(|record| record.owning_pid != u64::from(pid));
    }

    pub fn open_handle(&self, owner: u32, handle_value: RawHandleValue) {
        self.table
            .lock()
            .expect("table lock")
            .push(thread_record(owner, handle_value));
    }

    pub fn close_handle_in(&self, owner: u32, handle_value: RawHandleValue) {
        self.table.lock().expect("table lock").retain(|record| {
            !(record.owning_pid == u64::from(owner) && record.handle_value == handle_value)
        });
    }

    pub fn script(&self, outcome: QueryOutcome) {
        self.scripted
            .lock()
            .expect("script lock")
            .push_back(outcome);
    }

    pub fn closed_handles(&self) -> Vec<RawHandleValue> {
        self.closed.lock().expect("closed lock").clone()
    }

    /// Buffer sizes handed to `query_handle_table`, in call order.
    pub fn offered_buffer_lens(&self) -> Vec<usize> {
        self.offered.lock().expect("offered lock").clone()
    }
}

impl ThreadHandleSource for FakePlatform {
    fn current_process_id(&self) -> u32 {
        self.pid
    }

    fn current_thread_pseudo_handle(&self) -> RawHandleValue {
        PSEUDO_THREAD_HANDLE
    }

    fn duplicate_same_access(&self, source: RawHandleValue) -> io::Result<RawHandleValue> {
        assert_eq!(source, PSEUDO_THREAD_HANDLE);
        if self.fail_duplicate {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "quota exhausted"));
        }
        let mut next = self.next_handle.lock().expect("handle lock");
        let handle = *next;
        *next += 4;
        self.open_handle(self.pid, handle);
        Ok(handle)
    }

    fn close_handle(&self, handle: RawHandleValue) -> io::Result<()> {
        self.closed.lock().expect("closed lock").push(handle);
        self.close_handle_in(self.pid, handle);
        Ok(())
    }
}

impl HandleTableSource for FakePlatform {
    fn query_handle_table(&self, buffer: &mut [u8]) -> QueryOutcome {
        self.offered.lock().expect("offered lock").push(buffer.len());
        if let Some(outcome) = self.scripted.lock().expect("script lock").pop_front() {
            return outcome;
        }

        let encoded = encode_snapshot(self.layout, &self.table.lock().expect("table lock"));
        if buffer.len() < encoded.len() {
            return QueryOutcome::LengthMismatch {
                required: encoded.len(),
            };
        }
        buffer[..encoded.len()].copy_from_slice(&encoded);
        QueryOutcome::Complete {
            written: encoded.len(),
        }
    }
}

impl ProcessInspector for FakePlatform {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        self.parents.lock().expect("parents lock").get(&pid).copied()
    }

    fn image_path(&self, pid: u32) -> Option<String> {
        self.images.lock().expect("images lock").get(&pid).cloned()
    }
}

pub fn thread_record(owner: u32, handle_value: RawHandleValue) -> SystemHandleRecord {
    SystemHandleRecord {
        object: 0xffff_a08f_1234_5080,
        owning_pid: u64::from(owner),
        handle_value,
        granted_access: 0x1f_ffff,
        creator_back_trace_index: 0,
        object_type_index: THREAD_OBJECT_TYPE,
        handle_attributes: 0,
        reserved: 0,
    }
}

/// Serialize records the way the kernel lays out `SYSTEM_HANDLE_INFORMATION_EX`.
pub fn encode_snapshot(layout: HandleRecordLayout, records: &[SystemHandleRecord]) -> Vec<u8> {
    encode_snapshot_with_count(layout, records, records.len() as u64)
}

pub fn encode_snapshot_with_count(
    layout: HandleRecordLayout,
    records: &[SystemHandleRecord],
    reported_count: u64,
) -> Vec<u8> {
    let width = layout.pointer_width();
    let mut out = Vec::with_capacity(layout.header_len() + records.len() * layout.record_len());
    push_uint(&mut out, reported_count, width);
    push_uint(&mut out, 0, width);
    for record in records {
        push_uint(&mut out, record.object, width);
        push_uint(&mut out, record.owning_pid, width);
        push_uint(&mut out, record.handle_value, width);
        out.extend_from_slice(&record.granted_access.to_le_bytes());
        out.extend_from_slice(&record.creator_back_trace_index.to_le_bytes());
        out.extend_from_slice(&record.object_type_index.to_le_bytes());
        out.extend_from_slice(&record.handle_attributes.to_le_bytes());
        out.extend_from_slice(&record.reserved.to_le_bytes());
    }
    out
}

fn push_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}
