//! System-wide handle table snapshot.
//!
//! The kernel returns `SYSTEM_HANDLE_INFORMATION_EX`: a pointer-width header
//! (`NumberOfHandles`, `Reserved`) followed by fixed-size
//! `SYSTEM_HANDLE_TABLE_ENTRY_INFO_EX` records. The layout is decoded here by
//! explicit offsets so the rest of the crate only ever sees
//! [`SystemHandleRecord`] values.

use serde::Serialize;
use tracing::debug;

use crate::error::SnapshotError;
use crate::native::{HandleTableSource, QueryOutcome, RawHandleValue};

/// `SystemExtendedHandleInformation` information class.
pub const SYSTEM_EXTENDED_HANDLE_INFORMATION: u32 = 64;

pub const INITIAL_QUERY_BUFFER_BYTES: usize = 0x10000;

/// One entry of the extended handle table.
///
/// Only `owning_pid` and `handle_value` drive detection; the remaining fields
/// are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemHandleRecord {
    pub object: u64,
    pub owning_pid: u64,
    pub handle_value: RawHandleValue,
    pub granted_access: u32,
    pub creator_back_trace_index: u16,
    pub object_type_index: u16,
    pub handle_attributes: u32,
    pub reserved: u32,
}

/// Version 1 of the extended handle entry layout, parameterised by the
/// pointer width of the process that issued the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRecordLayout {
    pointer_width: usize,
}

impl HandleRecordLayout {
    pub const WIDE_64: Self = Self { pointer_width: 8 };
    pub const WIDE_32: Self = Self { pointer_width: 4 };

    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::WIDE_64
        } else {
            Self::WIDE_32
        }
    }

    pub fn pointer_width(&self) -> usize {
        self.pointer_width
    }

    pub fn header_len(&self) -> usize {
        self.pointer_width * 2
    }

    pub fn record_len(&self) -> usize {
        self.pointer_width * 3 + 16
    }

    /// Number of records the header claims, if the header is present.
    pub fn reported_count(&self, bytes: &[u8]) -> Option<u64> {
        read_uint_le(bytes, 0, self.pointer_width)
    }

    /// Decode every complete record in `bytes`.
    ///
    /// The header count is clamped to the records that actually fit, so a
    /// truncated or lying buffer never reads out of bounds.
    pub fn decode(&self, bytes: &[u8]) -> Vec<SystemHandleRecord> {
        let Some(reported) = self.reported_count(bytes) else {
            return Vec::new();
        };
        let available = bytes.len().saturating_sub(self.header_len()) / self.record_len();
        let count = usize::try_from(reported)
            .unwrap_or(usize::MAX)
            .min(available);

        let mut out = Vec::with_capacity(count);
        for index in 0..count {
            let offset = self.header_len() + index * self.record_len();
            if let Some(record) = self.decode_record(bytes, offset) {
                out.push(record);
            }
        }
        out
    }

    fn decode_record(&self, bytes: &[u8], offset: usize) -> Option<SystemHandleRecord> {
        let pw = self.pointer_width;
        let fixed = offset + pw * 3;
        Some(SystemHandleRecord {
            object: read_uint_le(bytes, offset, pw)?,
            owning_pid: read_uint_le(bytes, offset + pw, pw)?,
            handle_value: read_uint_le(bytes, offset + pw * 2, pw)?,
            granted_access: read_u32_le(bytes, fixed)?,
            creator_back_trace_index: read_u16_le(bytes, fixed + 4)?,
            object_type_index: read_u16_le(bytes, fixed + 6)?,
            handle_attributes: read_u32_le(bytes, fixed + 8)?,
            reserved: read_u32_le(bytes, fixed + 12)?,
        })
    }
}

impl Default for HandleRecordLayout {
    fn default() -> Self {
        Self::native()
    }
}

/// Decoded point-in-time handle table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleSnapshot {
    records: Vec<SystemHandleRecord>,
    reported_count: u64,
    buffer_len: usize,
    attempts: u32,
}

impl HandleSnapshot {
    pub fn from_records(records: Vec<SystemHandleRecord>) -> Self {
        Self {
            reported_count: records.len() as u64,
            records,
            buffer_len: 0,
            attempts: 0,
        }
    }

    pub fn records(&self) -> &[SystemHandleRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SystemHandleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count from the kernel header, before clamping.
    pub fn reported_count(&self) -> u64 {
        self.reported_count
    }

    /// Size of the final query buffer.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Number of query calls issued, including length-mismatch retries.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<'a> IntoIterator for &'a HandleSnapshot {
    type Item = &'a SystemHandleRecord;
    type IntoIter = std::slice::Iter<'a, SystemHandleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Query the extended handle table, growing the buffer until the kernel
/// accepts it.
///
/// A single buffer is reused across retries and dropped before returning.
/// Retries are not capped; the loop only ends on success, a non-length
/// status, or a failed allocation.
pub fn query_handle_snapshot<S>(
    source: &S,
    layout: HandleRecordLayout,
) -> Result<HandleSnapshot, SnapshotError>
where
    S: HandleTableSource + ?Sized,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut requested = INITIAL_QUERY_BUFFER_BYTES;
    let mut attempts = 0u32;

    loop {
        resize_zeroed(&mut buffer, requested)?;
        attempts = attempts.saturating_add(1);

        match source.query_handle_table(&mut buffer) {
            QueryOutcome::Complete { written } => {
                let valid = &buffer[..written.min(buffer.len())];
                let records = layout.decode(valid);
                let reported_count = layout.reported_count(valid).unwrap_or_default();
                debug!(
                    records = records.len(),
                    reported_count,
                    buffer_len = buffer.len(),
                    attempts,
                    "system handle snapshot captured"
                );
                return Ok(HandleSnapshot {
                    records,
                    reported_count,
                    buffer_len: buffer.len(),
                    attempts,
                });
            }
            QueryOutcome::LengthMismatch { required } => {
                requested = required.max(buffer.len().saturating_mul(2));
                debug!(required, next = requested, "handle snapshot buffer too small");
            }
            QueryOutcome::Failed { status } => {
                return Err(SnapshotError::QueryFailed { status });
            }
        }
    }
}

fn resize_zeroed(buffer: &mut Vec<u8>, len: usize) -> Result<(), SnapshotError> {
    buffer.clear();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| SnapshotError::Allocation { requested: len })?;
    buffer.resize(len, 0);
    Ok(())
}

fn read_uint_le(bytes: &[u8], off: usize, width: usize) -> Option<u64> {
    match width {
        8 => read_u64_le(bytes, off),
        4 => read_u32_le(bytes, off).map(u64::from),
        _ => None,
    }
}

fn read_u64_le(bytes: &[u8], off: usize) -> Option<u64> {
    let raw = bytes.get(off..off.checked_add(8)?)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}

fn read_u32_le(bytes: &[u8], off: usize) -> Option<u32> {
    let raw = bytes.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_u16_le(bytes: &[u8], off: usize) -> Option<u16> {
    let raw = bytes.get(off..off.checked_add(2)?)?;
    Some(u16::from_le_bytes(raw.try_into().ok()?))
}
