//! Flat binary report buffers.
//!
//! Each report is a single `Vec<f32>` with layout `[kind, count, records...]`
//! where every record starts with the entity's handle. Fixed-stride kinds
//! (transforms, collisions, wheels, constraint feedback) use one record size
//! per kind; the three soft-body kinds carry a per-record unit count and are
//! written and read through an explicit cursor.
//!
//! Capacity grows in whole chunks of [`CHUNK_RECORDS`] records and never
//! shrinks, so steady-state encoding performs no allocation as long as entity
//! counts are stable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scenelink_core::Handle;

/// Floats of header before the first record: kind tag, then record count.
pub const HEADER_SIZE: usize = 2;

/// Growth granularity, in records (or soft-body units).
pub const CHUNK_RECORDS: usize = 50;

/// The report kinds the worker can produce after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// 14 floats: handle, pos xyz, rot xyzw, linvel xyz, angvel xyz.
    WorldTransform,
    /// 5 floats: handle_a, handle_b, normal xyz.
    Collision,
    /// 9 floats: vehicle, wheel index, pos xyz, rot xyzw.
    VehicleWheel,
    /// 6 floats: constraint, body, world anchor xyz, applied impulse.
    ConstraintFeedback,
    /// Variable: handle, vertex count, then 3 floats per vertex.
    SoftRope,
    /// Variable: handle, vertex count, then 6 floats per vertex.
    SoftCloth,
    /// Variable: handle, face count, then 18 floats per face.
    SoftTrimesh,
}

impl ReportKind {
    /// Wire tag stored at offset 0 of every buffer.
    pub fn tag(self) -> f32 {
        match self {
            ReportKind::WorldTransform => 0.0,
            ReportKind::Collision => 1.0,
            ReportKind::VehicleWheel => 2.0,
            ReportKind::ConstraintFeedback => 3.0,
            ReportKind::SoftRope => 4.0,
            ReportKind::SoftCloth => 5.0,
            ReportKind::SoftTrimesh => 6.0,
        }
    }

    pub fn from_tag(tag: f32) -> Option<ReportKind> {
        match tag as i32 {
            0 => Some(ReportKind::WorldTransform),
            1 => Some(ReportKind::Collision),
            2 => Some(ReportKind::VehicleWheel),
            3 => Some(ReportKind::ConstraintFeedback),
            4 => Some(ReportKind::SoftRope),
            5 => Some(ReportKind::SoftCloth),
            6 => Some(ReportKind::SoftTrimesh),
            _ => None,
        }
    }

    /// Record size in floats for fixed-stride kinds, `None` for soft kinds.
    pub fn stride(self) -> Option<usize> {
        match self {
            ReportKind::WorldTransform => Some(14),
            ReportKind::Collision => Some(5),
            ReportKind::VehicleWheel => Some(9),
            ReportKind::ConstraintFeedback => Some(6),
            ReportKind::SoftRope | ReportKind::SoftCloth | ReportKind::SoftTrimesh => None,
        }
    }

    /// Floats per vertex/face for the soft kinds, `None` otherwise.
    pub fn unit_stride(self) -> Option<usize> {
        match self {
            ReportKind::SoftRope => Some(3),
            ReportKind::SoftCloth => Some(6),
            ReportKind::SoftTrimesh => Some(18),
            _ => None,
        }
    }
}

/// Errors surfaced when interpreting a buffer. A stale handle inside an
/// otherwise well-formed record is deliberately *not* an error; consumers
/// skip such records to tolerate removal races across the thread boundary.
#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("buffer too short to hold a header")]
    MissingHeader,
    #[error("unknown report kind tag {0}")]
    UnknownKind(f32),
    #[error("buffer truncated: need {needed} floats, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("{0:?} records have variable stride; use soft_records()")]
    VariableStride(ReportKind),
    #[error("{0:?} records have fixed stride; use records()")]
    FixedStride(ReportKind),
}

/// A growable flat report buffer owned by exactly one side at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBuffer {
    data: Vec<f32>,
}

impl ReportBuffer {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            data: vec![kind.tag(), 0.0],
        }
    }

    pub fn kind(&self) -> Option<ReportKind> {
        self.data.first().and_then(|t| ReportKind::from_tag(*t))
    }

    /// Record count claimed by the header.
    pub fn count(&self) -> usize {
        self.data.get(1).map(|c| *c as usize).unwrap_or(0)
    }

    pub fn set_count(&mut self, count: usize) {
        self.data[1] = count as f32;
    }

    /// Total buffer length in floats, including slack past the live records.
    pub fn len_floats(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Grow to at least `needed` floats, rounding the record region up to a
    /// whole number of chunks of `chunk_floats`. Never shrinks; a no-op when
    /// the current buffer is already large enough.
    fn grow_to(&mut self, needed: usize, chunk_floats: usize) {
        if self.data.len() >= needed {
            return;
        }
        let records_region = needed - HEADER_SIZE;
        let chunks = records_region.div_ceil(chunk_floats);
        self.data.resize(HEADER_SIZE + chunks * chunk_floats, 0.0);
    }

    /// Make room for `count` fixed-stride records and stamp the header count.
    ///
    /// Panics on soft kinds; those are encoded through [`soft_writer`].
    ///
    /// [`soft_writer`]: ReportBuffer::soft_writer
    pub fn begin_fixed(&mut self, count: usize) {
        let stride = self
            .kind()
            .and_then(ReportKind::stride)
            .expect("begin_fixed called on a variable-stride buffer");
        self.grow_to(HEADER_SIZE + count * stride, CHUNK_RECORDS * stride);
        self.set_count(count);
    }

    /// Write one fixed-stride record. The caller must have called
    /// [`begin_fixed`](ReportBuffer::begin_fixed) with a sufficient count.
    pub fn write_record(&mut self, index: usize, fields: &[f32]) {
        let stride = self
            .kind()
            .and_then(ReportKind::stride)
            .expect("write_record called on a variable-stride buffer");
        debug_assert_eq!(fields.len(), stride);
        let offset = HEADER_SIZE + index * stride;
        self.data[offset..offset + stride].copy_from_slice(fields);
    }

    /// Iterate the fixed-stride records the header claims.
    pub fn records(&self) -> Result<FixedRecords<'_>, ReportError> {
        if self.data.len() < HEADER_SIZE {
            return Err(ReportError::MissingHeader);
        }
        let kind = self
            .kind()
            .ok_or(ReportError::UnknownKind(self.data[0]))?;
        let stride = kind.stride().ok_or(ReportError::VariableStride(kind))?;
        let count = self.count();
        let needed = HEADER_SIZE + count * stride;
        if self.data.len() < needed {
            return Err(ReportError::Truncated {
                needed,
                have: self.data.len(),
            });
        }
        Ok(FixedRecords {
            data: &self.data[HEADER_SIZE..],
            stride,
            remaining: count,
        })
    }

    /// Start encoding soft-body records from the header boundary.
    pub fn soft_writer(&mut self) -> SoftWriter<'_> {
        let unit_stride = self
            .kind()
            .and_then(ReportKind::unit_stride)
            .expect("soft_writer called on a fixed-stride buffer");
        SoftWriter {
            buf: self,
            unit_stride,
            cursor: HEADER_SIZE,
            records: 0,
        }
    }

    /// Iterate variable-stride soft records. Validates the whole buffer up
    /// front so iteration itself cannot run out of bounds.
    pub fn soft_records(&self) -> Result<SoftRecords<'_>, ReportError> {
        if self.data.len() < HEADER_SIZE {
            return Err(ReportError::MissingHeader);
        }
        let kind = self
            .kind()
            .ok_or(ReportError::UnknownKind(self.data[0]))?;
        let unit_stride = kind.unit_stride().ok_or(ReportError::FixedStride(kind))?;
        let count = self.count();

        // Walk the records once to verify every unit count fits.
        let mut cursor = HEADER_SIZE;
        for _ in 0..count {
            if cursor + 2 > self.data.len() {
                return Err(ReportError::Truncated {
                    needed: cursor + 2,
                    have: self.data.len(),
                });
            }
            let units = self.data[cursor + 1] as usize;
            let end = cursor + 2 + units * unit_stride;
            if end > self.data.len() {
                return Err(ReportError::Truncated {
                    needed: end,
                    have: self.data.len(),
                });
            }
            cursor = end;
        }

        Ok(SoftRecords {
            data: &self.data,
            unit_stride,
            cursor: HEADER_SIZE,
            remaining: count,
        })
    }
}

/// Iterator over fixed-stride records; each item is one record's fields,
/// handle first.
#[derive(Debug)]
pub struct FixedRecords<'a> {
    data: &'a [f32],
    stride: usize,
    remaining: usize,
}

impl<'a> Iterator for FixedRecords<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<&'a [f32]> {
        if self.remaining == 0 {
            return None;
        }
        let (record, rest) = self.data.split_at(self.stride);
        self.data = rest;
        self.remaining -= 1;
        Some(record)
    }
}

/// Cursor-based encoder for the variable-stride soft kinds.
pub struct SoftWriter<'a> {
    buf: &'a mut ReportBuffer,
    unit_stride: usize,
    cursor: usize,
    records: usize,
}

impl SoftWriter<'_> {
    /// Append one soft-body record. `units` must be a whole number of
    /// vertices or faces for this buffer's kind.
    pub fn push(&mut self, handle: Handle, units: &[f32]) {
        debug_assert_eq!(units.len() % self.unit_stride, 0);
        let end = self.cursor + 2 + units.len();
        self.buf.grow_to(end, CHUNK_RECORDS * self.unit_stride);
        self.buf.data[self.cursor] = handle.to_f32();
        self.buf.data[self.cursor + 1] = (units.len() / self.unit_stride) as f32;
        self.buf.data[self.cursor + 2..end].copy_from_slice(units);
        self.cursor = end;
        self.records += 1;
    }

    /// Stamp the record count into the header.
    pub fn finish(self) {
        self.buf.set_count(self.records);
    }
}

/// One decoded soft-body record.
pub struct SoftRecord<'a> {
    pub handle: Handle,
    /// Flat payload, `unit_stride` floats per vertex/face.
    pub units: &'a [f32],
}

/// Iterator over validated soft-body records.
pub struct SoftRecords<'a> {
    data: &'a [f32],
    unit_stride: usize,
    cursor: usize,
    remaining: usize,
}

impl<'a> Iterator for SoftRecords<'a> {
    type Item = SoftRecord<'a>;

    fn next(&mut self) -> Option<SoftRecord<'a>> {
        if self.remaining == 0 {
            return None;
        }
        let handle = Handle::from_f32(self.data[self.cursor]);
        let units = self.data[self.cursor + 1] as usize;
        let start = self.cursor + 2;
        let end = start + units * self.unit_stride;
        self.cursor = end;
        self.remaining -= 1;
        Some(SoftRecord {
            handle,
            units: &self.data[start..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_record(i: usize) -> [f32; 14] {
        let h = (i + 1) as f32;
        [
            h,
            h * 10.0,
            h * 10.0 + 1.0,
            h * 10.0 + 2.0,
            0.0,
            0.0,
            0.0,
            1.0,
            h,
            -h,
            0.5,
            0.0,
            0.0,
            0.1,
        ]
    }

    fn roundtrip(count: usize) {
        let mut buf = ReportBuffer::new(ReportKind::WorldTransform);
        buf.begin_fixed(count);
        for i in 0..count {
            buf.write_record(i, &world_record(i));
        }

        assert_eq!(buf.kind(), Some(ReportKind::WorldTransform));
        assert_eq!(buf.count(), count);

        let decoded: Vec<_> = buf.records().unwrap().collect();
        assert_eq!(decoded.len(), count);
        for (i, record) in decoded.iter().enumerate() {
            assert_eq!(*record, &world_record(i)[..]);
        }
    }

    #[test]
    fn roundtrip_empty() {
        roundtrip(0);
    }

    #[test]
    fn roundtrip_single() {
        roundtrip(1);
    }

    #[test]
    fn roundtrip_full_chunk() {
        roundtrip(50);
    }

    #[test]
    fn roundtrip_chunk_boundary() {
        roundtrip(51);
    }

    #[test]
    fn roundtrip_many_chunks() {
        roundtrip(500);
    }

    #[test]
    fn growth_is_chunked() {
        let mut buf = ReportBuffer::new(ReportKind::Collision);
        buf.begin_fixed(1);
        // one chunk of 50 collision records
        assert_eq!(buf.len_floats(), HEADER_SIZE + 50 * 5);
        buf.begin_fixed(51);
        assert_eq!(buf.len_floats(), HEADER_SIZE + 100 * 5);
    }

    #[test]
    fn growth_is_idempotent() {
        let mut buf = ReportBuffer::new(ReportKind::WorldTransform);
        buf.begin_fixed(10);
        let len = buf.len_floats();
        let ptr = buf.as_slice().as_ptr();
        buf.begin_fixed(10);
        assert_eq!(buf.len_floats(), len);
        assert_eq!(buf.as_slice().as_ptr(), ptr);
    }

    #[test]
    fn buffers_never_shrink() {
        let mut buf = ReportBuffer::new(ReportKind::WorldTransform);
        buf.begin_fixed(500);
        let len = buf.len_floats();
        buf.begin_fixed(1);
        assert_eq!(buf.len_floats(), len);
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn kind_tag_survives_growth() {
        let mut buf = ReportBuffer::new(ReportKind::VehicleWheel);
        buf.begin_fixed(120);
        assert_eq!(buf.kind(), Some(ReportKind::VehicleWheel));
    }

    #[test]
    fn soft_records_roundtrip_mixed_sizes() {
        let mut buf = ReportBuffer::new(ReportKind::SoftRope);
        let a: Vec<f32> = (0..9).map(|i| i as f32).collect(); // 3 vertices
        let b: Vec<f32> = (0..30).map(|i| i as f32 * 0.5).collect(); // 10 vertices
        let mut writer = buf.soft_writer();
        writer.push(Handle(7), &a);
        writer.push(Handle(9), &b);
        writer.finish();

        assert_eq!(buf.count(), 2);
        let records: Vec<_> = buf.soft_records().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].handle, Handle(7));
        assert_eq!(records[0].units, &a[..]);
        assert_eq!(records[1].handle, Handle(9));
        assert_eq!(records[1].units, &b[..]);
    }

    #[test]
    fn soft_decode_rejects_truncation() {
        let mut buf = ReportBuffer::new(ReportKind::SoftCloth);
        let mut writer = buf.soft_writer();
        writer.push(Handle(1), &[0.0; 12]);
        writer.finish();
        // lie about the record count
        buf.set_count(2);
        assert!(matches!(
            buf.soft_records(),
            Err(ReportError::Truncated { .. })
        ));
    }

    #[test]
    fn fixed_accessor_rejects_soft_kind() {
        let buf = ReportBuffer::new(ReportKind::SoftTrimesh);
        assert_eq!(
            buf.records().unwrap_err(),
            ReportError::VariableStride(ReportKind::SoftTrimesh)
        );
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut buf = ReportBuffer::new(ReportKind::Collision);
        buf.data[0] = 42.0;
        assert_eq!(buf.records().unwrap_err(), ReportError::UnknownKind(42.0));
    }
}
