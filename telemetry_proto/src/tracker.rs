//! Binary belief-tracker stream.
//!
//! Every field is little-endian and eight bytes wide. One record per frame:
//!
//! ```text
//! u64 frame_index
//! u64 entity_count
//! per entity:
//!     u64 row_count
//!     per row:
//!         u64 column_count
//!         f64 * column_count
//! ```
//!
//! Row and column extents are read per entity and per row, so grids may be
//! ragged and may be empty.

use crate::DecodeError;

/// One entity's probability grid, indexed `[x][y]`.
pub type BeliefGrid = Vec<Vec<f64>>;

/// Every tracked entity's grid for a single frame, indexed by entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeliefTensor {
    pub entities: Vec<BeliefGrid>,
}

impl BeliefTensor {
    pub fn new(entities: Vec<BeliefGrid>) -> Self {
        Self { entities }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerRecord {
    pub frame_index: u64,
    pub tensor: BeliefTensor,
}

const WORD: usize = 8;

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    records_recovered: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            records_recovered: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn truncated(&self, needed: usize) -> DecodeError {
        DecodeError::Truncated {
            records_recovered: self.records_recovered,
            offset: self.offset,
            needed,
            available: self.remaining(),
        }
    }

    fn take_word(&mut self) -> Result<[u8; WORD], DecodeError> {
        if self.remaining() < WORD {
            return Err(self.truncated(WORD));
        }
        let mut word = [0u8; WORD];
        word.copy_from_slice(&self.bytes[self.offset..self.offset + WORD]);
        self.offset += WORD;
        Ok(word)
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.take_word().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.take_word().map(f64::from_le_bytes)
    }

    /// Read a length prefix and make sure `len * min_item_bytes` is still
    /// available before anything is allocated for it.
    fn read_len(&mut self, min_item_bytes: usize) -> Result<usize, DecodeError> {
        let raw = self.read_u64()?;
        let needed = usize::try_from(raw)
            .ok()
            .and_then(|len| len.checked_mul(min_item_bytes));
        match needed {
            Some(needed) if needed <= self.remaining() => Ok(raw as usize),
            Some(needed) => Err(self.truncated(needed)),
            None => Err(self.truncated(usize::MAX)),
        }
    }

    fn read_grid(&mut self) -> Result<BeliefGrid, DecodeError> {
        let rows = self.read_len(WORD)?;
        let mut grid = Vec::with_capacity(rows);
        for _ in 0..rows {
            let columns = self.read_len(WORD)?;
            let mut row = Vec::with_capacity(columns);
            for _ in 0..columns {
                row.push(self.read_f64()?);
            }
            grid.push(row);
        }
        Ok(grid)
    }

    fn read_record(&mut self) -> Result<TrackerRecord, DecodeError> {
        let frame_index = self.read_u64()?;
        let entity_count = self.read_len(WORD)?;
        let mut entities = Vec::with_capacity(entity_count);
        for _ in 0..entity_count {
            entities.push(self.read_grid()?);
        }
        Ok(TrackerRecord {
            frame_index,
            tensor: BeliefTensor { entities },
        })
    }
}

/// Decode every record in a tracker stream. Stops cleanly when the stream
/// ends on a record boundary.
pub fn decode_tracker_stream(bytes: &[u8]) -> Result<Vec<TrackerRecord>, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::new();
    while cursor.remaining() > 0 {
        records.push(cursor.read_record()?);
        cursor.records_recovered += 1;
    }
    Ok(records)
}

pub fn encode_tracker_record_into(out: &mut Vec<u8>, record: &TrackerRecord) {
    out.extend_from_slice(&record.frame_index.to_le_bytes());
    out.extend_from_slice(&(record.tensor.entities.len() as u64).to_le_bytes());
    for grid in &record.tensor.entities {
        out.extend_from_slice(&(grid.len() as u64).to_le_bytes());
        for row in grid {
            out.extend_from_slice(&(row.len() as u64).to_le_bytes());
            for value in row {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
}

pub fn encode_tracker_stream(records: &[TrackerRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        encode_tracker_record_into(&mut out, record);
    }
    out
}
