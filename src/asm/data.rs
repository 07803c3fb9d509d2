/*!
The constant table: an auxiliary data region for constants which cannot be encoded as immediates
*/
use crate::target::Width;
use fxhash::FxHashMap;

/// A table of constants, addressed by a base register plus offset
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ConstantTable {
    /// The contents of the table
    data: Vec<u8>,
    /// The offset of each constant already in the table
    offsets: FxHashMap<(u64, Width), usize>,
}

/// A point a [`ConstantTable`] can be truncated back to
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableCheckpoint(usize);

impl ConstantTable {
    /// Create a new, empty constant table
    pub fn new() -> ConstantTable {
        ConstantTable::default()
    }
    /**
    Reserve a slot for a constant, returning its offset from the start of the table.

    Slots are aligned to their own width. A constant already in the table at the same width shares its
    slot.
    */
    pub fn reserve(&mut self, bits: u64, width: Width) -> usize {
        if let Some(offset) = self.offsets.get(&(bits, width)) {
            return *offset;
        }
        let size = width.bytes();
        let offset = (self.data.len() + size - 1) / size * size;
        self.data.resize(offset, 0);
        match width {
            Width::Word => self.data.extend_from_slice(&(bits as u32).to_be_bytes()),
            Width::Xword => self.data.extend_from_slice(&bits.to_be_bytes()),
        }
        self.offsets.insert((bits, width), offset);
        offset
    }
    /// The contents of this table
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
    /// The size of this table, in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    /// Whether this table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Record the current extent of this table
    #[inline]
    pub fn checkpoint(&self) -> TableCheckpoint {
        TableCheckpoint(self.data.len())
    }
    /// Remove every constant reserved since a checkpoint
    pub fn rollback(&mut self, checkpoint: TableCheckpoint) {
        let len = checkpoint.0;
        self.data.truncate(len);
        self.offsets.retain(|_, offset| *offset < len);
    }
    /// Remove every constant
    pub fn clear(&mut self) {
        self.data.clear();
        self.offsets.clear();
    }
}
