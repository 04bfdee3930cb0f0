//! Byte-addressable frame memory.
//!
//! Memory starts empty and only grows, in 32-byte words. The expansion
//! charge is computed by the handlers from [`calculate_memory_size`] and
//! [`crate::gas_cost::memory_expansion_cost`] before any access happens, so
//! the access methods themselves never fail.

use crate::constants::WORD_SIZE;
use crate::errors::ExceptionalHalt;
use bytes::Bytes;
use kestrel_common::U256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    buffer: Vec<u8>,
}

/// Word-aligned size needed to touch `[offset, offset + size)`.
///
/// Zero-size accesses never extend memory. Offsets that do not fit the
/// address space are out-of-gas: the expansion they imply could never be
/// paid for.
pub fn calculate_memory_size(offset: U256, size: usize) -> Result<usize, ExceptionalHalt> {
    if size == 0 {
        return Ok(0);
    }
    let offset: usize = offset
        .try_into()
        .map_err(|_| ExceptionalHalt::OutOfGas)?;
    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE))
        .ok_or(ExceptionalHalt::OutOfGas)
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current extent in bytes; always a multiple of 32.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn ensure(&mut self, end: usize) {
        let target = end.checked_next_multiple_of(WORD_SIZE).unwrap_or(end);
        if target > self.buffer.len() {
            self.buffer.resize(target, 0);
        }
    }

    pub fn load_word(&mut self, offset: usize) -> U256 {
        self.ensure(offset.saturating_add(WORD_SIZE));
        let mut word = [0u8; WORD_SIZE];
        if let Some(slice) = self
            .buffer
            .get(offset..offset.saturating_add(WORD_SIZE))
        {
            word.copy_from_slice(slice);
        }
        U256::from_big_endian(&word)
    }

    pub fn store_word(&mut self, offset: usize, value: U256) {
        self.store_data(offset, &value.to_big_endian());
    }

    pub fn store_byte(&mut self, offset: usize, value: u8) {
        self.ensure(offset.saturating_add(1));
        if let Some(slot) = self.buffer.get_mut(offset) {
            *slot = value;
        }
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let end = offset.saturating_add(data.len());
        self.ensure(end);
        if let Some(slice) = self.buffer.get_mut(offset..end) {
            slice.copy_from_slice(data);
        }
    }

    /// MCOPY semantics: overlapping ranges behave like `memmove`.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = src.saturating_add(len).max(dst.saturating_add(len));
        self.ensure(end);
        if src.saturating_add(len) <= self.buffer.len() && dst.saturating_add(len) <= self.buffer.len()
        {
            self.buffer
                .copy_within(src..src.saturating_add(len), dst);
        }
    }

    /// Bounded prefix copy for tracer snapshots; never extends memory.
    pub fn snapshot_prefix(&self, max_bytes: usize) -> Vec<u8> {
        self.buffer
            .get(..self.buffer.len().min(max_bytes))
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// Read `size` bytes starting at `offset`, extending first.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Bytes {
        if size == 0 {
            return Bytes::new();
        }
        self.ensure(offset.saturating_add(size));
        self.buffer
            .get(offset..offset.saturating_add(size))
            .map(|slice| Bytes::copy_from_slice(slice))
            .unwrap_or_default()
    }
}
