//! Typed Array Storage
//!
//! One contiguous, zero-filled buffer of `count` elements of a single
//! [`ElementKind`], laid out exactly as the foreign ABI expects. The buffer is
//! allocated once and never reallocated, so [`TypedArrayStorage::as_ptr`] is
//! stable for the storage's lifetime.
//!
//! Per-element access goes through the kind's converter. Handle kinds own one
//! foreign reference per non-null slot, released on overwrite and on drop.

use std::fmt;

use crate::codec::codec_for;
use crate::error::{ArrayError, ArrayResult};
use crate::kind::ElementKind;
use crate::value::HostValue;

/// Widest slot of any kind (Guid and Rect).
const MAX_SLOT: usize = 16;

/// Contiguous storage for a WinRT array.
pub struct TypedArrayStorage {
    kind: ElementKind,
    count: usize,
    // u64 words keep every slot 8-byte aligned
    words: Vec<u64>,
}

impl TypedArrayStorage {
    /// Allocate `count` zeroed elements of `kind`.
    pub fn allocate(kind: ElementKind, count: usize) -> ArrayResult<Self> {
        let size = count.checked_mul(kind.byte_width()).ok_or_else(|| {
            ArrayError::overflow(format!(
                "{} elements of {} exceed the addressable size",
                count, kind
            ))
        })?;

        let word_count = size.div_ceil(8);
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| ArrayError::Allocation { size })?;
        words.resize(word_count, 0);

        Ok(Self { kind, count, words })
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_width(&self) -> usize {
        self.kind.byte_width()
    }

    /// Total size in bytes, always `len() * byte_width()`
    pub fn byte_len(&self) -> usize {
        self.count * self.kind.byte_width()
    }

    /// Canonical format string used on export
    pub fn format(&self) -> &'static str {
        self.kind.format()
    }

    /// Start of the element buffer
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    /// The raw element bytes
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `byte_len()` initialized bytes and
        // u8 has no alignment requirement.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.byte_len()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        // SAFETY: as in `as_bytes`, through a unique borrow.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), len) }
    }

    /// Mutable raw bytes, only for kinds whose slots are plain data.
    pub fn plain_bytes_mut(&mut self) -> ArrayResult<&mut [u8]> {
        if self.kind.is_handle() {
            return Err(ArrayError::type_error(format!(
                "{} elements hold foreign references and cannot be written as raw bytes",
                self.kind
            )));
        }
        Ok(self.bytes_mut())
    }

    fn slot_range(&self, index: usize) -> ArrayResult<std::ops::Range<usize>> {
        if index >= self.count {
            return Err(ArrayError::Index {
                index,
                len: self.count,
            });
        }
        let width = self.kind.byte_width();
        Ok(index * width..(index + 1) * width)
    }

    /// Decode element `index`.
    pub fn get(&self, index: usize) -> ArrayResult<HostValue> {
        let range = self.slot_range(index)?;
        codec_for(self.kind).decode(&self.as_bytes()[range])
    }

    /// Encode `value` into element `index`.
    ///
    /// The slot is untouched if encoding fails; otherwise its previous
    /// reference, if any, is released.
    pub fn set(&mut self, index: usize, value: &HostValue) -> ArrayResult<()> {
        let range = self.slot_range(index)?;
        let codec = codec_for(self.kind);

        let mut staged = [0u8; MAX_SLOT];
        let staged = &mut staged[..range.len()];
        codec.encode(value, staged)?;

        let slot = &mut self.bytes_mut()[range];
        codec.release(slot);
        slot.copy_from_slice(staged);
        Ok(())
    }

    /// Decode every element in order
    pub fn to_values(&self) -> ArrayResult<Vec<HostValue>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }
}

impl Drop for TypedArrayStorage {
    fn drop(&mut self) {
        if !self.kind.is_handle() {
            return;
        }
        let codec = codec_for(self.kind);
        let width = self.kind.byte_width();
        for slot in self.bytes_mut().chunks_exact_mut(width) {
            codec.release(slot);
        }
    }
}

impl fmt::Debug for TypedArrayStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedArrayStorage")
            .field("kind", &self.kind)
            .field("count", &self.count)
            .finish()
    }
}
