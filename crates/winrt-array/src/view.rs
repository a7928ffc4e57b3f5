//! View Export
//!
//! Read-only, zero-copy views over an [`ArrayBridge`]'s storage, shaped after
//! the PEP 3118 buffer protocol. Every view holds a lease on its bridge that
//! is returned when the view is released.
//!
//! ## Example
//!
//! ```
//! use winrt_array::{export, ArrayBridge, ElementKind, HostValue, ViewFlags};
//!
//! let values = [HostValue::Int(1), HostValue::Int(2), HostValue::Int(3)];
//! let array = ArrayBridge::from_sequence(ElementKind::UInt8, &values).unwrap();
//!
//! let view = export(&array, ViewFlags::FORMAT | ViewFlags::ND).unwrap();
//! assert_eq!(view.as_bytes(), &[1, 2, 3]);
//! assert_eq!(view.shape(), Some(3));
//! assert_eq!(view.format(), Some("B"));
//! assert_eq!(array.outstanding_views(), 1);
//!
//! drop(view);
//! assert_eq!(array.outstanding_views(), 0);
//! ```

use std::ffi::CStr;
use std::fmt;

use bitflags::bitflags;
use tracing::trace;

use crate::array_bridge::ArrayBridge;
use crate::error::{ArrayError, ArrayResult};

bitflags! {
    /// Request bits, numerically equal to the `PyBUF_*` constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewFlags: u32 {
        const WRITABLE = 0x0001;
        const FORMAT = 0x0004;
        const ND = 0x0008;
        /// Implies `ND`
        const STRIDES = 0x0010 | Self::ND.bits();
    }
}

impl ViewFlags {
    /// A plain request: pointer, length and itemsize only
    pub const SIMPLE: ViewFlags = ViewFlags::empty();
}

/// Export a read-only view of `bridge`.
///
/// Fails with a buffer error if `flags` asks for write access.
pub fn export(bridge: &ArrayBridge, flags: ViewFlags) -> ArrayResult<ViewDescriptor<'_>> {
    if flags.contains(ViewFlags::WRITABLE) {
        return Err(ArrayError::buffer("Array is not writable"));
    }

    bridge.acquire_lease();
    let view = RawView::new(bridge, flags);
    trace!(
        kind = %bridge.kind(),
        len = view.len,
        flags = flags.bits(),
        "view exported"
    );
    Ok(ViewDescriptor { bridge, raw: Some(view) })
}

// ============================================================================
// RawView
// ============================================================================

/// The data of an exported view, detached from any borrow.
///
/// Holds its bridge's lease until passed to [`ArrayBridge::release_view`].
/// Fields are laid out so a host can point its own buffer struct at them.
#[must_use = "a raw view must be returned with ArrayBridge::release_view"]
pub struct RawView {
    buf: *const u8,
    len: usize,
    itemsize: isize,
    shape: [isize; 1],
    has_shape: bool,
    has_strides: bool,
    format: Option<&'static CStr>,
}

impl RawView {
    fn new(bridge: &ArrayBridge, flags: ViewFlags) -> Self {
        let storage = bridge.storage();
        Self {
            buf: storage.as_ptr(),
            len: storage.byte_len(),
            // Widths and counts are bounded far below isize::MAX.
            itemsize: storage.byte_width() as isize,
            shape: [storage.len() as isize],
            has_shape: flags.contains(ViewFlags::ND),
            has_strides: flags.contains(ViewFlags::STRIDES),
            format: flags
                .contains(ViewFlags::FORMAT)
                .then(|| storage.kind().format_cstr()),
        }
    }

    /// Start of the viewed storage
    pub fn buf(&self) -> *const u8 {
        self.buf
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn itemsize(&self) -> isize {
        self.itemsize
    }

    /// Always one
    pub fn ndim(&self) -> usize {
        1
    }

    /// Always true
    pub fn readonly(&self) -> bool {
        true
    }

    /// Element count, if shape information was requested
    pub fn shape(&self) -> Option<usize> {
        self.has_shape.then_some(self.shape[0] as usize)
    }

    /// Pointer to the one-element shape array, or null.
    ///
    /// Valid while this `RawView` stays in place.
    pub fn shape_ptr(&self) -> *const isize {
        if self.has_shape {
            self.shape.as_ptr()
        } else {
            std::ptr::null()
        }
    }

    /// Element stride, if stride information was requested
    pub fn stride(&self) -> Option<isize> {
        self.has_strides.then_some(self.itemsize)
    }

    /// Pointer to the one-element strides array, or null
    pub fn strides_ptr(&self) -> *const isize {
        if self.has_strides {
            &self.itemsize
        } else {
            std::ptr::null()
        }
    }

    /// Format string, if format information was requested
    pub fn format(&self) -> Option<&'static str> {
        self.format.and_then(|f| f.to_str().ok())
    }

    /// Nul-terminated format string, or null
    pub fn format_ptr(&self) -> *const std::ffi::c_char {
        self.format.map_or(std::ptr::null(), CStr::as_ptr)
    }
}

impl fmt::Debug for RawView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawView")
            .field("buf", &self.buf)
            .field("len", &self.len)
            .field("itemsize", &self.itemsize)
            .field("shape", &self.shape())
            .field("stride", &self.stride())
            .field("format", &self.format())
            .finish()
    }
}

// ============================================================================
// ViewDescriptor
// ============================================================================

/// A scoped view; releases its lease when dropped.
pub struct ViewDescriptor<'a> {
    bridge: &'a ArrayBridge,
    // None only after `detach`
    raw: Option<RawView>,
}

impl<'a> ViewDescriptor<'a> {
    fn raw(&self) -> &RawView {
        match &self.raw {
            Some(raw) => raw,
            None => unreachable!("descriptor used after detach"),
        }
    }

    /// The viewed bytes, aliasing the bridge's storage
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bridge.as_bytes()
    }

    pub fn buf(&self) -> *const u8 {
        self.raw().buf()
    }

    pub fn len(&self) -> usize {
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }

    pub fn itemsize(&self) -> usize {
        self.raw().itemsize() as usize
    }

    pub fn ndim(&self) -> usize {
        1
    }

    pub fn readonly(&self) -> bool {
        true
    }

    pub fn shape(&self) -> Option<usize> {
        self.raw().shape()
    }

    pub fn stride(&self) -> Option<isize> {
        self.raw().stride()
    }

    pub fn format(&self) -> Option<&'static str> {
        self.raw().format()
    }

    /// Give up the borrow, keeping the lease in the returned [`RawView`]
    pub fn detach(mut self) -> RawView {
        match self.raw.take() {
            Some(raw) => raw,
            None => unreachable!("descriptor detached twice"),
        }
    }
}

impl Drop for ViewDescriptor<'_> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.bridge.release_view(raw);
        }
    }
}

impl fmt::Debug for ViewDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewDescriptor").field(&self.raw).finish()
    }
}
