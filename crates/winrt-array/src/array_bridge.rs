//! Array Bridge
//!
//! The host-visible array: exclusively owns one [`TypedArrayStorage`] and is
//! immutable once built.
//!
//! ## Construction
//!
//! An [`ArrayInit`] is the not-yet-built instance. Exactly one construction
//! path runs against it:
//!
//! - `empty`: zero elements
//! - `sized`: `count` zeroed elements
//! - `from_buffer`: verbatim copy of an external buffer's bytes
//! - `from_sequence`: per-element conversion of host values
//!
//! A construction hook is the fifth path; it receives the `ArrayInit` and
//! must run one of the four above. On failure the half-built storage is
//! dropped with the `ArrayInit`, so no partial array is ever observable.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, trace, warn};

use crate::error::{ArrayError, ArrayResult};
use crate::kind::ElementKind;
use crate::storage::TypedArrayStorage;
use crate::value::HostValue;
use crate::view::RawView;

// ============================================================================
// Size Limit
// ============================================================================

/// Upper bound on the element count of one array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimit {
    max_elements: u32,
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self {
            max_elements: u32::MAX,
        }
    }
}

impl SizeLimit {
    pub fn new(max_elements: u32) -> Self {
        Self { max_elements }
    }

    pub fn max_elements(&self) -> u32 {
        self.max_elements
    }

    /// Validate a requested size.
    pub fn check_size(&self, size: i128) -> ArrayResult<usize> {
        if size < 0 {
            return Err(ArrayError::value_error("array size cannot be negative"));
        }
        if size > i128::from(self.max_elements) {
            return Err(ArrayError::overflow(format!(
                "array size {} exceeds the maximum of {} elements",
                size, self.max_elements
            )));
        }
        usize::try_from(size)
            .map_err(|_| ArrayError::overflow(format!("array size {} is not addressable", size)))
    }

    /// Validate a count derived from a buffer or sequence.
    pub fn check_len(&self, len: usize) -> ArrayResult<usize> {
        if u32::try_from(len).map_or(true, |n| n > self.max_elements) {
            return Err(ArrayError::overflow(format!(
                "{} elements exceed the maximum of {} elements",
                len, self.max_elements
            )));
        }
        Ok(len)
    }
}

// ============================================================================
// External Buffers
// ============================================================================

/// A contiguous host buffer offered for ingestion.
pub trait ExternalBuffer {
    /// Size of one item in bytes
    fn itemsize(&self) -> usize;

    /// Total size in bytes
    fn len_bytes(&self) -> usize;

    /// Buffer format string, if the exporter supplied one
    fn format(&self) -> Option<&str>;

    /// Copy all `len_bytes()` bytes, in C order, into `dest`
    fn copy_to(&self, dest: &mut [u8]) -> ArrayResult<()>;
}

/// An [`ExternalBuffer`] over a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct RawBuffer<'a> {
    bytes: &'a [u8],
    itemsize: usize,
    format: Option<&'a str>,
}

impl<'a> RawBuffer<'a> {
    pub fn new(bytes: &'a [u8], itemsize: usize) -> Self {
        Self {
            bytes,
            itemsize,
            format: None,
        }
    }

    pub fn with_format(mut self, format: &'a str) -> Self {
        self.format = Some(format);
        self
    }
}

impl ExternalBuffer for RawBuffer<'_> {
    fn itemsize(&self) -> usize {
        self.itemsize
    }

    fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    fn format(&self) -> Option<&str> {
        self.format
    }

    fn copy_to(&self, dest: &mut [u8]) -> ArrayResult<()> {
        if dest.len() != self.bytes.len() {
            return Err(ArrayError::buffer(format!(
                "buffer holds {} bytes, destination {}",
                self.bytes.len(),
                dest.len()
            )));
        }
        dest.copy_from_slice(self.bytes);
        Ok(())
    }
}

// ============================================================================
// Construction State Machine
// ============================================================================

#[derive(Debug)]
enum InitState {
    Uninitialized,
    Ready(TypedArrayStorage),
    Invalid(ArrayError),
}

/// An array under construction.
#[derive(Debug)]
pub struct ArrayInit {
    state: InitState,
    limit: SizeLimit,
}

impl Default for ArrayInit {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayInit {
    pub fn new() -> Self {
        Self::with_limit(SizeLimit::default())
    }

    pub fn with_limit(limit: SizeLimit) -> Self {
        Self {
            state: InitState::Uninitialized,
            limit,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, InitState::Uninitialized)
    }

    /// Whether a construction path completed successfully
    pub fn is_ready(&self) -> bool {
        matches!(self.state, InitState::Ready(_))
    }

    fn run(
        &mut self,
        build: impl FnOnce(SizeLimit) -> ArrayResult<TypedArrayStorage>,
    ) -> ArrayResult<()> {
        if self.is_initialized() {
            return Err(ArrayError::type_error("array is already initialized"));
        }
        match build(self.limit) {
            Ok(storage) => {
                debug!(kind = %storage.kind(), count = storage.len(), "array constructed");
                self.state = InitState::Ready(storage);
                Ok(())
            }
            Err(err) => {
                self.state = InitState::Invalid(err.clone());
                Err(err)
            }
        }
    }

    /// Zero elements
    pub fn empty(&mut self, kind: ElementKind) -> ArrayResult<()> {
        self.run(|_| TypedArrayStorage::allocate(kind, 0))
    }

    /// `size` zero-valued elements
    pub fn sized(&mut self, kind: ElementKind, size: i128) -> ArrayResult<()> {
        self.run(|limit| {
            let count = limit.check_size(size)?;
            TypedArrayStorage::allocate(kind, count)
        })
    }

    /// Copy the bytes of `buffer`, whose layout must match `kind` exactly.
    pub fn from_buffer(&mut self, kind: ElementKind, buffer: &dyn ExternalBuffer) -> ArrayResult<()> {
        self.run(|limit| {
            if kind.is_handle() {
                return Err(ArrayError::type_error(format!(
                    "cannot create a {} array from a buffer",
                    kind
                )));
            }

            let itemsize = buffer.itemsize();
            if itemsize != kind.byte_width() {
                return Err(ArrayError::type_error(format!(
                    "buffer itemsize {} does not match {} element size {}",
                    itemsize,
                    kind,
                    kind.byte_width()
                )));
            }
            if let Some(format) = buffer.format() {
                if format != kind.format() {
                    return Err(ArrayError::type_error(format!(
                        "buffer format '{}' does not match '{}'",
                        format,
                        kind.format()
                    )));
                }
            }

            let len = buffer.len_bytes();
            if len % itemsize != 0 {
                return Err(ArrayError::type_error(format!(
                    "buffer length {} is not a multiple of itemsize {}",
                    len, itemsize
                )));
            }

            let count = limit.check_len(len / itemsize)?;
            let mut storage = TypedArrayStorage::allocate(kind, count)?;
            buffer.copy_to(storage.plain_bytes_mut()?)?;
            Ok(storage)
        })
    }

    /// Convert each of `values` into a new element.
    pub fn from_sequence(&mut self, kind: ElementKind, values: &[HostValue]) -> ArrayResult<()> {
        self.run(|limit| {
            let count = limit.check_len(values.len())?;
            let mut storage = TypedArrayStorage::allocate(kind, count)?;
            for (i, value) in values.iter().enumerate() {
                storage.set(i, value)?;
            }
            Ok(storage)
        })
    }

    /// Complete construction.
    pub fn finish(self) -> ArrayResult<ArrayBridge> {
        match self.state {
            InitState::Ready(storage) => Ok(ArrayBridge::new(storage)),
            InitState::Invalid(err) => Err(err),
            InitState::Uninitialized => Err(ArrayError::type_error("array is not initialized")),
        }
    }

    /// Complete construction after a hook has run against this instance.
    pub fn finish_hook(self, type_name: &str) -> ArrayResult<ArrayBridge> {
        if !self.is_initialized() {
            warn!(type_name, "construction hook returned without initializing the array");
            return Err(ArrayError::type_error(
                "construction hook did not initialize the array",
            ));
        }
        self.finish()
    }

    /// Run a construction hook against a fresh instance.
    pub fn with_hook<F>(type_name: &str, limit: SizeLimit, hook: F) -> ArrayResult<ArrayBridge>
    where
        F: FnOnce(&mut ArrayInit) -> ArrayResult<()>,
    {
        let mut init = ArrayInit::with_limit(limit);
        if let Err(err) = hook(&mut init) {
            warn!(type_name, error = %err, "construction hook failed");
            return Err(err);
        }
        init.finish_hook(type_name)
    }
}

// ============================================================================
// ArrayBridge
// ============================================================================

/// A fully built, immutable WinRT array.
#[derive(Debug)]
pub struct ArrayBridge {
    storage: TypedArrayStorage,
    leases: AtomicUsize,
}

impl ArrayBridge {
    fn new(storage: TypedArrayStorage) -> Self {
        Self {
            storage,
            leases: AtomicUsize::new(0),
        }
    }

    /// Wrap storage filled by foreign code
    pub fn adopt(storage: TypedArrayStorage) -> Self {
        debug!(kind = %storage.kind(), count = storage.len(), "adopted foreign array");
        Self::new(storage)
    }

    pub fn empty(kind: ElementKind) -> ArrayResult<Self> {
        let mut init = ArrayInit::new();
        init.empty(kind)?;
        init.finish()
    }

    pub fn sized(kind: ElementKind, size: i128) -> ArrayResult<Self> {
        let mut init = ArrayInit::new();
        init.sized(kind, size)?;
        init.finish()
    }

    pub fn from_buffer(kind: ElementKind, buffer: &dyn ExternalBuffer) -> ArrayResult<Self> {
        let mut init = ArrayInit::new();
        init.from_buffer(kind, buffer)?;
        init.finish()
    }

    pub fn from_sequence(kind: ElementKind, values: &[HostValue]) -> ArrayResult<Self> {
        let mut init = ArrayInit::new();
        init.from_sequence(kind, values)?;
        init.finish()
    }

    pub fn kind(&self) -> ElementKind {
        self.storage.kind()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn get(&self, index: usize) -> ArrayResult<HostValue> {
        self.storage.get(index)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    pub fn storage(&self) -> &TypedArrayStorage {
        &self.storage
    }

    /// Number of exported views not yet released
    pub fn outstanding_views(&self) -> usize {
        self.leases.load(Ordering::Acquire)
    }

    pub(crate) fn acquire_lease(&self) {
        self.leases.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_lease(&self) {
        let previous = self.leases.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "view released more often than exported");
    }

    /// Release a view detached from its descriptor.
    pub fn release_view(&self, view: RawView) {
        trace!(ptr = ?view.buf(), "raw view released");
        drop(view);
        self.release_lease();
    }
}

impl Drop for ArrayBridge {
    fn drop(&mut self) {
        let leases = *self.leases.get_mut();
        if leases > 0 {
            error!(
                kind = %self.storage.kind(),
                leases,
                "array dropped while views are still exported"
            );
        }
    }
}
