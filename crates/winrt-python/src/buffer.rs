//! Buffer protocol plumbing, in both directions.
//!
//! [`HostBuffer`] consumes a buffer exported by another Python object during
//! buffer ingest. [`fill_view`] and [`release_view`] implement the `Array`
//! side of `bf_getbuffer` and `bf_releasebuffer`.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::mem::MaybeUninit;

use pyo3::ffi;
use pyo3::prelude::*;

use winrt_array::{export, ArrayBridge, ArrayError, ArrayResult, ExternalBuffer, RawView, ViewFlags};

use crate::error::IntoPyResult;

// ============================================================================
// Incoming buffers
// ============================================================================

/// A `Py_buffer` acquired with `PyBUF_FULL_RO`, released on drop.
pub struct HostBuffer<'py> {
    py: Python<'py>,
    // boxed so the exporter may keep pointers into it
    view: Box<ffi::Py_buffer>,
    format: Option<String>,
}

impl<'py> HostBuffer<'py> {
    /// Whether `obj` supports the buffer protocol
    pub fn supported(obj: &Bound<'py, PyAny>) -> bool {
        // SAFETY: `obj` is a live object and the GIL is held.
        unsafe { ffi::PyObject_CheckBuffer(obj.as_ptr()) != 0 }
    }

    pub fn acquire(obj: &Bound<'py, PyAny>) -> PyResult<Self> {
        let py = obj.py();
        // SAFETY: Py_buffer is plain data for which all-zero is a valid value.
        let mut view = Box::new(unsafe { MaybeUninit::<ffi::Py_buffer>::zeroed().assume_init() });

        // SAFETY: `view` is writable and outlives the buffer; released in Drop.
        if unsafe { ffi::PyObject_GetBuffer(obj.as_ptr(), &mut *view, ffi::PyBUF_FULL_RO) } == -1 {
            return Err(PyErr::fetch(py));
        }

        let format = if view.format.is_null() {
            None
        } else {
            // SAFETY: a non-null format is a nul-terminated string owned by
            // the exporter for the lifetime of the buffer.
            Some(unsafe { CStr::from_ptr(view.format) }.to_string_lossy().into_owned())
        };

        Ok(HostBuffer { py, view, format })
    }
}

impl ExternalBuffer for HostBuffer<'_> {
    fn itemsize(&self) -> usize {
        usize::try_from(self.view.itemsize).unwrap_or(0)
    }

    fn len_bytes(&self) -> usize {
        usize::try_from(self.view.len).unwrap_or(0)
    }

    fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    fn copy_to(&self, dest: &mut [u8]) -> ArrayResult<()> {
        if dest.len() != self.len_bytes() {
            return Err(ArrayError::buffer(format!(
                "buffer holds {} bytes, destination {}",
                self.len_bytes(),
                dest.len()
            )));
        }

        let view: *const ffi::Py_buffer = &*self.view;
        // SAFETY: `dest` has room for exactly `view.len` bytes.
        let rc = unsafe {
            ffi::PyBuffer_ToContiguous(
                dest.as_mut_ptr().cast::<c_void>(),
                view.cast_mut(),
                self.view.len,
                b'C' as c_char,
            )
        };
        if rc == -1 {
            return Err(ArrayError::buffer(PyErr::fetch(self.py).to_string()));
        }
        Ok(())
    }
}

impl Drop for HostBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: acquired by PyObject_GetBuffer and released exactly once.
        unsafe { ffi::PyBuffer_Release(&mut *self.view) };
    }
}

// ============================================================================
// Outgoing views
// ============================================================================

/// Fill `view` with a read-only export of `bridge`, owned by `owner`.
///
/// # Safety
///
/// `view` must be a valid, writable `Py_buffer` and `owner` must be the
/// Python object that owns `bridge`.
pub unsafe fn fill_view(
    bridge: &ArrayBridge,
    owner: Bound<'_, PyAny>,
    view: *mut ffi::Py_buffer,
    flags: c_int,
) -> PyResult<()> {
    if view.is_null() {
        return Err(pyo3::exceptions::PyBufferError::new_err("View is null"));
    }

    // Bits beyond the ones a 1-D contiguous export cares about are ignored.
    let flags = ViewFlags::from_bits_truncate(flags as u32);
    let raw = Box::new(export(bridge, flags).into_py_result()?.detach());

    (*view).buf = raw.buf().cast_mut().cast::<c_void>();
    (*view).len = raw.len() as ffi::Py_ssize_t;
    (*view).readonly = 1;
    (*view).itemsize = raw.itemsize();
    (*view).format = raw.format_ptr().cast_mut();
    (*view).ndim = 1;
    (*view).shape = raw.shape_ptr().cast_mut();
    (*view).strides = raw.strides_ptr().cast_mut();
    (*view).suboffsets = std::ptr::null_mut();
    (*view).internal = Box::into_raw(raw).cast::<c_void>();
    // the view's strong reference pins the owner, and with it the storage
    (*view).obj = owner.into_ptr();
    Ok(())
}

/// Return the lease taken by [`fill_view`].
///
/// # Safety
///
/// `view` must have been filled by [`fill_view`] for `bridge` and not yet
/// released.
pub unsafe fn release_view(bridge: &ArrayBridge, view: *mut ffi::Py_buffer) {
    let internal = (*view).internal.cast::<RawView>();
    if internal.is_null() {
        return;
    }
    (*view).internal = std::ptr::null_mut();
    bridge.release_view(*Box::from_raw(internal));
}
