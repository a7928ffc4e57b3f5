//! # winrt
//!
//! Python extension module exposing `winrt.Array`, a typed, immutable array
//! whose storage uses the WinRT ABI layout of its element type.
//!
//! ## Usage
//!
//! ```python
//! import winrt
//! from winrt import Point
//!
//! a = winrt.Array("i", [1, 2, 3])
//! assert bytes(memoryview(a)) == b"\x01\x00\x00\x00\x02\x00\x00\x00\x03\x00\x00\x00"
//!
//! points = winrt.Array(Point, [(0, 0), Point(1, 2)])
//! assert points[-1] == Point(1, 2)
//! ```
//!
//! ## Construction
//!
//! `Array(descriptor[, source])` resolves the descriptor (a format code
//! or a type) and then dispatches on the source: an index-like object gives
//! that many zero elements, a buffer-protocol object is copied, and an exact
//! `list` or `tuple` is converted element by element. Types registered with
//! [`hooks::register_array_hook`] construct their arrays themselves.

use std::ffi::c_int;

use pyo3::exceptions::{PyIndexError, PyOverflowError, PyTypeError};
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::{PyTuple, PyType};

use winrt_array::{ArrayBridge, ArrayInit};

pub mod buffer;
pub mod convert;
pub mod error;
pub mod foundation;
pub mod hooks;

use crate::error::IntoPyResult;
use crate::foundation::{Object, Point, Rect, Size};
use crate::hooks::{ArrayInitializer, DescriptorArg, Plan, Source};

// ============================================================================
// Array
// ============================================================================

/// `winrt.Array`
#[pyclass(module = "winrt", name = "Array", frozen, sequence)]
pub struct Array {
    bridge: ArrayBridge,
}

impl Array {
    /// Hand an array built on the Rust side to Python.
    pub fn wrap(py: Python<'_>, bridge: ArrayBridge) -> PyResult<Py<Array>> {
        Py::new(py, Array { bridge })
    }

    pub fn bridge(&self) -> &ArrayBridge {
        &self.bridge
    }
}

#[pymethods]
impl Array {
    #[new]
    #[pyo3(signature = (descriptor, *args))]
    fn py_new(
        py: Python<'_>,
        descriptor: &Bound<'_, PyAny>,
        args: &Bound<'_, PyTuple>,
    ) -> PyResult<Self> {
        // an omitted source and an explicit None are different requests
        let source = match args.len() {
            0 => None,
            1 => Some(args.get_item(0)?),
            n => {
                return Err(PyTypeError::new_err(format!(
                    "Array() takes at most 2 arguments ({} given)",
                    n + 1
                )))
            }
        };
        let source = source.as_ref();
        let descriptor = DescriptorArg::extract(descriptor)?;

        let bridge = match hooks::plan(py, descriptor.as_descriptor())? {
            Plan::Hook(hook) => hooks::run_hook(py, hook, descriptor.name(), source)?,
            Plan::Kind(kind) => {
                let source = Source::from_object(source)?;
                let mut init = ArrayInit::with_limit(hooks::size_limit());
                source.apply(&mut init, kind).into_py_result()?;
                init.finish().into_py_result()?
            }
        };

        Ok(Array { bridge })
    }

    fn __len__(&self) -> usize {
        self.bridge.len()
    }

    fn __getitem__<'py>(&self, index: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
        let py = index.py();
        // SAFETY: `index` is a live object and the GIL is held.
        if unsafe { ffi::PyIndex_Check(index.as_ptr()) } == 0 {
            return Err(PyTypeError::new_err(format!(
                "array indices must be integers, not '{}'",
                index.get_type().qualname()?
            )));
        }
        let index = match index.extract::<isize>() {
            Ok(index) => index,
            // too large for isize is past the end of any array
            Err(err) if err.is_instance_of::<PyOverflowError>(py) => {
                return Err(PyIndexError::new_err("array index out of range"))
            }
            Err(err) => return Err(err),
        };

        let len = self.bridge.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|&i| i < len)
        };
        let index = resolved.ok_or_else(|| PyIndexError::new_err("array index out of range"))?;
        let value = self.bridge.get(index).into_py_result()?;
        convert::to_python(py, &value)
    }

    /// Element kind name, e.g. `"Int32"`
    #[getter]
    fn kind(&self) -> &'static str {
        self.bridge.kind().name()
    }

    #[getter]
    fn itemsize(&self) -> usize {
        self.bridge.kind().byte_width()
    }

    fn __repr__(&self) -> String {
        format!(
            "<winrt.Array of {} [{}]>",
            self.bridge.kind(),
            self.bridge.len()
        )
    }

    #[classmethod]
    fn __class_getitem__<'py>(
        cls: &Bound<'py, PyType>,
        item: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        cls.py()
            .import("types")?
            .getattr("GenericAlias")?
            .call1((cls, item))
    }

    unsafe fn __getbuffer__(
        slf: Bound<'_, Self>,
        view: *mut ffi::Py_buffer,
        flags: c_int,
    ) -> PyResult<()> {
        let owner = slf.clone().into_any();
        buffer::fill_view(&slf.get().bridge, owner, view, flags)
    }

    unsafe fn __releasebuffer__(&self, view: *mut ffi::Py_buffer) {
        buffer::release_view(&self.bridge, view);
    }
}

// ============================================================================
// Module
// ============================================================================

/// Add the module's classes and functions to `m`.
pub fn register_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Array>()?;
    m.add_class::<ArrayInitializer>()?;
    m.add_class::<Point>()?;
    m.add_class::<Size>()?;
    m.add_class::<Rect>()?;
    m.add_class::<Object>()?;
    m.add_function(wrap_pyfunction!(hooks::register_array_hook, m)?)?;
    m.add_function(wrap_pyfunction!(hooks::register_array_type, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

#[pymodule]
fn winrt(m: &Bound<'_, PyModule>) -> PyResult<()> {
    register_module(m)
}
