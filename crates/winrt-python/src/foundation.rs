//! Projected foundation types: the `Point`, `Size` and `Rect` value structs
//! and the universal object base.

use pyo3::prelude::*;
use pyo3::types::PyType;

use winrt_array::{HostStruct, HostValue, ObjectRef};

/// Runtime class given to objects created from Python without one.
const DEFAULT_RUNTIME_CLASS: &str = "Windows.Foundation.IInspectable";

// ============================================================================
// Value structs
// ============================================================================

/// `Windows.Foundation.Point`
#[pyclass(module = "winrt.windows.foundation", frozen, eq)]
#[derive(Debug, PartialEq)]
pub struct Point {
    #[pyo3(get)]
    pub x: f32,
    #[pyo3(get)]
    pub y: f32,
}

#[pymethods]
impl Point {
    #[new]
    #[pyo3(signature = (x = 0.0, y = 0.0))]
    fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    fn __repr__(&self) -> String {
        format!("Point(x={}, y={})", self.x, self.y)
    }
}

/// `Windows.Foundation.Size`
#[pyclass(module = "winrt.windows.foundation", frozen, eq)]
#[derive(Debug, PartialEq)]
pub struct Size {
    #[pyo3(get)]
    pub width: f32,
    #[pyo3(get)]
    pub height: f32,
}

#[pymethods]
impl Size {
    #[new]
    #[pyo3(signature = (width = 0.0, height = 0.0))]
    fn new(width: f32, height: f32) -> Self {
        Size { width, height }
    }

    fn __repr__(&self) -> String {
        format!("Size(width={}, height={})", self.width, self.height)
    }
}

/// `Windows.Foundation.Rect`
#[pyclass(module = "winrt.windows.foundation", frozen, eq)]
#[derive(Debug, PartialEq)]
pub struct Rect {
    #[pyo3(get)]
    pub x: f32,
    #[pyo3(get)]
    pub y: f32,
    #[pyo3(get)]
    pub width: f32,
    #[pyo3(get)]
    pub height: f32,
}

#[pymethods]
impl Rect {
    #[new]
    #[pyo3(signature = (x = 0.0, y = 0.0, width = 0.0, height = 0.0))]
    fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Rect(x={}, y={}, width={}, height={})",
            self.x, self.y, self.width, self.height
        )
    }
}

impl From<&Point> for HostValue {
    fn from(p: &Point) -> Self {
        HostValue::Struct(
            HostStruct::new("Point")
                .with("x", f64::from(p.x))
                .with("y", f64::from(p.y)),
        )
    }
}

impl From<&Size> for HostValue {
    fn from(s: &Size) -> Self {
        HostValue::Struct(
            HostStruct::new("Size")
                .with("width", f64::from(s.width))
                .with("height", f64::from(s.height)),
        )
    }
}

impl From<&Rect> for HostValue {
    fn from(r: &Rect) -> Self {
        HostValue::Struct(
            HostStruct::new("Rect")
                .with("x", f64::from(r.x))
                .with("y", f64::from(r.y))
                .with("width", f64::from(r.width))
                .with("height", f64::from(r.height)),
        )
    }
}

// ============================================================================
// Object
// ============================================================================

/// Base class of every projected runtime class.
#[pyclass(module = "winrt.system", subclass, frozen)]
pub struct Object {
    inner: ObjectRef,
}

impl Object {
    pub fn new(inner: ObjectRef) -> Self {
        Object { inner }
    }

    pub fn object_ref(&self) -> &ObjectRef {
        &self.inner
    }
}

#[pymethods]
impl Object {
    #[new]
    #[pyo3(signature = (runtime_class = DEFAULT_RUNTIME_CLASS))]
    fn py_new(runtime_class: &str) -> Self {
        Object::new(ObjectRef::new(runtime_class))
    }

    #[getter]
    fn runtime_class_name(&self) -> &str {
        self.inner.runtime_class_name()
    }

    /// Foreign references currently held on the underlying object
    #[getter]
    fn _ref_count(&self) -> usize {
        self.inner.ref_count()
    }

    fn __eq__(&self, other: &Bound<'_, PyAny>) -> bool {
        other
            .cast::<Object>()
            .is_ok_and(|other| other.get().inner == self.inner)
    }

    fn __hash__(&self) -> u64 {
        self.inner.as_raw() as usize as u64
    }

    fn __repr__(slf: &Bound<'_, Self>) -> PyResult<String> {
        let cls: Bound<'_, PyType> = slf.get_type();
        Ok(format!(
            "<{} object: {}>",
            cls.qualname()?,
            slf.get().inner.runtime_class_name()
        ))
    }
}
