//! Process-wide resolver state, construction hooks and source dispatch.
//!
//! The resolver is built once from [`BridgeConfig::from_env`] and then
//! extended at runtime through [`register_array_hook`] and
//! [`register_array_type`]. The lock is never held while Python code runs.

use std::sync::OnceLock;

use parking_lot::{Mutex, RwLock};
use pyo3::exceptions::{PyRuntimeError, PyTypeError};
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::{PyList, PyString, PyTuple, PyType};
use tracing::{debug, warn};

use winrt_array::{
    ArrayBridge, ArrayInit, ArrayResult, BridgeConfig, Descriptor, ElementKind, HostValue, Resolved,
    Resolver, SizeLimit,
};

use crate::buffer::HostBuffer;
use crate::convert::to_host_value;
use crate::error::{to_py_err, IntoPyResult};

// ============================================================================
// Global state
// ============================================================================

struct BridgeState {
    resolver: Resolver<Py<PyAny>>,
    limit: SizeLimit,
}

static STATE: OnceLock<RwLock<BridgeState>> = OnceLock::new();

fn state() -> &'static RwLock<BridgeState> {
    STATE.get_or_init(|| {
        let config = BridgeConfig::from_env().unwrap_or_else(|err| {
            warn!(error = %err, "ignoring array bridge config");
            BridgeConfig::default()
        });
        RwLock::new(BridgeState {
            resolver: config.resolver(),
            limit: config.size_limit(),
        })
    })
}

pub(crate) fn size_limit() -> SizeLimit {
    state().read().limit
}

/// What constructing an array of a given descriptor involves.
pub(crate) enum Plan {
    Kind(ElementKind),
    Hook(Py<PyAny>),
}

pub(crate) fn plan(py: Python<'_>, descriptor: Descriptor<'_>) -> PyResult<Plan> {
    let state = state().read();
    match state.resolver.resolve(descriptor).into_py_result()? {
        Resolved::Kind(kind) => Ok(Plan::Kind(kind)),
        Resolved::Hook(hook) => Ok(Plan::Hook(hook.clone_ref(py))),
    }
}

fn resolve_kind(descriptor: Descriptor<'_>) -> PyResult<ElementKind> {
    state().read().resolver.resolve_kind(descriptor).into_py_result()
}

/// `module.qualname` of a Python type.
pub(crate) fn qualified_name(cls: &Bound<'_, PyType>) -> PyResult<String> {
    Ok(format!("{}.{}", cls.module()?, cls.qualname()?))
}

// ============================================================================
// Descriptors and sources
// ============================================================================

/// Owned form of a [`Descriptor`] taken from a Python argument.
pub(crate) enum DescriptorArg {
    Format(String),
    Type(String),
}

impl DescriptorArg {
    pub(crate) fn extract(obj: &Bound<'_, PyAny>) -> PyResult<Self> {
        if let Ok(s) = obj.cast::<PyString>() {
            Ok(DescriptorArg::Format(s.to_cow()?.into_owned()))
        } else if let Ok(cls) = obj.cast::<PyType>() {
            Ok(DescriptorArg::Type(qualified_name(cls)?))
        } else {
            Err(PyTypeError::new_err("first argument must be str or type"))
        }
    }

    pub(crate) fn as_descriptor(&self) -> Descriptor<'_> {
        match self {
            DescriptorArg::Format(s) => Descriptor::Format(s),
            DescriptorArg::Type(s) => Descriptor::Type(s),
        }
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            DescriptorArg::Format(s) | DescriptorArg::Type(s) => s,
        }
    }
}

/// Second constructor argument after dispatch.
pub(crate) enum Source<'py> {
    Empty,
    Sized(i128),
    Buffer(HostBuffer<'py>),
    Sequence(Vec<HostValue>),
}

impl<'py> Source<'py> {
    /// Dispatch in order: index-like, buffer, exact list or tuple.
    pub(crate) fn from_object(obj: Option<&Bound<'py, PyAny>>) -> PyResult<Self> {
        let Some(obj) = obj else {
            return Ok(Source::Empty);
        };
        let py = obj.py();

        // SAFETY: `obj` is a live object and the GIL is held.
        if unsafe { ffi::PyIndex_Check(obj.as_ptr()) } != 0 {
            match obj.extract::<i128>() {
                Ok(size) => return Ok(Source::Sized(size)),
                // an __index__ raising TypeError falls through
                Err(err) if err.is_instance_of::<PyTypeError>(py) => {}
                Err(err) => return Err(err),
            }
        }

        if HostBuffer::supported(obj) {
            return HostBuffer::acquire(obj).map(Source::Buffer);
        }

        if let Ok(list) = obj.cast_exact::<PyList>() {
            return list.iter().map(|item| to_host_value(&item)).collect::<PyResult<_>>().map(Source::Sequence);
        }
        if let Ok(tuple) = obj.cast_exact::<PyTuple>() {
            return tuple.iter().map(|item| to_host_value(&item)).collect::<PyResult<_>>().map(Source::Sequence);
        }

        Err(PyTypeError::new_err(format!(
            "cannot convert '{}' object to Array",
            obj.get_type().qualname()?
        )))
    }

    pub(crate) fn apply(&self, init: &mut ArrayInit, kind: ElementKind) -> ArrayResult<()> {
        match self {
            Source::Empty => init.empty(kind),
            Source::Sized(size) => init.sized(kind, *size),
            Source::Buffer(buffer) => init.from_buffer(kind, buffer),
            Source::Sequence(values) => init.from_sequence(kind, values),
        }
    }
}

// ============================================================================
// ArrayInitializer
// ============================================================================

/// The uninitialized array handed to a construction hook.
///
/// Exactly one construction method may succeed; the initializer goes
/// inactive once the hook returns.
#[pyclass(module = "winrt", frozen)]
pub struct ArrayInitializer {
    init: Mutex<Option<ArrayInit>>,
}

impl ArrayInitializer {
    fn new(limit: SizeLimit) -> Self {
        ArrayInitializer {
            init: Mutex::new(Some(ArrayInit::with_limit(limit))),
        }
    }

    fn take(&self) -> Option<ArrayInit> {
        self.init.lock().take()
    }

    fn with_init(&self, f: impl FnOnce(&mut ArrayInit) -> ArrayResult<()>) -> PyResult<()> {
        let mut guard = self.init.lock();
        let init = guard
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("initializer is no longer active"))?;
        f(init).map_err(to_py_err)
    }
}

#[pymethods]
impl ArrayInitializer {
    fn empty(&self, descriptor: &Bound<'_, PyAny>) -> PyResult<()> {
        let descriptor = DescriptorArg::extract(descriptor)?;
        let kind = resolve_kind(descriptor.as_descriptor())?;
        self.with_init(|init| init.empty(kind))
    }

    fn sized(&self, descriptor: &Bound<'_, PyAny>, size: i128) -> PyResult<()> {
        let descriptor = DescriptorArg::extract(descriptor)?;
        let kind = resolve_kind(descriptor.as_descriptor())?;
        self.with_init(|init| init.sized(kind, size))
    }

    fn from_buffer(&self, descriptor: &Bound<'_, PyAny>, buffer: &Bound<'_, PyAny>) -> PyResult<()> {
        let descriptor = DescriptorArg::extract(descriptor)?;
        let kind = resolve_kind(descriptor.as_descriptor())?;
        let buffer = HostBuffer::acquire(buffer)?;
        self.with_init(|init| init.from_buffer(kind, &buffer))
    }

    /// Accepts any iterable.
    fn from_sequence(&self, descriptor: &Bound<'_, PyAny>, values: &Bound<'_, PyAny>) -> PyResult<()> {
        let descriptor = DescriptorArg::extract(descriptor)?;
        let kind = resolve_kind(descriptor.as_descriptor())?;
        let values = values
            .try_iter()?
            .map(|item| to_host_value(&item?))
            .collect::<PyResult<Vec<_>>>()?;
        self.with_init(|init| init.from_sequence(kind, &values))
    }

    fn __repr__(&self) -> &'static str {
        match self.init.lock().as_ref() {
            Some(init) if init.is_initialized() => "<ArrayInitializer initialized>",
            Some(_) => "<ArrayInitializer pending>",
            None => "<ArrayInitializer inactive>",
        }
    }
}

/// Run `hook(initializer, source)` and complete the array it built.
pub(crate) fn run_hook(
    py: Python<'_>,
    hook: Py<PyAny>,
    type_name: &str,
    source: Option<&Bound<'_, PyAny>>,
) -> PyResult<ArrayBridge> {
    let initializer = Bound::new(py, ArrayInitializer::new(size_limit()))?;
    let result = hook.call1(py, (initializer.clone(), source));
    let init = initializer.get().take();

    if let Err(err) = result {
        warn!(type_name, error = %err, "construction hook raised");
        return Err(err);
    }
    init.ok_or_else(|| PyRuntimeError::new_err("initializer is no longer active"))?
        .finish_hook(type_name)
        .into_py_result()
}

// ============================================================================
// Registration functions
// ============================================================================

/// Let `callback(init, source)` construct arrays of `cls`.
#[pyfunction]
pub fn register_array_hook(cls: &Bound<'_, PyType>, callback: Bound<'_, PyAny>) -> PyResult<()> {
    if !callback.is_callable() {
        return Err(PyTypeError::new_err("array hook must be callable"));
    }
    let type_name = qualified_name(cls)?;
    debug!(type_name = %type_name, "registering array hook");
    // the replaced hook is dropped outside the lock
    let previous = state().write().resolver.register_hook(type_name, callback.unbind());
    drop(previous);
    Ok(())
}

/// Map `cls` to the element kind named `kind_name`, e.g. `"Int32"`.
#[pyfunction]
pub fn register_array_type(cls: &Bound<'_, PyType>, kind_name: &str) -> PyResult<()> {
    let kind: ElementKind = kind_name.parse().map_err(to_py_err)?;
    let type_name = qualified_name(cls)?;
    debug!(type_name = %type_name, %kind, "registering array element type");
    state().write().resolver.register_type(type_name, kind);
    Ok(())
}
