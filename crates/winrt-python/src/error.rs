//! Mapping from bridge errors to Python exceptions.

use pyo3::exceptions::{
    PyBufferError, PyIndexError, PyMemoryError, PyOverflowError, PyRuntimeError, PyTypeError,
    PyUnicodeError, PyValueError,
};
use pyo3::PyErr;

use winrt_array::{ArrayError, HostErrorKind};

/// Raise `err` as the Python exception class it maps to.
pub fn to_py_err(err: ArrayError) -> PyErr {
    let message = err.to_string();
    match err.host_kind() {
        HostErrorKind::TypeError => PyTypeError::new_err(message),
        HostErrorKind::ValueError => PyValueError::new_err(message),
        HostErrorKind::OverflowError => PyOverflowError::new_err(message),
        HostErrorKind::IndexError => PyIndexError::new_err(message),
        HostErrorKind::BufferError => PyBufferError::new_err(message),
        HostErrorKind::MemoryError => PyMemoryError::new_err(message),
        HostErrorKind::UnicodeError => PyUnicodeError::new_err(message),
        HostErrorKind::RuntimeError => PyRuntimeError::new_err(message),
    }
}

/// `map_err(to_py_err)` for bridge results.
pub trait IntoPyResult<T> {
    fn into_py_result(self) -> Result<T, PyErr>;
}

impl<T> IntoPyResult<T> for Result<T, ArrayError> {
    fn into_py_result(self) -> Result<T, PyErr> {
        self.map_err(to_py_err)
    }
}
