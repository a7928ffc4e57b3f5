//! Error Types for the Array Bridge
//!
//! Every failure is reported synchronously at the point it is detected and
//! never retried. Construction failures drop the half-built storage together
//! with the instance, so an error always means "no object was produced".
//!
//! ## Error Categories
//!
//! - Descriptor resolution (`UnsupportedFormat`, `NotSupportedType`)
//! - Construction arguments (`Value`, `Overflow`, `Type`)
//! - Memory (`Allocation`)
//! - Element access (`Index`, `Encoding`)
//! - View export (`Buffer`)
//! - Configuration (`Config`)

use std::fmt;
use thiserror::Error;

/// Result type for array bridge operations
pub type ArrayResult<T> = Result<T, ArrayError>;

/// Array bridge error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Format code is not in the fixed descriptor table
    #[error("unsupported format string: '{format}'")]
    UnsupportedFormat {
        /// The rejected format code
        format: String,
    },

    /// Host type cannot be used as an element type
    #[error("cannot use {type_name} as type for WinRT array")]
    NotSupportedType {
        /// Qualified name of the offending type
        type_name: String,
    },

    /// Argument has the right type but an invalid value
    #[error("{message}")]
    Value {
        /// Error message
        message: String,
    },

    /// Size or derived count exceeds the platform bound
    #[error("{message}")]
    Overflow {
        /// Error message
        message: String,
    },

    /// Argument or element has the wrong type or shape
    #[error("{message}")]
    Type {
        /// Error message
        message: String,
    },

    /// Storage could not be allocated
    #[error("failed to allocate {size} bytes for array storage")]
    Allocation {
        /// Number of bytes requested
        size: usize,
    },

    /// Element index outside `0..count`
    #[error("index {index} out of range for array of length {len}")]
    Index {
        /// Requested index
        index: usize,
        /// Number of elements
        len: usize,
    },

    /// Stored UTF-16 data could not be decoded
    #[error("invalid UTF-16 data: {message}")]
    Encoding {
        /// Error message
        message: String,
    },

    /// View export refused
    #[error("{message}")]
    Buffer {
        /// Error message
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("invalid array bridge configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

/// Host exception class an [`ArrayError`] is raised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    TypeError,
    ValueError,
    OverflowError,
    IndexError,
    BufferError,
    MemoryError,
    UnicodeError,
    RuntimeError,
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostErrorKind::TypeError => "TypeError",
            HostErrorKind::ValueError => "ValueError",
            HostErrorKind::OverflowError => "OverflowError",
            HostErrorKind::IndexError => "IndexError",
            HostErrorKind::BufferError => "BufferError",
            HostErrorKind::MemoryError => "MemoryError",
            HostErrorKind::UnicodeError => "UnicodeError",
            HostErrorKind::RuntimeError => "RuntimeError",
        };
        f.write_str(name)
    }
}

impl ArrayError {
    /// Create an unsupported format error
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ArrayError::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a not supported type error
    pub fn not_supported_type(type_name: impl Into<String>) -> Self {
        ArrayError::NotSupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create a value error
    pub fn value_error(message: impl Into<String>) -> Self {
        ArrayError::Value {
            message: message.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow(message: impl Into<String>) -> Self {
        ArrayError::Overflow {
            message: message.into(),
        }
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        ArrayError::Type {
            message: message.into(),
        }
    }

    /// Create a type mismatch error for an element conversion
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        ArrayError::Type {
            message: format!("expected {}, got {}", expected, actual),
        }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        ArrayError::Encoding {
            message: message.into(),
        }
    }

    /// Create a buffer error
    pub fn buffer(message: impl Into<String>) -> Self {
        ArrayError::Buffer {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ArrayError::Config {
            message: message.into(),
        }
    }

    /// The host exception class this error is raised as.
    pub fn host_kind(&self) -> HostErrorKind {
        match self {
            ArrayError::UnsupportedFormat { .. } | ArrayError::Value { .. } => {
                HostErrorKind::ValueError
            }
            ArrayError::NotSupportedType { .. } | ArrayError::Type { .. } => {
                HostErrorKind::TypeError
            }
            ArrayError::Overflow { .. } => HostErrorKind::OverflowError,
            ArrayError::Allocation { .. } => HostErrorKind::MemoryError,
            ArrayError::Index { .. } => HostErrorKind::IndexError,
            ArrayError::Encoding { .. } => HostErrorKind::UnicodeError,
            ArrayError::Buffer { .. } => HostErrorKind::BufferError,
            ArrayError::Config { .. } => HostErrorKind::RuntimeError,
        }
    }

    /// Check if this error is raised as a host `TypeError`
    pub fn is_type_error(&self) -> bool {
        self.host_kind() == HostErrorKind::TypeError
    }

    /// Check if this error came from descriptor resolution
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            ArrayError::UnsupportedFormat { .. } | ArrayError::NotSupportedType { .. }
        )
    }
}
