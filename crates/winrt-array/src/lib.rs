//! # WinRT Array
//!
//! Typed arrays whose element type and memory layout follow the WinRT ABI,
//! bridged to a host scripting runtime.
//!
//! ## Overview
//!
//! An array holds `count` elements of one [`ElementKind`] in a single
//! contiguous buffer, laid out bit-for-bit as foreign code expects. The host
//! sees one uniform [`ArrayBridge`] type regardless of kind, can read it as a
//! sequence, and can export it as a read-only, zero-copy buffer view.
//!
//! ## Design Goals
//!
//! 1. **ABI exactness**: itemsize, format, shape and strides match the foreign layout
//! 2. **No partial arrays**: construction either completes or produces nothing
//! 3. **Pinned views**: storage cannot go away under an exported view
//! 4. **Foreign references**: handle elements are acquired on write and released on drop
//!
//! ## Module Structure
//!
//! - [`kind`]: element kinds, widths and format strings
//! - [`foreign`]: reference-counted string and object handles
//! - [`value`]: host value representation
//! - [`storage`]: contiguous typed storage
//! - [`resolver`]: descriptor resolution, registration table and hooks
//! - [`array_bridge`]: construction state machine and the array itself
//! - [`view`]: zero-copy view export
//! - [`config`]: optional TOML configuration
//! - [`error`]: error types

mod codec;

pub mod array_bridge;
pub mod config;
pub mod error;
pub mod foreign;
pub mod kind;
pub mod resolver;
pub mod storage;
pub mod value;
pub mod view;

// Re-export main types for convenience
pub use array_bridge::{ArrayBridge, ArrayInit, ExternalBuffer, RawBuffer, SizeLimit};
pub use codec::{TICKS_PER_MICROSECOND, UNIX_EPOCH_TICKS};
pub use config::BridgeConfig;
pub use error::{ArrayError, ArrayResult, HostErrorKind};
pub use foreign::{HString, ObjectRef};
pub use kind::ElementKind;
pub use resolver::{Descriptor, HookRegistry, Resolved, Resolver, TypeRegistry};
pub use storage::TypedArrayStorage;
pub use value::{HostStruct, HostValue};
pub use view::{export, RawView, ViewDescriptor, ViewFlags};
