//! Foreign Handle Types
//!
//! The two reference-counted handle types that WinRT arrays store by
//! pointer: `HSTRING`-style immutable UTF-16 strings and object references.
//!
//! ## Raw slot protocol
//!
//! A slot holds either null or a pointer that owns exactly one reference:
//!
//! - `into_raw`: move one reference into a slot
//! - `clone_from_raw`: acquire a new reference from a slot, leaving it intact
//! - `release_raw`: drop the slot's reference
//!
//! Null means "empty string" for [`HString`] and "no object" for [`ObjectRef`].

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::{ArrayError, ArrayResult};

// ============================================================================
// HString
// ============================================================================

/// Immutable, reference-counted UTF-16 string.
#[derive(Clone)]
pub struct HString(Arc<HStringData>);

struct HStringData {
    units: Box<[u16]>,
}

impl HString {
    /// Create a string from UTF-8 text
    pub fn new(text: &str) -> Self {
        Self::from_wide(&text.encode_utf16().collect::<Vec<_>>())
    }

    /// Create a string from UTF-16 code units, which need not be well formed
    pub fn from_wide(units: &[u16]) -> Self {
        HString(Arc::new(HStringData {
            units: units.into(),
        }))
    }

    /// The UTF-16 code units
    pub fn as_wide(&self) -> &[u16] {
        &self.0.units
    }

    pub fn len(&self) -> usize {
        self.0.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.units.is_empty()
    }

    /// Decode to UTF-8, failing on unpaired surrogates
    pub fn to_string_checked(&self) -> ArrayResult<String> {
        String::from_utf16(&self.0.units).map_err(|e| ArrayError::encoding(e.to_string()))
    }

    /// Current number of references
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Move this reference into a raw slot value.
    pub fn into_raw(self) -> *const c_void {
        Arc::into_raw(self.0).cast()
    }

    /// Acquire a new reference from a raw slot value.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a value produced by [`HString::into_raw`] whose
    /// reference has not been released.
    pub unsafe fn clone_from_raw(ptr: *const c_void) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let ptr = ptr.cast::<HStringData>();
        Arc::increment_strong_count(ptr);
        Some(HString(Arc::from_raw(ptr)))
    }

    /// Release the reference held by a raw slot value.
    ///
    /// # Safety
    ///
    /// Same as [`HString::clone_from_raw`]; the slot must not be used again.
    pub unsafe fn release_raw(ptr: *const c_void) {
        if !ptr.is_null() {
            drop(Arc::from_raw(ptr.cast::<HStringData>()));
        }
    }
}

impl PartialEq for HString {
    fn eq(&self, other: &Self) -> bool {
        self.as_wide() == other.as_wide()
    }
}

impl Eq for HString {}

impl fmt::Debug for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HString({:?})", String::from_utf16_lossy(self.as_wide()))
    }
}

// ============================================================================
// ObjectRef
// ============================================================================

/// A foreign object: its runtime class name plus whatever the projection
/// attached to it.
pub struct ForeignObject {
    class_name: SmolStr,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

/// Reference to a foreign object. Cloning adds a reference, dropping
/// releases one. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<ForeignObject>);

impl ObjectRef {
    /// Create a new object with a single reference
    pub fn new(class_name: impl Into<SmolStr>) -> Self {
        ObjectRef(Arc::new(ForeignObject {
            class_name: class_name.into(),
            payload: None,
        }))
    }

    /// Create a new object carrying a payload
    pub fn with_payload<T: Any + Send + Sync>(class_name: impl Into<SmolStr>, payload: T) -> Self {
        ObjectRef(Arc::new(ForeignObject {
            class_name: class_name.into(),
            payload: Some(Box::new(payload)),
        }))
    }

    pub fn runtime_class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Borrow the payload if it has type `T`
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.0.payload.as_deref()?.downcast_ref::<T>()
    }

    /// Current number of references
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Address of the foreign object, stable while any reference exists
    pub fn as_raw(&self) -> *const c_void {
        Arc::as_ptr(&self.0).cast()
    }

    /// Move this reference into a raw slot value.
    pub fn into_raw(self) -> *const c_void {
        Arc::into_raw(self.0).cast()
    }

    /// Acquire a new reference from a raw slot value.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a value produced by [`ObjectRef::into_raw`]
    /// whose reference has not been released.
    pub unsafe fn clone_from_raw(ptr: *const c_void) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let ptr = ptr.cast::<ForeignObject>();
        Arc::increment_strong_count(ptr);
        Some(ObjectRef(Arc::from_raw(ptr)))
    }

    /// Release the reference held by a raw slot value.
    ///
    /// # Safety
    ///
    /// Same as [`ObjectRef::clone_from_raw`]; the slot must not be used again.
    pub unsafe fn release_raw(ptr: *const c_void) {
        if !ptr.is_null() {
            drop(Arc::from_raw(ptr.cast::<ForeignObject>()));
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:p})", self.0.class_name, self.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hstring_raw_round_trip() {
        let s = HString::new("héllo");
        let raw = s.clone().into_raw();
        assert_eq!(s.ref_count(), 2);

        let copy = unsafe { HString::clone_from_raw(raw) }.unwrap();
        assert_eq!(copy, s);
        assert_eq!(s.ref_count(), 3);

        drop(copy);
        unsafe { HString::release_raw(raw) };
        assert_eq!(s.ref_count(), 1);
    }

    #[test]
    fn test_hstring_null_slot() {
        assert!(unsafe { HString::clone_from_raw(std::ptr::null()) }.is_none());
        unsafe { HString::release_raw(std::ptr::null()) };
    }

    #[test]
    fn test_hstring_lone_surrogate() {
        let s = HString::from_wide(&[0x0061, 0xD800]);
        assert!(matches!(
            s.to_string_checked(),
            Err(ArrayError::Encoding { .. })
        ));
        assert_eq!(HString::new("ok").to_string_checked().unwrap(), "ok");
    }

    #[test]
    fn test_object_identity() {
        let a = ObjectRef::new("Windows.Foundation.Uri");
        let b = a.clone();
        let c = ObjectRef::new("Windows.Foundation.Uri");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.runtime_class_name(), "Windows.Foundation.Uri");
    }

    #[test]
    fn test_object_payload() {
        let obj = ObjectRef::with_payload("Sample.Counter", 41_u32);
        assert_eq!(obj.payload::<u32>(), Some(&41));
        assert_eq!(obj.payload::<String>(), None);
        assert_eq!(ObjectRef::new("Sample.Empty").payload::<u32>(), None);
    }

    #[test]
    fn test_object_raw_acquire_release() {
        let obj = ObjectRef::new("Sample.Widget");
        let raw = obj.clone().into_raw();
        assert_eq!(raw, obj.as_raw());
        assert_eq!(obj.ref_count(), 2);

        let acquired = unsafe { ObjectRef::clone_from_raw(raw) }.unwrap();
        assert_eq!(acquired, obj);
        assert_eq!(obj.ref_count(), 3);

        drop(acquired);
        unsafe { ObjectRef::release_raw(raw) };
        assert_eq!(obj.ref_count(), 1);
    }
}
