//! Element Converters
//!
//! One encode/decode pair per [`ElementKind`], bridging a slot laid out per
//! the WinRT ABI and a [`HostValue`]. Storage looks codecs up in a static
//! table indexed by kind, so an array is not generic over its element type.
//!
//! Slots passed to a codec are exactly `kind.byte_width()` bytes long and,
//! for the handle kinds, contain either zero or a pointer that owns one
//! reference. This module is crate-private because decoding a handle slot
//! trusts that invariant.

use std::ffi::c_void;

use uuid::Uuid;

use crate::error::{ArrayError, ArrayResult};
use crate::foreign::{HString, ObjectRef};
use crate::kind::{ElementKind, POINTER_WIDTH};
use crate::value::{HostStruct, HostValue};

/// Ticks between 1601-01-01 and 1970-01-01.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// 100-ns ticks per microsecond.
pub const TICKS_PER_MICROSECOND: i64 = 10;

/// Encode/decode strategy for one element kind.
pub(crate) trait ElementCodec: Sync {
    /// Read the host value stored in `slot`
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue>;

    /// Write `value` into a slot that owns nothing
    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()>;

    /// Drop whatever `slot` owns and leave it zeroed
    fn release(&self, _slot: &mut [u8]) {}
}

/// The codec for `kind`.
pub(crate) fn codec_for(kind: ElementKind) -> &'static dyn ElementCodec {
    CODECS[kind as usize]
}

// Indexed by `ElementKind as usize`.
static CODECS: [&dyn ElementCodec; 20] = [
    &BoolCodec,
    &Int8Codec,
    &UInt8Codec,
    &Int16Codec,
    &UInt16Codec,
    &Int32Codec,
    &UInt32Codec,
    &Int64Codec,
    &UInt64Codec,
    &Float32Codec,
    &Float64Codec,
    &Char16Codec,
    &StringCodec,
    &GuidCodec,
    &DateTimeCodec,
    &TimeSpanCodec,
    &POINT,
    &SIZE,
    &RECT,
    &ObjectCodec,
];

fn read_array<const N: usize>(slot: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slot[..N]);
    out
}

fn read_ptr(slot: &[u8]) -> *const c_void {
    usize::from_ne_bytes(read_array::<POINTER_WIDTH>(slot)) as *const c_void
}

fn write_ptr(slot: &mut [u8], ptr: *const c_void) {
    slot.copy_from_slice(&(ptr as usize).to_ne_bytes());
}

// ============================================================================
// Scalars
// ============================================================================

struct BoolCodec;

impl ElementCodec for BoolCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        Ok(HostValue::Bool(slot[0] != 0))
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        match value {
            HostValue::Bool(b) => {
                slot[0] = u8::from(*b);
                Ok(())
            }
            other => Err(ArrayError::type_mismatch("bool", other.type_name())),
        }
    }
}

macro_rules! int_codec {
    ($codec:ident, $ty:ty) => {
        struct $codec;

        impl ElementCodec for $codec {
            fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
                Ok(HostValue::Int(i128::from(<$ty>::from_ne_bytes(read_array(slot)))))
            }

            fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
                let n = value
                    .as_int()
                    .ok_or_else(|| ArrayError::type_mismatch("int", value.type_name()))?;
                let n = <$ty>::try_from(n).map_err(|_| {
                    ArrayError::type_error(format!(
                        "{} is out of range for {}",
                        n,
                        stringify!($ty)
                    ))
                })?;
                slot.copy_from_slice(&n.to_ne_bytes());
                Ok(())
            }
        }
    };
}

int_codec!(Int8Codec, i8);
int_codec!(UInt8Codec, u8);
int_codec!(Int16Codec, i16);
int_codec!(UInt16Codec, u16);
int_codec!(Int32Codec, i32);
int_codec!(UInt32Codec, u32);
int_codec!(Int64Codec, i64);
int_codec!(UInt64Codec, u64);

macro_rules! float_codec {
    ($codec:ident, $ty:ty) => {
        struct $codec;

        impl ElementCodec for $codec {
            fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
                Ok(HostValue::Float(f64::from(<$ty>::from_ne_bytes(read_array(slot)))))
            }

            fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
                let f = value
                    .as_float()
                    .ok_or_else(|| ArrayError::type_mismatch("float", value.type_name()))?;
                let narrowed = f as $ty;
                if f.is_finite() && narrowed.is_infinite() {
                    return Err(ArrayError::type_error(format!(
                        "{} is out of range for {}",
                        f,
                        stringify!($ty)
                    )));
                }
                slot.copy_from_slice(&narrowed.to_ne_bytes());
                Ok(())
            }
        }
    };
}

float_codec!(Float32Codec, f32);
float_codec!(Float64Codec, f64);

struct Char16Codec;

impl ElementCodec for Char16Codec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        let unit = u16::from_ne_bytes(read_array(slot));
        match char::from_u32(u32::from(unit)) {
            Some(c) => Ok(HostValue::Str(c.to_string().into())),
            None => Err(ArrayError::encoding(format!(
                "unpaired surrogate 0x{:04X}",
                unit
            ))),
        }
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let s = value
            .as_str()
            .ok_or_else(|| ArrayError::type_mismatch("str", value.type_name()))?;
        let mut units = s.encode_utf16();
        match (units.next(), units.next()) {
            (Some(unit), None) => {
                slot.copy_from_slice(&unit.to_ne_bytes());
                Ok(())
            }
            _ => Err(ArrayError::type_error(format!(
                "expected a single UTF-16 character, got '{}'",
                s
            ))),
        }
    }
}

// ============================================================================
// Handles
// ============================================================================

struct StringCodec;

impl ElementCodec for StringCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        // SAFETY: handle slots are only ever written by `encode`.
        match unsafe { HString::clone_from_raw(read_ptr(slot)) } {
            Some(s) => Ok(HostValue::Str(s.to_string_checked()?.into())),
            None => Ok(HostValue::Str("".into())),
        }
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let s = value
            .as_str()
            .ok_or_else(|| ArrayError::type_mismatch("str", value.type_name()))?;
        let ptr = if s.is_empty() {
            std::ptr::null()
        } else {
            HString::new(s).into_raw()
        };
        write_ptr(slot, ptr);
        Ok(())
    }

    fn release(&self, slot: &mut [u8]) {
        // SAFETY: see `decode`; the slot is zeroed right after.
        unsafe { HString::release_raw(read_ptr(slot)) };
        slot.fill(0);
    }
}

struct ObjectCodec;

impl ElementCodec for ObjectCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        // SAFETY: handle slots are only ever written by `encode`.
        match unsafe { ObjectRef::clone_from_raw(read_ptr(slot)) } {
            Some(obj) => Ok(HostValue::Object(obj)),
            None => Ok(HostValue::None),
        }
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let ptr = match value {
            HostValue::Object(obj) => obj.clone().into_raw(),
            HostValue::None => std::ptr::null(),
            other => return Err(ArrayError::type_mismatch("Object", other.type_name())),
        };
        write_ptr(slot, ptr);
        Ok(())
    }

    fn release(&self, slot: &mut [u8]) {
        // SAFETY: see `decode`; the slot is zeroed right after.
        unsafe { ObjectRef::release_raw(read_ptr(slot)) };
        slot.fill(0);
    }
}

// ============================================================================
// Foundation value types
// ============================================================================

struct GuidCodec;

impl ElementCodec for GuidCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        let data1 = u32::from_ne_bytes(read_array(&slot[0..4]));
        let data2 = u16::from_ne_bytes(read_array(&slot[4..6]));
        let data3 = u16::from_ne_bytes(read_array(&slot[6..8]));
        let data4: [u8; 8] = read_array(&slot[8..16]);
        Ok(HostValue::Guid(Uuid::from_fields(data1, data2, data3, &data4)))
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let HostValue::Guid(id) = value else {
            return Err(ArrayError::type_mismatch("UUID", value.type_name()));
        };
        let (data1, data2, data3, data4) = id.as_fields();
        slot[0..4].copy_from_slice(&data1.to_ne_bytes());
        slot[4..6].copy_from_slice(&data2.to_ne_bytes());
        slot[6..8].copy_from_slice(&data3.to_ne_bytes());
        slot[8..16].copy_from_slice(data4);
        Ok(())
    }
}

/// Floors to whole microseconds. `epoch` is a whole number of microseconds,
/// so the result always fits.
fn ticks_to_micros(ticks: i64, epoch: i64) -> i64 {
    ticks.div_euclid(TICKS_PER_MICROSECOND) - epoch / TICKS_PER_MICROSECOND
}

fn micros_to_ticks(micros: i64, epoch: i64) -> ArrayResult<i64> {
    micros
        .checked_mul(TICKS_PER_MICROSECOND)
        .and_then(|ticks| ticks.checked_add(epoch))
        .ok_or_else(|| {
            ArrayError::type_error(format!("{} microseconds is out of range for ticks", micros))
        })
}

struct DateTimeCodec;

impl ElementCodec for DateTimeCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        let ticks = i64::from_ne_bytes(read_array(slot));
        Ok(HostValue::DateTime(ticks_to_micros(ticks, UNIX_EPOCH_TICKS)))
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let HostValue::DateTime(micros) = value else {
            return Err(ArrayError::type_mismatch("datetime", value.type_name()));
        };
        slot.copy_from_slice(&micros_to_ticks(*micros, UNIX_EPOCH_TICKS)?.to_ne_bytes());
        Ok(())
    }
}

struct TimeSpanCodec;

impl ElementCodec for TimeSpanCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        let ticks = i64::from_ne_bytes(read_array(slot));
        Ok(HostValue::TimeSpan(ticks_to_micros(ticks, 0)))
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let HostValue::TimeSpan(micros) = value else {
            return Err(ArrayError::type_mismatch("timedelta", value.type_name()));
        };
        slot.copy_from_slice(&micros_to_ticks(*micros, 0)?.to_ne_bytes());
        Ok(())
    }
}

/// A struct of consecutive `f32` fields.
struct FloatStructCodec {
    name: &'static str,
    fields: &'static [&'static str],
}

static POINT: FloatStructCodec = FloatStructCodec {
    name: "Point",
    fields: &["x", "y"],
};

static SIZE: FloatStructCodec = FloatStructCodec {
    name: "Size",
    fields: &["width", "height"],
};

static RECT: FloatStructCodec = FloatStructCodec {
    name: "Rect",
    fields: &["x", "y", "width", "height"],
};

impl FloatStructCodec {
    fn field_value(&self, field: &str, value: &HostValue) -> ArrayResult<f32> {
        let f = value.as_float().ok_or_else(|| {
            ArrayError::type_error(format!(
                "field '{}' of {} must be a number, got {}",
                field,
                self.name,
                value.type_name()
            ))
        })?;
        let narrowed = f as f32;
        if f.is_finite() && narrowed.is_infinite() {
            return Err(ArrayError::type_error(format!(
                "field '{}' of {} is out of range for f32: {}",
                field, self.name, f
            )));
        }
        Ok(narrowed)
    }
}

impl ElementCodec for FloatStructCodec {
    fn decode(&self, slot: &[u8]) -> ArrayResult<HostValue> {
        let mut out = HostStruct::new(self.name);
        for (i, field) in self.fields.iter().enumerate() {
            let f = f32::from_ne_bytes(read_array(&slot[i * 4..]));
            out = out.with(*field, f64::from(f));
        }
        Ok(HostValue::Struct(out))
    }

    fn encode(&self, value: &HostValue, slot: &mut [u8]) -> ArrayResult<()> {
        let mut parsed = [0f32; 4];
        match value {
            HostValue::Struct(s) if s.name.is_empty() || s.name == self.name => {
                for (i, field) in self.fields.iter().enumerate() {
                    let v = s.get(field).ok_or_else(|| {
                        ArrayError::type_error(format!("{} requires field '{}'", self.name, field))
                    })?;
                    parsed[i] = self.field_value(field, v)?;
                }
            }
            HostValue::Tuple(items) if items.len() == self.fields.len() => {
                for (i, (field, v)) in self.fields.iter().zip(items).enumerate() {
                    parsed[i] = self.field_value(field, v)?;
                }
            }
            other => return Err(ArrayError::type_mismatch(self.name, other.type_name())),
        }
        for (i, f) in parsed[..self.fields.len()].iter().enumerate() {
            slot[i * 4..i * 4 + 4].copy_from_slice(&f.to_ne_bytes());
        }
        Ok(())
    }
}
