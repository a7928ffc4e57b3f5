//! End-to-end behavior of the array bridge: construction paths, element
//! access and view export.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use winrt_array::{
    export, ArrayBridge, ArrayError, ArrayInit, Descriptor, ElementKind, HostStruct, HostValue,
    ObjectRef, RawBuffer, Resolved, Resolver, SizeLimit, ViewFlags,
};

const READ_FLAGS: ViewFlags = ViewFlags::FORMAT.union(ViewFlags::STRIDES);

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_empty_construct_for_every_format_code() {
    let resolver: Resolver<()> = Resolver::new();
    for (code, _) in ElementKind::FORMAT_CODES {
        let code = code.to_string();
        let kind = resolver.resolve_kind(Descriptor::Format(&code)).unwrap();
        let array = ArrayBridge::empty(kind).unwrap();
        assert_eq!(array.len(), 0);
        assert_eq!(array.storage().format(), code);
    }
}

#[test]
fn test_sized_construct_zero_values() {
    let array = ArrayBridge::sized(ElementKind::Int32, 5).unwrap();
    for i in 0..5 {
        assert_eq!(array.get(i).unwrap(), HostValue::Int(0));
    }
    assert_eq!(array.get(5).unwrap_err(), ArrayError::Index { index: 5, len: 5 });
}

#[test]
fn test_sized_zero_values_per_kind() {
    let zeroes = [
        (ElementKind::Bool, HostValue::Bool(false)),
        (ElementKind::Float64, HostValue::Float(0.0)),
        (ElementKind::Char16, HostValue::from("\0")),
        (ElementKind::String, HostValue::from("")),
        (ElementKind::Guid, HostValue::Guid(Uuid::nil())),
        (ElementKind::TimeSpan, HostValue::TimeSpan(0)),
        (
            ElementKind::Size,
            HostValue::Struct(HostStruct::new("Size").with("width", 0.0).with("height", 0.0)),
        ),
        (ElementKind::ObjectRef, HostValue::None),
    ];
    for (kind, zero) in zeroes {
        let array = ArrayBridge::sized(kind, 1).unwrap();
        assert_eq!(array.get(0).unwrap(), zero, "zero value of {}", kind);
    }
}

#[test]
fn test_sized_bounds() {
    let negative = ArrayBridge::sized(ElementKind::UInt8, -1).unwrap_err();
    assert!(matches!(negative, ArrayError::Value { .. }));

    let huge = ArrayBridge::sized(ElementKind::UInt8, 1 << 33).unwrap_err();
    assert!(matches!(huge, ArrayError::Overflow { .. }));
}

#[test]
fn test_buffer_ingest_copies_bytes() {
    let source: Vec<u8> = [10_i32, -20, 30].iter().flat_map(|n| n.to_ne_bytes()).collect();
    let buffer = RawBuffer::new(&source, 4).with_format("i");
    let array = ArrayBridge::from_buffer(ElementKind::Int32, &buffer).unwrap();

    assert_eq!(array.len(), 3);
    assert_eq!(array.as_bytes(), source.as_slice());
    assert_ne!(array.as_bytes().as_ptr(), source.as_ptr());
    assert_eq!(array.get(1).unwrap(), HostValue::Int(-20));
}

#[test]
fn test_buffer_ingest_mismatched_itemsize() {
    let source = [0u8; 16];
    let err = ArrayBridge::from_buffer(ElementKind::Float64, &RawBuffer::new(&source, 4)).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_buffer_ingest_struct_layout() {
    let source: Vec<u8> = [1.0_f32, 2.0, 3.0, 4.0].iter().flat_map(|f| f.to_ne_bytes()).collect();
    let buffer = RawBuffer::new(&source, 8).with_format("T{f:x:f:y:}");
    let array = ArrayBridge::from_buffer(ElementKind::Point, &buffer).unwrap();
    assert_eq!(
        array.get(1).unwrap(),
        HostValue::Struct(HostStruct::new("Point").with("x", 3.0).with("y", 4.0))
    );
}

#[test]
fn test_sequence_ingest_then_export() {
    let values = [HostValue::Int(1), HostValue::Int(2), HostValue::Int(3)];
    let array = ArrayBridge::from_sequence(ElementKind::UInt8, &values).unwrap();

    let view = export(&array, READ_FLAGS).unwrap();
    assert_eq!(view.len(), 3);
    assert_eq!(view.itemsize(), 1);
    assert_eq!(view.as_bytes(), &[1, 2, 3]);
    assert_eq!(view.format(), Some("B"));
}

#[test]
fn test_sequence_size_limit() {
    let values = vec![HostValue::Bool(true); 4];
    let mut init = ArrayInit::with_limit(SizeLimit::new(3));
    assert!(matches!(
        init.from_sequence(ElementKind::Bool, &values),
        Err(ArrayError::Overflow { .. })
    ));
}

#[test]
fn test_sequence_rejects_out_of_range_f32() {
    let err = ArrayBridge::from_sequence(ElementKind::Float32, &[HostValue::Float(1e300)]).unwrap_err();
    assert!(err.is_type_error());

    let point = HostValue::Struct(HostStruct::new("Point").with("x", 1e300).with("y", 0.0));
    assert!(ArrayBridge::from_sequence(ElementKind::Point, &[point]).unwrap_err().is_type_error());
}

#[test]
fn test_failed_sequence_releases_acquired_references() {
    let obj = ObjectRef::new("Sample.Widget");
    let values = [
        HostValue::Object(obj.clone()),
        HostValue::Object(obj.clone()),
        HostValue::from("not an object"),
    ];
    assert!(ArrayBridge::from_sequence(ElementKind::ObjectRef, &values).is_err());
    drop(values);
    assert_eq!(obj.ref_count(), 1);
}

#[test]
fn test_object_array_lifetime() {
    let obj = ObjectRef::new("Sample.Widget");
    let array = ArrayBridge::from_sequence(
        ElementKind::ObjectRef,
        &[HostValue::Object(obj.clone()), HostValue::None],
    )
    .unwrap();
    assert_eq!(obj.ref_count(), 2);
    assert_eq!(array.get(0).unwrap(), HostValue::Object(obj.clone()));
    assert_eq!(array.get(1).unwrap(), HostValue::None);

    drop(array);
    assert_eq!(obj.ref_count(), 1);
}

// ============================================================================
// Hooks
// ============================================================================

type Hook = fn(&mut ArrayInit) -> winrt_array::ArrayResult<()>;

fn construct(resolver: &Resolver<Hook>, type_name: &str) -> winrt_array::ArrayResult<ArrayBridge> {
    match resolver.resolve(Descriptor::Type(type_name))? {
        Resolved::Kind(kind) => ArrayBridge::empty(kind),
        Resolved::Hook(hook) => ArrayInit::with_hook(type_name, SizeLimit::default(), hook),
    }
}

#[test]
fn test_hook_claims_any_kind() {
    let mut resolver: Resolver<Hook> = Resolver::new();
    resolver.register_hook("sample.Matrix", |init| init.sized(ElementKind::Float32, 16));

    let array = construct(&resolver, "sample.Matrix").unwrap();
    assert_eq!(array.kind(), ElementKind::Float32);
    assert_eq!(array.len(), 16);

    assert_eq!(construct(&resolver, "uuid.UUID").unwrap().kind(), ElementKind::Guid);
    assert!(construct(&resolver, "sample.Unknown").unwrap_err().is_type_error());
}

#[test]
fn test_hook_that_skips_construction() {
    let mut resolver: Resolver<Hook> = Resolver::new();
    resolver.register_hook("sample.Lazy", |_| Ok(()));
    let err = construct(&resolver, "sample.Lazy").unwrap_err();
    assert_eq!(err.to_string(), "construction hook did not initialize the array");
}

#[test]
fn test_hook_running_two_paths() {
    let mut resolver: Resolver<Hook> = Resolver::new();
    resolver.register_hook("sample.Greedy", |init| {
        init.empty(ElementKind::Int8)?;
        init.empty(ElementKind::Int16)
    });
    let err = construct(&resolver, "sample.Greedy").unwrap_err();
    assert_eq!(err.to_string(), "array is already initialized");
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_writable_export_always_fails() {
    for kind in ElementKind::ALL {
        for count in [0, 1, 7] {
            let array = ArrayBridge::sized(kind, count).unwrap();
            let err = export(&array, ViewFlags::WRITABLE).unwrap_err();
            assert_eq!(err.to_string(), "Array is not writable");
        }
    }
}

#[test]
fn test_export_empty_array() {
    let array = ArrayBridge::empty(ElementKind::Rect).unwrap();
    let view = export(&array, READ_FLAGS).unwrap();
    assert!(view.is_empty());
    assert_eq!(view.shape(), Some(0));
    assert_eq!(view.stride(), Some(16));
    assert_eq!(view.format(), Some("T{f:x:f:y:f:width:f:height:}"));
}

#[test]
fn test_export_leaves_array_unchanged_on_failure() {
    let array = ArrayBridge::from_sequence(ElementKind::Int8, &[HostValue::Int(-1)]).unwrap();
    let before = array.as_bytes().to_vec();
    assert!(export(&array, ViewFlags::WRITABLE).is_err());
    assert_eq!(array.as_bytes(), before.as_slice());
    assert_eq!(array.outstanding_views(), 0);
}

// ============================================================================
// Randomized round trip
// ============================================================================

fn random_value(rng: &mut StdRng, kind: ElementKind, objects: &[ObjectRef]) -> HostValue {
    let float32 = |rng: &mut StdRng| f64::from(rng.gen_range(-1.0e6_f32..1.0e6_f32));
    match kind {
        ElementKind::Bool => HostValue::Bool(rng.gen()),
        ElementKind::Int8 => HostValue::Int(rng.gen::<i8>().into()),
        ElementKind::UInt8 => HostValue::Int(rng.gen::<u8>().into()),
        ElementKind::Int16 => HostValue::Int(rng.gen::<i16>().into()),
        ElementKind::UInt16 => HostValue::Int(rng.gen::<u16>().into()),
        ElementKind::Int32 => HostValue::Int(rng.gen::<i32>().into()),
        ElementKind::UInt32 => HostValue::Int(rng.gen::<u32>().into()),
        ElementKind::Int64 => HostValue::Int(rng.gen::<i64>().into()),
        ElementKind::UInt64 => HostValue::Int(rng.gen::<u64>().into()),
        ElementKind::Float32 => HostValue::Float(float32(rng)),
        ElementKind::Float64 => HostValue::Float(rng.gen_range(-1.0e300..1.0e300)),
        ElementKind::Char16 => {
            let unit = rng.gen_range(0x20_u32..0xD800);
            HostValue::Str(char::from_u32(unit).unwrap_or('?').to_string().into())
        }
        ElementKind::String => {
            let len = rng.gen_range(0..12);
            let text: String = (0..len)
                .map(|_| char::from_u32(rng.gen_range(0x20_u32..0x3000)).unwrap_or('x'))
                .collect();
            HostValue::Str(text.into())
        }
        ElementKind::Guid => HostValue::Guid(Uuid::from_u128(rng.gen())),
        ElementKind::DateTime => HostValue::DateTime(rng.gen_range(-1_000_000_000_000_000..1_000_000_000_000_000)),
        ElementKind::TimeSpan => HostValue::TimeSpan(rng.gen_range(-1_000_000_000_000_000..1_000_000_000_000_000)),
        ElementKind::Point => HostValue::Struct(
            HostStruct::new("Point").with("x", float32(rng)).with("y", float32(rng)),
        ),
        ElementKind::Size => HostValue::Struct(
            HostStruct::new("Size")
                .with("width", float32(rng))
                .with("height", float32(rng)),
        ),
        ElementKind::Rect => HostValue::Struct(
            HostStruct::new("Rect")
                .with("x", float32(rng))
                .with("y", float32(rng))
                .with("width", float32(rng))
                .with("height", float32(rng)),
        ),
        ElementKind::ObjectRef => {
            let pick = rng.gen_range(0..=objects.len());
            objects.get(pick).cloned().map_or(HostValue::None, HostValue::Object)
        }
    }
}

#[test]
fn test_sequence_round_trip_all_kinds() {
    let mut rng = StdRng::seed_from_u64(0x5EED_A77A);
    let objects: Vec<ObjectRef> = (0..3).map(|i| ObjectRef::new(format!("Sample.Item{}", i))).collect();

    for kind in ElementKind::ALL {
        for _ in 0..8 {
            let len = rng.gen_range(0..40);
            let values: Vec<HostValue> = (0..len).map(|_| random_value(&mut rng, kind, &objects)).collect();

            let array = ArrayBridge::from_sequence(kind, &values).unwrap();
            assert_eq!(array.len(), values.len());
            assert_eq!(array.storage().to_values().unwrap(), values, "round trip of {}", kind);
        }
    }

    for obj in &objects {
        assert_eq!(obj.ref_count(), 1);
    }
}
