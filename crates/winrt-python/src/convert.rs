//! Conversion between Python objects and [`HostValue`]s.
//!
//! Python to host is structural only; whether a value fits an element kind
//! is decided by the element converters. Host to Python produces the
//! natural Python type for each value.

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDateTime, PyDelta, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

use smol_str::SmolStr;
use uuid::Uuid;
use winrt_array::{HostStruct, HostValue};

use crate::foundation::{Object, Point, Rect, Size};

const MICROS_PER_SECOND: i128 = 1_000_000;
const MICROS_PER_DAY: i128 = 86_400 * MICROS_PER_SECOND;

// ============================================================================
// Python -> HostValue
// ============================================================================

/// Convert a Python object into a host value.
pub fn to_host_value(obj: &Bound<'_, PyAny>) -> PyResult<HostValue> {
    if obj.is_none() {
        Ok(HostValue::None)
    } else if let Ok(b) = obj.cast::<PyBool>() {
        Ok(HostValue::Bool(b.is_true()))
    } else if let Ok(i) = obj.cast::<PyInt>() {
        int_value(i.as_any())
    } else if let Ok(f) = obj.cast::<PyFloat>() {
        Ok(HostValue::Float(f.value()))
    } else if let Ok(s) = obj.cast::<PyString>() {
        Ok(HostValue::Str(SmolStr::new(s.to_cow()?)))
    } else if let Ok(p) = obj.cast::<Point>() {
        Ok(HostValue::from(p.get()))
    } else if let Ok(s) = obj.cast::<Size>() {
        Ok(HostValue::from(s.get()))
    } else if let Ok(r) = obj.cast::<Rect>() {
        Ok(HostValue::from(r.get()))
    } else if let Ok(o) = obj.cast::<Object>() {
        Ok(HostValue::Object(o.get().object_ref().clone()))
    } else if let Ok(t) = obj.cast::<PyTuple>() {
        t.iter().map(|item| to_host_value(&item)).collect::<PyResult<_>>().map(HostValue::Tuple)
    } else if let Ok(l) = obj.cast::<PyList>() {
        l.iter().map(|item| to_host_value(&item)).collect::<PyResult<_>>().map(HostValue::Tuple)
    } else if let Ok(d) = obj.cast::<PyDict>() {
        let mut fields = HostStruct::default();
        for (key, value) in d.iter() {
            let key = key.cast::<PyString>().map_err(|_| {
                PyTypeError::new_err("struct field names must be str")
            })?;
            fields = fields.with(SmolStr::new(key.to_cow()?), to_host_value(&value)?);
        }
        Ok(HostValue::Struct(fields))
    } else if let Ok(dt) = obj.cast::<PyDateTime>() {
        datetime_value(dt.as_any())
    } else if let Ok(td) = obj.cast::<PyDelta>() {
        timedelta_micros(td.as_any()).map(HostValue::TimeSpan)
    } else if is_uuid(obj)? {
        let n: u128 = obj.getattr("int")?.extract()?;
        Ok(HostValue::Guid(Uuid::from_u128(n)))
    } else if obj.hasattr("__index__")? {
        int_value(obj)
    } else if obj.hasattr("__float__")? {
        Ok(HostValue::Float(obj.extract()?))
    } else {
        Err(PyTypeError::new_err(format!(
            "cannot convert '{}' object to a WinRT array element",
            obj.get_type().qualname()?
        )))
    }
}

fn int_value(obj: &Bound<'_, PyAny>) -> PyResult<HostValue> {
    obj.extract::<i128>()
        .map(HostValue::Int)
        .map_err(|_| PyTypeError::new_err("int is out of range for any WinRT integer type"))
}

fn is_uuid(obj: &Bound<'_, PyAny>) -> PyResult<bool> {
    let uuid_type = obj.py().import("uuid")?.getattr("UUID")?;
    obj.is_instance(&uuid_type)
}

/// 1970-01-01 UTC
fn unix_epoch(py: Python<'_>) -> PyResult<Bound<'_, PyAny>> {
    let datetime = py.import("datetime")?;
    let kwargs = PyDict::new(py);
    kwargs.set_item("tzinfo", datetime.getattr("timezone")?.getattr("utc")?)?;
    datetime.getattr("datetime")?.call((1970, 1, 1), Some(&kwargs))
}

/// Only aware datetimes name an instant; naive ones are rejected.
fn datetime_value(dt: &Bound<'_, PyAny>) -> PyResult<HostValue> {
    if dt.call_method0("utcoffset")?.is_none() {
        return Err(PyTypeError::new_err(
            "naive datetime cannot be converted; attach a tzinfo",
        ));
    }
    let since_epoch = dt.sub(unix_epoch(dt.py())?)?;
    timedelta_micros(&since_epoch).map(HostValue::DateTime)
}

fn timedelta_micros(td: &Bound<'_, PyAny>) -> PyResult<i64> {
    let days: i128 = td.getattr("days")?.extract()?;
    let seconds: i128 = td.getattr("seconds")?.extract()?;
    let micros: i128 = td.getattr("microseconds")?.extract()?;
    let total = days * MICROS_PER_DAY + seconds * MICROS_PER_SECOND + micros;
    i64::try_from(total).map_err(|_| PyTypeError::new_err("timedelta is out of range for WinRT ticks"))
}

// ============================================================================
// HostValue -> Python
// ============================================================================

fn timedelta<'py>(py: Python<'py>, micros: i64) -> PyResult<Bound<'py, PyAny>> {
    let kwargs = PyDict::new(py);
    kwargs.set_item("microseconds", micros)?;
    py.import("datetime")?.getattr("timedelta")?.call((), Some(&kwargs))
}

fn struct_field(s: &HostStruct, field: &str) -> PyResult<f32> {
    s.get(field)
        .and_then(HostValue::as_float)
        .map(|f| f as f32)
        .ok_or_else(|| PyTypeError::new_err(format!("{} is missing field '{}'", s.name, field)))
}

/// Convert a host value into a Python object.
pub fn to_python<'py>(py: Python<'py>, value: &HostValue) -> PyResult<Bound<'py, PyAny>> {
    match value {
        HostValue::None => Ok(py.None().into_bound(py)),
        HostValue::Bool(b) => Ok(b.into_pyobject(py)?.to_owned().into_any()),
        HostValue::Int(n) => Ok(n.into_pyobject(py)?.into_any()),
        HostValue::Float(f) => Ok(f.into_pyobject(py)?.into_any()),
        HostValue::Str(s) => Ok(PyString::new(py, s.as_str()).into_any()),
        HostValue::Guid(id) => {
            let kwargs = PyDict::new(py);
            kwargs.set_item("int", id.as_u128())?;
            py.import("uuid")?.getattr("UUID")?.call((), Some(&kwargs))
        }
        HostValue::DateTime(micros) => unix_epoch(py)?.add(timedelta(py, *micros)?),
        HostValue::TimeSpan(micros) => timedelta(py, *micros),
        HostValue::Struct(s) => match s.name.as_str() {
            "Point" => Ok(Bound::new(
                py,
                Point {
                    x: struct_field(s, "x")?,
                    y: struct_field(s, "y")?,
                },
            )?
            .into_any()),
            "Size" => Ok(Bound::new(
                py,
                Size {
                    width: struct_field(s, "width")?,
                    height: struct_field(s, "height")?,
                },
            )?
            .into_any()),
            "Rect" => Ok(Bound::new(
                py,
                Rect {
                    x: struct_field(s, "x")?,
                    y: struct_field(s, "y")?,
                    width: struct_field(s, "width")?,
                    height: struct_field(s, "height")?,
                },
            )?
            .into_any()),
            _ => {
                let dict = PyDict::new(py);
                for (k, v) in &s.fields {
                    dict.set_item(k.as_str(), to_python(py, v)?)?;
                }
                Ok(dict.into_any())
            }
        },
        HostValue::Tuple(items) => {
            let items = items
                .iter()
                .map(|item| to_python(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            Ok(PyTuple::new(py, items)?.into_any())
        }
        HostValue::Object(obj) => Ok(Bound::new(py, Object::new(obj.clone()))?.into_any()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::CString;

    fn eval<'py>(py: Python<'py>, expr: &str) -> Bound<'py, PyAny> {
        let code = CString::new(expr).unwrap();
        py.eval(&code, None, None).unwrap()
    }

    #[test]
    fn test_scalars_to_host() {
        Python::initialize();
        Python::attach(|py| {
            assert_eq!(to_host_value(&eval(py, "True")).unwrap(), HostValue::Bool(true));
            assert_eq!(to_host_value(&eval(py, "-7")).unwrap(), HostValue::Int(-7));
            assert_eq!(to_host_value(&eval(py, "2**100")).unwrap(), HostValue::Int(1 << 100));
            assert_eq!(to_host_value(&eval(py, "0.25")).unwrap(), HostValue::Float(0.25));
            assert_eq!(to_host_value(&eval(py, "'hi'")).unwrap(), HostValue::from("hi"));
            assert_eq!(to_host_value(&eval(py, "None")).unwrap(), HostValue::None);
            assert!(to_host_value(&eval(py, "2**200")).is_err());
        });
    }

    #[test]
    fn test_datetime_to_host() {
        Python::initialize();
        Python::attach(|py| {
            let dt = eval(
                py,
                "__import__('datetime').datetime(1970, 1, 2, 0, 0, 0, 5, tzinfo=__import__('datetime').timezone.utc)",
            );
            assert_eq!(to_host_value(&dt).unwrap(), HostValue::DateTime(86_400_000_005));

            let before = eval(
                py,
                "__import__('datetime').datetime(1969, 12, 31, 23, 59, 59, tzinfo=__import__('datetime').timezone.utc)",
            );
            assert_eq!(to_host_value(&before).unwrap(), HostValue::DateTime(-1_000_000));

            let naive = eval(py, "__import__('datetime').datetime(1969, 12, 31, 23, 59, 59)");
            let err = to_host_value(&naive).unwrap_err();
            assert!(err.is_instance_of::<PyTypeError>(py));

            let td = eval(py, "__import__('datetime').timedelta(days=-1, microseconds=3)");
            assert_eq!(
                to_host_value(&td).unwrap(),
                HostValue::TimeSpan(-86_400_000_000 + 3)
            );
        });
    }

    #[test]
    fn test_uuid_round_trip() {
        Python::initialize();
        Python::attach(|py| {
            let obj = eval(py, "__import__('uuid').UUID('12345678-1234-5678-1234-567812345678')");
            let value = to_host_value(&obj).unwrap();
            assert_eq!(
                value,
                HostValue::Guid(Uuid::parse_str("12345678-1234-5678-1234-567812345678").unwrap())
            );
            assert!(to_python(py, &value).unwrap().eq(&obj).unwrap());
        });
    }

    #[test]
    fn test_dict_becomes_struct() {
        Python::initialize();
        Python::attach(|py| {
            let value = to_host_value(&eval(py, "{'x': 1, 'y': 2.5}")).unwrap();
            let expected = HostStruct::default().with("x", 1_i64).with("y", 2.5);
            assert_eq!(value, HostValue::Struct(expected));

            assert!(to_host_value(&eval(py, "{1: 2}")).is_err());
        });
    }

    #[test]
    fn test_unsupported_object() {
        Python::initialize();
        Python::attach(|py| {
            let err = to_host_value(&eval(py, "object()")).unwrap_err();
            assert!(err.is_instance_of::<PyTypeError>(py));
        });
    }

    #[test]
    fn test_point_to_python() {
        Python::initialize();
        Python::attach(|py| {
            let value = HostValue::Struct(HostStruct::new("Point").with("x", 1.0).with("y", 2.0));
            let obj = to_python(py, &value).unwrap();
            let point = obj.cast::<Point>().unwrap();
            assert_eq!(point.get(), &Point { x: 1.0, y: 2.0 });
        });
    }
}
