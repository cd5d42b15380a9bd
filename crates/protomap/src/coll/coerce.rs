//! Typed-field coercion.
//!
//! Write side: [`write_field`] checks a [`Value`] against a field's declared
//! type and converts it to its stored [`Native`] form. Nothing is written
//! until the whole value (every element, for repeated fields) has passed.
//!
//! Read side: [`read_field`] converts a stored value to its exposed form.
//!
//! | Declared type | Accepted on write | Exposed on read |
//! |---------------|-------------------|-----------------|
//! | bool | `Bool` | `Bool` |
//! | int32, sint32 | `I32` | `I32` |
//! | int64, sint64 | `I64` | `I64` |
//! | uint32 | `U32` | `U32` |
//! | uint64 | `U64` | `U64` |
//! | float | `F32` | `F32` |
//! | double | `F64` | `F64` |
//! | string | `Str` | `Str` |
//! | bytes | `Bytes` | `Bytes` (blob adapter) |
//! | enum | declared name (`Enum`) or number (`EnumNumber`, `I32`) | name, or `EnumNumber` |
//! | message | `Message`/`Record` of the same type, or `Map` | `Message` (map adapter) |
//! | repeated | `List` or `Vector` of legal elements | `Vector` |

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coll::{ByteBlob, ProtoMap, ProtoVector};
use crate::error::Error;
use crate::model::{Native, Record, Value};
use crate::schema::{EnumDescriptor, FieldDescriptor, FieldType, MessageDescriptor, ScalarType};

/// Converts `value` into the stored form for `field`.
///
/// Returns `Ok(None)` when the value means "unset" (`Nil` on a field with
/// presence).
pub fn write_field(field: &FieldDescriptor, value: &Value) -> Result<Option<Native>, Error> {
    if value.is_nil() {
        return if field.has_presence() {
            Ok(None)
        } else {
            Err(mismatch(field, value))
        };
    }
    if field.is_repeated() {
        return write_repeated(field, value).map(Some);
    }
    write_element(field, value).map(Some)
}

/// Converts one element (the whole value, for singular fields).
pub fn write_element(field: &FieldDescriptor, value: &Value) -> Result<Native, Error> {
    match field.field_type() {
        FieldType::Scalar(ty) => write_scalar(field, *ty, value),
        FieldType::Enum(e) => write_enum(field, e, value),
        FieldType::Message(m) => write_message(field, m, value).map(Native::Message),
    }
}

fn write_scalar(field: &FieldDescriptor, ty: ScalarType, value: &Value) -> Result<Native, Error> {
    let native = match (ty, value) {
        (ScalarType::Bool, Value::Bool(b)) => Some(Native::Bool(*b)),
        (ScalarType::Int32 | ScalarType::SInt32, Value::I32(v)) => Some(Native::I32(*v)),
        (ScalarType::Int64 | ScalarType::SInt64, Value::I64(v)) => Some(Native::I64(*v)),
        (ScalarType::UInt32, Value::U32(v)) => Some(Native::U32(*v)),
        (ScalarType::UInt64, Value::U64(v)) => Some(Native::U64(*v)),
        (ScalarType::Float, Value::F32(v)) => Some(Native::F32(*v)),
        (ScalarType::Double, Value::F64(v)) => Some(Native::F64(*v)),
        (ScalarType::String, Value::Str(s)) => Some(Native::Str(Arc::clone(s))),
        (ScalarType::Bytes, Value::Bytes(b)) => Some(Native::Bytes(b.as_bytes())),
        _ => None,
    };
    native.ok_or_else(|| mismatch(field, value))
}

fn write_enum(
    field: &FieldDescriptor,
    desc: &EnumDescriptor,
    value: &Value,
) -> Result<Native, Error> {
    let declared = match value {
        Value::Enum(name) => desc.value_by_name(name),
        Value::EnumNumber(n) | Value::I32(n) => desc.value_by_number(*n),
        _ => None,
    };
    declared
        .map(|v| Native::Enum(v.number()))
        .ok_or_else(|| mismatch(field, value))
}

fn write_message(
    field: &FieldDescriptor,
    desc: &Arc<MessageDescriptor>,
    value: &Value,
) -> Result<Record, Error> {
    match value {
        Value::Message(m) if m.descriptor().is_same(desc) => Ok(m.record().clone()),
        Value::Record(r) if r.descriptor().is_same(desc) => Ok(r.clone()),
        Value::Map(entries) => record_from_entries(desc, entries),
        _ => Err(mismatch(field, value)),
    }
}

/// Builds a record of type `desc` from a generic key/value container.
///
/// Every key must be a declared field and every value must coerce; nested
/// containers are converted recursively.
pub fn record_from_entries(
    desc: &Arc<MessageDescriptor>,
    entries: &BTreeMap<String, Value>,
) -> Result<Record, Error> {
    let mut builder = Record::builder(Arc::clone(desc));
    for (key, value) in entries {
        let field = desc.field_by_name(key).ok_or_else(|| Error::UnknownField {
            message: Arc::clone(desc.name_arc()),
            key: key.clone(),
        })?;
        match write_field(field, value)? {
            Some(native) => builder.set(field.index(), native),
            None => builder.clear(field.index()),
        };
    }
    Ok(builder.build())
}

fn write_repeated(field: &FieldDescriptor, value: &Value) -> Result<Native, Error> {
    let items = match value {
        // Same element type: already validated, share the storage
        Value::Vector(v) if v.field().field_type().same_as(field.field_type()) => {
            return Ok(v.to_native_list());
        }
        Value::Vector(v) => v
            .iter()
            .map(|item| write_element(field, &item))
            .collect::<Result<Vec<_>, _>>()?,
        Value::List(items) => items
            .iter()
            .map(|item| write_element(field, item))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(mismatch(field, value)),
    };
    Ok(Native::List(Arc::new(items)))
}

/// Converts a stored field value to its exposed form.
///
/// Returns `None` for absent values: unset messages, and unset strings,
/// bytes and enums on fields with presence. Unset numbers and booleans read
/// as zero; repeated fields always read as a (possibly empty) vector.
pub fn read_field(field: &Arc<FieldDescriptor>, stored: Option<&Native>) -> Option<Value> {
    if field.is_repeated() {
        let base = match stored {
            Some(Native::List(items)) => Arc::clone(items),
            _ => Arc::new(Vec::new()),
        };
        return Some(Value::Vector(ProtoVector::from_base(Arc::clone(field), base)));
    }
    let ty = field.field_type();
    match stored {
        Some(native) => Some(read_element(ty, native)),
        None => match ty {
            FieldType::Message(_) => None,
            FieldType::Scalar(s) if s.is_primitive() => {
                Some(read_element(ty, &Native::default_for(ty)))
            }
            _ if field.has_presence() => None,
            _ => Some(read_element(ty, &Native::default_for(ty))),
        },
    }
}

/// Converts one stored element of type `ty` to its exposed form.
pub fn read_element(ty: &FieldType, native: &Native) -> Value {
    match native {
        Native::Bool(b) => Value::Bool(*b),
        Native::I32(v) => Value::I32(*v),
        Native::I64(v) => Value::I64(*v),
        Native::U32(v) => Value::U32(*v),
        Native::U64(v) => Value::U64(*v),
        Native::F32(v) => Value::F32(*v),
        Native::F64(v) => Value::F64(*v),
        Native::Str(s) => Value::Str(Arc::clone(s)),
        Native::Bytes(b) => Value::Bytes(ByteBlob::new(b.clone())),
        Native::Enum(n) => match ty {
            FieldType::Enum(e) => e
                .value_by_number(*n)
                .map_or(Value::EnumNumber(*n), |v| Value::Enum(Arc::clone(v.name_arc()))),
            _ => Value::EnumNumber(*n),
        },
        Native::Message(r) => Value::Message(ProtoMap::from_record(r.clone())),
        Native::List(items) => {
            Value::List(items.iter().map(|item| read_element(ty, item)).collect())
        }
    }
}

pub(crate) fn mismatch(field: &FieldDescriptor, value: &Value) -> Error {
    let expected = if field.is_repeated() {
        format!("repeated {}", field.field_type())
    } else {
        field.field_type().to_string()
    };
    Error::TypeMismatch {
        field: Arc::clone(field.name_arc()),
        expected,
        found: describe(value),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Enum(name) => format!("keyword {}", name),
        Value::EnumNumber(n) => format!("enum number {}", n),
        Value::Message(m) => format!("message {}", m.descriptor().name()),
        Value::Record(r) => format!("record {}", r.descriptor().name()),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::{ADDRESS, PERSON};

    fn field(name: &str) -> &'static Arc<FieldDescriptor> {
        PERSON.field_by_name(name).unwrap()
    }

    #[test]
    fn test_scalars_require_declared_type() {
        assert_eq!(write_field(field("id"), &Value::I32(30)).unwrap(), Some(Native::I32(30)));
        assert_eq!(write_element(field("scores"), &Value::I64(-4)).unwrap(), Native::I64(-4));
        assert_eq!(write_field(field("ratio"), &Value::F64(1.5)).unwrap(), Some(Native::F64(1.5)));

        for (name, value) in [
            ("id", Value::I64(30)),
            ("id", Value::U64(7)),
            ("id", Value::U32(7)),
            ("scores", Value::I32(-4)),
            ("ratio", Value::F32(1.5)),
            ("ratio", Value::I64(1)),
        ] {
            let err = write_element(field(name), &value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch, "{} <- {:?}", name, value);
        }

        let err = write_field(field("id"), &Value::F64(30.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            err,
            Error::TypeMismatch {
                field: Arc::from("id"),
                expected: "int32".to_string(),
                found: "f64".to_string(),
            }
        );
        let err = write_field(field("id"), &Value::I64(i64::from(i32::MAX) + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_nil_only_clears_fields_with_presence() {
        assert_eq!(write_field(field("email"), &Value::Nil).unwrap(), None);
        assert_eq!(write_field(field("address"), &Value::Nil).unwrap(), None);
        assert!(write_field(field("name"), &Value::Nil).is_err());
        assert!(write_field(field("scores"), &Value::Nil).is_err());
    }

    #[test]
    fn test_enum_by_name_or_number() {
        let mood = field("mood");
        assert_eq!(write_field(mood, &Value::keyword("SAD")).unwrap(), Some(Native::Enum(2)));
        assert_eq!(write_field(mood, &Value::EnumNumber(1)).unwrap(), Some(Native::Enum(1)));

        let err = write_field(mood, &Value::keyword("ANGRY")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref found, .. } if found == "keyword ANGRY"));
        assert!(write_field(mood, &Value::EnumNumber(9)).is_err());
        assert!(write_field(mood, &Value::from("SAD")).is_err());

        assert_eq!(read_element(mood.field_type(), &Native::Enum(2)), Value::keyword("SAD"));
        assert_eq!(read_element(mood.field_type(), &Native::Enum(9)), Value::EnumNumber(9));
    }

    #[test]
    fn test_message_from_generic_map() {
        let value = Value::map([("street", Value::from("Main")), ("zip", Value::from(12345))]);
        let native = write_field(field("address"), &value).unwrap().unwrap();
        let Native::Message(record) = &native else {
            panic!("expected message, got {:?}", native);
        };
        assert!(record.descriptor().is_same(&ADDRESS));
        assert_eq!(ProtoMap::from_record(record.clone()).get("zip"), Some(Value::I32(12345)));

        let bad = Value::map([("country", Value::from("NZ"))]);
        let err = write_field(field("address"), &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let wrong_type = Value::Message(ProtoMap::new(PERSON.clone()));
        assert!(matches!(
            write_field(field("address"), &wrong_type),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_repeated_fails_atomically() {
        let scores = field("scores");
        let ok = write_field(scores, &Value::list([1i64, 2, 3])).unwrap().unwrap();
        let expected = vec![Native::I64(1), Native::I64(2), Native::I64(3)];
        assert_eq!(ok, Native::List(Arc::new(expected)));

        let bad = Value::List(vec![Value::I64(1), Value::from("two"), Value::I64(3)]);
        let err = write_field(scores, &bad).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref found, .. } if found == "string"));
        assert!(write_field(scores, &Value::I64(1)).is_err());
    }

    #[test]
    fn test_read_unset_fields() {
        assert_eq!(read_field(field("id"), None), Some(Value::I32(0)));
        assert_eq!(read_field(field("name"), None), Some(Value::from("")));
        assert_eq!(read_field(field("email"), None), None);
        assert_eq!(read_field(field("address"), None), None);
        assert_eq!(read_field(field("mood"), None), Some(Value::keyword("NEUTRAL")));
        assert_eq!(read_field(field("phone"), None), None);
        assert_eq!(read_field(field("ratio"), None), Some(Value::F64(0.0)));
        match read_field(field("scores"), None) {
            Some(Value::Vector(v)) => assert!(v.is_empty()),
            other => panic!("expected vector, got {:?}", other),
        }
    }
}
