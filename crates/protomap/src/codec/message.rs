//! Record encoding and decoding.
//!
//! Records are encoded in the protobuf wire format:
//! - fields in declared order; unset fields are omitted
//! - `int32`/`int64`/`uint*`/`bool`/enums as varints (negative `int32`
//!   values sign-extended to 64 bits), `sint*` zigzag-encoded
//! - `float` as fixed32, `double` as fixed64
//! - strings, bytes and nested messages length-delimited
//! - repeated numeric fields packed unless disabled in [`EncodeOptions`]
//!
//! The decoder accepts packed and unpacked repeated fields alike, keeps the
//! last occurrence of a singular field, and skips unknown fields.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::codec::primitives::{zigzag_decode, Reader, WireType, Writer};
use crate::error::DecodeError;
use crate::limits::{MAX_MESSAGE_SIZE, MAX_NESTING_DEPTH};
use crate::model::{Native, Record};
use crate::schema::{FieldDescriptor, FieldType, MessageDescriptor, ScalarType};

/// Options for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Pack repeated numeric and enum fields into one length-delimited run.
    ///
    /// Disable when the reader predates packed encoding.
    pub packed: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { packed: true }
    }
}

impl EncodeOptions {
    /// Creates default (packed) encoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that emit one tag per repeated element.
    pub fn unpacked() -> Self {
        Self { packed: false }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a record with default options.
pub fn encode_record(record: &Record) -> Vec<u8> {
    encode_record_with_options(record, EncodeOptions::default())
}

/// Encodes a record with the given options.
pub fn encode_record_with_options(record: &Record, options: EncodeOptions) -> Vec<u8> {
    let mut writer = Writer::with_capacity(record.descriptor().field_count() * 8);
    encode_fields(&mut writer, record, options);
    writer.into_bytes()
}

fn encode_fields(writer: &mut Writer, record: &Record, options: EncodeOptions) {
    for field in record.descriptor().fields() {
        let Some(value) = record.get(field.index()) else {
            continue;
        };
        match value {
            Native::List(items) => encode_repeated(writer, field, items, options),
            _ => {
                writer.write_tag(field.number(), wire_type_of(field.field_type()));
                encode_payload(writer, field.field_type(), value, options);
            }
        }
    }
}

fn encode_repeated(
    writer: &mut Writer,
    field: &FieldDescriptor,
    items: &[Native],
    options: EncodeOptions,
) {
    if items.is_empty() {
        return;
    }
    let ty = field.field_type();
    let wire_type = wire_type_of(ty);
    if options.packed && wire_type != WireType::Len {
        let mut packed = Writer::with_capacity(items.len() * 4);
        for item in items {
            encode_payload(&mut packed, ty, item, options);
        }
        writer.write_tag(field.number(), WireType::Len);
        writer.write_len_delimited(packed.as_bytes());
        return;
    }
    for item in items {
        writer.write_tag(field.number(), wire_type);
        encode_payload(writer, ty, item, options);
    }
}

fn encode_payload(writer: &mut Writer, ty: &FieldType, value: &Native, options: EncodeOptions) {
    let zigzag = matches!(ty, FieldType::Scalar(ScalarType::SInt32 | ScalarType::SInt64));
    match value {
        Native::Bool(b) => writer.write_varint(u64::from(*b)),
        Native::I32(v) if zigzag => writer.write_signed_varint(i64::from(*v)),
        Native::I32(v) => writer.write_varint(i64::from(*v) as u64),
        Native::I64(v) if zigzag => writer.write_signed_varint(*v),
        Native::I64(v) => writer.write_varint(*v as u64),
        Native::U32(v) => writer.write_varint(u64::from(*v)),
        Native::U64(v) => writer.write_varint(*v),
        Native::F32(v) => writer.write_fixed32(v.to_bits()),
        Native::F64(v) => writer.write_fixed64(v.to_bits()),
        Native::Str(s) => writer.write_len_delimited(s.as_bytes()),
        Native::Bytes(b) => writer.write_len_delimited(b),
        Native::Enum(n) => writer.write_varint(i64::from(*n) as u64),
        Native::Message(record) => {
            writer.write_len_delimited(&encode_record_with_options(record, options));
        }
        // Never stored as an element
        Native::List(_) => {}
    }
}

fn wire_type_of(ty: &FieldType) -> WireType {
    match ty {
        FieldType::Scalar(ScalarType::Float) => WireType::Fixed32,
        FieldType::Scalar(ScalarType::Double) => WireType::Fixed64,
        FieldType::Scalar(ScalarType::String | ScalarType::Bytes) => WireType::Len,
        FieldType::Scalar(_) | FieldType::Enum(_) => WireType::Varint,
        FieldType::Message(_) => WireType::Len,
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a record of type `descriptor` from wire bytes.
///
/// Bytes fields of the result share the input buffer.
pub fn decode_record(
    descriptor: &Arc<MessageDescriptor>,
    data: impl Into<Bytes>,
) -> Result<Record, DecodeError> {
    let data = data.into();
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "message",
            len: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    decode_message(descriptor, data, 0)
}

fn decode_message(
    descriptor: &Arc<MessageDescriptor>,
    data: Bytes,
    depth: usize,
) -> Result<Record, DecodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DecodeError::NestingTooDeep {
            max: MAX_NESTING_DEPTH,
        });
    }
    let mut reader = Reader::new(data);
    let mut builder = Record::builder(Arc::clone(descriptor));

    while !reader.is_empty() {
        let (number, wire_type) = reader.read_tag()?;
        let Some(field) = descriptor.field_by_number(number) else {
            trace!(message_type = descriptor.name(), number, "skipping unknown field");
            reader.skip(wire_type)?;
            continue;
        };

        let expected = wire_type_of(field.field_type());
        if field.is_repeated() && wire_type == WireType::Len && expected != WireType::Len {
            let mut packed = Reader::new(reader.read_len_delimited("packed field")?);
            while !packed.is_empty() {
                let item = decode_payload(&mut packed, field, depth)?;
                builder.push(field.index(), item);
            }
            continue;
        }
        if wire_type != expected {
            return Err(DecodeError::WireTypeMismatch {
                field: Arc::clone(field.name_arc()),
                expected: expected as u8,
                found: wire_type as u8,
            });
        }
        let value = decode_payload(&mut reader, field, depth)?;
        if field.is_repeated() {
            builder.push(field.index(), value);
        } else {
            builder.set(field.index(), value);
        }
    }

    Ok(builder.build())
}

fn decode_payload(
    reader: &mut Reader,
    field: &FieldDescriptor,
    depth: usize,
) -> Result<Native, DecodeError> {
    let native = match field.field_type() {
        FieldType::Scalar(ty) => match ty {
            ScalarType::Bool => Native::Bool(reader.read_varint("bool")? != 0),
            ScalarType::Int32 => Native::I32(reader.read_varint("int32")? as i32),
            ScalarType::Int64 => Native::I64(reader.read_varint("int64")? as i64),
            ScalarType::UInt32 => Native::U32(reader.read_varint("uint32")? as u32),
            ScalarType::UInt64 => Native::U64(reader.read_varint("uint64")?),
            ScalarType::SInt32 => Native::I32(reader.read_signed_varint("sint32")? as i32),
            ScalarType::SInt64 => Native::I64(reader.read_signed_varint("sint64")?),
            ScalarType::Float => Native::F32(f32::from_bits(reader.read_fixed32("float")?)),
            ScalarType::Double => Native::F64(f64::from_bits(reader.read_fixed64("double")?)),
            ScalarType::String => {
                let bytes = reader.read_len_delimited("string")?;
                let s = std::str::from_utf8(&bytes).map_err(|_| DecodeError::InvalidUtf8 {
                    field: Arc::clone(field.name_arc()),
                })?;
                Native::Str(Arc::from(s))
            }
            ScalarType::Bytes => Native::Bytes(reader.read_len_delimited("bytes")?),
        },
        FieldType::Enum(_) => Native::Enum(reader.read_varint("enum")? as i32),
        FieldType::Message(nested) => {
            let data = reader.read_len_delimited("message")?;
            Native::Message(decode_message(nested, data, depth + 1)?)
        }
    };
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ADDRESS, LIKE, PERSON, SIMPLE};
    use crate::schema::EnumDescriptor;
    use proptest::prelude::*;

    fn index(name: &str) -> usize {
        PERSON.field_by_name(name).unwrap().index()
    }

    #[test]
    fn test_known_encoding() {
        let mut builder = Record::builder(SIMPLE.clone());
        builder.set(0, Native::Str(Arc::from("Al")));
        builder.set(1, Native::I32(-1));
        let bytes = encode_record(&builder.build());

        let mut expected = vec![0x0a, 0x02, b'A', b'l', 0x10];
        expected.extend([0xff; 9]);
        expected.push(0x01);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_packed_and_unpacked_decode_alike() {
        let mut builder = Record::builder(PERSON.clone());
        for v in [1i64, -2, 300] {
            builder.push(index("scores"), Native::I64(v));
        }
        let record = builder.build();

        let packed = encode_record(&record);
        let unpacked = encode_record_with_options(&record, EncodeOptions::unpacked());
        assert_ne!(packed, unpacked);
        assert_eq!(decode_record(&PERSON, packed).unwrap(), record);
        assert_eq!(decode_record(&PERSON, unpacked).unwrap(), record);
    }

    #[test]
    fn test_last_occurrence_wins_and_unknown_skipped() {
        let mut writer = Writer::new();
        writer.write_tag(2, WireType::Varint);
        writer.write_varint(1);
        writer.write_tag(99, WireType::Len);
        writer.write_len_delimited(b"ignored");
        writer.write_tag(2, WireType::Varint);
        writer.write_varint(2);

        let record = decode_record(&SIMPLE, writer.into_bytes()).unwrap();
        assert_eq!(record.get(1), Some(&Native::I32(2)));
        assert!(!record.is_set(0));
    }

    #[test]
    fn test_decode_errors() {
        let mut writer = Writer::new();
        writer.write_tag(1, WireType::Varint);
        writer.write_varint(5);
        assert!(matches!(
            decode_record(&SIMPLE, writer.into_bytes()),
            Err(DecodeError::WireTypeMismatch { expected: 2, found: 0, .. })
        ));

        let mut writer = Writer::new();
        writer.write_tag(1, WireType::Len);
        writer.write_len_delimited(&[0xff, 0xfe]);
        assert!(matches!(
            decode_record(&SIMPLE, writer.into_bytes()),
            Err(DecodeError::InvalidUtf8 { .. })
        ));

        assert!(matches!(
            decode_record(&SIMPLE, vec![0x10]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_nested_message_and_bytes_share_input() {
        let mut address = Record::builder(ADDRESS.clone());
        address.set(1, Native::Str(Arc::from("Paris")));
        let mut builder = Record::builder(PERSON.clone());
        builder
            .set(index("address"), Native::Message(address.build()))
            .set(index("avatar"), Native::Bytes(Bytes::from_static(&[1, 2, 3])));
        let record = builder.build();

        let data = Bytes::from(encode_record(&record));
        let decoded = decode_record(&PERSON, data.clone()).unwrap();
        assert_eq!(decoded, record);

        let Some(Native::Bytes(avatar)) = decoded.get(index("avatar")) else {
            panic!("avatar not decoded");
        };
        let start = data.as_ptr() as usize;
        let end = start + data.len();
        assert!((start..end).contains(&(avatar.as_ptr() as usize)));
    }

    #[test]
    fn test_empty_nested_message_is_present() {
        let mut builder = Record::builder(PERSON.clone());
        builder.set(index("address"), Native::Message(Record::new(ADDRESS.clone())));
        let record = builder.build();
        let decoded = decode_record(&PERSON, encode_record(&record)).unwrap();
        assert!(decoded.is_set(index("address")));
    }

    #[test]
    fn test_repeated_messages_and_oneof_decode() {
        let like = |description: &str, level: i32| {
            let mut b = Record::builder(LIKE.clone());
            b.set(0, Native::Str(Arc::from(description)))
                .set(1, Native::I32(level));
            b.build()
        };
        let mut writer = Writer::new();
        for (description, level) in [("tea", 3), ("rain", 0)] {
            writer.write_tag(5, WireType::Len);
            writer.write_len_delimited(&encode_record(&like(description, level)));
        }
        writer.write_tag(9, WireType::Len);
        writer.write_len_delimited(b"555");
        writer.write_tag(10, WireType::Len);
        writer.write_len_delimited(b"@al");

        let decoded = decode_record(&PERSON, writer.into_bytes()).unwrap();
        match decoded.get(index("likes")) {
            Some(Native::List(items)) => {
                let expected = [like("tea", 3), like("rain", 0)].map(Native::Message);
                assert_eq!(items.as_slice(), &expected)
            }
            other => panic!("expected likes, got {:?}", other),
        }
        // The later oneof member replaces the earlier one
        let group = PERSON.oneof_index("contact").unwrap();
        assert_eq!(decoded.which_oneof(group), Some(index("handle")));
        assert!(!decoded.is_set(index("phone")));
        assert_eq!(decode_record(&PERSON, encode_record(&decoded)).unwrap(), decoded);
    }

    #[test]
    fn test_enum_zero_decoded_when_not_first() {
        let level = EnumDescriptor::new("t.Level", [("LOW", 1), ("OFF", 0)]).unwrap();
        let dial = MessageDescriptor::builder("t.Dial")
            .field("level", 1, &level)
            .build()
            .unwrap();

        let decoded = decode_record(&dial, vec![0x08, 0x00]).unwrap();
        assert_eq!(decoded.get(0), Some(&Native::Enum(0)));
        assert_eq!(encode_record(&decoded), vec![0x08, 0x00]);
        assert!(!decode_record(&dial, vec![0x08, 0x01]).unwrap().is_set(0));
    }

    fn address_strategy() -> impl Strategy<Value = Option<Record>> {
        proptest::option::of(("[a-z ]{0,8}", "[A-Z][a-z]{0,6}", any::<i32>())).prop_map(|address| {
            address.map(|(street, city, zip)| {
                let mut b = Record::builder(ADDRESS.clone());
                b.set(0, Native::Str(Arc::from(street)))
                    .set(1, Native::Str(Arc::from(city)))
                    .set(2, Native::I32(zip));
                b.build()
            })
        })
    }

    fn likes_strategy() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(("[a-z]{0,6}", 0i32..5), 0..4).prop_map(|likes| {
            likes
                .into_iter()
                .map(|(description, level)| {
                    let mut b = Record::builder(LIKE.clone());
                    b.set(0, Native::Str(Arc::from(description)))
                        .set(1, Native::I32(level));
                    b.build()
                })
                .collect()
        })
    }

    fn person_strategy() -> impl Strategy<Value = Record> {
        let email = prop_oneof![
            Just(None),
            Just(Some(String::new())),
            "[a-z@.]{1,10}".prop_map(Some),
        ];
        let contact = proptest::option::of((any::<bool>(), "[0-9@-]{0,8}"));
        (
            (any::<i32>(), "[a-zA-Z ]{0,12}", email, 0i32..4, -1e9f64..1e9),
            (
                prop::collection::vec(any::<i64>(), 0..8),
                prop::collection::vec(any::<u8>(), 0..16),
                prop::collection::vec("[a-z]{0,5}", 0..4),
            ),
            (address_strategy(), likes_strategy(), contact),
        )
            .prop_map(|(scalars, lists, nested)| {
                let (id, name, email, mood, ratio) = scalars;
                let (scores, avatar, tags) = lists;
                let (address, likes, contact) = nested;

                let mut b = Record::builder(PERSON.clone());
                b.set(index("id"), Native::I32(id))
                    .set(index("name"), Native::Str(Arc::from(name)))
                    .set(index("mood"), Native::Enum(mood))
                    .set(index("avatar"), Native::Bytes(Bytes::from(avatar)))
                    .set(index("ratio"), Native::F64(ratio));
                if let Some(email) = email {
                    b.set(index("email"), Native::Str(Arc::from(email)));
                }
                if let Some(address) = address {
                    b.set(index("address"), Native::Message(address));
                }
                if let Some((phone, contact)) = contact {
                    let member = if phone { "phone" } else { "handle" };
                    b.set(index(member), Native::Str(Arc::from(contact)));
                }
                for score in scores {
                    b.push(index("scores"), Native::I64(score));
                }
                for like in likes {
                    b.push(index("likes"), Native::Message(like));
                }
                for tag in tags {
                    b.push(index("tags"), Native::Str(Arc::from(tag)));
                }
                b.build()
            })
    }

    proptest! {
        #[test]
        fn roundtrip_person(record in person_strategy(), packed in any::<bool>()) {
            let options = EncodeOptions { packed };
            let bytes = encode_record_with_options(&record, options);
            let decoded = decode_record(&PERSON, bytes).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
