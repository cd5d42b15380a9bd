//! Binary encoding/decoding of records in the protobuf wire format.

pub mod message;
pub mod primitives;

pub use message::{decode_record, encode_record, encode_record_with_options, EncodeOptions};
pub use primitives::{zigzag_decode, zigzag_encode, Reader, WireType, Writer};
