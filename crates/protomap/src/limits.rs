//! Security limits for decoding.
//!
//! The decoder rejects input exceeding these bounds before allocating.

/// Maximum bytes in a varint (enough for a full u64).
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum size of an encoded message, and of any length-delimited field.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Maximum nesting depth of embedded messages.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Largest legal field number (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// First field number reserved by the protobuf implementation.
pub const RESERVED_FIELD_NUMBERS_START: u32 = 19_000;

/// Last field number reserved by the protobuf implementation.
pub const RESERVED_FIELD_NUMBERS_END: u32 = 19_999;

/// Returns true if `number` may be used as a field number.
pub fn is_valid_field_number(number: u32) -> bool {
    number >= 1
        && number <= MAX_FIELD_NUMBER
        && !(RESERVED_FIELD_NUMBERS_START..=RESERVED_FIELD_NUMBERS_END).contains(&number)
}
