//! Error types for adapters, schema construction and the wire codec.

use std::sync::Arc;

use thiserror::Error;

/// Error categories for adapter operations.
///
/// Every [`Error`] maps onto exactly one kind, so callers can branch on the
/// category without matching individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Key is not a declared field of the schema.
    UnknownField,
    /// Written value disagrees with the declared field or element type.
    TypeMismatch,
    /// Insert-only write on a field that is already set.
    DuplicateKey,
    /// Structural operation the schema cannot express (e.g. removing a field).
    UnsupportedOperation,
    /// Index outside `[0, count)`.
    IndexOutOfRange,
    /// Operation on a transient after it was frozen or outside its session.
    StaleTransient,
    /// Bytes could not be decoded into a record.
    MalformedInput,
    /// Message type is not registered.
    UnknownMessage,
}

impl ErrorKind {
    /// Returns the category name (e.g. "UnknownField").
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnknownField => "UnknownField",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::DuplicateKey => "DuplicateKey",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::StaleTransient => "StaleTransient",
            ErrorKind::MalformedInput => "MalformedInput",
            ErrorKind::UnknownMessage => "UnknownMessage",
        }
    }
}

/// Error raised by map, vector, blob and transient adapters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unknown field {key:?} for message {message}")]
    UnknownField { message: Arc<str>, key: String },

    #[error("type mismatch for field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: Arc<str>,
        expected: String,
        found: String,
    },

    #[error("field {field} is already set")]
    DuplicateKey { field: Arc<str> },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("index {index} out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("transient used after it was frozen or outside its editing session")]
    StaleTransient,

    #[error("malformed input: {0}")]
    MalformedInput(#[from] DecodeError),

    #[error("message type {name:?} is not registered")]
    UnknownMessage { name: String },
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownField { .. } => ErrorKind::UnknownField,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::StaleTransient => ErrorKind::StaleTransient,
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::UnknownMessage { .. } => ErrorKind::UnknownMessage,
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid field number {number}")]
    InvalidFieldNumber { number: u64 },

    #[error("invalid wire type {wire_type} for field number {number}")]
    InvalidWireType { number: u32, wire_type: u8 },

    #[error("unsupported wire type {wire_type} (groups are not supported)")]
    UnsupportedWireType { wire_type: u8 },

    #[error("field {field} expects wire type {expected}, found {found}")]
    WireTypeMismatch {
        field: Arc<str>,
        expected: u8,
        found: u8,
    },

    #[error("invalid UTF-8 in field {field}")]
    InvalidUtf8 { field: Arc<str> },

    #[error("message nesting exceeds maximum depth {max}")]
    NestingTooDeep { max: usize },
}

/// Error while constructing a schema descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("message {message}: duplicate field name {name:?}")]
    DuplicateFieldName { message: Arc<str>, name: Arc<str> },

    #[error("message {message}: duplicate field number {number}")]
    DuplicateFieldNumber { message: Arc<str>, number: u32 },

    #[error("message {message}: field {field:?} has invalid number {number}")]
    InvalidFieldNumber {
        message: Arc<str>,
        field: Arc<str>,
        number: u32,
    },

    #[error("message {message}: duplicate oneof {name:?}")]
    DuplicateOneof { message: Arc<str>, name: Arc<str> },

    #[error("message {message}: oneof {name:?} has no members")]
    EmptyOneof { message: Arc<str>, name: Arc<str> },

    #[error("enum {name} declares no values")]
    EmptyEnum { name: Arc<str> },

    #[error("enum {name}: duplicate value name {value:?}")]
    DuplicateEnumValue { name: Arc<str>, value: Arc<str> },
}
