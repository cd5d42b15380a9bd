//! protomap: persistent collection adapters over schema-typed binary records.
//!
//! Structured binary messages (protobuf-style records with nested messages,
//! repeated fields, enums, oneof groups and byte blobs) are handled as
//! ordinary immutable values: maps keyed by field name, vectors over repeated
//! fields and byte sequences over blobs. The compact record stays the source
//! of truth; every write produces a new record and shares what it can.
//!
//! # Quick Start
//!
//! ```rust
//! use protomap::schema::{EnumDescriptor, MessageDescriptor, ScalarType};
//! use protomap::{Registry, TransientCollection, Value};
//!
//! let mood = EnumDescriptor::new("people.Mood", [("NEUTRAL", 0), ("HAPPY", 1)]).unwrap();
//! let person = MessageDescriptor::builder("people.Person")
//!     .field("name", 1, ScalarType::String)
//!     .field("age", 2, ScalarType::Int32)
//!     .field("mood", 3, &mood)
//!     .repeated("scores", 4, ScalarType::Int64)
//!     .build()
//!     .unwrap();
//!
//! let registry = Registry::new("people").with(&person);
//!
//! // Writes return new maps; the original is untouched
//! let empty = registry.empty("Person").unwrap();
//! let alice = empty
//!     .assoc("name", "Alice").unwrap()
//!     .assoc("age", 30).unwrap()
//!     .assoc("mood", Value::keyword("HAPPY")).unwrap()
//!     .assoc("scores", Value::list([10i64, 20])).unwrap();
//! assert_eq!(alice.get("age"), Some(Value::I32(30)));
//! assert_eq!(empty.get("age"), Some(Value::I32(0)));
//!
//! // Repeated fields are persistent vectors
//! let scores = alice.get("scores").unwrap();
//! let more = scores.as_vector().unwrap().cons(30i64).unwrap();
//! assert_eq!(more.len(), 3);
//!
//! // Round trip through the wire format
//! let bytes = alice.to_bytes();
//! let decoded = registry.from_bytes("Person", bytes).unwrap();
//! assert_eq!(decoded, alice);
//!
//! // Batched edits through a transient
//! let mut t = alice.as_transient();
//! t.assoc("name", "Alicia").unwrap().assoc("age", 31).unwrap();
//! let older = t.persistent().unwrap();
//! assert_eq!(older.get("name"), Some(Value::from("Alicia")));
//! ```
//!
//! # Modules
//!
//! - [`schema`]: field, enum and message descriptors
//! - [`model`]: records, builders and exposed values
//! - [`coll`]: map, vector and blob adapters, transients, capability traits
//! - [`codec`]: protobuf wire encoding/decoding
//! - [`registry`]: message types by name
//! - [`error`]: error types
//! - [`limits`]: decoding limits
//!
//! # Concurrency
//!
//! Descriptors, records and every persistent adapter are immutable and
//! `Send + Sync`; they can be shared across threads without locks.
//! Transients are single-writer: every mutating call takes `&mut self`.

pub mod codec;
pub mod coll;
pub mod error;
pub mod limits;
pub mod model;
pub mod registry;
pub mod schema;

#[cfg(test)]
pub(crate) mod fixtures;

pub use codec::{decode_record, encode_record, encode_record_with_options, EncodeOptions};
pub use coll::{
    Associative, ByteBlob, Counted, Editable, Indexed, ProtoMap, ProtoVector, Reducible,
    TransientCollection, TransientProtoMap, TransientVector,
};
pub use error::{DecodeError, Error, ErrorKind, SchemaError};
pub use model::{Native, Record, Value};
pub use registry::Registry;
