//! Shared test schemas.

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::schema::{EnumDescriptor, MessageDescriptor, ScalarType};

lazy_static! {
    pub static ref MOOD: Arc<EnumDescriptor> =
        EnumDescriptor::new("test.Mood", [("NEUTRAL", 0), ("HAPPY", 1), ("SAD", 2)]).unwrap();

    pub static ref ADDRESS: Arc<MessageDescriptor> = MessageDescriptor::builder("test.Address")
        .field("street", 1, ScalarType::String)
        .field("city", 2, ScalarType::String)
        .field("zip", 3, ScalarType::Int32)
        .build()
        .unwrap();

    pub static ref LIKE: Arc<MessageDescriptor> = MessageDescriptor::builder("test.Like")
        .field("description", 1, ScalarType::String)
        .field("level", 2, ScalarType::Int32)
        .build()
        .unwrap();

    pub static ref PERSON: Arc<MessageDescriptor> = MessageDescriptor::builder("test.Person")
        .field("id", 1, ScalarType::Int32)
        .field("name", 2, ScalarType::String)
        .optional("email", 3, ScalarType::String)
        .field("address", 4, &*ADDRESS)
        .repeated("likes", 5, &*LIKE)
        .repeated("scores", 6, ScalarType::Int64)
        .field("mood", 7, &*MOOD)
        .field("avatar", 8, ScalarType::Bytes)
        .oneof("contact", |o| {
            o.field("phone", 9, ScalarType::String)
                .field("handle", 10, ScalarType::String)
        })
        .repeated("tags", 11, ScalarType::String)
        .field("ratio", 12, ScalarType::Double)
        .build()
        .unwrap();

    /// `{name: string, age: int32}`
    pub static ref SIMPLE: Arc<MessageDescriptor> = MessageDescriptor::builder("test.Simple")
        .field("name", 1, ScalarType::String)
        .field("age", 2, ScalarType::Int32)
        .build()
        .unwrap();
}
