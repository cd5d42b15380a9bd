//! Schema metadata: field, enum and message descriptors.
//!
//! - [`descriptor`]: the descriptor types and their lookup tables
//! - [`builder`]: fluent construction of message descriptors

pub mod builder;
pub mod descriptor;

pub use builder::{MessageDescriptorBuilder, OneofBuilder};
pub use descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldType, Label, MessageDescriptor,
    OneofDescriptor, ScalarType,
};
