//! In-memory data model.
//!
//! - [`record`]: immutable records, their builders and native field values
//! - [`value`]: the values adapters expose and accept

pub mod record;
pub mod value;

pub(crate) use record::Builder;
pub use record::{Native, Record};
pub use value::Value;
