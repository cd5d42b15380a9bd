//! Builder API for message descriptors.
//!
//! Stands in for schema code generation: fields are declared once, in order,
//! and `build()` produces the shared lookup tables every adapter uses.
//!
//! # Example
//!
//! ```rust
//! use protomap::schema::{MessageDescriptor, ScalarType};
//!
//! let address = MessageDescriptor::builder("people.Address")
//!     .field("street", 1, ScalarType::String)
//!     .field("city", 2, ScalarType::String)
//!     .build()
//!     .unwrap();
//!
//! let person = MessageDescriptor::builder("people.Person")
//!     .field("id", 1, ScalarType::Int32)
//!     .field("name", 2, ScalarType::String)
//!     .optional("email", 3, ScalarType::String)
//!     .field("address", 4, &address)
//!     .repeated("scores", 5, ScalarType::Int64)
//!     .oneof("contact", |o| {
//!         o.field("phone", 6, ScalarType::String)
//!             .field("handle", 7, ScalarType::String)
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(person.field_count(), 7);
//! assert_eq!(person.field_by_name("phone").unwrap().oneof_index(), Some(0));
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::SchemaError;
use crate::limits::is_valid_field_number;
use crate::schema::descriptor::{
    FieldDescriptor, FieldType, Label, MessageDescriptor, OneofDescriptor,
};

#[derive(Debug, Clone)]
struct PendingField {
    name: Arc<str>,
    number: u32,
    ty: FieldType,
    label: Label,
    oneof: Option<usize>,
}

/// Builder for a [`MessageDescriptor`].
#[derive(Debug, Clone)]
pub struct MessageDescriptorBuilder {
    name: Arc<str>,
    fields: Vec<PendingField>,
    oneofs: Vec<Arc<str>>,
}

impl MessageDescriptorBuilder {
    /// Creates a builder for the message with the given fully qualified name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            oneofs: Vec::new(),
        }
    }

    fn push(mut self, name: &str, number: u32, ty: FieldType, label: Label) -> Self {
        self.fields.push(PendingField {
            name: Arc::from(name),
            number,
            ty,
            label,
            oneof: None,
        });
        self
    }

    /// Adds a singular field with implicit presence.
    pub fn field(self, name: &str, number: u32, ty: impl Into<FieldType>) -> Self {
        self.push(name, number, ty.into(), Label::Singular)
    }

    /// Adds a singular field with explicit presence.
    pub fn optional(self, name: &str, number: u32, ty: impl Into<FieldType>) -> Self {
        self.push(name, number, ty.into(), Label::Optional)
    }

    /// Adds a repeated field.
    pub fn repeated(self, name: &str, number: u32, ty: impl Into<FieldType>) -> Self {
        self.push(name, number, ty.into(), Label::Repeated)
    }

    /// Adds a oneof group whose members are declared by `f`.
    pub fn oneof<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(OneofBuilder) -> OneofBuilder,
    {
        let group = self.oneofs.len();
        self.oneofs.push(Arc::from(name));
        let members = f(OneofBuilder::default()).fields;
        for (member_name, number, ty) in members {
            self.fields.push(PendingField {
                name: member_name,
                number,
                ty,
                label: Label::Singular,
                oneof: Some(group),
            });
        }
        self
    }

    /// Builds the descriptor, validating names and numbers.
    pub fn build(self) -> Result<Arc<MessageDescriptor>, SchemaError> {
        let message = self.name;
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut by_name =
            FxHashMap::with_capacity_and_hasher(self.fields.len(), Default::default());
        let mut by_number =
            FxHashMap::with_capacity_and_hasher(self.fields.len(), Default::default());

        for (index, pending) in self.fields.into_iter().enumerate() {
            if !is_valid_field_number(pending.number) {
                return Err(SchemaError::InvalidFieldNumber {
                    message,
                    field: pending.name,
                    number: pending.number,
                });
            }
            if by_name.insert(Arc::clone(&pending.name), index).is_some() {
                return Err(SchemaError::DuplicateFieldName {
                    message,
                    name: pending.name,
                });
            }
            if by_number.insert(pending.number, index).is_some() {
                return Err(SchemaError::DuplicateFieldNumber {
                    message,
                    number: pending.number,
                });
            }
            fields.push(Arc::new(FieldDescriptor {
                name: pending.name,
                number: pending.number,
                ty: pending.ty,
                label: pending.label,
                oneof: pending.oneof,
                index,
            }));
        }

        let mut oneofs = Vec::with_capacity(self.oneofs.len());
        let mut oneof_by_name = FxHashMap::default();
        for (group, name) in self.oneofs.into_iter().enumerate() {
            if oneof_by_name.insert(Arc::clone(&name), group).is_some() {
                return Err(SchemaError::DuplicateOneof { message, name });
            }
            let members: Vec<usize> = fields
                .iter()
                .filter(|f| f.oneof == Some(group))
                .map(|f| f.index)
                .collect();
            if members.is_empty() {
                return Err(SchemaError::EmptyOneof { message, name });
            }
            oneofs.push(OneofDescriptor { name, members });
        }

        Ok(Arc::new(MessageDescriptor {
            name: message,
            fields,
            oneofs,
            by_name,
            by_number,
            oneof_by_name,
        }))
    }
}

/// Builder for the members of one oneof group.
///
/// Members are always singular; repeated fields cannot belong to a oneof.
#[derive(Debug, Clone, Default)]
pub struct OneofBuilder {
    fields: Vec<(Arc<str>, u32, FieldType)>,
}

impl OneofBuilder {
    /// Adds a member field.
    pub fn field(mut self, name: &str, number: u32, ty: impl Into<FieldType>) -> Self {
        self.fields.push((Arc::from(name), number, ty.into()));
        self
    }
}
