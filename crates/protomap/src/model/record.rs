//! Records and builders.
//!
//! A [`Record`] is an immutable structured value of one message type; its
//! fields are held in their stored form ([`Native`]). A `Builder` is the
//! mutable staging area used to derive a new record from an old one.
//!
//! The builder is internal to the crate and trusts its caller: values passed
//! to `Builder::set` must already match the field's declared type. Callers
//! derive records through the adapters in [`crate::coll`], which validate
//! before they write.
//!
//! ```compile_fail
//! use protomap::schema::MessageDescriptor;
//! use protomap::Record;
//!
//! let desc = MessageDescriptor::builder("m.Empty").build().unwrap();
//! let _builder = Record::new(desc).to_builder();
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::schema::{FieldType, MessageDescriptor, ScalarType};

/// A field value in its stored form.
///
/// Floats compare by value except that NaN equals NaN, so a record holding a
/// NaN is still equal to itself.
#[derive(Debug, Clone)]
pub enum Native {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Arc<str>),
    Bytes(Bytes),
    /// Enum number.
    Enum(i32),
    Message(Record),
    /// Elements of a repeated field.
    List(Arc<Vec<Native>>),
}

impl Native {
    /// Returns the default value for a field of type `ty`.
    pub fn default_for(ty: &FieldType) -> Native {
        match ty {
            FieldType::Scalar(s) => match s {
                ScalarType::Bool => Native::Bool(false),
                ScalarType::Int32 | ScalarType::SInt32 => Native::I32(0),
                ScalarType::Int64 | ScalarType::SInt64 => Native::I64(0),
                ScalarType::UInt32 => Native::U32(0),
                ScalarType::UInt64 => Native::U64(0),
                ScalarType::Float => Native::F32(0.0),
                ScalarType::Double => Native::F64(0.0),
                ScalarType::String => Native::Str(Arc::from("")),
                ScalarType::Bytes => Native::Bytes(Bytes::new()),
            },
            FieldType::Enum(e) => Native::Enum(e.default_value().number()),
            FieldType::Message(m) => Native::Message(Record::new(Arc::clone(m))),
        }
    }

    /// Returns true if this is the default value of a field of type `ty`.
    ///
    /// Enums default to their first declared value, which need not be 0.
    /// Messages are never considered default: a set message is present even
    /// when all of its fields are unset.
    pub fn is_default_for(&self, ty: &FieldType) -> bool {
        match self {
            Native::Bool(b) => !*b,
            Native::I32(v) => *v == 0,
            Native::I64(v) => *v == 0,
            Native::U32(v) => *v == 0,
            Native::U64(v) => *v == 0,
            // -0.0 is not the default
            Native::F32(v) => v.to_bits() == 0,
            Native::F64(v) => v.to_bits() == 0,
            Native::Str(s) => s.is_empty(),
            Native::Bytes(b) => b.is_empty(),
            Native::Enum(n) => match ty {
                FieldType::Enum(e) => *n == e.default_value().number(),
                _ => false,
            },
            Native::Message(_) => false,
            Native::List(items) => items.is_empty(),
        }
    }
}

impl PartialEq for Native {
    fn eq(&self, other: &Native) -> bool {
        match (self, other) {
            (Native::Bool(a), Native::Bool(b)) => a == b,
            (Native::I32(a), Native::I32(b)) => a == b,
            (Native::I64(a), Native::I64(b)) => a == b,
            (Native::U32(a), Native::U32(b)) => a == b,
            (Native::U64(a), Native::U64(b)) => a == b,
            (Native::F32(a), Native::F32(b)) => same_float(f64::from(*a), f64::from(*b)),
            (Native::F64(a), Native::F64(b)) => same_float(*a, *b),
            (Native::Str(a), Native::Str(b)) => a == b,
            (Native::Bytes(a), Native::Bytes(b)) => a == b,
            (Native::Enum(a), Native::Enum(b)) => a == b,
            (Native::Message(a), Native::Message(b)) => a == b,
            (Native::List(a), Native::List(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Float equality where NaN equals NaN.
pub(crate) fn same_float(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// An immutable record of one message type.
///
/// Cloning is O(1): field storage is shared.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<MessageDescriptor>,
    fields: Arc<[Option<Native>]>,
}

impl Record {
    /// Creates a record with every field unset.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        let fields: Vec<Option<Native>> = vec![None; descriptor.field_count()];
        Self {
            descriptor,
            fields: Arc::from(fields),
        }
    }

    /// Creates an empty builder for the given message type.
    pub(crate) fn builder(descriptor: Arc<MessageDescriptor>) -> Builder {
        let fields = vec![None; descriptor.field_count()];
        Builder { descriptor, fields }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Returns the stored value of the field at `index`, if set.
    pub fn get(&self, index: usize) -> Option<&Native> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    /// Returns true if the field at `index` holds a value.
    pub fn is_set(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Returns the index of the member currently set in oneof group `group`.
    pub fn which_oneof(&self, group: usize) -> Option<usize> {
        which_oneof(&self.descriptor, &self.fields, group)
    }

    /// Derives a builder holding a copy of this record's fields.
    pub(crate) fn to_builder(&self) -> Builder {
        Builder {
            descriptor: Arc::clone(&self.descriptor),
            fields: self.fields.to_vec(),
        }
    }

    /// Returns true if both records share the same field storage.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.ptr_eq(other)
            || (self.descriptor.is_same(&other.descriptor) && self.fields == other.fields)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.descriptor.name());
        for field in self.descriptor.fields() {
            if let Some(value) = self.get(field.index()) {
                s.field(field.name(), value);
            }
        }
        s.finish()
    }
}

/// Mutable staging area for a record.
#[derive(Debug, Clone)]
pub(crate) struct Builder {
    descriptor: Arc<MessageDescriptor>,
    fields: Vec<Option<Native>>,
}

impl Builder {
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    pub fn get(&self, index: usize) -> Option<&Native> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn which_oneof(&self, group: usize) -> Option<usize> {
        which_oneof(&self.descriptor, &self.fields, group)
    }

    /// Sets the field at `index`.
    ///
    /// Setting a oneof member clears the other members of its group. Default
    /// values of implicit-presence fields are stored as unset, so records
    /// compare equal regardless of how a default was reached.
    ///
    /// `index` must come from this message type's field table.
    pub(crate) fn set(&mut self, index: usize, value: Native) -> &mut Self {
        let field = Arc::clone(&self.descriptor.fields()[index]);
        if let Some(group) = field.oneof_index() {
            self.clear_oneof(group);
        }
        self.fields[index] = if !field.has_presence() && value.is_default_for(field.field_type()) {
            None
        } else {
            Some(value)
        };
        self
    }

    /// Appends an element to the repeated field at `index`.
    pub(crate) fn push(&mut self, index: usize, value: Native) -> &mut Self {
        match &mut self.fields[index] {
            Some(Native::List(items)) => Arc::make_mut(items).push(value),
            slot => *slot = Some(Native::List(Arc::new(vec![value]))),
        }
        self
    }

    /// Resets the field at `index` to unset.
    pub(crate) fn clear(&mut self, index: usize) -> &mut Self {
        self.fields[index] = None;
        self
    }

    fn clear_oneof(&mut self, group: usize) {
        if let Some(oneof) = self.descriptor.oneof(group) {
            for &member in oneof.members() {
                self.fields[member] = None;
            }
        }
    }

    /// Freezes the builder into an immutable record.
    pub(crate) fn build(self) -> Record {
        Record {
            descriptor: self.descriptor,
            fields: Arc::from(self.fields),
        }
    }
}

fn which_oneof(
    descriptor: &MessageDescriptor,
    fields: &[Option<Native>],
    group: usize,
) -> Option<usize> {
    descriptor
        .oneof(group)?
        .members()
        .iter()
        .copied()
        .find(|&member| fields[member].is_some())
}
