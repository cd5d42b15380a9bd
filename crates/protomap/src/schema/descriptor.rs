//! Field, enum and message descriptors.
//!
//! Descriptors are the static, schema-derived metadata every adapter reads.
//! They are built once (see [`MessageDescriptorBuilder`]) and shared behind
//! `Arc` for the lifetime of the process.
//!
//! [`MessageDescriptorBuilder`]: crate::schema::MessageDescriptorBuilder

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::SchemaError;
use crate::schema::builder::MessageDescriptorBuilder;

/// Scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    /// Zigzag-encoded 32-bit signed integer.
    SInt32,
    /// Zigzag-encoded 64-bit signed integer.
    SInt64,
    Float,
    Double,
    String,
    Bytes,
}

impl ScalarType {
    /// Returns the schema-language name of this type.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt32 => "uint32",
            ScalarType::UInt64 => "uint64",
            ScalarType::SInt32 => "sint32",
            ScalarType::SInt64 => "sint64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Returns true for numeric and boolean types, which have no absent state.
    pub fn is_primitive(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }
}

/// Declared type of a field (or of each element, for repeated fields).
#[derive(Debug, Clone)]
pub enum FieldType {
    Scalar(ScalarType),
    Enum(Arc<EnumDescriptor>),
    Message(Arc<MessageDescriptor>),
}

impl FieldType {
    /// Returns true if both types describe the same schema type.
    pub fn same_as(&self, other: &FieldType) -> bool {
        match (self, other) {
            (FieldType::Scalar(a), FieldType::Scalar(b)) => a == b,
            (FieldType::Enum(a), FieldType::Enum(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            (FieldType::Message(a), FieldType::Message(b)) => a.is_same(b),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => f.write_str(s.name()),
            FieldType::Enum(e) => write!(f, "enum {}", e.name()),
            FieldType::Message(m) => write!(f, "message {}", m.name()),
        }
    }
}

impl From<ScalarType> for FieldType {
    fn from(s: ScalarType) -> Self {
        FieldType::Scalar(s)
    }
}

impl From<Arc<EnumDescriptor>> for FieldType {
    fn from(e: Arc<EnumDescriptor>) -> Self {
        FieldType::Enum(e)
    }
}

impl From<&Arc<EnumDescriptor>> for FieldType {
    fn from(e: &Arc<EnumDescriptor>) -> Self {
        FieldType::Enum(Arc::clone(e))
    }
}

impl From<Arc<MessageDescriptor>> for FieldType {
    fn from(m: Arc<MessageDescriptor>) -> Self {
        FieldType::Message(m)
    }
}

impl From<&Arc<MessageDescriptor>> for FieldType {
    fn from(m: &Arc<MessageDescriptor>) -> Self {
        FieldType::Message(Arc::clone(m))
    }
}

/// Field cardinality and presence tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Singular field with implicit presence: unset reads as the default.
    Singular,
    /// Singular field with explicit presence: set and default are distinct.
    Optional,
    /// Repeated field.
    Repeated,
}

/// Metadata for one declared field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) name: Arc<str>,
    pub(crate) number: u32,
    pub(crate) ty: FieldType,
    pub(crate) label: Label,
    pub(crate) oneof: Option<usize>,
    pub(crate) index: usize,
}

impl FieldDescriptor {
    /// Returns the symbolic field name (the map key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field name as a shared string.
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns the wire field number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns the declared type (element type for repeated fields).
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    /// Index of the oneof group this field belongs to, if any.
    pub fn oneof_index(&self) -> Option<usize> {
        self.oneof
    }

    /// Position of this field in declared order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true if the record distinguishes "set" from "default" for this field.
    ///
    /// Message fields, oneof members and `optional` fields track presence;
    /// repeated fields and plain singular scalars do not.
    pub fn has_presence(&self) -> bool {
        match self.label {
            Label::Optional => true,
            Label::Repeated => false,
            Label::Singular => self.oneof.is_some() || matches!(self.ty, FieldType::Message(_)),
        }
    }
}

/// One named value of an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    name: Arc<str>,
    number: i32,
}

impl EnumValue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn number(&self) -> i32 {
        self.number
    }
}

/// An enum type: ordered named values.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    name: Arc<str>,
    values: Vec<EnumValue>,
    by_name: FxHashMap<Arc<str>, usize>,
    by_number: FxHashMap<i32, usize>,
}

impl EnumDescriptor {
    /// Creates an enum descriptor. The first value is the default.
    ///
    /// Several names may share a number (aliases); lookups by number return
    /// the first declared name.
    pub fn new<'a>(
        name: impl Into<Arc<str>>,
        values: impl IntoIterator<Item = (&'a str, i32)>,
    ) -> Result<Arc<Self>, SchemaError> {
        let name = name.into();
        let mut descriptor = EnumDescriptor {
            name: Arc::clone(&name),
            values: Vec::new(),
            by_name: FxHashMap::default(),
            by_number: FxHashMap::default(),
        };
        for (value_name, number) in values {
            let value_name: Arc<str> = Arc::from(value_name);
            let index = descriptor.values.len();
            if descriptor.by_name.insert(Arc::clone(&value_name), index).is_some() {
                return Err(SchemaError::DuplicateEnumValue {
                    name,
                    value: value_name,
                });
            }
            descriptor.by_number.entry(number).or_insert(index);
            descriptor.values.push(EnumValue {
                name: value_name,
                number,
            });
        }
        if descriptor.values.is_empty() {
            return Err(SchemaError::EmptyEnum { name });
        }
        Ok(Arc::new(descriptor))
    }

    /// Returns the fully qualified enum name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns values in declared order.
    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.by_name.get(name).map(|&i| &self.values[i])
    }

    pub fn value_by_number(&self, number: i32) -> Option<&EnumValue> {
        self.by_number.get(&number).map(|&i| &self.values[i])
    }

    /// Returns the default (first declared) value.
    pub fn default_value(&self) -> &EnumValue {
        // new() rejects empty enums
        &self.values[0]
    }
}

/// A oneof group: mutually exclusive member fields.
#[derive(Debug, Clone)]
pub struct OneofDescriptor {
    pub(crate) name: Arc<str>,
    pub(crate) members: Vec<usize>,
}

impl OneofDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns member field indices, in declared order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

/// A message type: the ordered field table plus name/number lookup tables.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub(crate) name: Arc<str>,
    pub(crate) fields: Vec<Arc<FieldDescriptor>>,
    pub(crate) oneofs: Vec<OneofDescriptor>,
    pub(crate) by_name: FxHashMap<Arc<str>, usize>,
    pub(crate) by_number: FxHashMap<u32, usize>,
    pub(crate) oneof_by_name: FxHashMap<Arc<str>, usize>,
}

impl MessageDescriptor {
    /// Starts building a message descriptor with the given fully qualified name.
    pub fn builder(name: impl Into<Arc<str>>) -> MessageDescriptorBuilder {
        MessageDescriptorBuilder::new(name)
    }

    /// Returns the fully qualified message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns all fields in declared order.
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&Arc<FieldDescriptor>> {
        self.fields.get(index)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_by_number(&self, number: u32) -> Option<&Arc<FieldDescriptor>> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }

    pub fn oneof(&self, index: usize) -> Option<&OneofDescriptor> {
        self.oneofs.get(index)
    }

    /// Returns the index of the oneof group with the given name.
    pub fn oneof_index(&self, name: &str) -> Option<usize> {
        self.oneof_by_name.get(name).copied()
    }

    /// Returns true if `other` describes the same message type.
    pub fn is_same(&self, other: &MessageDescriptor) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_lookup() {
        let mood =
            EnumDescriptor::new("Mood", [("NEUTRAL", 0), ("HAPPY", 1), ("GLAD", 1)]).unwrap();
        assert_eq!(mood.default_value().name(), "NEUTRAL");
        assert_eq!(mood.value_by_name("GLAD").unwrap().number(), 1);
        // Aliases resolve to the first declared name
        assert_eq!(mood.value_by_number(1).unwrap().name(), "HAPPY");
        assert!(mood.value_by_number(7).is_none());
    }

    #[test]
    fn test_enum_rejects_duplicates_and_empty() {
        let err = EnumDescriptor::new("Mood", [("A", 0), ("A", 1)]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEnumValue { .. }));

        let err = EnumDescriptor::new("Mood", Vec::<(&str, i32)>::new()).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyEnum { .. }));
    }

    #[test]
    fn test_field_type_display() {
        assert_eq!(FieldType::Scalar(ScalarType::SInt64).to_string(), "sint64");
        let mood = EnumDescriptor::new("people.Mood", [("A", 0)]).unwrap();
        assert_eq!(FieldType::from(&mood).to_string(), "enum people.Mood");
    }
}
