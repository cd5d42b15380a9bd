//! Persistent map adapter over a record.
//!
//! A [`ProtoMap`] presents one [`Record`] as an immutable map whose key set
//! is exactly the message's declared fields. Reads go through the field
//! table and the coercion rules in [`coerce`](crate::coll::coerce); writes
//! derive a record builder, apply the coerced value and wrap the frozen result
//! in a new adapter. The original is never touched.
//!
//! # Example
//!
//! ```rust
//! use protomap::coll::ProtoMap;
//! use protomap::schema::{MessageDescriptor, ScalarType};
//! use protomap::{ErrorKind, Value};
//!
//! let person = MessageDescriptor::builder("people.Person")
//!     .field("name", 1, ScalarType::String)
//!     .field("age", 2, ScalarType::Int32)
//!     .build()
//!     .unwrap();
//!
//! let alice = ProtoMap::new(person)
//!     .assoc("name", "Alice").unwrap()
//!     .assoc("age", 30).unwrap();
//!
//! assert_eq!(alice.get("name"), Some(Value::from("Alice")));
//! assert_eq!(alice.len(), 2);
//! assert_eq!(alice.without("age").unwrap_err().kind(), ErrorKind::UnsupportedOperation);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{decode_record, encode_record};
use crate::coll::coerce::{read_field, write_field};
use crate::coll::{fold, Associative, Counted, Editable, Reducible, TransientProtoMap};
use crate::error::Error;
use crate::model::value::hash_entries;
use crate::model::{Builder, Native, Record, Value};
use crate::schema::{FieldDescriptor, MessageDescriptor};

// =============================================================================
// SHARED FIELD ACCESS
// =============================================================================

/// Read access shared by records (persistent maps) and builders (transients).
pub(crate) trait FieldSource {
    fn descriptor(&self) -> &Arc<MessageDescriptor>;
    fn stored(&self, index: usize) -> Option<&Native>;
    fn set_member(&self, group: usize) -> Option<usize>;
}

impl FieldSource for Record {
    fn descriptor(&self) -> &Arc<MessageDescriptor> {
        Record::descriptor(self)
    }

    fn stored(&self, index: usize) -> Option<&Native> {
        self.get(index)
    }

    fn set_member(&self, group: usize) -> Option<usize> {
        self.which_oneof(group)
    }
}

impl FieldSource for Builder {
    fn descriptor(&self) -> &Arc<MessageDescriptor> {
        Builder::descriptor(self)
    }

    fn stored(&self, index: usize) -> Option<&Native> {
        self.get(index)
    }

    fn set_member(&self, group: usize) -> Option<usize> {
        self.which_oneof(group)
    }
}

pub(crate) fn field_for<'a>(
    desc: &'a MessageDescriptor,
    key: &str,
) -> Result<&'a Arc<FieldDescriptor>, Error> {
    desc.field_by_name(key).ok_or_else(|| Error::UnknownField {
        message: Arc::clone(desc.name_arc()),
        key: key.to_string(),
    })
}

pub(crate) fn read<S: FieldSource>(source: &S, key: &str) -> Option<Value> {
    let field = source.descriptor().field_by_name(key)?;
    read_field(field, source.stored(field.index()))
}

pub(crate) fn has<S: FieldSource>(source: &S, key: &str) -> bool {
    match source.descriptor().field_by_name(key) {
        Some(field) if field.has_presence() => source.stored(field.index()).is_some(),
        Some(_) => true,
        None => false,
    }
}

pub(crate) fn which_one_of<'a, S: FieldSource>(
    source: &'a S,
    group: &str,
) -> Result<Option<&'a str>, Error> {
    let desc = source.descriptor();
    let index = desc.oneof_index(group).ok_or_else(|| Error::UnknownField {
        message: Arc::clone(desc.name_arc()),
        key: group.to_string(),
    })?;
    Ok(source
        .set_member(index)
        .and_then(|member| desc.field(member))
        .map(|field| field.name()))
}

/// Validates every entry against the schema before anything is written.
pub(crate) fn coerce_entries<I, K>(
    desc: &MessageDescriptor,
    entries: I,
) -> Result<Vec<(usize, Option<Native>)>, Error>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let field = field_for(desc, key.as_ref())?;
            Ok((field.index(), write_field(field, &value)?))
        })
        .collect()
}

pub(crate) fn apply(builder: &mut Builder, index: usize, value: Option<Native>) {
    match value {
        Some(native) => builder.set(index, native),
        None => builder.clear(index),
    };
}

/// Splits a `conj` argument into entries: a map, or a `[key, value]` pair.
pub(crate) fn conj_entries(value: Value) -> Result<Vec<(String, Value)>, Error> {
    match value {
        Value::Map(entries) => Ok(entries.into_iter().collect()),
        Value::List(pair) if pair.len() == 2 => {
            let mut pair = pair.into_iter();
            match (pair.next(), pair.next()) {
                (Some(Value::Str(key) | Value::Enum(key)), Some(value)) => {
                    Ok(vec![(key.to_string(), value)])
                }
                _ => Err(Error::UnsupportedOperation("conj expects a map or a [key, value] pair")),
            }
        }
        _ => Err(Error::UnsupportedOperation("conj expects a map or a [key, value] pair")),
    }
}

/// Looks up `key` as an entry: `Nil` for declared but absent fields, `None`
/// for undeclared keys.
pub(crate) fn lookup(record: &Record, key: &str) -> Option<Value> {
    let field = record.descriptor().field_by_name(key)?;
    Some(read_field(field, record.get(field.index())).unwrap_or(Value::Nil))
}

pub(crate) fn entries_of(record: &Record) -> Entries<'_> {
    Entries { record, index: 0 }
}

// =============================================================================
// PERSISTENT MAP
// =============================================================================

/// An immutable map over the declared fields of one record.
#[derive(Clone)]
pub struct ProtoMap {
    record: Record,
}

impl ProtoMap {
    /// Creates a map over a record with every field unset.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self::from_record(Record::new(descriptor))
    }

    pub fn from_record(record: Record) -> Self {
        Self { record }
    }

    /// Decodes a map from wire bytes.
    pub fn from_bytes(
        descriptor: &Arc<MessageDescriptor>,
        bytes: impl Into<Bytes>,
    ) -> Result<Self, Error> {
        Ok(Self::from_record(decode_record(descriptor, bytes)?))
    }

    /// Encodes the record to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_record(&self.record)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        self.record.descriptor()
    }

    /// Number of declared fields; constant for a message type.
    pub fn len(&self) -> usize {
        self.descriptor().field_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is a declared field.
    pub fn contains_key(&self, key: &str) -> bool {
        self.descriptor().field_by_name(key).is_some()
    }

    /// Returns true if `key` is declared and, for fields that track presence,
    /// explicitly set.
    pub fn has(&self, key: &str) -> bool {
        has(&self.record, key)
    }

    /// Returns the exposed value of `key`.
    ///
    /// `None` for undeclared keys and for absent values (see
    /// [`read_field`](crate::coll::coerce::read_field)).
    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.record, key)
    }

    /// Returns the exposed value of `key`, or `default` if there is none.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Returns a new map with `key` set to `value`.
    pub fn assoc(&self, key: &str, value: impl Into<Value>) -> Result<Self, Error> {
        let field = field_for(self.descriptor(), key)?;
        let native = write_field(field, &value.into())?;
        let mut builder = self.record.to_builder();
        apply(&mut builder, field.index(), native);
        Ok(Self::from_record(builder.build()))
    }

    /// As [`assoc`](Self::assoc), but fails with `DuplicateKey` if `has(key)`.
    pub fn assoc_if_absent(&self, key: &str, value: impl Into<Value>) -> Result<Self, Error> {
        let field = field_for(self.descriptor(), key)?;
        if self.has(key) {
            return Err(Error::DuplicateKey {
                field: Arc::clone(field.name_arc()),
            });
        }
        self.assoc(key, value)
    }

    /// Always fails: the key set is fixed by the schema.
    pub fn without(&self, _key: &str) -> Result<Self, Error> {
        Err(Error::UnsupportedOperation("cannot remove a field from a message"))
    }

    /// Returns a new map with `key` reset to its default.
    pub fn clear(&self, key: &str) -> Result<Self, Error> {
        let field = field_for(self.descriptor(), key)?;
        let mut builder = self.record.to_builder();
        builder.clear(field.index());
        Ok(Self::from_record(builder.build()))
    }

    /// Returns a new map with every entry applied in order.
    ///
    /// All entries are validated first; one bad entry leaves nothing written.
    pub fn merge<I, K>(&self, entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let coerced = coerce_entries(self.descriptor(), entries)?;
        let mut builder = self.record.to_builder();
        for (index, native) in coerced {
            apply(&mut builder, index, native);
        }
        Ok(Self::from_record(builder.build()))
    }

    /// Adds a map of entries or a single `[key, value]` pair.
    pub fn conj(&self, value: Value) -> Result<Self, Error> {
        self.merge(conj_entries(value)?)
    }

    /// Returns the name of the member currently set in oneof `group`.
    pub fn which_one_of(&self, group: &str) -> Result<Option<&str>, Error> {
        which_one_of(&self.record, group)
    }

    /// Iterates `(key, value)` pairs in declared order; absent values are `Nil`.
    pub fn entries(&self) -> Entries<'_> {
        entries_of(&self.record)
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.descriptor().fields().iter().map(|field| field.name())
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = Value> + '_ {
        self.entries().map(|(_, value)| value)
    }

    /// Returns a map of the same type with every field unset.
    pub fn empty(&self) -> Self {
        Self::new(Arc::clone(self.descriptor()))
    }

    /// Folds `(key, value)` entries with early termination.
    pub fn reduce_kv<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, &str, Value) -> ControlFlow<A, A>,
    {
        fold(self.entries(), init, |acc, (key, value)| f(acc, key, value))
    }

    /// Starts a transient editing session seeded with this map's record.
    pub fn as_transient(&self) -> TransientProtoMap {
        TransientProtoMap::new(self.record.to_builder())
    }
}

/// Iterator over the entries of a [`ProtoMap`].
pub struct Entries<'a> {
    record: &'a Record,
    index: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let field = self.record.descriptor().field(self.index)?;
        self.index += 1;
        let value = read_field(field, self.record.get(field.index())).unwrap_or(Value::Nil);
        Some((field.name(), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.record.descriptor().field_count().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl PartialEq for ProtoMap {
    fn eq(&self, other: &ProtoMap) -> bool {
        if self.record.ptr_eq(&other.record) {
            return true;
        }
        self.len() == other.len()
            && self
                .entries()
                .all(|(key, value)| lookup(&other.record, key).is_some_and(|v| v == value))
    }
}

impl Eq for ProtoMap {}

impl PartialEq<BTreeMap<String, Value>> for ProtoMap {
    fn eq(&self, other: &BTreeMap<String, Value>) -> bool {
        self.len() == other.len()
            && self
                .entries()
                .all(|(key, value)| other.get(key).is_some_and(|v| *v == value))
    }
}

impl Hash for ProtoMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_entries(state, self.len(), self.entries());
    }
}

impl fmt::Debug for ProtoMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl Counted for ProtoMap {
    fn count(&self) -> usize {
        self.len()
    }
}

impl Associative for ProtoMap {
    fn contains_key(&self, key: &str) -> bool {
        ProtoMap::contains_key(self, key)
    }

    fn get(&self, key: &str) -> Option<Value> {
        ProtoMap::get(self, key)
    }

    fn assoc(&self, key: &str, value: Value) -> Result<Self, Error> {
        ProtoMap::assoc(self, key, value)
    }
}

impl Reducible for ProtoMap {
    type Item = (Arc<str>, Value);

    fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, (Arc<str>, Value)) -> ControlFlow<A, A>,
    {
        let fields = self.descriptor().fields().iter();
        let entries = fields
            .zip(self.entries())
            .map(|(field, (_, value))| (Arc::clone(field.name_arc()), value));
        fold(entries, init, f)
    }
}

impl Editable for ProtoMap {
    type Transient = TransientProtoMap;

    fn as_transient(&self) -> TransientProtoMap {
        ProtoMap::as_transient(self)
    }
}
