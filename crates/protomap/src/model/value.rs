//! Exposed values.
//!
//! [`Value`] is what adapters hand out on read and accept on write. Besides
//! the adapter types themselves it covers generic containers (`Map`, `List`)
//! so that adapters can be compared with, and built from, plain data.
//!
//! Equality follows value semantics across container types:
//! - integers compare numerically regardless of width or signedness
//! - `F32` and `F64` compare as `f64`
//! - `List`, `Vector` and `Bytes` are sequences and compare element-wise
//! - `Message`, `Record` and `Map` are associative and compare by entry set
//!
//! Unlike `f64`, NaN equals NaN, so every value is equal to itself and can
//! serve as a hash key. Hashing is consistent with that equality.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::coll::map::{entries_of, lookup};
use crate::coll::{ByteBlob, ProtoMap, ProtoVector};
use crate::model::record::same_float;
use crate::model::Record;

const NIL_TAG: u8 = 0;
const BOOL_TAG: u8 = 1;
const INTEGER_TAG: u8 = 2;
const FLOAT_TAG: u8 = 3;
const STRING_TAG: u8 = 4;
const KEYWORD_TAG: u8 = 5;
const ENUM_NUMBER_TAG: u8 = 6;
const SEQUENCE_TAG: u8 = 7;
const ENTRIES_TAG: u8 = 8;

/// A value read from, or written to, an adapter.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value; the "missing" marker in entries.
    Nil,
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Arc<str>),
    /// Symbolic enum name.
    Enum(Arc<str>),
    /// Native enum number.
    EnumNumber(i32),
    Bytes(ByteBlob),
    Message(ProtoMap),
    /// Native record, accepted on write for message fields.
    Record(Record),
    /// Generic key/value container.
    Map(BTreeMap<String, Value>),
    /// Generic sequence.
    List(Vec<Value>),
    Vector(ProtoVector),
}

impl Value {
    /// Creates a symbolic enum value.
    pub fn keyword(name: impl Into<Arc<str>>) -> Value {
        Value::Enum(name.into())
    }

    /// Creates a generic map from key/value pairs.
    pub fn map<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates a generic sequence.
    pub fn list<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns a short name of this value's runtime type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Enum(_) => "keyword",
            Value::EnumNumber(_) => "enum number",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
            Value::Record(_) => "record",
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns any integer value that fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|v| i64::try_from(v).ok())
    }

    /// Returns any floating-point value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_float()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the symbolic name of an enum value.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteBlob> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&ProtoMap> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&ProtoVector> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I32(v) => Some(i128::from(*v)),
            Value::I64(v) => Some(i128::from(*v)),
            Value::U32(v) => Some(i128::from(*v)),
            Value::U64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn seq_len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            Value::Vector(v) => Some(v.len()),
            Value::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }

    fn seq_items(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        match self {
            Value::List(items) => Some(Box::new(items.iter().cloned())),
            Value::Vector(v) => Some(Box::new(v.iter())),
            Value::Bytes(b) => Some(Box::new(b.iter().map(|x| Value::I32(i32::from(x))))),
            _ => None,
        }
    }

    fn entry_count(&self) -> Option<usize> {
        match self {
            Value::Message(m) => Some(m.len()),
            Value::Record(r) => Some(r.descriptor().field_count()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    fn entries(&self) -> Option<Box<dyn Iterator<Item = (&str, Value)> + '_>> {
        match self {
            Value::Message(m) => Some(Box::new(m.entries())),
            Value::Record(r) => Some(Box::new(entries_of(r))),
            Value::Map(m) => Some(Box::new(m.iter().map(|(k, v)| (k.as_str(), v.clone())))),
            _ => None,
        }
    }

    fn entry(&self, key: &str) -> Option<Value> {
        match self {
            Value::Message(m) => lookup(m.record(), key),
            Value::Record(r) => lookup(r, key),
            Value::Map(m) => m.get(key).cloned(),
            _ => None,
        }
    }
}

fn sequences_equal(a: &Value, b: &Value) -> bool {
    match (a.seq_len(), b.seq_len()) {
        (Some(len_a), Some(len_b)) if len_a == len_b => {
            match (a.seq_items(), b.seq_items()) {
                (Some(items_a), Some(items_b)) => items_a.eq(items_b),
                _ => false,
            }
        }
        _ => false,
    }
}

fn entries_equal(a: &Value, b: &Value) -> bool {
    match (a.entry_count(), b.entry_count(), a.entries()) {
        (Some(len_a), Some(len_b), Some(mut entries)) if len_a == len_b => {
            entries.all(|(key, value)| b.entry(key).is_some_and(|other| other == value))
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::EnumNumber(a), Value::EnumNumber(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            _ => {
                if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
                    return a == b;
                }
                if let (Some(a), Some(b)) = (self.as_float(), other.as_float()) {
                    return same_float(a, b);
                }
                if self.seq_len().is_some() {
                    return sequences_equal(self, other);
                }
                entries_equal(self, other)
            }
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(v) = self.as_integer() {
            INTEGER_TAG.hash(state);
            v.hash(state);
            return;
        }
        if let Some(v) = self.as_float() {
            FLOAT_TAG.hash(state);
            // 0.0 == -0.0 and every NaN is the same value
            let bits = if v == 0.0 {
                0
            } else if v.is_nan() {
                f64::NAN.to_bits()
            } else {
                v.to_bits()
            };
            bits.hash(state);
            return;
        }
        match self {
            Value::Nil => NIL_TAG.hash(state),
            Value::Bool(b) => {
                BOOL_TAG.hash(state);
                b.hash(state);
            }
            Value::Str(s) => {
                STRING_TAG.hash(state);
                s.hash(state);
            }
            Value::Enum(s) => {
                KEYWORD_TAG.hash(state);
                s.hash(state);
            }
            Value::EnumNumber(n) => {
                ENUM_NUMBER_TAG.hash(state);
                n.hash(state);
            }
            _ => {
                if let (Some(len), Some(items)) = (self.seq_len(), self.seq_items()) {
                    hash_sequence(state, len, items);
                } else if let (Some(len), Some(entries)) = (self.entry_count(), self.entries()) {
                    hash_entries(state, len, entries);
                }
            }
        }
    }
}

/// Hashes a sequence so that equal sequences of any container type collide.
pub(crate) fn hash_sequence<H: Hasher>(
    state: &mut H,
    len: usize,
    items: impl Iterator<Item = Value>,
) {
    SEQUENCE_TAG.hash(state);
    len.hash(state);
    for item in items {
        item.hash(state);
    }
}

/// Hashes an entry set independently of entry order.
pub(crate) fn hash_entries<'a, H: Hasher>(
    state: &mut H,
    len: usize,
    entries: impl Iterator<Item = (&'a str, Value)>,
) {
    ENTRIES_TAG.hash(state);
    len.hash(state);
    let combined = entries.fold(0u64, |acc, (key, value)| {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        value.hash(&mut hasher);
        acc.wrapping_add(hasher.finish())
    });
    combined.hash(state);
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Arc<str> => Str,
    ByteBlob => Bytes,
    ProtoMap => Message,
    Record => Record,
    BTreeMap<String, Value> => Map,
    Vec<Value> => List,
    ProtoVector => Vector,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}
