//! Transient editing sessions.
//!
//! A transient is the mutable counterpart of a persistent adapter: it edits
//! a builder (maps) or an owned tail (vectors) in place, then freezes back
//! into an immutable adapter with [`persistent`].
//!
//! Every call checks the session flag first. After `persistent()` (or after
//! the flag is cleared with `set_in_transaction(false)`), every call fails
//! with `StaleTransient`.
//!
//! [`persistent`]: crate::coll::TransientCollection::persistent

use std::sync::Arc;

use tracing::trace;

use crate::coll::coerce::{read_element, write_element, write_field};
use crate::coll::map::{self, apply, coerce_entries, conj_entries, field_for};
use crate::coll::{Counted, ProtoMap, ProtoVector, TransientCollection, TrieVector};
use crate::error::Error;
use crate::model::{Builder, Native, Value};
use crate::schema::{FieldDescriptor, MessageDescriptor};

// =============================================================================
// TRANSIENT MAP
// =============================================================================

/// A mutable, single-writer map over a record under construction.
#[derive(Debug)]
pub struct TransientProtoMap {
    descriptor: Arc<MessageDescriptor>,
    builder: Option<Builder>,
    in_transaction: bool,
}

impl TransientProtoMap {
    pub(crate) fn new(builder: Builder) -> Self {
        Self {
            descriptor: Arc::clone(builder.descriptor()),
            builder: Some(builder),
            in_transaction: true,
        }
    }

    /// Starts a session over an empty record of the given type.
    pub fn empty(descriptor: Arc<MessageDescriptor>) -> Self {
        ProtoMap::new(descriptor).as_transient()
    }

    fn builder(&self) -> Result<&Builder, Error> {
        if !self.in_transaction {
            return Err(Error::StaleTransient);
        }
        self.builder.as_ref().ok_or(Error::StaleTransient)
    }

    fn builder_mut(&mut self) -> Result<&mut Builder, Error> {
        if !self.in_transaction {
            return Err(Error::StaleTransient);
        }
        self.builder.as_mut().ok_or(Error::StaleTransient)
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.descriptor.field_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        Ok(map::read(self.builder()?, key))
    }

    pub fn has(&self, key: &str) -> Result<bool, Error> {
        Ok(map::has(self.builder()?, key))
    }

    pub fn which_one_of(&self, group: &str) -> Result<Option<&str>, Error> {
        map::which_one_of(self.builder()?, group)
    }

    /// Sets `key` to `value` in place.
    pub fn assoc(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self, Error> {
        let builder = self.builder_mut()?;
        let field = field_for(builder.descriptor(), key)?;
        let native = write_field(field, &value.into())?;
        let index = field.index();
        apply(builder, index, native);
        Ok(self)
    }

    /// As [`assoc`](Self::assoc), but fails with `DuplicateKey` if `has(key)`.
    pub fn assoc_if_absent(
        &mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let field = Arc::clone(field_for(&self.descriptor, key)?);
        if self.has(key)? {
            return Err(Error::DuplicateKey {
                field: Arc::clone(field.name_arc()),
            });
        }
        self.assoc(key, value)
    }

    /// Resets `key` to its default in place.
    pub fn clear(&mut self, key: &str) -> Result<&mut Self, Error> {
        let builder = self.builder_mut()?;
        let index = field_for(builder.descriptor(), key)?.index();
        builder.clear(index);
        Ok(self)
    }

    /// Applies every entry in order, after validating all of them.
    pub fn merge<I, K>(&mut self, entries: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let builder = self.builder_mut()?;
        let coerced = coerce_entries(builder.descriptor(), entries)?;
        for (index, native) in coerced {
            apply(builder, index, native);
        }
        Ok(self)
    }

    /// Always fails: the key set is fixed by the schema.
    pub fn without(&mut self, _key: &str) -> Result<&mut Self, Error> {
        self.builder()?;
        Err(Error::UnsupportedOperation("cannot remove a field from a message"))
    }

    /// Marks the session live or ended.
    pub fn set_in_transaction(&mut self, live: bool) {
        self.in_transaction = live;
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }
}

impl Counted for TransientProtoMap {
    fn count(&self) -> usize {
        self.len()
    }
}

impl TransientCollection for TransientProtoMap {
    type Persistent = ProtoMap;

    fn conj(&mut self, value: Value) -> Result<&mut Self, Error> {
        self.builder()?;
        let entries = conj_entries(value)?;
        self.merge(entries)
    }

    fn persistent(&mut self) -> Result<ProtoMap, Error> {
        self.builder()?;
        let builder = self.builder.take().ok_or(Error::StaleTransient)?;
        self.in_transaction = false;
        trace!(message_type = self.descriptor.name(), "froze transient map");
        Ok(ProtoMap::from_record(builder.build()))
    }

    fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }
}

// =============================================================================
// TRANSIENT VECTOR
// =============================================================================

/// A mutable, single-writer vector: an owned tail over a shared base.
///
/// Edits are limited to the tail range; the base stays shared with the
/// vector the session was started from.
#[derive(Debug)]
pub struct TransientVector {
    field: Arc<FieldDescriptor>,
    base: Arc<Vec<Native>>,
    tail: TrieVector<Native>,
    in_transaction: bool,
}

impl TransientVector {
    pub(crate) fn new(vector: &ProtoVector) -> Self {
        Self {
            field: Arc::clone(vector.field()),
            base: Arc::clone(vector.base()),
            tail: vector.tail().clone(),
            in_transaction: true,
        }
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(Error::StaleTransient)
        }
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nth(&self, index: usize) -> Result<Value, Error> {
        self.ensure_active()?;
        let item = match self.base.get(index) {
            Some(item) => Some(item),
            None => self.tail.get(index - self.base.len()),
        };
        item.map(|item| read_element(self.field.field_type(), item))
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.len(),
            })
    }

    /// Appends `value` in place.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<&mut Self, Error> {
        self.ensure_active()?;
        let item = write_element(&self.field, &value.into())?;
        self.tail.push_back_mut(item);
        Ok(self)
    }

    /// Replaces the element at `index` in place; `index == len()` appends.
    ///
    /// Indices inside the shared base fail with `UnsupportedOperation`.
    pub fn assoc_n(&mut self, index: usize, value: impl Into<Value>) -> Result<&mut Self, Error> {
        self.ensure_active()?;
        let count = self.len();
        if index > count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        if index < self.base.len() {
            return Err(Error::UnsupportedOperation("transient edit inside the base segment"));
        }
        let item = write_element(&self.field, &value.into())?;
        if index == count {
            self.tail.push_back_mut(item);
        } else {
            self.tail.set_mut(index - self.base.len(), item);
        }
        Ok(self)
    }

    /// Removes the last element in place.
    pub fn pop(&mut self) -> Result<&mut Self, Error> {
        self.ensure_active()?;
        if self.tail.pop_mut().is_some() {
            return Ok(self);
        }
        if self.base.is_empty() {
            Err(Error::IndexOutOfRange { index: 0, count: 0 })
        } else {
            Err(Error::UnsupportedOperation("transient pop inside the base segment"))
        }
    }

    pub fn set_in_transaction(&mut self, live: bool) {
        self.in_transaction = live;
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }
}

impl Counted for TransientVector {
    fn count(&self) -> usize {
        self.len()
    }
}

impl TransientCollection for TransientVector {
    type Persistent = ProtoVector;

    fn conj(&mut self, value: Value) -> Result<&mut Self, Error> {
        self.push(value)
    }

    fn persistent(&mut self) -> Result<ProtoVector, Error> {
        self.ensure_active()?;
        self.in_transaction = false;
        trace!(field = self.field.name(), len = self.len(), "froze transient vector");
        let tail = std::mem::take(&mut self.tail);
        Ok(ProtoVector::from_parts(
            Arc::clone(&self.field),
            Arc::clone(&self.base),
            tail,
        ))
    }

    fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coll::Editable;
    use crate::error::ErrorKind;
    use crate::fixtures::{PERSON, SIMPLE};

    #[test]
    fn test_map_round_trip_matches_persistent_edits() {
        let start = ProtoMap::new(PERSON.clone());

        let mut t = start.as_transient();
        t.assoc("id", 7)
            .unwrap()
            .assoc("name", "Alice")
            .unwrap()
            .assoc("phone", "555")
            .unwrap()
            .assoc("handle", "@alice")
            .unwrap()
            .clear("name")
            .unwrap();
        let frozen = t.persistent().unwrap();

        let expected = start
            .assoc("id", 7)
            .unwrap()
            .assoc("name", "Alice")
            .unwrap()
            .assoc("phone", "555")
            .unwrap()
            .assoc("handle", "@alice")
            .unwrap()
            .clear("name")
            .unwrap();
        assert_eq!(frozen, expected);
        assert_eq!(start.get("id"), Some(Value::I32(0)));
    }

    #[test]
    fn test_map_stale_after_freeze() {
        let mut t = TransientProtoMap::empty(SIMPLE.clone());
        assert!(t.is_in_transaction());
        t.assoc("name", "Bob").unwrap();
        assert_eq!(t.get("name").unwrap(), Some(Value::from("Bob")));
        let _ = t.persistent().unwrap();

        assert!(!t.is_in_transaction());
        assert_eq!(t.assoc("age", 1).unwrap_err(), Error::StaleTransient);
        assert_eq!(t.get("name").unwrap_err(), Error::StaleTransient);
        assert_eq!(t.persistent().unwrap_err().kind(), ErrorKind::StaleTransient);
        assert_eq!(t.count(), 2);
    }

    #[test]
    fn test_map_session_flag() {
        let mut t = TransientProtoMap::empty(SIMPLE.clone());
        t.set_in_transaction(false);
        assert_eq!(t.assoc("name", "x").unwrap_err(), Error::StaleTransient);
        t.set_in_transaction(true);
        t.assoc("name", "x").unwrap();
        assert_eq!(t.without("name").unwrap_err().kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_map_errors_leave_builder_untouched() {
        let mut t = TransientProtoMap::empty(SIMPLE.clone());
        t.assoc("name", "Ann").unwrap();
        assert!(t.merge([("name", Value::from("Bo")), ("age", Value::from(1.5))]).is_err());
        assert_eq!(t.get("name").unwrap(), Some(Value::from("Ann")));
        assert_eq!(t.assoc("nope", 1).unwrap_err().kind(), ErrorKind::UnknownField);

        t.conj(Value::map([("age", Value::from(3))])).unwrap();
        assert_eq!(t.get("age").unwrap(), Some(Value::I32(3)));
        assert_eq!(t.assoc_if_absent("age", 4).unwrap_err().kind(), ErrorKind::DuplicateKey);
    }

    #[test]
    fn test_map_which_one_of() {
        let mut t = TransientProtoMap::empty(PERSON.clone());
        t.assoc("handle", "@a").unwrap();
        assert_eq!(t.which_one_of("contact").unwrap(), Some("handle"));
        assert!(t.has("handle").unwrap());
        assert!(!t.has("phone").unwrap());
    }

    fn scores(values: &[i64]) -> ProtoVector {
        let field = PERSON.field_by_name("scores").unwrap();
        ProtoVector::from_values(Arc::clone(field), values.iter().copied()).unwrap()
    }

    #[test]
    fn test_vector_round_trip() {
        let v = scores(&[1, 2, 3]).cons(4i64).unwrap();
        let mut t = v.as_transient();
        t.conj(Value::I64(5)).unwrap().push(6i64).unwrap();
        t.assoc_n(3, 40i64).unwrap().pop().unwrap();
        let frozen = t.persistent().unwrap();

        let expected = v
            .cons(5i64)
            .unwrap()
            .cons(6i64)
            .unwrap()
            .assoc_n(3, 40i64)
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(frozen, expected);
        assert_eq!(v.len(), 4);
        assert_eq!(v.nth(3).unwrap(), Value::I64(4));
        assert!(Arc::ptr_eq(frozen.base(), v.base()));
    }

    #[test]
    fn test_vector_base_is_read_only() {
        let mut t = scores(&[1, 2]).as_transient();
        assert_eq!(t.nth(1).unwrap(), Value::I64(2));
        assert_eq!(t.assoc_n(0, 9i64).unwrap_err().kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(t.pop().unwrap_err().kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(t.assoc_n(5, 9i64).unwrap_err().kind(), ErrorKind::IndexOutOfRange);
        t.assoc_n(2, 3i64).unwrap();
        assert_eq!(t.count(), 3);

        let _ = t.persistent().unwrap();
        assert_eq!(t.push(1i64).unwrap_err(), Error::StaleTransient);
        assert_eq!(t.nth(0).unwrap_err(), Error::StaleTransient);
    }

    #[test]
    fn test_empty_vector_pop() {
        let field = PERSON.field_by_name("tags").unwrap();
        let mut t = ProtoVector::new(Arc::clone(field)).unwrap().as_transient();
        assert_eq!(t.pop().unwrap_err().kind(), ErrorKind::IndexOutOfRange);
    }
}
