//! Persistent vector adapter over a repeated field.
//!
//! A [`ProtoVector`] is split in two:
//! - a **base** segment: the elements as decoded or last written, a plain
//!   shared list that is replaced wholesale when an edit falls inside it
//! - a **tail**: a [`TrieVector`] holding everything appended since
//!
//! `count = base.len() + tail.len()`. Appends and edits past the base touch
//! only the tail and share the rest; edits inside the base cost one copy of
//! the base.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::coll::coerce::{read_element, write_element};
use crate::coll::{fold, Counted, Editable, Indexed, Reducible, TransientVector, TrieVector};
use crate::error::Error;
use crate::model::value::hash_sequence;
use crate::model::{Native, Value};
use crate::schema::FieldDescriptor;

/// An immutable vector over the elements of a repeated field.
#[derive(Clone)]
pub struct ProtoVector {
    field: Arc<FieldDescriptor>,
    base: Arc<Vec<Native>>,
    tail: TrieVector<Native>,
}

impl ProtoVector {
    /// Wraps already-validated elements as the base segment.
    pub(crate) fn from_base(field: Arc<FieldDescriptor>, base: Arc<Vec<Native>>) -> Self {
        Self {
            field,
            base,
            tail: TrieVector::new(),
        }
    }

    pub(crate) fn from_parts(
        field: Arc<FieldDescriptor>,
        base: Arc<Vec<Native>>,
        tail: TrieVector<Native>,
    ) -> Self {
        Self { field, base, tail }
    }

    /// Creates an empty vector for the repeated field `field`.
    pub fn new(field: Arc<FieldDescriptor>) -> Result<Self, Error> {
        if !field.is_repeated() {
            return Err(Error::UnsupportedOperation("vector over a singular field"));
        }
        Ok(Self::from_base(field, Arc::new(Vec::new())))
    }

    /// Creates a vector from values, coercing each to the field's element type.
    pub fn from_values<I>(field: Arc<FieldDescriptor>, values: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let empty = Self::new(field)?;
        let base = values
            .into_iter()
            .map(|value| write_element(&empty.field, &value.into()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_base(empty.field, Arc::new(base)))
    }

    /// Returns the repeated field this vector holds elements of.
    pub fn field(&self) -> &Arc<FieldDescriptor> {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }

    pub(crate) fn base(&self) -> &Arc<Vec<Native>> {
        &self.base
    }

    pub(crate) fn tail(&self) -> &TrieVector<Native> {
        &self.tail
    }

    fn native(&self, index: usize) -> Option<&Native> {
        match self.base.get(index) {
            Some(item) => Some(item),
            None => self.tail.get(index - self.base.len()),
        }
    }

    /// Returns the element at `index`, or `IndexOutOfRange`.
    pub fn nth(&self, index: usize) -> Result<Value, Error> {
        self.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.len(),
        })
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.native(index)
            .map(|item| read_element(self.field.field_type(), item))
    }

    /// Returns a new vector with the element at `index` replaced.
    ///
    /// `index == len()` appends.
    pub fn assoc_n(&self, index: usize, value: impl Into<Value>) -> Result<Self, Error> {
        let item = write_element(&self.field, &value.into())?;
        let count = self.len();
        if index == count {
            return Ok(self.push(item));
        }
        if index > count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        if index < self.base.len() {
            let mut base = Vec::clone(&self.base);
            base[index] = item;
            return Ok(Self::from_parts(Arc::clone(&self.field), Arc::new(base), self.tail.clone()));
        }
        let tail = self
            .tail
            .set(index - self.base.len(), item)
            .ok_or(Error::IndexOutOfRange { index, count })?;
        Ok(Self::from_parts(Arc::clone(&self.field), Arc::clone(&self.base), tail))
    }

    /// Returns a new vector with `value` appended.
    pub fn cons(&self, value: impl Into<Value>) -> Result<Self, Error> {
        let item = write_element(&self.field, &value.into())?;
        Ok(self.push(item))
    }

    fn push(&self, item: Native) -> Self {
        Self::from_parts(Arc::clone(&self.field), Arc::clone(&self.base), self.tail.push_back(item))
    }

    /// Returns a new vector without its last element.
    pub fn pop(&self) -> Result<Self, Error> {
        if let Some((tail, _)) = self.tail.pop_back() {
            return Ok(Self::from_parts(Arc::clone(&self.field), Arc::clone(&self.base), tail));
        }
        match self.base.split_last() {
            Some((_, rest)) => {
                Ok(Self::from_base(Arc::clone(&self.field), Arc::new(rest.to_vec())))
            }
            None => Err(Error::IndexOutOfRange { index: 0, count: 0 }),
        }
    }

    /// Returns an empty vector for the same field.
    pub fn empty(&self) -> Self {
        Self::from_base(Arc::clone(&self.field), Arc::new(Vec::new()))
    }

    /// Iterates base then tail, converting each element on the fly.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Value> + '_ {
        let ty = self.field.field_type();
        Iter {
            base: self.base.iter(),
            tail: self.tail.iter(),
        }
        .map(move |item| read_element(ty, item))
    }

    /// Folds `(index, element)` pairs with early termination.
    pub fn reduce_kv<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, usize, Value) -> ControlFlow<A, A>,
    {
        fold(self.iter().enumerate(), init, |acc, (i, item)| f(acc, i, item))
    }

    /// Returns the elements as one stored list, reusing the base when the
    /// tail is empty.
    pub(crate) fn to_native_list(&self) -> Native {
        if self.tail.is_empty() {
            return Native::List(Arc::clone(&self.base));
        }
        let mut items = Vec::with_capacity(self.len());
        items.extend(self.base.iter().cloned());
        items.extend(self.tail.iter().cloned());
        Native::List(Arc::new(items))
    }
}

struct Iter<'a> {
    base: std::slice::Iter<'a, Native>,
    tail: crate::coll::pvec::Iter<'a, Native>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Native;

    fn next(&mut self) -> Option<&'a Native> {
        self.base.next().or_else(|| self.tail.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.base.len() + self.tail.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl PartialEq for ProtoVector {
    fn eq(&self, other: &ProtoVector) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for ProtoVector {}

impl PartialEq<Vec<Value>> for ProtoVector {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == *b)
    }
}

impl Hash for ProtoVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_sequence(state, self.len(), self.iter());
    }
}

impl fmt::Debug for ProtoVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Counted for ProtoVector {
    fn count(&self) -> usize {
        self.len()
    }
}

impl Indexed for ProtoVector {
    type Item = Value;

    fn nth(&self, index: usize) -> Result<Value, Error> {
        ProtoVector::nth(self, index)
    }
}

impl Reducible for ProtoVector {
    type Item = Value;

    fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, Value) -> ControlFlow<A, A>,
    {
        fold(self.iter(), init, f)
    }
}

impl Editable for ProtoVector {
    type Transient = TransientVector;

    fn as_transient(&self) -> TransientVector {
        TransientVector::new(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::PERSON;
    use proptest::prelude::*;

    fn scores(values: &[i64]) -> ProtoVector {
        let field = PERSON.field_by_name("scores").unwrap();
        ProtoVector::from_values(Arc::clone(field), values.iter().copied()).unwrap()
    }

    fn hash_of<T: Hash>(v: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_cons_scenario() {
        let v = scores(&[1, 2, 3]);
        let v2 = v.cons(4i64).unwrap();

        assert_eq!(v2.count(), 4);
        assert_eq!(v2.nth(3).unwrap(), Value::I64(4));
        assert_eq!(v.count(), 3);
        assert_eq!(v2.base_len(), 3);
        assert_eq!(v2.tail_len(), 1);
        for i in 0..3 {
            assert_eq!(v.nth(i).unwrap(), v2.nth(i).unwrap());
        }
        assert!(Arc::ptr_eq(v.base(), v2.base()));
    }

    #[test]
    fn test_assoc_n_base_and_tail() {
        let v = scores(&[1, 2, 3]).cons(4i64).unwrap().cons(5i64).unwrap();

        let in_base = v.assoc_n(1, 20i64).unwrap();
        let expected: Vec<Value> = [1i64, 20, 3, 4, 5].into_iter().map(Value::I64).collect();
        assert_eq!(in_base, expected);
        assert!(!Arc::ptr_eq(v.base(), in_base.base()));

        let in_tail = v.assoc_n(4, 50i64).unwrap();
        assert_eq!(in_tail.nth(4).unwrap(), Value::I64(50));
        assert!(Arc::ptr_eq(v.base(), in_tail.base()));
        assert_eq!(v.nth(4).unwrap(), Value::I64(5));

        let appended = v.assoc_n(5, 6i64).unwrap();
        assert_eq!(appended.len(), 6);

        let err = v.assoc_n(7, 0i64).unwrap_err();
        assert_eq!(err, Error::IndexOutOfRange { index: 7, count: 5 });
        let err = v.assoc_n(0, "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_pop_tail_then_base() {
        let v = scores(&[1, 2]).cons(3i64).unwrap();
        let popped = v.pop().unwrap();
        assert_eq!(popped, vec![Value::I64(1), Value::I64(2)]);
        assert_eq!(popped.tail_len(), 0);

        let popped = popped.pop().unwrap();
        assert_eq!(popped, vec![Value::I64(1)]);
        let empty = popped.pop().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.pop().unwrap_err().kind(), ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn test_equality_ignores_split() {
        let split = scores(&[1]).cons(2i64).unwrap();
        let flat = scores(&[1, 2]);
        assert_eq!(split, flat);
        assert_eq!(hash_of(&split), hash_of(&flat));
        assert_eq!(hash_of(&Value::Vector(split)), hash_of(&Value::list([1, 2])));
        assert_eq!(flat.empty().len(), 0);
    }

    #[test]
    fn test_reduce_and_reduce_kv() {
        let v = scores(&[1, 2, 3]).cons(4i64).unwrap();
        let sum = v.reduce(0i64, |acc, item| {
            ControlFlow::Continue(acc + item.as_i64().unwrap_or(0))
        });
        assert_eq!(sum, 10);

        let first_even = v.reduce_kv(None, |acc, i, item| {
            if item.as_i64().is_some_and(|n| n % 2 == 0) {
                ControlFlow::Break(Some(i))
            } else {
                ControlFlow::Continue(acc)
            }
        });
        assert_eq!(first_even, Some(1));
    }

    #[test]
    fn test_singular_field_rejected() {
        let field = PERSON.field_by_name("name").unwrap();
        assert_eq!(
            ProtoVector::new(Arc::clone(field)).unwrap_err().kind(),
            ErrorKind::UnsupportedOperation
        );
    }

    proptest! {
        #[test]
        fn assoc_n_with_own_element_is_identity(
            base in prop::collection::vec(any::<i64>(), 0..40),
            appended in prop::collection::vec(any::<i64>(), 0..40),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut v = scores(&base);
            for x in &appended {
                v = v.cons(*x).unwrap();
            }
            prop_assume!(!v.is_empty());
            let i = pick.index(v.len());
            let same = v.assoc_n(i, v.nth(i).unwrap()).unwrap();
            prop_assert_eq!(&same, &v);

            let expected: Vec<Value> =
                base.iter().chain(&appended).map(|x| Value::I64(*x)).collect();
            prop_assert!(v == expected);
        }
    }
}
