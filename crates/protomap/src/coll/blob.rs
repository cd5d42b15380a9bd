//! Byte-blob adapter.
//!
//! [`ByteBlob`] exposes a bytes field as an indexed, reducible sequence of
//! bytes. It never copies on read: the underlying [`Bytes`] handle is shared
//! by every view, and a view only moves its start offset.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;

use bytes::{Bytes, BytesMut};

use crate::coll::{fold, Counted, Indexed, Reducible};
use crate::error::Error;
use crate::model::value::hash_sequence;
use crate::model::Value;

/// An immutable byte sequence, possibly a view into a larger blob.
#[derive(Clone, Default)]
pub struct ByteBlob {
    bytes: Bytes,
    offset: usize,
}

impl ByteBlob {
    /// Wraps a blob without copying.
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Returns an empty blob.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of bytes visible from the current offset.
    pub fn len(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start of this view within the underlying blob.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.offset..]
    }

    /// Returns a zero-copy handle to the visible bytes.
    pub fn as_bytes(&self) -> Bytes {
        self.bytes.slice(self.offset..)
    }

    /// Returns the byte at `index`, or `IndexOutOfRange`.
    pub fn nth(&self, index: usize) -> Result<u8, Error> {
        self.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.len(),
        })
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_slice().get(index).copied()
    }

    /// Returns a new blob holding these bytes followed by `byte`.
    ///
    /// Copies the visible bytes once; the result no longer shares storage.
    pub fn cons(&self, byte: u8) -> ByteBlob {
        let mut buf = BytesMut::with_capacity(self.len() + 1);
        buf.extend_from_slice(self.as_slice());
        buf.extend_from_slice(&[byte]);
        ByteBlob::new(buf.freeze())
    }

    /// Returns a view starting at `start`, relative to this view.
    ///
    /// Views share the underlying blob; `start == len()` yields an empty view.
    pub fn view(&self, start: usize) -> Result<ByteBlob, Error> {
        if start > self.len() {
            return Err(Error::IndexOutOfRange {
                index: start,
                count: self.len(),
            });
        }
        Ok(ByteBlob {
            bytes: self.bytes.clone(),
            offset: self.offset + start,
        })
    }

    /// Position of the first occurrence of `byte`, relative to this view.
    pub fn index_of(&self, byte: u8) -> Option<usize> {
        self.as_slice().iter().position(|&b| b == byte)
    }

    /// Position of the last occurrence of `byte`, relative to this view.
    pub fn last_index_of(&self, byte: u8) -> Option<usize> {
        self.as_slice().iter().rposition(|&b| b == byte)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = u8> + '_ {
        self.as_slice().iter().copied()
    }

    /// Returns true if both blobs are views of the same allocation.
    pub fn shares_storage_with(&self, other: &ByteBlob) -> bool {
        !self.bytes.is_empty()
            && self.bytes.as_ptr() == other.bytes.as_ptr()
            && self.bytes.len() == other.bytes.len()
    }
}

impl From<Bytes> for ByteBlob {
    fn from(bytes: Bytes) -> Self {
        ByteBlob::new(bytes)
    }
}

impl From<Vec<u8>> for ByteBlob {
    fn from(bytes: Vec<u8>) -> Self {
        ByteBlob::new(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ByteBlob {
    fn from(bytes: &[u8]) -> Self {
        ByteBlob::new(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<[u8; N]> for ByteBlob {
    fn from(bytes: [u8; N]) -> Self {
        ByteBlob::from(bytes.to_vec())
    }
}

impl PartialEq for ByteBlob {
    fn eq(&self, other: &ByteBlob) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBlob {}

impl PartialEq<[u8]> for ByteBlob {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl PartialEq<&[u8]> for ByteBlob {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_slice() == *other
    }
}

impl PartialEq<Vec<u8>> for ByteBlob {
    fn eq(&self, other: &Vec<u8>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> PartialEq<[u8; N]> for ByteBlob {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl PartialEq<Vec<Value>> for ByteBlob {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(byte, value)| Value::I32(i32::from(byte)) == *value)
    }
}

impl Hash for ByteBlob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_sequence(state, self.len(), self.iter().map(|b| Value::I32(i32::from(b))));
    }
}

impl fmt::Debug for ByteBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#bytes[")?;
        for (i, byte) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("]")
    }
}

impl Counted for ByteBlob {
    fn count(&self) -> usize {
        self.len()
    }
}

impl Indexed for ByteBlob {
    type Item = u8;

    fn nth(&self, index: usize) -> Result<u8, Error> {
        ByteBlob::nth(self, index)
    }
}

impl Reducible for ByteBlob {
    type Item = u8;

    fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, u8) -> ControlFlow<A, A>,
    {
        fold(self.iter(), init, f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of<T: Hash>(v: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_blob_view_scenario() {
        let blob = ByteBlob::from(vec![0x41u8, 0x42]);
        assert_eq!(blob.count(), 2);
        assert_eq!(blob.nth(0).unwrap(), 0x41);

        let view = blob.view(1).unwrap();
        assert_eq!(view.count(), 1);
        assert_eq!(view.nth(0).unwrap(), 0x42);
        assert_eq!(view.offset(), 1);
        assert!(view.shares_storage_with(&blob));

        assert_eq!(blob, vec![0x41u8, 0x42]);
        assert_eq!(blob, [0x41u8, 0x42]);
        assert_eq!(view, [0x42u8]);
        assert_eq!(blob, vec![Value::I32(0x41), Value::I64(0x42)]);
    }

    #[test]
    fn test_out_of_range() {
        let blob = ByteBlob::from([1u8, 2, 3]);
        assert_eq!(
            blob.nth(3).unwrap_err(),
            Error::IndexOutOfRange { index: 3, count: 3 }
        );
        assert!(blob.view(3).unwrap().is_empty());
        assert!(blob.view(4).is_err());
        assert_eq!(blob.nth_or(9, 0xff), 0xff);
    }

    #[test]
    fn test_bytes_are_unsigned() {
        let blob = ByteBlob::from([0xffu8, 0x80]);
        assert_eq!(blob.nth(0).unwrap(), 255);
        assert_eq!(blob, vec![Value::I32(255), Value::I32(128)]);
        assert_ne!(blob, vec![Value::I32(-1), Value::I32(-128)]);
        assert_eq!(Value::Bytes(blob), Value::list([255, 128]));
    }

    #[test]
    fn test_cons_copies() {
        let blob = ByteBlob::from([1u8, 2]);
        let view = blob.view(1).unwrap();
        let grown = view.cons(3);
        assert_eq!(grown, [2u8, 3]);
        assert_eq!(view, [2u8]);
        assert!(!grown.shares_storage_with(&blob));
    }

    #[test]
    fn test_reduce_stops_early() {
        let blob = ByteBlob::from([1u8, 2, 3, 4]);
        let sum = blob.reduce(0u32, |acc, b| ControlFlow::Continue(acc + u32::from(b)));
        assert_eq!(sum, 10);

        let until_three = blob.reduce(0u32, |acc, b| {
            if b == 3 {
                ControlFlow::Break(acc)
            } else {
                ControlFlow::Continue(acc + u32::from(b))
            }
        });
        assert_eq!(until_three, 3);
    }

    #[test]
    fn test_index_of_relative_to_view() {
        let blob = ByteBlob::from([7u8, 1, 7, 1]);
        let view = blob.view(1).unwrap();
        assert_eq!(view.index_of(7), Some(1));
        assert_eq!(view.last_index_of(1), Some(2));
        assert_eq!(view.index_of(9), None);
    }

    #[test]
    fn test_views_equal_and_hash_equal() {
        let a = ByteBlob::from([9u8, 1, 2]).view(1).unwrap();
        let b = ByteBlob::from([1u8, 2]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(hash_of(&Value::Bytes(a)), hash_of(&Value::list([1, 2])));
        assert_eq!(format!("{:?}", b), "#bytes[01 02]");
    }
}
