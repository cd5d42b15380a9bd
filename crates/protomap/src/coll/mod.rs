//! Persistent collection adapters.
//!
//! Each adapter wraps schema-typed data and exposes it through a small set of
//! capability traits:
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`Counted`] | constant-time size |
//! | [`Indexed`] | positional access |
//! | [`Associative`] | keyed access and keyed update |
//! | [`Reducible`] | left fold with early termination |
//! | [`Editable`] | conversion to a transient |
//! | [`TransientCollection`] | batched mutation and freeze |
//!
//! Adapters:
//! - [`ProtoMap`]: a record viewed as a map over its declared fields
//! - [`ProtoVector`]: a repeated field as a base segment plus a trie tail
//! - [`ByteBlob`]: a bytes field as an indexed byte sequence
//! - [`TransientProtoMap`], [`TransientVector`]: single-writer editing sessions

use std::ops::ControlFlow;

use crate::error::Error;
use crate::model::Value;

pub mod blob;
pub mod coerce;
pub mod map;
pub mod pvec;
pub mod transient;
pub mod vector;

pub use blob::ByteBlob;
pub use map::{Entries, ProtoMap};
pub use pvec::TrieVector;
pub use transient::{TransientProtoMap, TransientVector};
pub use vector::ProtoVector;

/// A collection with a known element count.
pub trait Counted {
    fn count(&self) -> usize;
}

/// Positional access.
pub trait Indexed: Counted {
    type Item;

    /// Returns the element at `index`, or `IndexOutOfRange`.
    fn nth(&self, index: usize) -> Result<Self::Item, Error>;

    /// Returns the element at `index`, or `default` when out of range.
    fn nth_or(&self, index: usize, default: Self::Item) -> Self::Item {
        self.nth(index).unwrap_or(default)
    }
}

/// Keyed access and update over a fixed key space.
pub trait Associative: Counted {
    fn contains_key(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<Value>;

    /// Returns a new collection with `key` set to `value`.
    fn assoc(&self, key: &str, value: Value) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Left fold with early termination.
///
/// The step function returns `ControlFlow::Continue(acc)` to keep folding or
/// `ControlFlow::Break(acc)` to stop and return `acc` immediately.
pub trait Reducible {
    type Item;

    fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, Self::Item) -> ControlFlow<A, A>;
}

/// Conversion into a transient editing session.
pub trait Editable {
    type Transient: TransientCollection;

    fn as_transient(&self) -> Self::Transient;
}

/// A mutable, single-writer counterpart of a persistent collection.
pub trait TransientCollection {
    type Persistent;

    /// Adds `value` in place.
    fn conj(&mut self, value: Value) -> Result<&mut Self, Error>;

    /// Ends the session and returns the immutable result.
    ///
    /// Any later call on this transient fails with `StaleTransient`.
    fn persistent(&mut self) -> Result<Self::Persistent, Error>;

    fn is_in_transaction(&self) -> bool;
}

/// Folds `items` with early termination.
pub(crate) fn fold<I, A, F>(items: I, init: A, mut f: F) -> A
where
    I: IntoIterator,
    F: FnMut(A, I::Item) -> ControlFlow<A, A>,
{
    let mut acc = init;
    for item in items {
        match f(acc, item) {
            ControlFlow::Continue(next) => acc = next,
            ControlFlow::Break(done) => return done,
        }
    }
    acc
}
