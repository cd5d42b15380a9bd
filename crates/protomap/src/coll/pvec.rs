//! Persistent vector: a 32-way trie plus a tail buffer.
//!
//! Elements live in leaves of up to 32 items. The last (partial) leaf is kept
//! out of the trie as the tail, so appends are amortized O(1). Updates copy
//! the path from the root to the touched leaf and share everything else.
//!
//! The `*_mut` methods edit in place. Nodes are shared through `Arc`, and
//! `Arc::make_mut` only copies a node when some other vector still holds
//! it, so a uniquely owned vector is mutated without copying.

use std::fmt;
use std::sync::Arc;

const BITS: usize = 5;
const WIDTH: usize = 1 << BITS;
const MASK: usize = WIDTH - 1;

#[derive(Debug, Clone)]
enum Node<T> {
    Branch(Vec<Arc<Node<T>>>),
    Leaf(Vec<T>),
}

impl<T> Node<T> {
    fn empty_branch() -> Arc<Self> {
        Arc::new(Node::Branch(Vec::new()))
    }
}

/// A persistent vector with structural sharing.
pub struct TrieVector<T> {
    len: usize,
    shift: usize,
    root: Arc<Node<T>>,
    tail: Arc<Vec<T>>,
}

impl<T> TrieVector<T> {
    pub fn new() -> Self {
        Self {
            len: 0,
            shift: BITS,
            root: Node::empty_branch(),
            tail: Arc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the first element held in the tail.
    fn tail_offset(&self) -> usize {
        if self.len < WIDTH {
            0
        } else {
            ((self.len - 1) >> BITS) << BITS
        }
    }

    /// Returns the leaf holding `index` and the index of its first element.
    fn leaf_for(&self, index: usize) -> Option<(usize, &[T])> {
        if index >= self.len {
            return None;
        }
        let offset = self.tail_offset();
        if index >= offset {
            return Some((offset, &self.tail));
        }
        let mut node = &*self.root;
        let mut level = self.shift;
        loop {
            match node {
                Node::Branch(children) => {
                    node = children.get((index >> level) & MASK)?;
                    level = level.saturating_sub(BITS);
                }
                Node::Leaf(items) => return Some((index & !MASK, items)),
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        let (start, leaf) = self.leaf_for(index)?;
        leaf.get(index - start)
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            vec: self,
            index: 0,
            leaf_start: 0,
            leaf: &[],
        }
    }

    /// Returns true if both vectors share the same root and tail.
    pub fn ptr_eq(&self, other: &TrieVector<T>) -> bool {
        self.len == other.len
            && Arc::ptr_eq(&self.root, &other.root)
            && Arc::ptr_eq(&self.tail, &other.tail)
    }
}

impl<T: Clone> TrieVector<T> {
    /// Appends `value` in place.
    pub fn push_back_mut(&mut self, value: T) {
        if self.len - self.tail_offset() < WIDTH {
            Arc::make_mut(&mut self.tail).push(value);
            self.len += 1;
            return;
        }

        // Tail is full: move it into the trie
        let full = std::mem::replace(&mut self.tail, Arc::new(Vec::with_capacity(WIDTH)));
        let leaf = Arc::new(Node::Leaf(Arc::unwrap_or_clone(full)));
        if (self.len >> BITS) > (1 << self.shift) {
            let old_root = std::mem::replace(&mut self.root, Node::empty_branch());
            let path = new_path(self.shift, leaf);
            self.root = Arc::new(Node::Branch(vec![old_root, path]));
            self.shift += BITS;
        } else {
            push_tail(Arc::make_mut(&mut self.root), self.shift, self.len - 1, leaf);
        }
        Arc::make_mut(&mut self.tail).push(value);
        self.len += 1;
    }

    /// Replaces the element at `index` in place. Returns false if out of range.
    pub fn set_mut(&mut self, index: usize, value: T) -> bool {
        if index >= self.len {
            return false;
        }
        let offset = self.tail_offset();
        if index >= offset {
            Arc::make_mut(&mut self.tail)[index - offset] = value;
        } else {
            set_in(Arc::make_mut(&mut self.root), self.shift, index, value);
        }
        true
    }

    /// Removes and returns the last element in place.
    pub fn pop_mut(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        if self.len - self.tail_offset() > 1 || self.len == 1 {
            let value = Arc::make_mut(&mut self.tail).pop();
            self.len -= 1;
            return value;
        }

        // Tail holds one element: the trie's last leaf becomes the new tail
        let value = Arc::make_mut(&mut self.tail).pop();
        let new_tail = self
            .leaf_for(self.len - 2)
            .map(|(_, leaf)| leaf.to_vec())
            .unwrap_or_default();
        self.tail = Arc::new(new_tail);
        pop_tail(Arc::make_mut(&mut self.root), self.shift, self.len - 2);
        if self.shift > BITS {
            let collapsed = match &*self.root {
                Node::Branch(children) if children.len() == 1 => Some(Arc::clone(&children[0])),
                _ => None,
            };
            if let Some(child) = collapsed {
                self.root = child;
                self.shift -= BITS;
            }
        }
        self.len -= 1;
        value
    }

    /// Returns a new vector with `value` appended.
    pub fn push_back(&self, value: T) -> Self {
        let mut next = self.clone();
        next.push_back_mut(value);
        next
    }

    /// Returns a new vector with the element at `index` replaced.
    pub fn set(&self, index: usize, value: T) -> Option<Self> {
        let mut next = self.clone();
        next.set_mut(index, value).then_some(next)
    }

    /// Returns a new vector without its last element, and that element.
    pub fn pop_back(&self) -> Option<(Self, T)> {
        let mut next = self.clone();
        let value = next.pop_mut()?;
        Some((next, value))
    }
}

fn new_path<T>(level: usize, leaf: Arc<Node<T>>) -> Arc<Node<T>> {
    if level == 0 {
        leaf
    } else {
        Arc::new(Node::Branch(vec![new_path(level - BITS, leaf)]))
    }
}

fn push_tail<T: Clone>(node: &mut Node<T>, level: usize, index: usize, leaf: Arc<Node<T>>) {
    if let Node::Branch(children) = node {
        if level == BITS {
            children.push(leaf);
            return;
        }
        let sub = (index >> level) & MASK;
        match children.get_mut(sub) {
            Some(child) => push_tail(Arc::make_mut(child), level - BITS, index, leaf),
            None => children.push(new_path(level - BITS, leaf)),
        }
    }
}

fn set_in<T: Clone>(node: &mut Node<T>, level: usize, index: usize, value: T) {
    match node {
        Node::Branch(children) => {
            if let Some(child) = children.get_mut((index >> level) & MASK) {
                set_in(Arc::make_mut(child), level.saturating_sub(BITS), index, value);
            }
        }
        Node::Leaf(items) => {
            if let Some(slot) = items.get_mut(index & MASK) {
                *slot = value;
            }
        }
    }
}

/// Removes the leaf holding `index`. Returns true if `node` became empty.
fn pop_tail<T: Clone>(node: &mut Node<T>, level: usize, index: usize) -> bool {
    let Node::Branch(children) = node else {
        return false;
    };
    let sub = (index >> level) & MASK;
    if level > BITS {
        let emptied = children
            .get_mut(sub)
            .is_some_and(|child| pop_tail(Arc::make_mut(child), level - BITS, index));
        if emptied {
            children.truncate(sub);
        }
    } else {
        children.truncate(sub);
    }
    children.is_empty()
}

impl<T> Clone for TrieVector<T> {
    fn clone(&self) -> Self {
        Self {
            len: self.len,
            shift: self.shift,
            root: Arc::clone(&self.root),
            tail: Arc::clone(&self.tail),
        }
    }
}

impl<T> Default for TrieVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for TrieVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for TrieVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len == other.len && self.iter().eq(other.iter()))
    }
}

impl<T: Eq> Eq for TrieVector<T> {}

impl<T: Clone> FromIterator<T> for TrieVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = TrieVector::new();
        vec.extend(iter);
        vec
    }
}

impl<T: Clone> Extend<T> for TrieVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back_mut(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a TrieVector<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`TrieVector`], one leaf lookup per 32 elements.
pub struct Iter<'a, T> {
    vec: &'a TrieVector<T>,
    index: usize,
    leaf_start: usize,
    leaf: &'a [T],
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.index >= self.vec.len {
            return None;
        }
        if self.index - self.leaf_start >= self.leaf.len() {
            let (start, leaf) = self.vec.leaf_for(self.index)?;
            self.leaf_start = start;
            self.leaf = leaf;
        }
        let item = self.leaf.get(self.index - self.leaf_start);
        self.index += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.vec.len - self.index.min(self.vec.len);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
