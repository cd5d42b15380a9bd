//! Message type registry.
//!
//! A [`Registry`] maps message names to descriptors under a namespace and
//! hands out adapters by name: decoded from bytes, wrapped around an
//! existing record, empty, or as a fresh transient.
//!
//! Names resolve exactly first, then relative to the namespace, so with
//! namespace `people` both `"people.Person"` and `"Person"` find the same
//! type.

use std::sync::Arc;

use bytes::Bytes;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::coll::{ProtoMap, TransientProtoMap};
use crate::error::Error;
use crate::model::Record;
use crate::schema::{FieldType, MessageDescriptor};

/// Registered message types under one namespace.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    namespace: Arc<str>,
    messages: FxHashMap<Arc<str>, Arc<MessageDescriptor>>,
}

impl Registry {
    pub fn new(namespace: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            messages: FxHashMap::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registers a message type and every message type nested in its fields.
    pub fn register(&mut self, descriptor: &Arc<MessageDescriptor>) -> &mut Self {
        let mut pending = vec![Arc::clone(descriptor)];
        while let Some(desc) = pending.pop() {
            if self.messages.contains_key(desc.name()) {
                continue;
            }
            debug!(
                namespace = %self.namespace,
                message_type = desc.name(),
                fields = desc.field_count(),
                "registered message type"
            );
            for field in desc.fields() {
                if let FieldType::Message(nested) = field.field_type() {
                    pending.push(Arc::clone(nested));
                }
            }
            self.messages.insert(Arc::clone(desc.name_arc()), desc);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, descriptor: &Arc<MessageDescriptor>) -> Self {
        self.register(descriptor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Returns the registered message names, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(|name| &**name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn resolve(&self, name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(name).or_else(|| {
            let qualified = format!("{}.{}", self.namespace, name);
            self.messages.get(qualified.as_str())
        })
    }

    /// Returns the descriptor registered under `name`.
    pub fn descriptor(&self, name: &str) -> Result<&Arc<MessageDescriptor>, Error> {
        self.resolve(name).ok_or_else(|| Error::UnknownMessage {
            name: name.to_string(),
        })
    }

    /// Decodes a map of type `name` from wire bytes.
    pub fn from_bytes(&self, name: &str, bytes: impl Into<Bytes>) -> Result<ProtoMap, Error> {
        ProtoMap::from_bytes(self.descriptor(name)?, bytes)
    }

    /// Wraps a record whose type is registered here.
    pub fn from_record(&self, record: Record) -> Result<ProtoMap, Error> {
        self.descriptor(record.descriptor().name())?;
        Ok(ProtoMap::from_record(record))
    }

    /// Returns a map of type `name` with every field unset.
    pub fn empty(&self, name: &str) -> Result<ProtoMap, Error> {
        Ok(ProtoMap::new(Arc::clone(self.descriptor(name)?)))
    }

    /// Starts a transient over an empty record of type `name`.
    pub fn transient(&self, name: &str) -> Result<TransientProtoMap, Error> {
        Ok(TransientProtoMap::empty(Arc::clone(self.descriptor(name)?)))
    }
}
