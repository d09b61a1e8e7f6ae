//! # Collection Proxies
//!
//! Purpose: Present one remote key as a map, list, queue, stack or sorted
//! set. Proxies hold no data; every call is a store round trip.
//!
//! ## Design Principles
//! 1. **Independent Types**: Each proxy exposes only operations the store can
//!    serve directly; there are no inherited methods that fail at runtime.
//! 2. **Small Capabilities**: `Keyed`, `Sequence` and `PushPop` describe
//!    what generic callers may rely on.
//! 3. **Fixed Binding**: A proxy's key never changes; `rebind` consumes the
//!    proxy and returns a new one.

mod map;
mod queue;
mod seq_list;
mod sorted_set;
mod stack;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use rkv_client::Executor;
use rkv_common::RkvResult;

use crate::codec::{decode_or_absent, Codec};
use crate::value::Encodable;

pub use map::FieldMap;
pub use queue::Queue;
pub use seq_list::SeqList;
pub use sorted_set::{Range, SortedSet};
pub use stack::Stack;

/// Data bound to one store key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Ordered sequence with positional reads.
pub trait Sequence: Keyed {
    /// Appends at the tail. Returns true when the length grew.
    fn append<V: Encodable>(&self, value: V) -> RkvResult<bool>;

    /// Element at `index`; negative indexes count from the tail.
    fn get(&self, index: i64) -> RkvResult<Option<String>>;

    /// Inclusive range with the store's negative-index rules.
    fn slice(&self, start: i64, stop: i64) -> RkvResult<Vec<String>>;

    fn length(&self) -> RkvResult<u64>;
}

/// Push/pop container.
pub trait PushPop: Keyed {
    /// Inserts at the tail. Returns true when the length grew.
    fn push<V: Encodable>(&self, value: V) -> RkvResult<bool>;

    /// Removes one element; `None` when empty.
    fn pop(&self) -> RkvResult<Option<String>>;
}

// Executor, codec and key shared by every proxy.
pub(crate) struct Binding<E, C> {
    executor: Arc<E>,
    codec: C,
    key: String,
}

impl<E, C: Clone> Clone for Binding<E, C> {
    fn clone(&self) -> Self {
        Binding {
            executor: Arc::clone(&self.executor),
            codec: self.codec.clone(),
            key: self.key.clone(),
        }
    }
}

impl<E: Executor, C: Codec> Binding<E, C> {
    pub(crate) fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        Binding {
            executor,
            codec,
            key: key.into(),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn rebind(self, key: impl Into<String>) -> Self {
        Binding {
            key: key.into(),
            ..self
        }
    }

    /// Runs `op` with a connection and the bound key.
    pub(crate) fn execute<T, F>(&self, op: F) -> RkvResult<T>
    where
        F: FnOnce(&mut E::Conn, &str) -> RkvResult<T>,
    {
        self.executor.execute(|conn| op(conn, &self.key))
    }

    pub(crate) fn encode<V: Encodable>(&self, value: V) -> RkvResult<String> {
        value.to_stored(&self.codec)
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, raw: Option<String>) -> Option<T> {
        raw.and_then(|raw| decode_or_absent(&self.codec, &self.key, &raw))
    }

    pub(crate) fn codec(&self) -> &C {
        &self.codec
    }
}
