use std::sync::Arc;

use serde::de::DeserializeOwned;

use rkv_client::{Commands, Executor};
use rkv_common::RkvResult;

use super::{Binding, Keyed, Sequence};
use crate::codec::{Codec, JsonCodec};
use crate::value::Encodable;

/// Ordered sequence over a remote list.
///
/// Positional writes and membership tests are not offered: the store has no
/// primitive for them short of reading the whole list.
pub struct SeqList<E: Executor, C: Codec = JsonCodec> {
    binding: Binding<E, C>,
}

impl<E: Executor, C: Codec + Clone> Clone for SeqList<E, C> {
    fn clone(&self) -> Self {
        SeqList {
            binding: self.binding.clone(),
        }
    }
}

impl<E: Executor, C: Codec> SeqList<E, C> {
    pub fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        SeqList {
            binding: Binding::new(executor, codec, key),
        }
    }

    pub fn rebind(self, key: impl Into<String>) -> Self {
        SeqList {
            binding: self.binding.rebind(key),
        }
    }

    /// Decoded element at `index`; undecodable values count as absent.
    pub fn get_as<T: DeserializeOwned>(&self, index: i64) -> RkvResult<Option<T>> {
        Ok(self.binding.decode(self.get(index)?))
    }
}

impl<E: Executor, C: Codec> Keyed for SeqList<E, C> {
    fn key(&self) -> &str {
        self.binding.key()
    }
}

impl<E: Executor, C: Codec> Sequence for SeqList<E, C> {
    fn append<V: Encodable>(&self, value: V) -> RkvResult<bool> {
        let stored = self.binding.encode(value)?;
        Ok(self.binding.execute(|conn, key| conn.rpush(key, &[stored.as_str()]))? > 0)
    }

    fn get(&self, index: i64) -> RkvResult<Option<String>> {
        self.binding.execute(|conn, key| conn.lindex(key, index))
    }

    fn slice(&self, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        self.binding.execute(|conn, key| conn.lrange(key, start, stop))
    }

    fn length(&self) -> RkvResult<u64> {
        self.binding.execute(|conn, key| conn.llen(key))
    }
}
