use std::sync::Arc;

use serde::de::DeserializeOwned;

use rkv_client::{Commands, Executor};
use rkv_common::RkvResult;

use super::{Binding, Keyed, PushPop};
use crate::codec::{Codec, JsonCodec};
use crate::value::Encodable;

/// FIFO queue: push at the tail, pop from the head.
pub struct Queue<E: Executor, C: Codec = JsonCodec> {
    binding: Binding<E, C>,
}

impl<E: Executor, C: Codec + Clone> Clone for Queue<E, C> {
    fn clone(&self) -> Self {
        Queue {
            binding: self.binding.clone(),
        }
    }
}

impl<E: Executor, C: Codec> Queue<E, C> {
    pub fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        Queue {
            binding: Binding::new(executor, codec, key),
        }
    }

    pub fn rebind(self, key: impl Into<String>) -> Self {
        Queue {
            binding: self.binding.rebind(key),
        }
    }

    /// Pops the head and decodes it; undecodable values count as absent.
    pub fn pop_as<T: DeserializeOwned>(&self) -> RkvResult<Option<T>> {
        Ok(self.binding.decode(self.pop()?))
    }
}

impl<E: Executor, C: Codec> Keyed for Queue<E, C> {
    fn key(&self) -> &str {
        self.binding.key()
    }
}

impl<E: Executor, C: Codec> PushPop for Queue<E, C> {
    fn push<V: Encodable>(&self, value: V) -> RkvResult<bool> {
        let stored = self.binding.encode(value)?;
        Ok(self.binding.execute(|conn, key| conn.rpush(key, &[stored.as_str()]))? > 0)
    }

    fn pop(&self) -> RkvResult<Option<String>> {
        self.binding.execute(|conn, key| conn.lpop(key))
    }
}
