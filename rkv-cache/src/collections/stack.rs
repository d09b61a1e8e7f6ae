use std::sync::Arc;

use serde::de::DeserializeOwned;

use rkv_client::{Commands, Executor};
use rkv_common::RkvResult;

use super::{Binding, Keyed, PushPop};
use crate::codec::{Codec, JsonCodec};
use crate::value::Encodable;

/// LIFO stack. The top of the stack is the tail of the remote list.
pub struct Stack<E: Executor, C: Codec = JsonCodec> {
    binding: Binding<E, C>,
}

impl<E: Executor, C: Codec + Clone> Clone for Stack<E, C> {
    fn clone(&self) -> Self {
        Stack {
            binding: self.binding.clone(),
        }
    }
}

impl<E: Executor, C: Codec> Stack<E, C> {
    pub fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        Stack {
            binding: Binding::new(executor, codec, key),
        }
    }

    pub fn rebind(self, key: impl Into<String>) -> Self {
        Stack {
            binding: self.binding.rebind(key),
        }
    }

    pub fn pop_as<T: DeserializeOwned>(&self) -> RkvResult<Option<T>> {
        Ok(self.binding.decode(self.pop()?))
    }
}

impl<E: Executor, C: Codec> Keyed for Stack<E, C> {
    fn key(&self) -> &str {
        self.binding.key()
    }
}

impl<E: Executor, C: Codec> PushPop for Stack<E, C> {
    fn push<V: Encodable>(&self, value: V) -> RkvResult<bool> {
        let stored = self.binding.encode(value)?;
        Ok(self.binding.execute(|conn, key| conn.rpush(key, &[stored.as_str()]))? > 0)
    }

    fn pop(&self) -> RkvResult<Option<String>> {
        self.binding.execute(|conn, key| conn.rpop(key))
    }
}
