use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use rkv_client::{Commands, Executor};
use rkv_common::RkvResult;

use super::{Binding, Keyed};
use crate::codec::{Codec, JsonCodec};
use crate::value::Encodable;

/// Field map over a remote hash.
pub struct FieldMap<E: Executor, C: Codec = JsonCodec> {
    binding: Binding<E, C>,
}

impl<E: Executor, C: Codec + Clone> Clone for FieldMap<E, C> {
    fn clone(&self) -> Self {
        FieldMap {
            binding: self.binding.clone(),
        }
    }
}

impl<E: Executor, C: Codec> FieldMap<E, C> {
    pub fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        FieldMap {
            binding: Binding::new(executor, codec, key),
        }
    }

    pub fn rebind(self, key: impl Into<String>) -> Self {
        FieldMap {
            binding: self.binding.rebind(key),
        }
    }

    pub fn get(&self, field: &str) -> RkvResult<Option<String>> {
        self.binding.execute(|conn, key| conn.hget(key, field))
    }

    /// Decoded field value; undecodable values count as absent.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> RkvResult<Option<T>> {
        Ok(self.binding.decode(self.get(field)?))
    }

    /// Writes `field`. Returns the value back when the field was created and
    /// `None` when an existing field was overwritten.
    pub fn put<V: Encodable>(&self, field: &str, value: V) -> RkvResult<Option<V>> {
        let stored = self.binding.encode(&value)?;
        let created = self
            .binding
            .execute(|conn, key| conn.hset(key, field, &stored))?;
        Ok(created.then_some(value))
    }

    /// Returns true when the field existed.
    pub fn delete(&self, field: &str) -> RkvResult<bool> {
        Ok(self.binding.execute(|conn, key| conn.hdel(key, &[field]))? > 0)
    }

    /// Returns true when at least one field existed.
    pub fn delete_batch(&self, fields: &[&str]) -> RkvResult<bool> {
        if fields.is_empty() {
            return Ok(false);
        }
        Ok(self.binding.execute(|conn, key| conn.hdel(key, fields))? > 0)
    }

    /// Writes every entry with one HMSET.
    pub fn put_all<V: Encodable>(&self, entries: &[(&str, V)]) -> RkvResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let stored = entries
            .iter()
            .map(|(field, value)| Ok((*field, self.binding.encode(value)?)))
            .collect::<RkvResult<Vec<(&str, String)>>>()?;
        let pairs: Vec<(&str, &str)> = stored
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
            .collect();
        self.binding.execute(|conn, key| conn.hmset(key, &pairs))
    }

    /// Reads several fields, in the requested order.
    pub fn get_all(&self, fields: &[&str]) -> RkvResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.binding.execute(|conn, key| conn.hmget(key, fields))
    }

    /// Cache-aside read scoped to one field. Fields cannot expire on their
    /// own, so a filled field lives as long as the map.
    pub fn cache_query<T, F>(&self, field: &str, supplier: F) -> RkvResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get_as(field)? {
            return Ok(hit);
        }
        debug!(key = self.key(), field, "field cache miss, calling supplier");
        let fresh = supplier();
        let encoded = self.binding.codec().encode(&fresh)?;
        self.binding
            .execute(|conn, key| conn.hset(key, field, &encoded))?;
        Ok(fresh)
    }

    /// Sequence variant of `cache_query`. A cached empty sequence is a hit.
    pub fn cache_query_list<T, F>(&self, field: &str, supplier: F) -> RkvResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        self.cache_query(field, supplier)
    }
}

impl<E: Executor, C: Codec> Keyed for FieldMap<E, C> {
    fn key(&self) -> &str {
        self.binding.key()
    }
}
