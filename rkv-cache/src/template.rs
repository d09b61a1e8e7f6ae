//! # Cache Template
//!
//! Purpose: A typed facade over one executor: scalar commands, cache-aside
//! queries and accessors for the collection proxies.
//!
//! ## Design Principles
//! 1. **One Command Per Call**: Every scalar operation maps to exactly one
//!    store command, so none can leave a key half-written.
//! 2. **Serialize Once**: Values cross the boundary through `Encodable`;
//!    cache-aside payloads always go through the codec.
//! 3. **Absent Over Broken**: Lenient reads treat undecodable text as a miss
//!    and log it; `get_decoded` is the strict alternative.
//! 4. **Explicit Coalescing**: Plain cache-aside races like the store does;
//!    `cache_query_coalesced` opts into per-key single-flight.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use rkv_client::{Commands, Executor, MultiKeyOps};
use rkv_common::{RkvResult, Ttl};

use crate::codec::{decode_or_absent, Codec, JsonCodec};
use crate::collections::{FieldMap, Queue, SeqList, SortedSet, Stack};
use crate::flight::SingleFlight;
use crate::value::Encodable;

/// Facade settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Expiry attached by `lock` when no explicit timeout is given.
    pub lock_timeout_secs: u64,
}

impl CacheConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            lock_timeout_secs: 10,
        }
    }
}

/// Typed facade over an executor.
pub struct CacheTemplate<E: Executor, C: Codec = JsonCodec> {
    executor: Arc<E>,
    codec: C,
    config: CacheConfig,
    flight: SingleFlight,
}

impl<E: Executor> CacheTemplate<E, JsonCodec> {
    /// JSON codec and default settings.
    pub fn new(executor: Arc<E>) -> Self {
        CacheTemplate::with_codec(executor, JsonCodec, CacheConfig::default())
    }
}

impl<E: Executor, C: Codec + Clone> CacheTemplate<E, C> {
    pub fn with_codec(executor: Arc<E>, codec: C, config: CacheConfig) -> Self {
        CacheTemplate {
            executor,
            codec,
            config,
            flight: SingleFlight::new(),
        }
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Raw text under `key`.
    pub fn get(&self, key: &str) -> RkvResult<Option<String>> {
        self.executor.execute(|conn| conn.get(key))
    }

    /// Decoded value under `key`; `None` when absent, null or undecodable.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> RkvResult<Option<T>> {
        Ok(self
            .get(key)?
            .and_then(|raw| decode_or_absent(&self.codec, key, &raw)))
    }

    /// Decoded value under `key`; undecodable text is `RkvError::Decode`.
    pub fn get_decoded<T: DeserializeOwned>(&self, key: &str) -> RkvResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => self.codec.decode::<Option<T>>(&raw),
            None => Ok(None),
        }
    }

    pub fn set<V: Encodable>(&self, key: &str, value: V) -> RkvResult<()> {
        let stored = value.to_stored(&self.codec)?;
        self.executor.execute(|conn| conn.set(key, &stored))
    }

    /// Writes only when `key` is absent. Returns true when written.
    pub fn setnx<V: Encodable>(&self, key: &str, value: V) -> RkvResult<bool> {
        let stored = value.to_stored(&self.codec)?;
        self.executor.execute(|conn| conn.setnx(key, &stored))
    }

    /// Writes with an expiry, rounded up to whole seconds (at least one).
    pub fn setex<V: Encodable>(&self, key: &str, value: V, expiry: Duration) -> RkvResult<()> {
        let stored = value.to_stored(&self.codec)?;
        self.executor
            .execute(|conn| conn.set_ex(key, whole_seconds(expiry), &stored))
    }

    pub fn incr(&self, key: &str) -> RkvResult<i64> {
        self.executor.execute(|conn| conn.incr(key))
    }

    pub fn decr(&self, key: &str) -> RkvResult<i64> {
        self.executor.execute(|conn| conn.decr(key))
    }

    /// Unsupported on a sharded executor.
    pub fn mget(&self, keys: &[&str]) -> RkvResult<Vec<Option<String>>> {
        self.executor.mget(keys)
    }

    /// Unsupported on a sharded executor.
    pub fn mset(&self, pairs: &[(&str, &str)]) -> RkvResult<()> {
        self.executor.mset(pairs)
    }

    /// Returns true when the expiry was attached. A zero `expiry` is
    /// raised to one second rather than deleting the key.
    pub fn expire(&self, key: &str, expiry: Duration) -> RkvResult<bool> {
        self.executor
            .execute(|conn| conn.expire(key, whole_seconds(expiry)))
    }

    pub fn ttl(&self, key: &str) -> RkvResult<Ttl> {
        self.executor.execute(|conn| conn.ttl(key))
    }

    pub fn exists(&self, key: &str) -> RkvResult<bool> {
        self.executor.execute(|conn| conn.exists(key))
    }

    /// Store type name ("string", "hash", "list", "zset", "none", ...).
    pub fn key_type(&self, key: &str) -> RkvResult<String> {
        self.executor.execute(|conn| conn.key_type(key))
    }

    /// Returns true when a key was removed.
    pub fn delete(&self, key: &str) -> RkvResult<bool> {
        Ok(self.executor.execute(|conn| conn.del(key))? > 0)
    }

    /// Transactions are not offered by this facade.
    pub fn supports_transactions(&self) -> bool {
        false
    }

    /// Cache-aside read without expiry.
    ///
    /// Returns the decoded cached value when present; otherwise calls
    /// `supplier`, stores its encoded result and returns it. A stored null or
    /// undecodable text counts as a miss.
    ///
    /// Concurrent callers missing on the same key each call their supplier
    /// and the last write wins. Use `cache_query_coalesced` to avoid that
    /// within one process.
    pub fn cache_query<T, F>(&self, key: &str, supplier: F) -> RkvResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.query(key, None, supplier)
    }

    /// Cache-aside read that stores a miss with `expiry`.
    pub fn cache_query_ex<T, F>(&self, key: &str, expiry: Duration, supplier: F) -> RkvResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.query(key, Some(expiry), supplier)
    }

    /// Cache-aside read of a sequence. A cached empty sequence is a hit.
    pub fn cache_query_list<T, F>(&self, key: &str, supplier: F) -> RkvResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        self.query(key, None, supplier)
    }

    /// Sequence variant of `cache_query_ex`.
    pub fn cache_query_list_ex<T, F>(
        &self,
        key: &str,
        expiry: Duration,
        supplier: F,
    ) -> RkvResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        self.query(key, Some(expiry), supplier)
    }

    /// Cache-aside read where concurrent misses on `key` in this process
    /// share one supplier call: later callers wait for the first and then
    /// read what it stored.
    pub fn cache_query_coalesced<T, F>(
        &self,
        key: &str,
        expiry: Option<Duration>,
        supplier: F,
    ) -> RkvResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get_as(key)? {
            return Ok(hit);
        }
        self.flight.run(key, || self.query(key, expiry, supplier))
    }

    pub fn map(&self, key: impl Into<String>) -> FieldMap<E, C> {
        FieldMap::new(Arc::clone(&self.executor), self.codec.clone(), key)
    }

    pub fn list(&self, key: impl Into<String>) -> SeqList<E, C> {
        SeqList::new(Arc::clone(&self.executor), self.codec.clone(), key)
    }

    pub fn queue(&self, key: impl Into<String>) -> Queue<E, C> {
        Queue::new(Arc::clone(&self.executor), self.codec.clone(), key)
    }

    pub fn stack(&self, key: impl Into<String>) -> Stack<E, C> {
        Stack::new(Arc::clone(&self.executor), self.codec.clone(), key)
    }

    pub fn sorted_set(&self, key: impl Into<String>) -> SortedSet<E, C> {
        SortedSet::new(Arc::clone(&self.executor), self.codec.clone(), key)
    }

    fn query<T, F>(&self, key: &str, expiry: Option<Duration>, supplier: F) -> RkvResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get_as(key)? {
            trace!(key, "cache hit");
            return Ok(hit);
        }

        debug!(key, "cache miss, calling supplier");
        let fresh = supplier();
        let encoded = self.codec.encode(&fresh)?;
        self.executor.execute(|conn| match expiry {
            Some(expiry) => conn.set_ex(key, whole_seconds(expiry), &encoded),
            None => conn.set(key, &encoded),
        })?;
        Ok(fresh)
    }
}

/// Expiry in whole seconds, rounding any fraction up. Never below one: the
/// store deletes a key given a zero expiry.
pub(crate) fn whole_seconds(expiry: Duration) -> u64 {
    (expiry.as_secs() + u64::from(expiry.subsec_nanos() > 0)).max(1)
}
