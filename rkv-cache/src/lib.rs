//! # RemoteKV Cache
//!
//! Purpose: Typed access to a remote key-value store on top of an
//! `rkv_client::Executor`: scalar values, cache-aside reads, a best-effort
//! lock and collection proxies bound to one key each.
//!
//! ## Design Principles
//! 1. **Executor Agnostic**: Everything here works over a single endpoint, a
//!    shard set or the in-memory store without change.
//! 2. **Pluggable Encoding**: Structured values pass through a `Codec`;
//!    plain text and numbers are stored as-is.
//! 3. **Stateless Proxies**: Collections keep no local copy of remote data.

pub mod codec;
pub mod collections;
pub mod flight;
pub mod lock;
pub mod template;
pub mod value;

pub use codec::{Codec, JsonCodec};
pub use collections::{
    FieldMap, Keyed, PushPop, Queue, Range, SeqList, Sequence, SortedSet, Stack,
};
pub use flight::SingleFlight;
pub use template::{CacheConfig, CacheTemplate};
pub use value::{Encodable, Null, Structured};
