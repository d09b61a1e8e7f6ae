//! # RemoteKV Client
//!
//! Purpose: Execute store commands through a bounded connection pool, against
//! either one endpoint or a set of shards, with the connection handed back on
//! every exit path.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections to avoid repeated connects.
//! 2. **Scoped Acquisition**: Operations are closures; the executor owns the
//!    connection's lifetime.
//! 3. **Capability, Not Surprise**: Commands a deployment cannot serve fail
//!    with `RkvError::Unsupported` before any network traffic.
//! 4. **Protocol Clarity**: RESP2 is encoded and parsed explicitly.

pub mod commands;
pub mod config;
pub mod connection;
pub mod executor;
pub mod memory;
pub mod multi_key;
pub mod pool;
pub mod sharded;

pub use commands::{format_score, Commands};
pub use config::{ClientConfig, EndpointConfig, PoolConfig};
pub use connection::{RawCommand, TcpConnection, TcpConnector};
pub use executor::{Executor, SingleExecutor};
pub use memory::{MemoryConnection, MemoryConnector, MemoryStore};
pub use multi_key::{MultiKeyCommand, MultiKeyOps};
pub use pool::{ManageConnection, Pool, PoolStatus, PooledConnection};
pub use sharded::{shard_index, ShardedConnection, ShardedConnector, ShardedExecutor};

pub use rkv_common::{RespValue, RkvError, RkvResult, Ttl};
