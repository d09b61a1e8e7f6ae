//! # Sharded Executor
//!
//! Purpose: Spread keys over several independent nodes, one pool entry
//! holding one connection per node.
//!
//! ## Design Principles
//! 1. **Stable Routing**: A key maps to its node through FNV-1a, so the
//!    mapping is identical across processes and builds.
//! 2. **Hash Tags**: When a key contains `{tag}`, only the tag is hashed,
//!    letting related keys land on the same node.
//! 3. **Single-Key Only**: Multi-key, keyless and SELECT commands are refused
//!    with `RkvError::Unsupported`; there is no cross-node coordination.

use tracing::debug;

use rkv_common::{RespValue, RkvError, RkvResult};

use crate::config::{ClientConfig, PoolConfig};
use crate::connection::{RawCommand, TcpConnector};
use crate::executor::Executor;
use crate::multi_key::MultiKeyCommand;
use crate::pool::{ManageConnection, Pool, PoolStatus, PooledConnection};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Returns the node index for `key` among `shards` nodes.
pub fn shard_index(key: &[u8], shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let hash = hash_tag(key)
        .unwrap_or(key)
        .iter()
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        });
    (hash % shards as u64) as usize
}

// Non-empty content of the first `{...}` pair.
fn hash_tag(key: &[u8]) -> Option<&[u8]> {
    let open = key.iter().position(|byte| *byte == b'{')?;
    let rest = &key[open + 1..];
    let close = rest.iter().position(|byte| *byte == b'}')?;
    (close > 0).then(|| &rest[..close])
}

/// One connection per node, routed by key.
pub struct ShardedConnection<C> {
    shards: Vec<C>,
}

impl<C: RawCommand> ShardedConnection<C> {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Connection serving `key`.
    pub fn shard_for(&mut self, key: &str) -> &mut C {
        let index = shard_index(key.as_bytes(), self.shards.len());
        &mut self.shards[index]
    }
}

impl<C: RawCommand> RawCommand for ShardedConnection<C> {
    fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue> {
        if let Some(command) = MultiKeyCommand::classify(args) {
            return Err(RkvError::Unsupported(command.name()));
        }
        match args {
            [name, ..] if name.eq_ignore_ascii_case(b"SELECT") => {
                Err(RkvError::Unsupported("SELECT"))
            }
            [name] if name.eq_ignore_ascii_case(b"PING") => match self.shards.first_mut() {
                Some(shard) => shard.exec(args),
                None => Err(RkvError::UnexpectedResponse),
            },
            [_, key, ..] => {
                let index = shard_index(key, self.shards.len());
                self.shards[index].exec(args)
            }
            _ => Err(RkvError::Unsupported("keyless command")),
        }
    }

    fn select(&mut self, _database: u32) -> RkvResult<()> {
        Err(RkvError::Unsupported("SELECT"))
    }
}

/// Opens one connection per node for each pool entry.
pub struct ShardedConnector<M> {
    shards: Vec<M>,
}

impl<M: ManageConnection> ManageConnection for ShardedConnector<M> {
    type Connection = ShardedConnection<M::Connection>;

    fn connect(&self) -> RkvResult<Self::Connection> {
        let shards = self
            .shards
            .iter()
            .map(|shard| shard.connect())
            .collect::<RkvResult<Vec<_>>>()?;
        Ok(ShardedConnection { shards })
    }
}

/// Executor over several nodes with key-hash routing.
pub struct ShardedExecutor<M: ManageConnection = TcpConnector> {
    pool: Pool<ShardedConnector<M>>,
    shard_count: usize,
}

impl<M: ManageConnection> ShardedExecutor<M> {
    /// Builds an executor over one connector per node.
    pub fn new(shards: Vec<M>, pool: PoolConfig) -> RkvResult<Self> {
        if shards.is_empty() {
            return Err(RkvError::InvalidAddress("no endpoint configured".to_string()));
        }
        let shard_count = shards.len();
        Ok(ShardedExecutor {
            pool: Pool::new(ShardedConnector { shards }, pool),
            shard_count,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }
}

impl ShardedExecutor<TcpConnector> {
    /// Builds a TCP executor over every configured endpoint.
    ///
    /// `config.database` is ignored; nodes always use their default database.
    pub fn connect(config: &ClientConfig) -> RkvResult<Self> {
        debug!(shards = config.endpoints.len(), "sharded executor configured");
        let shards = config
            .endpoints
            .iter()
            .cloned()
            .map(TcpConnector::new)
            .collect();
        ShardedExecutor::new(shards, config.pool.clone())
    }
}

impl<M: ManageConnection> Executor for ShardedExecutor<M> {
    type Conn = PooledConnection<ShardedConnector<M>>;

    fn execute<T, F>(&self, op: F) -> RkvResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> RkvResult<T>,
    {
        let mut conn = self.pool.acquire()?;
        op(&mut conn)
    }

    fn supports_multi_key(&self) -> bool {
        false
    }
}
