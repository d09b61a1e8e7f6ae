//! # Command Executor
//!
//! Purpose: Run one operation against a pooled connection and give the
//! connection back afterwards, on success and on failure alike.
//!
//! ## Design Principles
//! 1. **Scoped Resource**: An operation is a closure over `&mut Conn`; the
//!    executor owns acquisition and release, callers never see the pool.
//! 2. **Database Selection**: The single-endpoint executor selects its
//!    configured database before every operation.
//! 3. **Capability Check**: Multi-key commands go through `execute_multi`,
//!    which the sharded executor refuses before touching the pool.

use tracing::debug;

use rkv_common::{RkvError, RkvResult};

use crate::config::{ClientConfig, PoolConfig};
use crate::connection::{RawCommand, TcpConnector};
use crate::multi_key::MultiKeyCommand;
use crate::pool::{ManageConnection, Pool, PoolStatus, PooledConnection};

/// Runs operations against a connection it acquires and releases.
pub trait Executor: Send + Sync {
    /// Connection-like handle passed to operations.
    type Conn: RawCommand;

    /// Acquires a connection, runs `op` on it and releases it.
    ///
    /// Errors from acquisition and from `op` propagate unchanged.
    fn execute<T, F>(&self, op: F) -> RkvResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> RkvResult<T>;

    /// Side-effect-only variant of `execute`.
    fn run<F>(&self, op: F) -> RkvResult<()>
    where
        F: FnOnce(&mut Self::Conn) -> RkvResult<()>,
    {
        self.execute(op)
    }

    /// Runs a multi-key operation, or fails with `RkvError::Unsupported`
    /// when this executor cannot serve `command`.
    fn execute_multi<T, F>(&self, command: MultiKeyCommand, op: F) -> RkvResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> RkvResult<T>,
    {
        if !self.supports_multi_key() {
            return Err(RkvError::Unsupported(command.name()));
        }
        self.execute(op)
    }

    /// Returns true when multi-key commands are available.
    fn supports_multi_key(&self) -> bool;
}

/// Executor over one endpoint's pool.
pub struct SingleExecutor<M: ManageConnection = TcpConnector> {
    pool: Pool<M>,
    database: u32,
}

impl<M: ManageConnection> SingleExecutor<M> {
    /// Wraps an existing pool; `database` is selected before each operation.
    pub fn new(manager: M, pool: PoolConfig, database: u32) -> Self {
        SingleExecutor {
            pool: Pool::new(manager, pool),
            database,
        }
    }

    pub fn database(&self) -> u32 {
        self.database
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }
}

impl SingleExecutor<TcpConnector> {
    /// Builds a TCP executor from the first configured endpoint.
    ///
    /// No connection is opened until the first operation.
    pub fn connect(config: &ClientConfig) -> RkvResult<Self> {
        let endpoint = config
            .endpoints
            .first()
            .cloned()
            .ok_or_else(|| RkvError::InvalidAddress("no endpoint configured".to_string()))?;
        debug!(addr = %endpoint.addr, database = config.database, "single executor configured");
        Ok(SingleExecutor::new(
            TcpConnector::new(endpoint),
            config.pool.clone(),
            config.database,
        ))
    }
}

impl<M: ManageConnection> Executor for SingleExecutor<M> {
    type Conn = PooledConnection<M>;

    fn execute<T, F>(&self, op: F) -> RkvResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> RkvResult<T>,
    {
        let mut conn = self.pool.acquire()?;
        conn.select(self.database)?;
        op(&mut conn)
    }

    fn supports_multi_key(&self) -> bool {
        true
    }
}
