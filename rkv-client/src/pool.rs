//! # Connection Pool
//!
//! Purpose: Hand out a bounded set of reusable connections to any number of
//! threads, blocking up to a configured wait when all of them are in use.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections;
//!    connecting happens outside the lock on a reserved slot.
//! 3. **Bounded Waiting**: Exceeding `max_total` parks the caller on a
//!    condition variable until a slot frees up or `max_wait` elapses.
//! 4. **Scoped Acquisition**: `PooledConnection` returns itself on drop, on
//!    every exit path, and is discarded instead if it saw a transport error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use rkv_common::{RespValue, RkvError, RkvResult};

use crate::config::PoolConfig;
use crate::connection::RawCommand;

/// Factory for the connections a `Pool` manages.
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: RawCommand + Send + 'static;

    /// Opens a fresh connection.
    fn connect(&self) -> RkvResult<Self::Connection>;
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections waiting in the idle queue.
    pub idle: usize,
    /// Connections alive, idle or checked out.
    pub total: usize,
}

struct PoolState<C> {
    idle: VecDeque<C>,
    total: usize,
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
    available: Condvar,
}

impl<M: ManageConnection> PoolInner<M> {
    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.total = state.total.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    fn return_connection(&self, conn: M::Connection) {
        let mut state = self.state.lock();
        if state.idle.len() < self.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
        drop(state);
        self.available.notify_one();
    }
}

/// Connection pool handle. Cloning shares the same pool.
pub struct Pool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ManageConnection> Pool<M> {
    /// Creates an empty pool; connections are opened on demand.
    pub fn new(manager: M, config: PoolConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        Pool {
            inner: Arc::new(PoolInner {
                manager,
                config,
                state: Mutex::new(state),
                available: Condvar::new(),
            }),
        }
    }

    /// Acquires a connection, waiting up to `max_wait` when the pool is full.
    pub fn acquire(&self) -> RkvResult<PooledConnection<M>> {
        let max_wait = self.inner.config.max_wait();
        let deadline = Instant::now() + max_wait;
        let mut state = self.inner.state.lock();

        loop {
            if let Some(conn) = state.idle.pop_front() {
                return Ok(PooledConnection::new(Arc::clone(&self.inner), conn));
            }

            if state.total < self.inner.config.max_total {
                state.total += 1;
                drop(state);
                return self.open();
            }

            let timed_out = self.inner.available.wait_until(&mut state, deadline).timed_out();
            if timed_out && state.idle.is_empty() && state.total >= self.inner.config.max_total {
                warn!(
                    max_total = self.inner.config.max_total,
                    ?max_wait,
                    "connection pool exhausted"
                );
                return Err(RkvError::PoolExhausted(max_wait));
            }
        }
    }

    /// Returns current occupancy.
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            total: state.total,
        }
    }

    /// Returns the pool limits.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Returns the connection factory.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    // Runs on a slot reserved by `acquire`; gives the slot back on failure.
    fn open(&self) -> RkvResult<PooledConnection<M>> {
        match self.inner.manager.connect() {
            Ok(conn) => {
                debug!("pool opened new connection");
                Ok(PooledConnection::new(Arc::clone(&self.inner), conn))
            }
            Err(err) => {
                self.inner.release_slot();
                Err(err)
            }
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection<M: ManageConnection> {
    pool: Arc<PoolInner<M>>,
    conn: Option<M::Connection>,
    valid: bool,
}

impl<M: ManageConnection> PooledConnection<M> {
    fn new(pool: Arc<PoolInner<M>>, conn: M::Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Gives direct access to the managed connection.
    pub fn get_mut(&mut self) -> &mut M::Connection {
        self.conn.as_mut().expect("connection present until drop")
    }

    // Marked broken while `op` runs, so a call that unwinds mid-frame is
    // discarded too. IO/protocol failures keep it broken.
    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut M::Connection) -> RkvResult<T>,
    ) -> RkvResult<T> {
        let was_valid = std::mem::replace(&mut self.valid, false);
        let result = op(self.get_mut());
        let broken = matches!(&result, Err(err) if err.is_connection_error());
        self.valid = was_valid && !broken;
        result
    }
}

impl<M: ManageConnection> RawCommand for PooledConnection<M> {
    fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue> {
        self.guarded(|conn| conn.exec(args))
    }

    fn select(&mut self, database: u32) -> RkvResult<()> {
        self.guarded(|conn| conn.select(database))
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        if self.valid {
            self.pool.return_connection(conn);
        } else {
            warn!("discarding broken connection");
            drop(conn);
            self.pool.release_slot();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        refuse: AtomicBool,
    }

    struct FakeManager {
        counters: Arc<Counters>,
    }

    struct FakeConn {
        broken: bool,
    }

    impl RawCommand for FakeConn {
        fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue> {
            if args[0] == b"PANIC" {
                panic!("reply framing overflow");
            }
            if args[0] == b"BREAK" {
                self.broken = true;
            }
            if self.broken {
                return Err(RkvError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )));
            }
            Ok(RespValue::ok())
        }
    }

    impl ManageConnection for FakeManager {
        type Connection = FakeConn;

        fn connect(&self) -> RkvResult<FakeConn> {
            if self.counters.refuse.load(Ordering::SeqCst) {
                return Err(RkvError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn { broken: false })
        }
    }

    fn pool(max_idle: usize, max_total: usize, max_wait_ms: u64) -> (Pool<FakeManager>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let manager = FakeManager {
            counters: Arc::clone(&counters),
        };
        let config = PoolConfig {
            max_idle,
            max_total,
            max_wait_ms,
        };
        (Pool::new(manager, config), counters)
    }

    #[test]
    fn reuses_idle_connection() {
        let (pool, counters) = pool(1, 1, 0);
        for _ in 0..3 {
            let mut conn = pool.acquire().unwrap();
            conn.exec(&[b"PING"]).unwrap();
        }
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status(), PoolStatus { idle: 1, total: 1 });
    }

    #[test]
    fn exhausted_after_max_wait() {
        let (pool, _) = pool(1, 1, 50);
        let _held = pool.acquire().unwrap();

        let started = Instant::now();
        let err = pool.acquire().err().expect("pool should be exhausted");
        assert!(matches!(err, RkvError::PoolExhausted(wait) if wait == Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn zero_wait_fails_immediately() {
        let (pool, _) = pool(1, 1, 0);
        let _held = pool.acquire().unwrap();
        assert!(matches!(pool.acquire(), Err(RkvError::PoolExhausted(_))));
    }

    #[test]
    fn waiter_wakes_when_connection_returns() {
        let (pool, counters) = pool(1, 1, 2_000);
        let held = pool.acquire().unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(held);
        });

        let mut conn = pool.acquire().expect("released connection");
        conn.exec(&[b"PING"]).unwrap();
        releaser.join().unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broken_connection_is_discarded() {
        let (pool, counters) = pool(2, 2, 0);
        {
            let mut conn = pool.acquire().unwrap();
            assert!(conn.exec(&[b"BREAK"]).is_err());
        }
        assert_eq!(pool.status(), PoolStatus { idle: 0, total: 0 });

        let mut conn = pool.acquire().unwrap();
        conn.exec(&[b"PING"]).unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn connection_unwinding_mid_command_is_discarded() {
        let (pool, counters) = pool(2, 2, 0);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut conn = pool.acquire().unwrap();
            conn.exec(&[b"PANIC"])
        }));
        assert!(outcome.is_err());
        assert_eq!(pool.status(), PoolStatus { idle: 0, total: 0 });

        let mut conn = pool.acquire().unwrap();
        conn.exec(&[b"PING"]).unwrap();
        drop(conn);
        assert_eq!(pool.status(), PoolStatus { idle: 1, total: 1 });
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_connect_releases_slot() {
        let (pool, counters) = pool(1, 1, 0);
        counters.refuse.store(true, Ordering::SeqCst);
        assert!(matches!(pool.acquire(), Err(RkvError::Io(_))));
        assert_eq!(pool.status().total, 0);

        counters.refuse.store(false, Ordering::SeqCst);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn surplus_connections_close_beyond_max_idle() {
        let (pool, _) = pool(1, 3, 0);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        drop(first);
        drop(second);
        assert_eq!(pool.status(), PoolStatus { idle: 1, total: 1 });
    }
}
