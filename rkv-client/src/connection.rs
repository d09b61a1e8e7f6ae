//! # Connections
//!
//! Purpose: Define the connection-like handle every executor operation
//! receives, and the TCP implementation that speaks RESP2 to a real node.
//!
//! ## Design Principles
//! 1. **One Seam**: `RawCommand` is the only thing operations see; pooled,
//!    sharded and in-memory connections all plug in behind it.
//! 2. **Buffer Reuse**: Each TCP connection owns its read/write buffers.
//! 3. **Lazy SELECT**: A TCP connection remembers its selected database so
//!    repeated selections cost nothing on the wire.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use bytes::BytesMut;
use tracing::debug;

use rkv_common::protocol::{encode_command, read_response};
use rkv_common::{RespValue, RkvError, RkvResult};

use crate::config::EndpointConfig;
use crate::pool::ManageConnection;

/// A handle that can execute one store command and return its reply.
///
/// Error replies from the store come back as `Ok(RespValue::Error)`; only
/// transport and framing failures are `Err`.
pub trait RawCommand {
    /// Sends one command and reads its reply.
    fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue>;

    /// Switches the logical database.
    fn select(&mut self, database: u32) -> RkvResult<()> {
        let index = database.to_string();
        self.exec(&[b"SELECT", index.as_bytes()])?.into_ok()
    }
}

/// Single TCP connection with reusable buffers.
pub struct TcpConnection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
    // Last database confirmed by the server; None when unknown.
    database: Option<u32>,
}

impl TcpConnection {
    /// Opens a connection to one endpoint.
    pub fn connect(endpoint: &EndpointConfig) -> RkvResult<Self> {
        let addr = resolve(&endpoint.addr)?;
        let stream = match endpoint.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(endpoint.read_timeout())?;
        stream.set_write_timeout(endpoint.write_timeout())?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        debug!(addr = %addr, "opened store connection");

        Ok(TcpConnection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
            database: None,
        })
    }
}

impl RawCommand for TcpConnection {
    fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue> {
        if args
            .first()
            .is_some_and(|name| name.eq_ignore_ascii_case(b"SELECT"))
        {
            // A raw SELECT bypasses the tracked state.
            self.database = None;
        }

        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }

    fn select(&mut self, database: u32) -> RkvResult<()> {
        if self.database == Some(database) {
            return Ok(());
        }
        let index = database.to_string();
        self.exec(&[b"SELECT", index.as_bytes()])?.into_ok()?;
        self.database = Some(database);
        Ok(())
    }
}

/// Connection factory for one TCP endpoint.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: EndpointConfig,
}

impl TcpConnector {
    pub fn new(endpoint: EndpointConfig) -> Self {
        TcpConnector { endpoint }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }
}

impl ManageConnection for TcpConnector {
    type Connection = TcpConnection;

    fn connect(&self) -> RkvResult<TcpConnection> {
        TcpConnection::connect(&self.endpoint)
    }
}

fn resolve(addr: &str) -> RkvResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|_| RkvError::InvalidAddress(addr.to_string()))?
        .next()
        .ok_or_else(|| RkvError::InvalidAddress(addr.to_string()))
}
