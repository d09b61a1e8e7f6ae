// rkv-common - Shared error taxonomy, wire protocol and small types for RemoteKV
//
// Everything here is free of IO policy; pooling and command semantics live in
// rkv-client, the typed facade in rkv-cache.

pub mod error;
pub mod protocol;
pub mod types;

// Re-export for convenience
pub use error::*;
pub use protocol::RespValue;
pub use types::*;
