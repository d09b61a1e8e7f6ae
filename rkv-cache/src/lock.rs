//! # Distributed Lock
//!
//! Best-effort mutual exclusion from SETNX plus EXPIRE. The lock key is the
//! concatenation of business, action and message; the stored value
//! `business|action|message` is informational only.
//!
//! Acquisition never blocks or retries. Release is not owner-checked: anyone
//! who knows the triple can unlock, so callers must cooperate.

use std::time::Duration;

use tracing::debug;

use rkv_client::{Commands, Executor};
use rkv_common::RkvResult;

use crate::codec::Codec;
use crate::template::{whole_seconds, CacheTemplate};

impl<E: Executor, C: Codec + Clone> CacheTemplate<E, C> {
    /// Acquires with the configured default timeout.
    pub fn lock(&self, business: &str, action: &str, message: &str) -> RkvResult<bool> {
        self.lock_with_timeout(business, action, message, self.config().lock_timeout())
    }

    /// Returns true when this call created the lock. The expiry is attached
    /// only on success.
    pub fn lock_with_timeout(
        &self,
        business: &str,
        action: &str,
        message: &str,
        timeout: Duration,
    ) -> RkvResult<bool> {
        let key = lock_key(business, action, message);
        let owner = format!("{business}|{action}|{message}");
        let acquired = self.executor().execute(|conn| {
            let won = conn.setnx(&key, &owner)?;
            if won {
                conn.expire(&key, whole_seconds(timeout))?;
            }
            Ok(won)
        })?;
        debug!(key = %key, acquired, ?timeout, "lock attempt");
        Ok(acquired)
    }

    /// Returns true when the lock key exists. No side effects.
    pub fn lock_exists(&self, business: &str, action: &str, message: &str) -> RkvResult<bool> {
        let key = lock_key(business, action, message);
        self.executor().execute(|conn| conn.exists(&key))
    }

    /// Deletes the lock key. Returns true when a key was removed.
    pub fn unlock(&self, business: &str, action: &str, message: &str) -> RkvResult<bool> {
        let key = lock_key(business, action, message);
        let released = self.executor().execute(|conn| conn.del(&key))? > 0;
        debug!(key = %key, released, "unlock");
        Ok(released)
    }
}

fn lock_key(business: &str, action: &str, message: &str) -> String {
    let mut key = String::with_capacity(business.len() + action.len() + message.len());
    key.push_str(business);
    key.push_str(action);
    key.push_str(message);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_plain_concatenation() {
        assert_eq!(lock_key("order", "pay", "42"), "orderpay42");
        assert_eq!(lock_key("", "", ""), "");
    }
}
