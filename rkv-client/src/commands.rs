//! # Typed Commands
//!
//! Purpose: Give every connection-like handle a typed, single-key command
//! surface so executor operations read as `conn.hget(key, field)` instead of
//! hand-built argument vectors.
//!
//! Every method maps to exactly one store command. Multi-key commands live in
//! `multi_key` because their availability depends on the executor.

use rkv_common::{RkvError, RkvResult, Ttl};

use crate::connection::RawCommand;

/// Single-key command surface, available on every `RawCommand`.
pub trait Commands: RawCommand {
    /// GET. `None` when the key is missing.
    fn get(&mut self, key: &str) -> RkvResult<Option<String>> {
        self.exec(&[b"GET", key.as_bytes()])?.into_string()
    }

    /// SET without expiration.
    fn set(&mut self, key: &str, value: &str) -> RkvResult<()> {
        self.exec(&[b"SET", key.as_bytes(), value.as_bytes()])?.into_ok()
    }

    /// SETEX: set and attach an expiration in seconds.
    fn set_ex(&mut self, key: &str, seconds: u64, value: &str) -> RkvResult<()> {
        let seconds = seconds.to_string();
        self.exec(&[b"SETEX", key.as_bytes(), seconds.as_bytes(), value.as_bytes()])?
            .into_ok()
    }

    /// SETNX. Returns true when the key did not exist and was written.
    fn setnx(&mut self, key: &str, value: &str) -> RkvResult<bool> {
        Ok(self.exec(&[b"SETNX", key.as_bytes(), value.as_bytes()])?.into_integer()? == 1)
    }

    fn incr(&mut self, key: &str) -> RkvResult<i64> {
        self.exec(&[b"INCR", key.as_bytes()])?.into_integer()
    }

    fn decr(&mut self, key: &str) -> RkvResult<i64> {
        self.exec(&[b"DECR", key.as_bytes()])?.into_integer()
    }

    /// EXPIRE. Returns true when the timeout was set.
    fn expire(&mut self, key: &str, seconds: u64) -> RkvResult<bool> {
        let seconds = seconds.to_string();
        Ok(self.exec(&[b"EXPIRE", key.as_bytes(), seconds.as_bytes()])?.into_integer()? == 1)
    }

    fn ttl(&mut self, key: &str) -> RkvResult<Ttl> {
        let reply = self.exec(&[b"TTL", key.as_bytes()])?.into_integer()?;
        Ttl::from_reply(reply).ok_or(RkvError::UnexpectedResponse)
    }

    fn exists(&mut self, key: &str) -> RkvResult<bool> {
        Ok(self.exec(&[b"EXISTS", key.as_bytes()])?.into_integer()? > 0)
    }

    /// TYPE. Returns "none" for a missing key.
    fn key_type(&mut self, key: &str) -> RkvResult<String> {
        self.exec(&[b"TYPE", key.as_bytes()])?
            .into_string()?
            .ok_or(RkvError::UnexpectedResponse)
    }

    /// DEL of one key. Returns the number of keys removed.
    fn del(&mut self, key: &str) -> RkvResult<u64> {
        count(self.exec(&[b"DEL", key.as_bytes()])?.into_integer()?)
    }

    fn hget(&mut self, key: &str, field: &str) -> RkvResult<Option<String>> {
        self.exec(&[b"HGET", key.as_bytes(), field.as_bytes()])?.into_string()
    }

    /// HSET of one field. Returns true when the field was created.
    fn hset(&mut self, key: &str, field: &str, value: &str) -> RkvResult<bool> {
        let reply = self
            .exec(&[b"HSET", key.as_bytes(), field.as_bytes(), value.as_bytes()])?
            .into_integer()?;
        Ok(reply > 0)
    }

    /// HDEL. Returns the number of fields removed.
    fn hdel(&mut self, key: &str, fields: &[&str]) -> RkvResult<u64> {
        let args = keyed(b"HDEL", key, fields.iter().map(|field| field.as_bytes()));
        count(self.exec(&args)?.into_integer()?)
    }

    fn hmset(&mut self, key: &str, pairs: &[(&str, &str)]) -> RkvResult<()> {
        let flat = pairs
            .iter()
            .flat_map(|(field, value)| [field.as_bytes(), value.as_bytes()]);
        let args = keyed(b"HMSET", key, flat);
        self.exec(&args)?.into_ok()
    }

    /// HMGET. The reply preserves the requested field order.
    fn hmget(&mut self, key: &str, fields: &[&str]) -> RkvResult<Vec<Option<String>>> {
        let args = keyed(b"HMGET", key, fields.iter().map(|field| field.as_bytes()));
        self.exec(&args)?.into_optional_strings()
    }

    /// RPUSH. Returns the list length after the push.
    fn rpush(&mut self, key: &str, values: &[&str]) -> RkvResult<u64> {
        let args = keyed(b"RPUSH", key, values.iter().map(|value| value.as_bytes()));
        count(self.exec(&args)?.into_integer()?)
    }

    fn lpop(&mut self, key: &str) -> RkvResult<Option<String>> {
        self.exec(&[b"LPOP", key.as_bytes()])?.into_string()
    }

    fn rpop(&mut self, key: &str) -> RkvResult<Option<String>> {
        self.exec(&[b"RPOP", key.as_bytes()])?.into_string()
    }

    fn lindex(&mut self, key: &str, index: i64) -> RkvResult<Option<String>> {
        let index = index.to_string();
        self.exec(&[b"LINDEX", key.as_bytes(), index.as_bytes()])?.into_string()
    }

    /// LRANGE with the store's inclusive, negative-from-end indexing.
    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.exec(&[b"LRANGE", key.as_bytes(), start.as_bytes(), stop.as_bytes()])?
            .into_strings()
    }

    fn llen(&mut self, key: &str) -> RkvResult<u64> {
        count(self.exec(&[b"LLEN", key.as_bytes()])?.into_integer()?)
    }

    /// ZADD. Returns the number of members newly added.
    fn zadd(&mut self, key: &str, members: &[(&str, f64)]) -> RkvResult<u64> {
        let scores: Vec<String> = members.iter().map(|(_, score)| format_score(*score)).collect();
        let flat = members
            .iter()
            .zip(&scores)
            .flat_map(|((member, _), score)| [score.as_bytes(), member.as_bytes()]);
        let args = keyed(b"ZADD", key, flat);
        count(self.exec(&args)?.into_integer()?)
    }

    /// ZRANGE by rank, ascending score.
    fn zrange(&mut self, key: &str, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.exec(&[b"ZRANGE", key.as_bytes(), start.as_bytes(), stop.as_bytes()])?
            .into_strings()
    }

    /// ZREVRANGE by rank, descending score.
    fn zrevrange(&mut self, key: &str, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.exec(&[b"ZREVRANGE", key.as_bytes(), start.as_bytes(), stop.as_bytes()])?
            .into_strings()
    }

    /// ZRANK. `None` when the member is absent.
    fn zrank(&mut self, key: &str, member: &str) -> RkvResult<Option<u64>> {
        let rank = self
            .exec(&[b"ZRANK", key.as_bytes(), member.as_bytes()])?
            .into_optional_integer()?;
        rank.map(count).transpose()
    }

    /// ZREM. Returns the number of members removed.
    fn zrem(&mut self, key: &str, members: &[&str]) -> RkvResult<u64> {
        let args = keyed(b"ZREM", key, members.iter().map(|member| member.as_bytes()));
        count(self.exec(&args)?.into_integer()?)
    }

    fn zscore(&mut self, key: &str, member: &str) -> RkvResult<Option<f64>> {
        self.exec(&[b"ZSCORE", key.as_bytes(), member.as_bytes()])?.into_float()
    }

    /// ZINCRBY. Returns the member's new score.
    fn zincrby(&mut self, key: &str, delta: f64, member: &str) -> RkvResult<f64> {
        let delta = format_score(delta);
        self.exec(&[b"ZINCRBY", key.as_bytes(), delta.as_bytes(), member.as_bytes()])?
            .into_float()?
            .ok_or(RkvError::UnexpectedResponse)
    }

    /// ZCOUNT with score bounds in store syntax ("(1", "+inf", ...).
    fn zcount(&mut self, key: &str, min: &str, max: &str) -> RkvResult<u64> {
        count(
            self.exec(&[b"ZCOUNT", key.as_bytes(), min.as_bytes(), max.as_bytes()])?
                .into_integer()?,
        )
    }

    /// ZLEXCOUNT with lexicographic bounds in store syntax ("[a", "(b", "-", "+").
    fn zlexcount(&mut self, key: &str, min: &str, max: &str) -> RkvResult<u64> {
        count(
            self.exec(&[b"ZLEXCOUNT", key.as_bytes(), min.as_bytes(), max.as_bytes()])?
                .into_integer()?,
        )
    }

    fn zcard(&mut self, key: &str) -> RkvResult<u64> {
        count(self.exec(&[b"ZCARD", key.as_bytes()])?.into_integer()?)
    }

    fn ping(&mut self) -> RkvResult<String> {
        self.exec(&[b"PING"])?
            .into_string()?
            .ok_or(RkvError::UnexpectedResponse)
    }
}

impl<T: RawCommand + ?Sized> Commands for T {}

/// Formats a score the way the store accepts it.
pub fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

// Builds `[name, key, rest...]`.
pub(crate) fn keyed<'a>(
    name: &'static [u8],
    key: &'a str,
    rest: impl IntoIterator<Item = &'a [u8]>,
) -> Vec<&'a [u8]> {
    let mut args = vec![name, key.as_bytes()];
    args.extend(rest);
    args
}

pub(crate) fn count(value: i64) -> RkvResult<u64> {
    u64::try_from(value).map_err(|_| RkvError::UnexpectedResponse)
}
