//! # In-Process Store
//!
//! Purpose: Interpret the store's command protocol in memory so executors,
//! the cache facade and collection proxies run without a network peer.
//!
//! ## Design Principles
//! 1. **Same Replies**: Handlers answer with the `RespValue` a real node
//!    would send, including `-WRONGTYPE` and `-ERR` replies.
//! 2. **Lazy Expiry**: Expired keys are dropped when a command touches them.
//! 3. **No Empty Collections**: A hash, list or sorted set that loses its
//!    last element removes its key.
//! 4. **Logical Databases**: Sixteen independent keyspaces; each connection
//!    tracks its own selection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use rkv_common::{RespValue, RkvResult};

use crate::config::PoolConfig;
use crate::connection::RawCommand;
use crate::executor::SingleExecutor;
use crate::pool::ManageConnection;
use crate::sharded::ShardedExecutor;

type Database = HashMap<Vec<u8>, Entry>;
type Reply = Result<RespValue, RespValue>;

enum Stored {
    Str(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    ZSet(HashMap<Vec<u8>, f64>),
}

impl Stored {
    fn as_str(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Stored::Str(value) => Some(value),
            _ => None,
        }
    }

    fn as_hash(&mut self) -> Option<&mut HashMap<Vec<u8>, Vec<u8>>> {
        match self {
            Stored::Hash(map) => Some(map),
            _ => None,
        }
    }

    fn as_list(&mut self) -> Option<&mut VecDeque<Vec<u8>>> {
        match self {
            Stored::List(list) => Some(list),
            _ => None,
        }
    }

    fn as_zset(&mut self) -> Option<&mut HashMap<Vec<u8>, f64>> {
        match self {
            Stored::ZSet(set) => Some(set),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Stored::Str(_) => "string",
            Stored::Hash(_) => "hash",
            Stored::List(_) => "list",
            Stored::ZSet(_) => "zset",
        }
    }
}

struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Stored) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Shared in-memory keyspace.
pub struct MemoryStore {
    databases: Mutex<Vec<Database>>,
}

impl MemoryStore {
    /// Number of logical databases.
    pub const DATABASES: u32 = 16;

    pub fn new() -> Self {
        let databases = (0..Self::DATABASES).map(|_| Database::new()).collect();
        MemoryStore {
            databases: Mutex::new(databases),
        }
    }

    /// Runs one command against `database` and returns the reply.
    pub fn execute(&self, database: u32, args: &[&[u8]]) -> RespValue {
        let mut databases = self.databases.lock();
        let Some(db) = databases.get_mut(database as usize) else {
            return RespValue::error("ERR DB index is out of range");
        };
        if let Some(name) = args.first() {
            trace!(database, command = %String::from_utf8_lossy(name), "memory store command");
        }
        dispatch(db, args).unwrap_or_else(|reply| reply)
    }

    /// Number of live keys in `database`.
    pub fn key_count(&self, database: u32) -> usize {
        let databases = self.databases.lock();
        databases
            .get(database as usize)
            .map_or(0, |db| db.values().filter(|entry| !entry.is_expired()).count())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

fn dispatch(db: &mut Database, args: &[&[u8]]) -> Reply {
    let Some(name) = args.first() else {
        return Err(RespValue::error("ERR empty command"));
    };

    match name.to_ascii_uppercase().as_slice() {
        b"PING" => handle_ping(args),
        b"FLUSHDB" => {
            db.clear();
            Ok(RespValue::ok())
        }
        b"DBSIZE" => {
            db.retain(|_, entry| !entry.is_expired());
            Ok(integer(db.len()))
        }
        b"GET" => handle_get(db, args),
        b"SET" => handle_set(db, args),
        b"SETNX" => handle_setnx(db, args),
        b"SETEX" => handle_setex(db, args),
        b"INCR" => handle_incr_by(db, args, 1),
        b"DECR" => handle_incr_by(db, args, -1),
        b"EXPIRE" => handle_expire(db, args),
        b"TTL" => handle_ttl(db, args),
        b"EXISTS" => handle_exists(db, args),
        b"TYPE" => handle_type(db, args),
        b"DEL" => handle_del(db, args),
        b"MGET" => handle_mget(db, args),
        b"MSET" => handle_mset(db, args),
        b"MSETNX" => handle_msetnx(db, args),
        b"RENAME" => handle_rename(db, args, false),
        b"RENAMENX" => handle_rename(db, args, true),
        b"KEYS" => handle_keys(db, args),
        b"HGET" => handle_hget(db, args),
        b"HSET" => handle_hset(db, args),
        b"HMSET" => handle_hset(db, args).map(|_| RespValue::ok()),
        b"HMGET" => handle_hmget(db, args),
        b"HDEL" => handle_hdel(db, args),
        b"RPUSH" => handle_rpush(db, args),
        b"LPOP" => handle_pop(db, args, true),
        b"RPOP" => handle_pop(db, args, false),
        b"RPOPLPUSH" => handle_rpoplpush(db, args),
        b"LINDEX" => handle_lindex(db, args),
        b"LRANGE" => handle_lrange(db, args),
        b"LLEN" => handle_llen(db, args),
        b"ZADD" => handle_zadd(db, args),
        b"ZRANGE" => handle_zrange(db, args, false),
        b"ZREVRANGE" => handle_zrange(db, args, true),
        b"ZRANK" => handle_zrank(db, args),
        b"ZREM" => handle_zrem(db, args),
        b"ZSCORE" => handle_zscore(db, args),
        b"ZINCRBY" => handle_zincrby(db, args),
        b"ZCOUNT" => handle_zcount(db, args),
        b"ZLEXCOUNT" => handle_zlexcount(db, args),
        b"ZCARD" => handle_zcard(db, args),
        _ => Err(RespValue::error(format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(name)
        ))),
    }
}

fn handle_ping(args: &[&[u8]]) -> Reply {
    match args.len() {
        1 => Ok(RespValue::Simple(b"PONG".to_vec())),
        2 => Ok(RespValue::bulk(args[1])),
        _ => Err(wrong_arity(args)),
    }
}

fn handle_get(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    Ok(RespValue::Bulk(lookup(db, args[1], Stored::as_str)?.cloned()))
}

fn handle_set(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3)?;
    let mut ttl = None;
    let mut only_new = false;
    let mut options = args[3..].iter();
    while let Some(option) = options.next() {
        if option.eq_ignore_ascii_case(b"NX") {
            only_new = true;
        } else if option.eq_ignore_ascii_case(b"EX") || option.eq_ignore_ascii_case(b"PX") {
            let raw = options.next().ok_or_else(syntax_error)?;
            let amount = positive(parse_int(raw)?, "set")?;
            ttl = Some(if option.eq_ignore_ascii_case(b"EX") {
                Duration::from_secs(amount)
            } else {
                Duration::from_millis(amount)
            });
        } else {
            return Err(syntax_error());
        }
    }

    purge(db, args[1]);
    if only_new && db.contains_key(args[1]) {
        return Ok(RespValue::Bulk(None));
    }
    write_string(db, args[1], args[2], ttl);
    Ok(RespValue::ok())
}

fn handle_setnx(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    purge(db, args[1]);
    if db.contains_key(args[1]) {
        return Ok(RespValue::Integer(0));
    }
    write_string(db, args[1], args[2], None);
    Ok(RespValue::Integer(1))
}

fn handle_setex(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 4)?;
    let seconds = positive(parse_int(args[2])?, "setex")?;
    write_string(db, args[1], args[3], Some(Duration::from_secs(seconds)));
    Ok(RespValue::ok())
}

fn handle_incr_by(db: &mut Database, args: &[&[u8]], delta: i64) -> Reply {
    arity(args, args.len() == 2)?;
    let current = match lookup(db, args[1], Stored::as_str)? {
        Some(raw) => parse_int(raw)?,
        None => 0,
    };
    let next = current.checked_add(delta).ok_or_else(not_an_integer)?;
    let encoded = next.to_string().into_bytes();
    match lookup(db, args[1], Stored::as_str)? {
        // Keep any expiry already attached.
        Some(value) => *value = encoded,
        None => write_string(db, args[1], &encoded, None),
    }
    Ok(RespValue::Integer(next))
}

fn handle_expire(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    let seconds = parse_int(args[2])?;
    if live(db, args[1]).is_none() {
        return Ok(RespValue::Integer(0));
    }
    if seconds <= 0 {
        db.remove(args[1]);
        return Ok(RespValue::Integer(1));
    }
    if let Some(entry) = db.get_mut(args[1]) {
        entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds as u64));
    }
    Ok(RespValue::Integer(1))
}

fn handle_ttl(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    let reply = match live(db, args[1]) {
        None => -2,
        Some(Entry {
            expires_at: None, ..
        }) => -1,
        Some(Entry {
            expires_at: Some(at),
            ..
        }) => {
            let remaining = at.saturating_duration_since(Instant::now());
            ((remaining.as_millis() + 500) / 1000) as i64
        }
    };
    Ok(RespValue::Integer(reply))
}

fn handle_exists(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 2)?;
    let found = args[1..]
        .iter()
        .filter(|key| live(db, key).is_some())
        .count();
    Ok(integer(found))
}

fn handle_type(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    let name = live(db, args[1]).map_or("none", |entry| entry.value.type_name());
    Ok(RespValue::Simple(name.as_bytes().to_vec()))
}

fn handle_del(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 2)?;
    let mut removed = 0;
    for key in &args[1..] {
        if live(db, key).is_some() {
            db.remove(*key);
            removed += 1;
        }
    }
    Ok(integer(removed))
}

fn handle_mget(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 2)?;
    let values = args[1..]
        .iter()
        .map(|key| match live(db, key) {
            Some(Entry {
                value: Stored::Str(value),
                ..
            }) => RespValue::bulk(value.clone()),
            _ => RespValue::Bulk(None),
        })
        .collect();
    Ok(RespValue::Array(values))
}

fn handle_mset(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3 && args.len() % 2 == 1)?;
    for pair in args[1..].chunks(2) {
        write_string(db, pair[0], pair[1], None);
    }
    Ok(RespValue::ok())
}

fn handle_msetnx(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3 && args.len() % 2 == 1)?;
    if args[1..].chunks(2).any(|pair| live(db, pair[0]).is_some()) {
        return Ok(RespValue::Integer(0));
    }
    for pair in args[1..].chunks(2) {
        write_string(db, pair[0], pair[1], None);
    }
    Ok(RespValue::Integer(1))
}

fn handle_rename(db: &mut Database, args: &[&[u8]], only_new: bool) -> Reply {
    arity(args, args.len() == 3)?;
    if live(db, args[1]).is_none() {
        return Err(RespValue::error("ERR no such key"));
    }
    if only_new && live(db, args[2]).is_some() {
        return Ok(RespValue::Integer(0));
    }
    if let Some(entry) = db.remove(args[1]) {
        db.insert(args[2].to_vec(), entry);
    }
    Ok(if only_new {
        RespValue::Integer(1)
    } else {
        RespValue::ok()
    })
}

fn handle_keys(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    db.retain(|_, entry| !entry.is_expired());
    let mut keys: Vec<&Vec<u8>> = db.keys().filter(|key| glob_match(args[1], key)).collect();
    keys.sort();
    Ok(RespValue::Array(
        keys.into_iter().map(|key| RespValue::bulk(key.clone())).collect(),
    ))
}

fn handle_hget(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    let value = lookup(db, args[1], Stored::as_hash)?.and_then(|map| map.get(args[2]).cloned());
    Ok(RespValue::Bulk(value))
}

fn handle_hset(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 4 && args.len() % 2 == 0)?;
    let map = lookup_or_insert(db, args[1], || Stored::Hash(HashMap::new()), Stored::as_hash)?;
    let created = args[2..]
        .chunks(2)
        .filter(|pair| map.insert(pair[0].to_vec(), pair[1].to_vec()).is_none())
        .count();
    Ok(integer(created))
}

fn handle_hmget(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3)?;
    let map = lookup(db, args[1], Stored::as_hash)?;
    let values = args[2..]
        .iter()
        .map(|field| RespValue::Bulk(map.as_ref().and_then(|map| map.get(*field).cloned())))
        .collect();
    Ok(RespValue::Array(values))
}

fn handle_hdel(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3)?;
    let Some(map) = lookup(db, args[1], Stored::as_hash)? else {
        return Ok(RespValue::Integer(0));
    };
    let removed = args[2..]
        .iter()
        .filter(|field| map.remove(**field).is_some())
        .count();
    let now_empty = map.is_empty();
    if now_empty {
        db.remove(args[1]);
    }
    Ok(integer(removed))
}

fn handle_rpush(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3)?;
    let list = lookup_or_insert(db, args[1], || Stored::List(VecDeque::new()), Stored::as_list)?;
    list.extend(args[2..].iter().map(|value| value.to_vec()));
    Ok(integer(list.len()))
}

fn handle_pop(db: &mut Database, args: &[&[u8]], front: bool) -> Reply {
    arity(args, args.len() == 2)?;
    Ok(RespValue::Bulk(pop(db, args[1], front)?))
}

fn handle_rpoplpush(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    // Type-check the destination before moving anything.
    lookup(db, args[2], Stored::as_list)?;
    let Some(value) = pop(db, args[1], false)? else {
        return Ok(RespValue::Bulk(None));
    };
    let list = lookup_or_insert(db, args[2], || Stored::List(VecDeque::new()), Stored::as_list)?;
    list.push_front(value.clone());
    Ok(RespValue::bulk(value))
}

fn handle_lindex(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    let index = parse_int(args[2])?;
    let value = lookup(db, args[1], Stored::as_list)?.and_then(|list| {
        let position = if index < 0 {
            list.len() as i64 + index
        } else {
            index
        };
        usize::try_from(position)
            .ok()
            .and_then(|position| list.get(position).cloned())
    });
    Ok(RespValue::Bulk(value))
}

fn handle_lrange(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 4)?;
    let (start, stop) = (parse_int(args[2])?, parse_int(args[3])?);
    let items = match lookup(db, args[1], Stored::as_list)? {
        Some(list) => match rank_window(list.len(), start, stop) {
            Some((first, last)) => list
                .range(first..=last)
                .map(|item| RespValue::bulk(item.clone()))
                .collect(),
            None => Vec::new(),
        },
        None => Vec::new(),
    };
    Ok(RespValue::Array(items))
}

fn handle_llen(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    Ok(integer(lookup(db, args[1], Stored::as_list)?.map_or(0, |list| list.len())))
}

fn handle_zadd(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 4 && args.len() % 2 == 0)?;
    let mut pairs = Vec::with_capacity(args.len() / 2 - 1);
    for pair in args[2..].chunks(2) {
        pairs.push((parse_float(pair[0])?, pair[1]));
    }
    let set = lookup_or_insert(db, args[1], || Stored::ZSet(HashMap::new()), Stored::as_zset)?;
    let added = pairs
        .into_iter()
        .filter(|(score, member)| set.insert(member.to_vec(), *score).is_none())
        .count();
    Ok(integer(added))
}

fn handle_zrange(db: &mut Database, args: &[&[u8]], reverse: bool) -> Reply {
    arity(args, args.len() == 4)?;
    let (start, stop) = (parse_int(args[2])?, parse_int(args[3])?);
    let Some(set) = lookup(db, args[1], Stored::as_zset)? else {
        return Ok(RespValue::Array(Vec::new()));
    };
    let mut members = ordered(set);
    if reverse {
        members.reverse();
    }
    let items = match rank_window(members.len(), start, stop) {
        Some((first, last)) => members[first..=last]
            .iter()
            .map(|(member, _)| RespValue::bulk(member.clone()))
            .collect(),
        None => Vec::new(),
    };
    Ok(RespValue::Array(items))
}

fn handle_zrank(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    let rank = lookup(db, args[1], Stored::as_zset)?.and_then(|set| {
        ordered(set)
            .iter()
            .position(|(member, _)| member.as_slice() == args[2])
    });
    Ok(rank.map_or(RespValue::Bulk(None), integer))
}

fn handle_zrem(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() >= 3)?;
    let Some(set) = lookup(db, args[1], Stored::as_zset)? else {
        return Ok(RespValue::Integer(0));
    };
    let removed = args[2..]
        .iter()
        .filter(|member| set.remove(**member).is_some())
        .count();
    let now_empty = set.is_empty();
    if now_empty {
        db.remove(args[1]);
    }
    Ok(integer(removed))
}

fn handle_zscore(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 3)?;
    let score = lookup(db, args[1], Stored::as_zset)?.and_then(|set| set.get(args[2]).copied());
    Ok(RespValue::Bulk(score.map(|score| score.to_string().into_bytes())))
}

fn handle_zincrby(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 4)?;
    let delta = parse_float(args[2])?;
    let set = lookup_or_insert(db, args[1], || Stored::ZSet(HashMap::new()), Stored::as_zset)?;
    let score = set.entry(args[3].to_vec()).or_insert(0.0);
    *score += delta;
    Ok(RespValue::bulk(score.to_string()))
}

fn handle_zcount(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 4)?;
    let (min, max) = (ScoreBound::parse(args[2])?, ScoreBound::parse(args[3])?);
    let counted = lookup(db, args[1], Stored::as_zset)?.map_or(0, |set| {
        set.values()
            .filter(|score| min.admits_from_below(**score) && max.admits_from_above(**score))
            .count()
    });
    Ok(integer(counted))
}

fn handle_zlexcount(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 4)?;
    let (min, max) = (LexBound::parse(args[2])?, LexBound::parse(args[3])?);
    let counted = lookup(db, args[1], Stored::as_zset)?.map_or(0, |set| {
        set.keys()
            .filter(|member| min.admits_from_below(member) && max.admits_from_above(member))
            .count()
    });
    Ok(integer(counted))
}

fn handle_zcard(db: &mut Database, args: &[&[u8]]) -> Reply {
    arity(args, args.len() == 2)?;
    Ok(integer(lookup(db, args[1], Stored::as_zset)?.map_or(0, |set| set.len())))
}

struct ScoreBound {
    value: f64,
    exclusive: bool,
}

impl ScoreBound {
    fn parse(raw: &[u8]) -> Result<Self, RespValue> {
        let invalid = || RespValue::error("ERR min or max is not a float");
        let (exclusive, rest) = match raw.split_first() {
            Some((b'(', rest)) => (true, rest),
            _ => (false, raw),
        };
        let value = parse_float(rest).map_err(|_| invalid())?;
        Ok(ScoreBound { value, exclusive })
    }

    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

enum LexBound {
    Lowest,
    Highest,
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
}

impl LexBound {
    fn parse(raw: &[u8]) -> Result<Self, RespValue> {
        match raw.split_first() {
            Some((b'-', [])) => Ok(LexBound::Lowest),
            Some((b'+', [])) => Ok(LexBound::Highest),
            Some((b'[', rest)) => Ok(LexBound::Inclusive(rest.to_vec())),
            Some((b'(', rest)) => Ok(LexBound::Exclusive(rest.to_vec())),
            _ => Err(RespValue::error("ERR min or max not valid string range item")),
        }
    }

    fn admits_from_below(&self, member: &[u8]) -> bool {
        match self {
            LexBound::Lowest => true,
            LexBound::Highest => false,
            LexBound::Inclusive(bound) => member >= bound.as_slice(),
            LexBound::Exclusive(bound) => member > bound.as_slice(),
        }
    }

    fn admits_from_above(&self, member: &[u8]) -> bool {
        match self {
            LexBound::Lowest => false,
            LexBound::Highest => true,
            LexBound::Inclusive(bound) => member <= bound.as_slice(),
            LexBound::Exclusive(bound) => member < bound.as_slice(),
        }
    }
}

// Sorted by (score, member), the store's ordering for equal scores.
fn ordered(set: &HashMap<Vec<u8>, f64>) -> Vec<(Vec<u8>, f64)> {
    let mut members: Vec<(Vec<u8>, f64)> = set
        .iter()
        .map(|(member, score)| (member.clone(), *score))
        .collect();
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
}

// Inclusive rank window with negative-from-end indexes; None when empty.
fn rank_window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn pop(db: &mut Database, key: &[u8], front: bool) -> Result<Option<Vec<u8>>, RespValue> {
    let Some(list) = lookup(db, key, Stored::as_list)? else {
        return Ok(None);
    };
    let value = if front {
        list.pop_front()
    } else {
        list.pop_back()
    };
    let now_empty = list.is_empty();
    if now_empty {
        db.remove(key);
    }
    Ok(value)
}

fn write_string(db: &mut Database, key: &[u8], value: &[u8], ttl: Option<Duration>) {
    let mut entry = Entry::new(Stored::Str(value.to_vec()));
    entry.expires_at = ttl.map(|ttl| Instant::now() + ttl);
    db.insert(key.to_vec(), entry);
}

fn purge(db: &mut Database, key: &[u8]) {
    if db.get(key).is_some_and(Entry::is_expired) {
        db.remove(key);
    }
}

fn live<'a>(db: &'a mut Database, key: &[u8]) -> Option<&'a mut Entry> {
    purge(db, key);
    db.get_mut(key)
}

fn lookup<'a, T>(
    db: &'a mut Database,
    key: &[u8],
    project: fn(&mut Stored) -> Option<&mut T>,
) -> Result<Option<&'a mut T>, RespValue> {
    match live(db, key) {
        None => Ok(None),
        Some(entry) => project(&mut entry.value).map(Some).ok_or_else(wrong_type),
    }
}

fn lookup_or_insert<'a, T>(
    db: &'a mut Database,
    key: &[u8],
    empty: fn() -> Stored,
    project: fn(&mut Stored) -> Option<&mut T>,
) -> Result<&'a mut T, RespValue> {
    purge(db, key);
    let entry = db
        .entry(key.to_vec())
        .or_insert_with(|| Entry::new(empty()));
    project(&mut entry.value).ok_or_else(wrong_type)
}

// Glob with `*` and `?`; no character classes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((byte, rest)) => text.first() == Some(byte) && glob_match(rest, &text[1..]),
    }
}

fn arity(args: &[&[u8]], valid: bool) -> Result<(), RespValue> {
    if valid {
        Ok(())
    } else {
        Err(wrong_arity(args))
    }
}

fn wrong_arity(args: &[&[u8]]) -> RespValue {
    let name = args
        .first()
        .map(|name| String::from_utf8_lossy(name).to_ascii_lowercase())
        .unwrap_or_default();
    RespValue::error(format!("ERR wrong number of arguments for '{name}' command"))
}

fn wrong_type() -> RespValue {
    RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn syntax_error() -> RespValue {
    RespValue::error("ERR syntax error")
}

fn not_an_integer() -> RespValue {
    RespValue::error("ERR value is not an integer or out of range")
}

fn positive(value: i64, command: &str) -> Result<u64, RespValue> {
    u64::try_from(value)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| RespValue::error(format!("ERR invalid expire time in '{command}' command")))
}

fn parse_int(raw: &[u8]) -> Result<i64, RespValue> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(not_an_integer)
}

fn parse_float(raw: &[u8]) -> Result<f64, RespValue> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
        .ok_or_else(|| RespValue::error("ERR value is not a valid float"))
}

fn integer(value: usize) -> RespValue {
    RespValue::Integer(value as i64)
}

/// Connection to a `MemoryStore` with its own database selection.
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    database: u32,
}

impl MemoryConnection {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        MemoryConnection { store, database: 0 }
    }

    pub fn database(&self) -> u32 {
        self.database
    }
}

impl RawCommand for MemoryConnection {
    fn exec(&mut self, args: &[&[u8]]) -> RkvResult<RespValue> {
        match args {
            [name, index] if name.eq_ignore_ascii_case(b"SELECT") => {
                let index = std::str::from_utf8(index)
                    .ok()
                    .and_then(|text| text.parse::<u32>().ok());
                Ok(match index {
                    Some(index) if index < MemoryStore::DATABASES => {
                        self.database = index;
                        RespValue::ok()
                    }
                    Some(_) => RespValue::error("ERR DB index is out of range"),
                    None => not_an_integer(),
                })
            }
            _ => Ok(self.store.execute(self.database, args)),
        }
    }
}

/// Connection factory over one shared `MemoryStore`.
#[derive(Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        MemoryConnector { store }
    }
}

impl ManageConnection for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(&self) -> RkvResult<MemoryConnection> {
        Ok(MemoryConnection::new(Arc::clone(&self.store)))
    }
}

impl SingleExecutor<MemoryConnector> {
    /// Executor over an in-process store with default pool limits.
    pub fn in_memory(store: Arc<MemoryStore>, database: u32) -> Self {
        SingleExecutor::new(MemoryConnector::new(store), PoolConfig::default(), database)
    }
}

impl ShardedExecutor<MemoryConnector> {
    /// Executor over one in-process store per shard.
    pub fn in_memory(stores: Vec<Arc<MemoryStore>>) -> RkvResult<Self> {
        let shards = stores.into_iter().map(MemoryConnector::new).collect();
        ShardedExecutor::new(shards, PoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(store: &MemoryStore, args: &[&str]) -> RespValue {
        let args: Vec<&[u8]> = args.iter().map(|arg| arg.as_bytes()).collect();
        store.execute(0, &args)
    }

    #[test]
    fn strings_and_counters() {
        let store = MemoryStore::new();
        assert_eq!(run(&store, &["SET", "k", "v"]), RespValue::ok());
        assert_eq!(run(&store, &["GET", "k"]), RespValue::bulk("v"));
        assert_eq!(run(&store, &["SETNX", "k", "w"]), RespValue::Integer(0));
        assert_eq!(run(&store, &["INCR", "n"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["DECR", "n"]), RespValue::Integer(0));
        assert!(matches!(run(&store, &["INCR", "k"]), RespValue::Error(_)));
    }

    #[test]
    fn expiry_and_ttl() {
        let store = MemoryStore::new();
        run(&store, &["SETEX", "k", "10", "v"]);
        assert_eq!(run(&store, &["TTL", "k"]), RespValue::Integer(10));
        run(&store, &["SET", "p", "v"]);
        assert_eq!(run(&store, &["TTL", "p"]), RespValue::Integer(-1));
        assert_eq!(run(&store, &["TTL", "missing"]), RespValue::Integer(-2));

        run(&store, &["SET", "short", "v", "PX", "20"]);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(run(&store, &["GET", "short"]), RespValue::Bulk(None));
        assert_eq!(run(&store, &["EXISTS", "short"]), RespValue::Integer(0));

        assert_eq!(run(&store, &["EXPIRE", "p", "0"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["EXISTS", "p"]), RespValue::Integer(0));
    }

    #[test]
    fn wrong_type_is_reported() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "l", "a"]);
        let reply = run(&store, &["GET", "l"]);
        assert!(matches!(reply, RespValue::Error(msg) if msg.starts_with(b"WRONGTYPE")));
        assert_eq!(
            run(&store, &["TYPE", "l"]),
            RespValue::Simple(b"list".to_vec())
        );
    }

    #[test]
    fn lists_drop_key_when_empty() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "l", "a", "b", "c"]);
        assert_eq!(
            run(&store, &["LRANGE", "l", "-2", "-1"]),
            RespValue::Array(vec![RespValue::bulk("b"), RespValue::bulk("c")])
        );
        assert_eq!(run(&store, &["LINDEX", "l", "-1"]), RespValue::bulk("c"));
        assert_eq!(run(&store, &["LPOP", "l"]), RespValue::bulk("a"));
        assert_eq!(run(&store, &["RPOP", "l"]), RespValue::bulk("c"));
        assert_eq!(run(&store, &["RPOP", "l"]), RespValue::bulk("b"));
        assert_eq!(run(&store, &["EXISTS", "l"]), RespValue::Integer(0));
    }

    #[test]
    fn sorted_set_order_and_bounds() {
        let store = MemoryStore::new();
        run(&store, &["ZADD", "z", "2", "c", "1", "a", "2", "b"]);
        assert_eq!(
            run(&store, &["ZRANGE", "z", "0", "-1"]),
            RespValue::Array(vec![
                RespValue::bulk("a"),
                RespValue::bulk("b"),
                RespValue::bulk("c"),
            ])
        );
        assert_eq!(run(&store, &["ZRANK", "z", "c"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["ZCOUNT", "z", "(1", "+inf"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["ZLEXCOUNT", "z", "[b", "+"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["ZINCRBY", "z", "0.5", "a"]), RespValue::bulk("1.5"));
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match(b"user:*", b"user:1"));
        assert!(glob_match(b"?a*", b"xab"));
        assert!(!glob_match(b"user:?", b"user:10"));
    }

    #[test]
    fn databases_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let mut conn = MemoryConnection::new(Arc::clone(&store));
        conn.select(3).unwrap();
        conn.exec(&[b"SET", b"k", b"v"]).unwrap();
        assert_eq!(store.key_count(3), 1);
        assert_eq!(store.key_count(0), 0);
        assert!(conn.select(99).is_err());
    }
}
