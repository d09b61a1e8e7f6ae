//! # Multi-Key Commands
//!
//! Commands that touch more than one key (or no key at all) cannot be routed
//! to a single shard, so their availability depends on the executor:
//! the single-endpoint executor passes them through, the sharded executor
//! rejects them with `RkvError::Unsupported` before touching the pool.
//!
//! `MultiKeyCommand` is the closed list of such commands. `classify` also
//! lets the sharded connection refuse raw invocations of the same commands.

use rkv_common::{RespValue, RkvError, RkvResult};

use crate::commands::{count, keyed};
use crate::connection::RawCommand;
use crate::executor::Executor;

/// Cluster-unsafe commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiKeyCommand {
    Rename,
    RenameNx,
    RpopLpush,
    BrpopLpush,
    SDiff,
    SDiffStore,
    SInter,
    SInterStore,
    SUnion,
    SUnionStore,
    SMove,
    SortStore,
    ZInterStore,
    ZUnionStore,
    Publish,
    Subscribe,
    PSubscribe,
    Scan,
    RandomKey,
    BitOp,
    Watch,
    Unwatch,
    Keys,
    MGet,
    MSet,
    MSetNx,
    DelMany,
    BlPopMany,
    BrPopMany,
    PfMerge,
    PfCountMany,
}

impl MultiKeyCommand {
    /// Every cluster-unsafe command.
    pub const ALL: [MultiKeyCommand; 31] = [
        MultiKeyCommand::Rename,
        MultiKeyCommand::RenameNx,
        MultiKeyCommand::RpopLpush,
        MultiKeyCommand::BrpopLpush,
        MultiKeyCommand::SDiff,
        MultiKeyCommand::SDiffStore,
        MultiKeyCommand::SInter,
        MultiKeyCommand::SInterStore,
        MultiKeyCommand::SUnion,
        MultiKeyCommand::SUnionStore,
        MultiKeyCommand::SMove,
        MultiKeyCommand::SortStore,
        MultiKeyCommand::ZInterStore,
        MultiKeyCommand::ZUnionStore,
        MultiKeyCommand::Publish,
        MultiKeyCommand::Subscribe,
        MultiKeyCommand::PSubscribe,
        MultiKeyCommand::Scan,
        MultiKeyCommand::RandomKey,
        MultiKeyCommand::BitOp,
        MultiKeyCommand::Watch,
        MultiKeyCommand::Unwatch,
        MultiKeyCommand::Keys,
        MultiKeyCommand::MGet,
        MultiKeyCommand::MSet,
        MultiKeyCommand::MSetNx,
        MultiKeyCommand::DelMany,
        MultiKeyCommand::BlPopMany,
        MultiKeyCommand::BrPopMany,
        MultiKeyCommand::PfMerge,
        MultiKeyCommand::PfCountMany,
    ];

    /// Wire name of the command.
    pub const fn name(self) -> &'static str {
        match self {
            MultiKeyCommand::Rename => "RENAME",
            MultiKeyCommand::RenameNx => "RENAMENX",
            MultiKeyCommand::RpopLpush => "RPOPLPUSH",
            MultiKeyCommand::BrpopLpush => "BRPOPLPUSH",
            MultiKeyCommand::SDiff => "SDIFF",
            MultiKeyCommand::SDiffStore => "SDIFFSTORE",
            MultiKeyCommand::SInter => "SINTER",
            MultiKeyCommand::SInterStore => "SINTERSTORE",
            MultiKeyCommand::SUnion => "SUNION",
            MultiKeyCommand::SUnionStore => "SUNIONSTORE",
            MultiKeyCommand::SMove => "SMOVE",
            MultiKeyCommand::SortStore => "SORT",
            MultiKeyCommand::ZInterStore => "ZINTERSTORE",
            MultiKeyCommand::ZUnionStore => "ZUNIONSTORE",
            MultiKeyCommand::Publish => "PUBLISH",
            MultiKeyCommand::Subscribe => "SUBSCRIBE",
            MultiKeyCommand::PSubscribe => "PSUBSCRIBE",
            MultiKeyCommand::Scan => "SCAN",
            MultiKeyCommand::RandomKey => "RANDOMKEY",
            MultiKeyCommand::BitOp => "BITOP",
            MultiKeyCommand::Watch => "WATCH",
            MultiKeyCommand::Unwatch => "UNWATCH",
            MultiKeyCommand::Keys => "KEYS",
            MultiKeyCommand::MGet => "MGET",
            MultiKeyCommand::MSet => "MSET",
            MultiKeyCommand::MSetNx => "MSETNX",
            MultiKeyCommand::DelMany => "DEL",
            MultiKeyCommand::BlPopMany => "BLPOP",
            MultiKeyCommand::BrPopMany => "BRPOP",
            MultiKeyCommand::PfMerge => "PFMERGE",
            MultiKeyCommand::PfCountMany => "PFCOUNT",
        }
    }

    /// Classifies a raw command line.
    ///
    /// Commands that are only multi-key for some arities (DEL, PFCOUNT, BLPOP,
    /// BRPOP) or option sets (SORT ... STORE) are classified by their arguments.
    pub fn classify(args: &[&[u8]]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        let command = match name.as_str() {
            "DEL" if rest.len() > 1 => MultiKeyCommand::DelMany,
            "PFCOUNT" if rest.len() > 1 => MultiKeyCommand::PfCountMany,
            // Last argument is the timeout.
            "BLPOP" if rest.len() > 2 => MultiKeyCommand::BlPopMany,
            "BRPOP" if rest.len() > 2 => MultiKeyCommand::BrPopMany,
            "SORT" if rest.iter().any(|arg| arg.eq_ignore_ascii_case(b"STORE")) => {
                MultiKeyCommand::SortStore
            }
            "DEL" | "PFCOUNT" | "BLPOP" | "BRPOP" | "SORT" => return None,
            other => return Self::ALL.into_iter().find(|command| command.name() == other),
        };
        Some(command)
    }
}

/// Typed multi-key surface for any executor.
///
/// On a sharded executor every method fails with `RkvError::Unsupported`.
pub trait MultiKeyOps: Executor {
    fn rename(&self, old_key: &str, new_key: &str) -> RkvResult<()> {
        self.execute_multi(MultiKeyCommand::Rename, |conn| {
            conn.exec(&[b"RENAME", old_key.as_bytes(), new_key.as_bytes()])?
                .into_ok()
        })
    }

    /// Returns true when the key was renamed.
    fn renamenx(&self, old_key: &str, new_key: &str) -> RkvResult<bool> {
        self.execute_multi(MultiKeyCommand::RenameNx, |conn| {
            Ok(conn
                .exec(&[b"RENAMENX", old_key.as_bytes(), new_key.as_bytes()])?
                .into_integer()?
                == 1)
        })
    }

    fn rpoplpush(&self, source: &str, destination: &str) -> RkvResult<Option<String>> {
        self.execute_multi(MultiKeyCommand::RpopLpush, |conn| {
            conn.exec(&[b"RPOPLPUSH", source.as_bytes(), destination.as_bytes()])?
                .into_string()
        })
    }

    fn sdiff(&self, keys: &[&str]) -> RkvResult<Vec<String>> {
        self.execute_multi(MultiKeyCommand::SDiff, |conn| {
            conn.exec(&command(b"SDIFF", keys))?.into_strings()
        })
    }

    fn sdiffstore(&self, destination: &str, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::SDiffStore, |conn| {
            count(conn.exec(&store(b"SDIFFSTORE", destination, keys))?.into_integer()?)
        })
    }

    fn sinter(&self, keys: &[&str]) -> RkvResult<Vec<String>> {
        self.execute_multi(MultiKeyCommand::SInter, |conn| {
            conn.exec(&command(b"SINTER", keys))?.into_strings()
        })
    }

    fn sinterstore(&self, destination: &str, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::SInterStore, |conn| {
            count(conn.exec(&store(b"SINTERSTORE", destination, keys))?.into_integer()?)
        })
    }

    fn sunion(&self, keys: &[&str]) -> RkvResult<Vec<String>> {
        self.execute_multi(MultiKeyCommand::SUnion, |conn| {
            conn.exec(&command(b"SUNION", keys))?.into_strings()
        })
    }

    fn sunionstore(&self, destination: &str, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::SUnionStore, |conn| {
            count(conn.exec(&store(b"SUNIONSTORE", destination, keys))?.into_integer()?)
        })
    }

    /// Returns true when the member was moved.
    fn smove(&self, source: &str, destination: &str, member: &str) -> RkvResult<bool> {
        self.execute_multi(MultiKeyCommand::SMove, |conn| {
            let args: [&[u8]; 4] = [
                b"SMOVE",
                source.as_bytes(),
                destination.as_bytes(),
                member.as_bytes(),
            ];
            Ok(conn.exec(&args)?.into_integer()? == 1)
        })
    }

    /// SORT key STORE destination. Returns the stored length.
    fn sort_store(&self, key: &str, destination: &str) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::SortStore, |conn| {
            let args: [&[u8]; 4] = [b"SORT", key.as_bytes(), b"STORE", destination.as_bytes()];
            count(conn.exec(&args)?.into_integer()?)
        })
    }

    fn zinterstore(&self, destination: &str, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::ZInterStore, |conn| {
            count(conn.exec(&numbered(b"ZINTERSTORE", destination, keys).refs())?.into_integer()?)
        })
    }

    fn zunionstore(&self, destination: &str, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::ZUnionStore, |conn| {
            count(conn.exec(&numbered(b"ZUNIONSTORE", destination, keys).refs())?.into_integer()?)
        })
    }

    /// Returns the number of subscribers that received the message.
    fn publish(&self, channel: &str, message: &str) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::Publish, |conn| {
            count(
                conn.exec(&[b"PUBLISH", channel.as_bytes(), message.as_bytes()])?
                    .into_integer()?,
            )
        })
    }

    /// One SCAN step. Returns the next cursor (0 when done) and the keys.
    fn scan(&self, cursor: u64) -> RkvResult<(u64, Vec<String>)> {
        self.execute_multi(MultiKeyCommand::Scan, |conn| {
            let cursor = cursor.to_string();
            match conn.exec(&[b"SCAN", cursor.as_bytes()])? {
                RespValue::Array(mut parts) if parts.len() == 2 => {
                    let keys = parts.pop().map(RespValue::into_strings).transpose()?;
                    let next = parts
                        .pop()
                        .map(RespValue::into_string)
                        .transpose()?
                        .flatten()
                        .and_then(|raw| raw.parse::<u64>().ok());
                    match (next, keys) {
                        (Some(next), Some(keys)) => Ok((next, keys)),
                        _ => Err(RkvError::UnexpectedResponse),
                    }
                }
                RespValue::Error(message) => {
                    Err(RkvError::Server(String::from_utf8_lossy(&message).into_owned()))
                }
                _ => Err(RkvError::UnexpectedResponse),
            }
        })
    }

    fn randomkey(&self) -> RkvResult<Option<String>> {
        self.execute_multi(MultiKeyCommand::RandomKey, |conn| {
            conn.exec(&[b"RANDOMKEY"])?.into_string()
        })
    }

    /// BITOP operation destination sources... Returns the destination length.
    fn bitop(&self, operation: &str, destination: &str, sources: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::BitOp, |conn| {
            let mut args = keyed(b"BITOP", operation, [destination.as_bytes()]);
            args.extend(sources.iter().map(|key| key.as_bytes()));
            count(conn.exec(&args)?.into_integer()?)
        })
    }

    fn watch(&self, keys: &[&str]) -> RkvResult<()> {
        self.execute_multi(MultiKeyCommand::Watch, |conn| {
            conn.exec(&command(b"WATCH", keys))?.into_ok()
        })
    }

    fn unwatch(&self) -> RkvResult<()> {
        self.execute_multi(MultiKeyCommand::Unwatch, |conn| {
            conn.exec(&[b"UNWATCH"])?.into_ok()
        })
    }

    fn keys(&self, pattern: &str) -> RkvResult<Vec<String>> {
        self.execute_multi(MultiKeyCommand::Keys, |conn| {
            conn.exec(&[b"KEYS", pattern.as_bytes()])?.into_strings()
        })
    }

    /// MGET. The reply preserves key order; missing keys are `None`.
    fn mget(&self, keys: &[&str]) -> RkvResult<Vec<Option<String>>> {
        self.execute_multi(MultiKeyCommand::MGet, |conn| {
            conn.exec(&command(b"MGET", keys))?.into_optional_strings()
        })
    }

    fn mset(&self, pairs: &[(&str, &str)]) -> RkvResult<()> {
        self.execute_multi(MultiKeyCommand::MSet, |conn| {
            conn.exec(&pairwise(b"MSET", pairs))?.into_ok()
        })
    }

    /// Returns true when every key was written (none existed).
    fn msetnx(&self, pairs: &[(&str, &str)]) -> RkvResult<bool> {
        self.execute_multi(MultiKeyCommand::MSetNx, |conn| {
            Ok(conn.exec(&pairwise(b"MSETNX", pairs))?.into_integer()? == 1)
        })
    }

    /// DEL of several keys. Returns the number removed.
    fn del_many(&self, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::DelMany, |conn| {
            count(conn.exec(&command(b"DEL", keys))?.into_integer()?)
        })
    }

    fn pfmerge(&self, destination: &str, sources: &[&str]) -> RkvResult<()> {
        self.execute_multi(MultiKeyCommand::PfMerge, |conn| {
            conn.exec(&store(b"PFMERGE", destination, sources))?.into_ok()
        })
    }

    /// Approximate cardinality of the union of several HyperLogLogs.
    fn pfcount(&self, keys: &[&str]) -> RkvResult<u64> {
        self.execute_multi(MultiKeyCommand::PfCountMany, |conn| {
            count(conn.exec(&command(b"PFCOUNT", keys))?.into_integer()?)
        })
    }
}

impl<E: Executor> MultiKeyOps for E {}

fn command<'a>(name: &'static [u8], keys: &[&'a str]) -> Vec<&'a [u8]> {
    let mut args = vec![name];
    args.extend(keys.iter().map(|key| key.as_bytes()));
    args
}

fn store<'a>(name: &'static [u8], destination: &'a str, keys: &[&'a str]) -> Vec<&'a [u8]> {
    keyed(name, destination, keys.iter().map(|key| key.as_bytes()))
}

fn pairwise<'a>(name: &'static [u8], pairs: &[(&'a str, &'a str)]) -> Vec<&'a [u8]> {
    let mut args = vec![name];
    args.extend(
        pairs
            .iter()
            .flat_map(|(key, value)| [key.as_bytes(), value.as_bytes()]),
    );
    args
}

// ZINTERSTORE/ZUNIONSTORE carry a key count before the keys.
struct Numbered<'a> {
    name: &'static [u8],
    destination: &'a str,
    count: String,
    keys: Vec<&'a str>,
}

impl<'a> Numbered<'a> {
    fn refs(&self) -> Vec<&[u8]> {
        let mut args: Vec<&[u8]> = vec![self.name, self.destination.as_bytes(), self.count.as_bytes()];
        args.extend(self.keys.iter().map(|key| key.as_bytes()));
        args
    }
}

fn numbered<'a>(name: &'static [u8], destination: &'a str, keys: &[&'a str]) -> Numbered<'a> {
    Numbered {
        name,
        destination,
        count: keys.len().to_string(),
        keys: keys.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_name_case_insensitively() {
        assert_eq!(
            MultiKeyCommand::classify(&[b"rename", b"a", b"b"]),
            Some(MultiKeyCommand::Rename)
        );
        assert_eq!(
            MultiKeyCommand::classify(&[b"SInterStore", b"d", b"a", b"b"]),
            Some(MultiKeyCommand::SInterStore)
        );
        assert_eq!(MultiKeyCommand::classify(&[b"GET", b"a"]), None);
    }

    #[test]
    fn arity_dependent_commands() {
        assert_eq!(MultiKeyCommand::classify(&[b"DEL", b"a"]), None);
        assert_eq!(
            MultiKeyCommand::classify(&[b"DEL", b"a", b"b"]),
            Some(MultiKeyCommand::DelMany)
        );
        assert_eq!(MultiKeyCommand::classify(&[b"BLPOP", b"a", b"0"]), None);
        assert_eq!(
            MultiKeyCommand::classify(&[b"BLPOP", b"a", b"b", b"0"]),
            Some(MultiKeyCommand::BlPopMany)
        );
        assert_eq!(MultiKeyCommand::classify(&[b"SORT", b"a", b"ALPHA"]), None);
        assert_eq!(
            MultiKeyCommand::classify(&[b"SORT", b"a", b"store", b"b"]),
            Some(MultiKeyCommand::SortStore)
        );
    }

    #[test]
    fn every_command_round_trips_through_its_name() {
        for command in MultiKeyCommand::ALL {
            match command {
                // Arity-dependent; covered above.
                MultiKeyCommand::DelMany
                | MultiKeyCommand::PfCountMany
                | MultiKeyCommand::BlPopMany
                | MultiKeyCommand::BrPopMany
                | MultiKeyCommand::SortStore => continue,
                _ => {}
            }
            let name = command.name().as_bytes();
            assert_eq!(MultiKeyCommand::classify(&[name, b"k"]), Some(command));
        }
    }
}
