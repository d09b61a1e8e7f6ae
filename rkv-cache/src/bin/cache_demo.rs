//! # Cache Demo
//!
//! Purpose: Walk through the facade end to end: cache-aside, the lock and
//! each collection proxy.
//!
//! Usage: `cache_demo [config.json]` (or `RKV_CONFIG=config.json`). Without a
//! configuration the demo runs against the in-process `MemoryStore`. Set
//! `RUST_LOG=debug` to see cache misses and lock attempts.

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rkv_cache::{CacheTemplate, Keyed, PushPop, Range, Sequence, Structured};
use rkv_client::{ClientConfig, Executor, MemoryStore, ShardedExecutor, SingleExecutor};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    id: u64,
    name: String,
    tags: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args().nth(1).or_else(|| env::var("RKV_CONFIG").ok());
    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading configuration {path}"))?;
            let config = ClientConfig::from_json(&raw)?;
            if config.is_sharded() {
                info!(endpoints = config.endpoints.len(), "using sharded executor");
                run(Arc::new(ShardedExecutor::connect(&config)?))
            } else {
                info!(database = config.database, "using single-endpoint executor");
                run(Arc::new(SingleExecutor::connect(&config)?))
            }
        }
        None => {
            info!("no configuration given, using in-memory store");
            let store = Arc::new(MemoryStore::new());
            run(Arc::new(SingleExecutor::in_memory(store, 0)))
        }
    }
}

fn run<E: Executor>(executor: Arc<E>) -> anyhow::Result<()> {
    let cache = CacheTemplate::new(executor);

    let mut lookups = 0;
    for _ in 0..2 {
        let profile: Profile =
            cache.cache_query_ex("demo:profile:7", Duration::from_secs(60), || {
                lookups += 1;
                Profile {
                    id: 7,
                    name: "ada".to_string(),
                    tags: vec!["admin".to_string()],
                }
            })?;
        info!(name = %profile.name, lookups, "profile");
    }
    info!(ttl = ?cache.ttl("demo:profile:7")?, "profile expiry");

    cache.set("demo:settings", Structured(vec![1, 2, 3]))?;
    let settings: Option<Vec<u32>> = cache.get_as("demo:settings")?;
    info!(?settings, "settings");

    if cache.lock("demo", "report", "daily")? {
        info!(held = cache.lock_exists("demo", "report", "daily")?, "lock acquired");
        let second = cache.lock("demo", "report", "daily")?;
        info!(second, "second attempt while held");
        cache.unlock("demo", "report", "daily")?;
    }

    let queue = cache.queue("demo:jobs");
    for job in ["a", "b", "c"] {
        queue.push(job)?;
    }
    while let Some(job) = queue.pop()? {
        info!(key = queue.key(), %job, "dequeued");
    }

    let stack = cache.stack("demo:undo");
    stack.push("first")?;
    stack.push("second")?;
    info!(top = ?stack.pop()?, "popped");

    let list = cache.list("demo:log");
    list.append("boot")?;
    list.append(42)?;
    info!(entries = ?list.slice(0, -1)?, length = list.length()?, "log");

    let map = cache.map("demo:user:7");
    map.put_all(&[("name", "ada"), ("lang", "en")])?;
    info!(fields = ?map.get_all(&["name", "lang", "missing"])?, "user fields");

    let board = cache.sorted_set("demo:board");
    board.add_all(&[("ada", 30.0), ("bob", 12.5), ("cy", 30.0)])?;
    board.increment_score("bob", 20.0)?;
    info!(
        order = ?board.range_by_rank(0, -1)?,
        rank = ?board.rank("cy")?,
        above_20 = board.count_in_range(&Range::Numeric(20.0, f64::INFINITY))?,
        "leaderboard"
    );

    for key in [
        "demo:profile:7",
        "demo:settings",
        "demo:undo",
        "demo:log",
        "demo:user:7",
        "demo:board",
    ] {
        cache.delete(key)?;
    }
    Ok(())
}
