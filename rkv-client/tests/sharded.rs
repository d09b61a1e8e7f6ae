use std::sync::Arc;

use rkv_client::{
    shard_index, Commands, Executor, MemoryStore, MultiKeyCommand, MultiKeyOps, PoolStatus,
    RawCommand, RkvError, RkvResult, ShardedExecutor, SingleExecutor,
};

fn stores(count: usize) -> Vec<Arc<MemoryStore>> {
    (0..count).map(|_| Arc::new(MemoryStore::new())).collect()
}

fn sharded(stores: &[Arc<MemoryStore>]) -> ShardedExecutor<rkv_client::MemoryConnector> {
    ShardedExecutor::in_memory(stores.to_vec()).expect("executor")
}

// Invokes the typed method for `command`.
fn invoke<E: Executor>(executor: &E, command: MultiKeyCommand) -> RkvResult<()> {
    match command {
        MultiKeyCommand::Rename => executor.rename("a", "b"),
        MultiKeyCommand::RenameNx => executor.renamenx("a", "b").map(drop),
        MultiKeyCommand::RpopLpush => executor.rpoplpush("a", "b").map(drop),
        MultiKeyCommand::BrpopLpush => executor.execute_multi(command, |conn| {
            conn.exec(&[b"BRPOPLPUSH", b"a", b"b", b"0"]).map(drop)
        }),
        MultiKeyCommand::SDiff => executor.sdiff(&["a", "b"]).map(drop),
        MultiKeyCommand::SDiffStore => executor.sdiffstore("d", &["a", "b"]).map(drop),
        MultiKeyCommand::SInter => executor.sinter(&["a", "b"]).map(drop),
        MultiKeyCommand::SInterStore => executor.sinterstore("d", &["a", "b"]).map(drop),
        MultiKeyCommand::SUnion => executor.sunion(&["a", "b"]).map(drop),
        MultiKeyCommand::SUnionStore => executor.sunionstore("d", &["a", "b"]).map(drop),
        MultiKeyCommand::SMove => executor.smove("a", "b", "m").map(drop),
        MultiKeyCommand::SortStore => executor.sort_store("a", "b").map(drop),
        MultiKeyCommand::ZInterStore => executor.zinterstore("d", &["a", "b"]).map(drop),
        MultiKeyCommand::ZUnionStore => executor.zunionstore("d", &["a", "b"]).map(drop),
        MultiKeyCommand::Publish => executor.publish("news", "hello").map(drop),
        MultiKeyCommand::Subscribe | MultiKeyCommand::PSubscribe => {
            executor.execute_multi(command, |conn| conn.exec(&[b"SUBSCRIBE", b"news"]).map(drop))
        }
        MultiKeyCommand::Scan => executor.scan(0).map(drop),
        MultiKeyCommand::RandomKey => executor.randomkey().map(drop),
        MultiKeyCommand::BitOp => executor.bitop("AND", "d", &["a", "b"]).map(drop),
        MultiKeyCommand::Watch => executor.watch(&["a"]),
        MultiKeyCommand::Unwatch => executor.unwatch(),
        MultiKeyCommand::Keys => executor.keys("*").map(drop),
        MultiKeyCommand::MGet => executor.mget(&["a", "b"]).map(drop),
        MultiKeyCommand::MSet => executor.mset(&[("a", "1"), ("b", "2")]),
        MultiKeyCommand::MSetNx => executor.msetnx(&[("a", "1")]).map(drop),
        MultiKeyCommand::DelMany => executor.del_many(&["a", "b"]).map(drop),
        MultiKeyCommand::BlPopMany | MultiKeyCommand::BrPopMany => {
            executor.execute_multi(command, |conn| conn.exec(&[b"BLPOP", b"a", b"b", b"0"]).map(drop))
        }
        MultiKeyCommand::PfMerge => executor.pfmerge("d", &["a", "b"]),
        MultiKeyCommand::PfCountMany => executor.pfcount(&["a", "b"]).map(drop),
    }
}

#[test]
fn every_multi_key_command_is_unsupported() {
    let stores = stores(3);
    let executor = sharded(&stores);

    for command in MultiKeyCommand::ALL {
        let err = invoke(&executor, command).unwrap_err();
        assert!(
            matches!(err, RkvError::Unsupported(name) if name == command.name()),
            "{command:?} returned {err:?}"
        );
    }
    // Rejected before any resource was acquired.
    assert_eq!(executor.pool_status(), PoolStatus { idle: 0, total: 0 });
}

#[test]
fn raw_multi_key_commands_are_refused_by_the_connection() {
    let executor = sharded(&stores(2));

    let err = executor
        .execute(|conn| conn.exec(&[b"DEL", b"a", b"b"]))
        .unwrap_err();
    assert!(matches!(err, RkvError::Unsupported("DEL")));

    let err = executor.execute(|conn| conn.select(1)).unwrap_err();
    assert!(matches!(err, RkvError::Unsupported("SELECT")));

    let err = executor.execute(|conn| conn.exec(&[b"FLUSHALL"])).unwrap_err();
    assert!(err.is_unsupported());

    // Refusals are not transport failures; the connection stays pooled.
    assert_eq!(executor.pool_status(), PoolStatus { idle: 1, total: 1 });
}

#[test]
fn single_key_commands_route_by_hash() {
    let stores = stores(3);
    let executor = sharded(&stores);

    let keys: Vec<String> = (0..30).map(|i| format!("key:{i}")).collect();
    for key in &keys {
        executor.execute(|conn| conn.set(key, "v")).expect("set");
    }

    for key in &keys {
        let owner = shard_index(key.as_bytes(), stores.len());
        for (index, store) in stores.iter().enumerate() {
            let reply = store.execute(0, &[b"EXISTS", key.as_bytes()]);
            let expected = i64::from(index == owner);
            assert_eq!(reply, rkv_client::RespValue::Integer(expected), "{key} on {index}");
        }
    }

    let total: usize = stores.iter().map(|store| store.key_count(0)).sum();
    assert_eq!(total, keys.len());
    assert!(stores.iter().filter(|store| store.key_count(0) > 0).count() > 1);

    let value = executor.execute(|conn| conn.get("key:7")).expect("get");
    assert_eq!(value.as_deref(), Some("v"));
}

#[test]
fn hash_tagged_keys_share_a_shard() {
    let stores = stores(4);
    let executor = sharded(&stores);

    executor
        .execute(|conn| {
            conn.rpush("{order:9}:items", &["a", "b"])?;
            conn.hset("{order:9}:meta", "state", "open")?;
            conn.set("{order:9}:total", "12")
        })
        .expect("writes");

    let owner = shard_index(b"order:9", stores.len());
    assert_eq!(stores[owner].key_count(0), 3);
}

#[test]
fn single_endpoint_supports_multi_key() {
    let store = Arc::new(MemoryStore::new());
    let executor = SingleExecutor::in_memory(Arc::clone(&store), 5);
    assert!(executor.supports_multi_key());

    executor.mset(&[("a", "1"), ("b", "2")]).expect("mset");
    assert_eq!(
        executor.mget(&["a", "missing", "b"]).expect("mget"),
        vec![Some("1".to_string()), None, Some("2".to_string())]
    );
    executor.rename("a", "c").expect("rename");
    assert_eq!(executor.keys("*").expect("keys"), vec!["b", "c"]);
    assert_eq!(executor.del_many(&["b", "c", "zzz"]).expect("del"), 2);
    assert_eq!(store.key_count(5), 0);

    let err = executor.sdiff(&["x", "y"]).unwrap_err();
    assert!(matches!(err, RkvError::Server(msg) if msg.contains("unknown command")));
}

#[test]
fn single_endpoint_writes_to_configured_database() {
    let store = Arc::new(MemoryStore::new());
    let executor = SingleExecutor::in_memory(Arc::clone(&store), 7);

    executor.execute(|conn| conn.set("k", "v")).expect("set");
    assert_eq!(store.key_count(7), 1);
    assert_eq!(store.key_count(0), 0);

    // Operations that reselect a database do not leak into the next one.
    executor.run(|conn| conn.select(2)).expect("select");
    let value = executor.execute(|conn| conn.get("k")).expect("get");
    assert_eq!(value.as_deref(), Some("v"));
}
