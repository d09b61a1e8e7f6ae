use std::cell::Cell;
use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rkv_cache::{CacheTemplate, Keyed, PushPop, Range, Sequence, Structured};
use rkv_client::{MemoryConnector, MemoryStore, SingleExecutor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    sku: String,
    qty: u32,
}

fn cache() -> CacheTemplate<SingleExecutor<MemoryConnector>> {
    let store = Arc::new(MemoryStore::new());
    CacheTemplate::new(Arc::new(SingleExecutor::in_memory(store, 0)))
}

fn drain<P: PushPop>(container: &P) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(value) = container.pop().unwrap() {
        out.push(value);
    }
    out
}

#[test]
fn queue_is_fifo() {
    let cache = cache();
    let queue = cache.queue("jobs");
    for value in ["v1", "v2", "v3"] {
        assert!(queue.push(value).unwrap());
    }
    assert_eq!(drain(&queue), ["v1", "v2", "v3"]);
    assert_eq!(queue.pop().unwrap(), None);
}

#[test]
fn stack_is_lifo() {
    let cache = cache();
    let stack = cache.stack("undo");
    for value in ["v1", "v2", "v3"] {
        assert!(stack.push(value).unwrap());
    }
    assert_eq!(drain(&stack), ["v3", "v2", "v1"]);
}

#[test]
fn structured_values_round_trip_through_pop() {
    let cache = cache();
    let queue = cache.queue("items");
    let item = Item {
        sku: "A-1".to_string(),
        qty: 3,
    };
    queue.push(Structured(&item)).unwrap();
    queue.push("not json").unwrap();

    assert_eq!(queue.pop_as::<Item>().unwrap(), Some(item));
    assert_eq!(queue.pop_as::<Item>().unwrap(), None);
    assert_eq!(queue.pop().unwrap(), None);
}

#[test]
fn sorted_set_orders_ties_by_member() {
    let cache = cache();
    let set = cache.sorted_set("board");
    assert_eq!(set.add_all(&[("c", 2.0), ("a", 1.0), ("b", 2.0)]).unwrap(), 3);

    assert_eq!(set.range_by_rank(0, -1).unwrap(), ["a", "b", "c"]);
    assert_eq!(set.reverse_range_by_rank(0, 0).unwrap(), ["c"]);
    assert_eq!(set.rank("c").unwrap(), Some(2));
    assert_eq!(set.rank("a").unwrap(), Some(0));
    assert_eq!(set.rank("zz").unwrap(), None);
    assert_eq!(set.cardinality().unwrap(), 3);
}

#[test]
fn sorted_set_scores() {
    let cache = cache();
    let set = cache.sorted_set("scores");
    assert!(set.add("a", 1.0).unwrap());
    assert!(!set.add("a", 4.0).unwrap());
    assert_eq!(set.score("a").unwrap(), Some(4.0));
    assert_eq!(set.increment_score("a", 0.5).unwrap(), 4.5);
    assert_eq!(set.increment_score("fresh", 2.0).unwrap(), 2.0);
    assert_eq!(set.score("missing").unwrap(), None);

    assert_eq!(set.remove(&["a", "missing"]).unwrap(), 1);
    assert_eq!(set.remove(&[]).unwrap(), 0);
    assert_eq!(set.range_by_rank(0, -1).unwrap(), ["fresh"]);
}

#[test]
fn count_in_range_variants() {
    let cache = cache();
    let set = cache.sorted_set("ranges");
    set.add_all(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 3.0)])
        .unwrap();

    assert_eq!(set.count_in_range(&Range::Numeric(2.0, 3.0)).unwrap(), 3);
    assert_eq!(
        set.count_in_range(&Range::Numeric(f64::NEG_INFINITY, f64::INFINITY))
            .unwrap(),
        4
    );

    let exclusive = Range::Score(Bound::Excluded(1.0), Bound::Excluded(3.0));
    assert_eq!(set.count_in_range(&exclusive).unwrap(), 1);
    let open_above = Range::Score(Bound::Excluded(2.0), Bound::Unbounded);
    assert_eq!(set.count_in_range(&open_above).unwrap(), 2);
    let open_below = Range::Score(Bound::Unbounded, Bound::Included(2.0));
    assert_eq!(set.count_in_range(&open_below).unwrap(), 2);

    let lex = cache.sorted_set("names");
    lex.add_all(&[("alpha", 0.0), ("beta", 0.0), ("gamma", 0.0)])
        .unwrap();
    let range = Range::Lexicographic("[b".to_string(), "+".to_string());
    assert_eq!(lex.count_in_range(&range).unwrap(), 2);
    let range = Range::Lexicographic("-".to_string(), "(beta".to_string());
    assert_eq!(lex.count_in_range(&range).unwrap(), 1);
}

#[test]
fn map_put_reports_creation() {
    let cache = cache();
    let map = cache.map("user:1");

    assert_eq!(map.put("name", "ada").unwrap(), Some("ada"));
    assert_eq!(map.put("name", "grace").unwrap(), None);
    assert_eq!(map.get("name").unwrap().as_deref(), Some("grace"));
    assert_eq!(map.get("missing").unwrap(), None);

    assert!(map.delete("name").unwrap());
    assert!(!map.delete("name").unwrap());
}

#[test]
fn map_batch_operations_preserve_order() {
    let cache = cache();
    let map = cache.map("user:2");
    map.put_all(&[("a", 1), ("b", 2), ("c", 3)]).unwrap();
    map.put_all::<i32>(&[]).unwrap();

    assert_eq!(
        map.get_all(&["c", "missing", "a"]).unwrap(),
        vec![Some("3".to_string()), None, Some("1".to_string())]
    );
    assert!(map.get_all(&[]).unwrap().is_empty());

    assert!(map.delete_batch(&["a", "missing"]).unwrap());
    assert!(!map.delete_batch(&["missing"]).unwrap());
    assert!(!map.delete_batch(&[]).unwrap());
    assert_eq!(map.get_as::<u32>("b").unwrap(), Some(2));
}

#[test]
fn map_field_cache_aside() {
    let cache = cache();
    let map = cache.map("catalog");
    let calls = Cell::new(0);
    let supplier = || {
        calls.set(calls.get() + 1);
        Item {
            sku: "B-2".to_string(),
            qty: 1,
        }
    };

    let first = map.cache_query("B-2", supplier).unwrap();
    let second = map.cache_query("B-2", supplier).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.get(), 1);

    let empty: Vec<Item> = map.cache_query_list("none", Vec::new).unwrap();
    assert!(empty.is_empty());
    let again: Vec<Item> = map
        .cache_query_list("none", || panic!("supplier must not run"))
        .unwrap();
    assert!(again.is_empty());
}

#[test]
fn seq_list_positional_reads() {
    let cache = cache();
    let list = cache.list("log");
    assert_eq!(list.length().unwrap(), 0);

    assert!(list.append("boot").unwrap());
    assert!(list.append(7).unwrap());
    assert!(list.append(Structured(vec!["x", "y"])).unwrap());

    assert_eq!(list.length().unwrap(), 3);
    assert_eq!(list.get(0).unwrap().as_deref(), Some("boot"));
    assert_eq!(list.get(-1).unwrap().as_deref(), Some(r#"["x","y"]"#));
    assert_eq!(list.get(10).unwrap(), None);
    assert_eq!(list.get_as::<u32>(1).unwrap(), Some(7));
    assert_eq!(list.slice(0, 1).unwrap(), ["boot", "7"]);
    assert_eq!(list.slice(-2, -1).unwrap().len(), 2);
}

#[test]
fn proxies_report_and_rebind_their_key() {
    let cache = cache();
    let first = cache.queue("q:1");
    first.push("a").unwrap();
    assert_eq!(first.key(), "q:1");

    let second = first.clone().rebind("q:2");
    assert_eq!(second.key(), "q:2");
    assert_eq!(second.pop().unwrap(), None);
    assert_eq!(first.pop().unwrap().as_deref(), Some("a"));

    assert_eq!(cache.map("m").rebind("m2").key(), "m2");
    assert_eq!(cache.list("l").key(), "l");
    assert_eq!(cache.stack("s").key(), "s");
    assert_eq!(cache.sorted_set("z").rebind("z2").key(), "z2");
}

#[test]
fn proxies_share_the_facade_keyspace() {
    let cache = cache();
    cache.list("shared").append("x").unwrap();
    assert_eq!(cache.key_type("shared").unwrap(), "list");
    assert_eq!(cache.queue("shared").pop().unwrap().as_deref(), Some("x"));
    assert!(!cache.exists("shared").unwrap());
}
