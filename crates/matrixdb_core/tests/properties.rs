//! Property-based tests: the persistent structures agree with an
//! in-memory model.

use matrixdb_core::{
    HashMatrixMap, MapConfig, PersistentMap, SkipList, Store, Value, SERIALIZER_BINARY,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Put(i64, i64),
    Remove(i64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..48, any::<i64>()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => (0i64..48).prop_map(Op::Remove),
    ]
}

fn apply<M: PersistentMap<i64>>(map: &M, model: &mut BTreeMap<i64, i64>, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Put(k, v) => {
                let previous = map.put(&k, Value::Integer(v)).unwrap();
                let expected = model.insert(k, v);
                assert_eq!(previous, expected.map(Value::Integer));
            }
            Op::Remove(k) => {
                let previous = map.remove(&k).unwrap();
                let expected = model.remove(&k);
                assert_eq!(previous, expected.map(Value::Integer));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn matrix_map_matches_btreemap(
        ops in proptest::collection::vec(arb_op(), 1..120),
        load_factor in 1u8..=4,
    ) {
        let store = Arc::new(Store::in_memory().unwrap());
        let map: HashMatrixMap<i64> = HashMatrixMap::open(
            store,
            0,
            MapConfig::default().load_factor(load_factor),
        )
        .unwrap();
        let mut model = BTreeMap::new();

        apply(&map, &mut model, &ops);

        prop_assert_eq!(map.len(), model.len() as u64);
        for (k, v) in &model {
            prop_assert_eq!(map.get(k).unwrap(), Some(Value::Integer(*v)));
        }

        let mut seen: Vec<i64> = map.keys().map(|k| k.unwrap()).collect();
        seen.sort_unstable();
        let expected: Vec<i64> = model.keys().copied().collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn skip_list_iterates_in_model_order(
        ops in proptest::collection::vec(arb_op(), 1..120),
    ) {
        let store = Arc::new(Store::in_memory().unwrap());
        let list: SkipList<i64> = SkipList::open(store, 0, SERIALIZER_BINARY).unwrap();
        let mut model = BTreeMap::new();

        apply(&list, &mut model, &ops);

        let seen: Vec<i64> = list.iter().unwrap().map(|r| r.unwrap().key).collect();
        let expected: Vec<i64> = model.keys().copied().collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn range_scans_partition_the_key_space(
        keys in proptest::collection::btree_set(0i64..200, 1..60),
        bound in 0i64..200,
    ) {
        let store = Arc::new(Store::in_memory().unwrap());
        let map: HashMatrixMap<i64> = HashMatrixMap::open(
            store,
            0,
            MapConfig::default().load_factor(2),
        )
        .unwrap();
        for &k in &keys {
            map.put(&k, Value::Integer(k)).unwrap();
        }

        let above: Vec<i64> = map.above(&bound, true).unwrap().into_iter().map(|r| r.key).collect();
        let below: Vec<i64> = map.below(&bound, false).unwrap().into_iter().map(|r| r.key).collect();

        let expected_above: Vec<i64> = keys.iter().copied().filter(|k| *k >= bound).collect();
        let expected_below: Vec<i64> = keys.iter().copied().filter(|k| *k < bound).collect();

        prop_assert_eq!(above, expected_above);
        prop_assert_eq!(below, expected_below);
        // Together they cover every key exactly once.
        prop_assert_eq!(
            map.above(&bound, true).unwrap().len() + map.below(&bound, false).unwrap().len(),
            keys.len()
        );
    }
}
