//! End-to-end tests of the map contract over both structures.

use matrixdb_core::{
    CoreError, HashMatrixMap, MapConfig, PersistentMap, SkipList, Store, Value,
    SERIALIZER_BINARY, SERIALIZER_CBOR,
};
use matrixdb_storage::FileVolume;
use std::sync::Arc;
use tempfile::tempdir;

fn open_map(load_factor: u8) -> HashMatrixMap<i64> {
    let store = Arc::new(Store::in_memory().unwrap());
    HashMatrixMap::open(store, 0, MapConfig::default().load_factor(load_factor)).unwrap()
}

#[test]
fn thousand_keys_above_and_below() {
    let map = open_map(2);
    for k in 1..=1000i64 {
        map.put(&k, Value::Integer(k * 10)).unwrap();
    }
    assert_eq!(map.len(), 1000);

    let above: Vec<i64> = map
        .above(&500, true)
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(above.len(), 501);
    assert_eq!(above, (500..=1000).collect::<Vec<_>>());

    let below: Vec<i64> = map
        .below(&500, false)
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(below.len(), 499);
    assert_eq!(below, (1..500).collect::<Vec<_>>());
}

#[test]
fn update_keeps_size_at_one() {
    let store = Arc::new(Store::in_memory().unwrap());
    let map: HashMatrixMap<String> =
        HashMatrixMap::open(store, 0, MapConfig::default()).unwrap();

    map.put(&"a".to_string(), Value::Integer(1)).unwrap();
    map.put(&"a".to_string(), Value::Integer(2)).unwrap();

    assert_eq!(map.get(&"a".to_string()).unwrap(), Some(Value::Integer(2)));
    assert_eq!(map.len(), 1);
}

#[test]
fn construction_rejects_bad_load_factor() {
    let store = Arc::new(Store::in_memory().unwrap());

    for bad in [0u8, 11] {
        let result: Result<HashMatrixMap<i64>, _> = HashMatrixMap::open(
            Arc::clone(&store),
            0,
            MapConfig::default().load_factor(bad),
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}

#[test]
fn size_tracks_distinct_keys_and_removals() {
    let map = open_map(3);

    for k in 0..64i64 {
        map.put(&k, Value::Integer(k)).unwrap();
    }
    assert_eq!(map.len(), 64);

    // Overwrites do not change the size.
    for k in 0..64i64 {
        map.put(&k, Value::Integer(-k)).unwrap();
    }
    assert_eq!(map.len(), 64);

    // Each successful removal shrinks by exactly one.
    for (i, k) in (0..10i64).enumerate() {
        assert!(map.remove(&k).unwrap().is_some());
        assert_eq!(map.len(), 64 - i as u64 - 1);
    }

    // Removing absent keys changes nothing.
    map.remove(&5).unwrap();
    map.remove(&-100).unwrap();
    assert_eq!(map.len(), 54);
}

#[test]
fn mixed_serializers_in_one_map() {
    let store = Arc::new(Store::in_memory().unwrap());
    let binary: HashMatrixMap<i64> = HashMatrixMap::open(
        Arc::clone(&store),
        0,
        MapConfig::default().serializer_id(SERIALIZER_BINARY),
    )
    .unwrap();
    binary.put(&1, Value::Text("from binary".into())).unwrap();

    // Reattach the same header with CBOR as the write codec.
    let cbor: HashMatrixMap<i64> = HashMatrixMap::open(
        Arc::clone(&store),
        binary.header_position(),
        MapConfig::default().serializer_id(SERIALIZER_CBOR),
    )
    .unwrap();
    cbor.put(&2, Value::Text("from cbor".into())).unwrap();

    // Reads resolve each record's own serializer id.
    assert_eq!(cbor.get(&1).unwrap(), Some(Value::Text("from binary".into())));
    assert_eq!(cbor.get(&2).unwrap(), Some(Value::Text("from cbor".into())));
}

#[test]
fn file_backed_map_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.mxdb");
    let header_position;

    {
        let volume = FileVolume::open(&path).unwrap();
        let store = Arc::new(Store::open(Box::new(volume)).unwrap());
        let map: HashMatrixMap<String> =
            HashMatrixMap::open(store, 0, MapConfig::default().load_factor(2)).unwrap();
        for i in 0..50 {
            map.put(&format!("key-{i}"), Value::Integer(i)).unwrap();
        }
        header_position = map.header_position();
    }

    let volume = FileVolume::open(&path).unwrap();
    let store = Arc::new(Store::open(Box::new(volume)).unwrap());
    let map: HashMatrixMap<String> = HashMatrixMap::open(
        store,
        header_position,
        MapConfig::default().load_factor(2),
    )
    .unwrap();

    assert_eq!(map.len(), 50);
    for i in 0..50 {
        assert_eq!(
            map.get(&format!("key-{i}")).unwrap(),
            Some(Value::Integer(i))
        );
    }
}

#[test]
fn two_maps_share_one_store() {
    let store = Arc::new(Store::in_memory().unwrap());

    let users: HashMatrixMap<String> =
        HashMatrixMap::open(Arc::clone(&store), 0, MapConfig::default()).unwrap();
    let scores: HashMatrixMap<i64> =
        HashMatrixMap::open(Arc::clone(&store), 0, MapConfig::default()).unwrap();

    users
        .put(&"alice".to_string(), Value::Integer(1))
        .unwrap();
    scores.put(&17, Value::Integer(9000)).unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(scores.len(), 1);
    assert_eq!(
        users.get(&"alice".to_string()).unwrap(),
        Some(Value::Integer(1))
    );
    assert_eq!(scores.get(&17).unwrap(), Some(Value::Integer(9000)));
    assert_eq!(users.get(&"bob".to_string()).unwrap(), None);
}

#[test]
fn skip_list_and_matrix_behind_one_trait() {
    fn exercise(map: &dyn PersistentMap<i64>) {
        map.put(&1, Value::Integer(1)).unwrap();
        map.put(&2, Value::Integer(2)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.remove(&1).unwrap(), Some(Value::Integer(1)));
        assert!(map.contains_key(&2).unwrap());
        map.clear().unwrap();
        assert!(map.is_empty());
    }

    let store = Arc::new(Store::in_memory().unwrap());
    let list: SkipList<i64> =
        SkipList::open(Arc::clone(&store), 0, SERIALIZER_BINARY).unwrap();
    let matrix: HashMatrixMap<i64> =
        HashMatrixMap::open(Arc::clone(&store), 0, MapConfig::default()).unwrap();

    exercise(&list);
    exercise(&matrix);
}

#[test]
fn dictionary_view_over_heterogeneous_values() {
    let store = Arc::new(Store::in_memory().unwrap());
    let map: HashMatrixMap<String> =
        HashMatrixMap::open(store, 0, MapConfig::default()).unwrap();

    map.put(&"count".to_string(), Value::Integer(3)).unwrap();
    map.put(
        &"tags".to_string(),
        Value::Array(vec![Value::Text("a".into()), Value::Text("b".into())]),
    )
    .unwrap();

    let mut seen = 0;
    for dict in map.dicts() {
        let dict = dict.unwrap();
        assert!(dict.get("key").is_some());
        assert!(dict.get("value").is_some());
        seen += 1;
    }
    assert_eq!(seen, 2);
}
