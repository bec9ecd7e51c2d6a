use std::collections::HashSet;

use medscreen::shard::{ShardSlot, Sharder, WorkItem};

#[test]
fn three_by_two_grid_fits_in_one_shard_of_width_six() {
    let sharder = Sharder::new(3, 2, 6).unwrap();
    assert_eq!(sharder.grid_size(), 6);
    assert_eq!(sharder.shard_count(), 1);
    let items = sharder.pairs_for_shard(1).unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(items[0], WorkItem { row: 0, outcome: 0 });
    assert_eq!(items[1], WorkItem { row: 0, outcome: 1 });
    assert_eq!(items[5], WorkItem { row: 2, outcome: 1 });
    assert!(sharder.pairs_for_shard(2).is_err());
    assert!(sharder.pairs_for_shard(0).is_err());
}

#[test]
fn locate_and_resolve_round_trip_over_the_grid() {
    for (rows, outcomes, width) in [(7, 5, 1), (7, 5, 3), (4, 9, 36), (1, 1, 4), (13, 2, 5)] {
        let sharder = Sharder::new(rows, outcomes, width).unwrap();
        for row in 0..rows {
            for outcome in 0..outcomes {
                let item = WorkItem { row, outcome };
                let slot = sharder.locate(item).unwrap();
                assert!(slot.shard >= 1 && slot.shard <= sharder.shard_count());
                assert!(slot.slot < width);
                assert_eq!(sharder.resolve(slot), Some(item));
            }
        }
        assert_eq!(sharder.locate(WorkItem { row: rows, outcome: 0 }), None);
        assert_eq!(sharder.locate(WorkItem { row: 0, outcome: outcomes }), None);
    }
}

#[test]
fn shards_partition_the_grid() {
    let sharder = Sharder::new(7, 5, 3).unwrap();
    assert_eq!(sharder.shard_count(), 12);
    let mut seen = HashSet::new();
    for shard in 1..=sharder.shard_count() {
        let items = sharder.pairs_for_shard(shard).unwrap();
        assert!(!items.is_empty() && items.len() <= 3);
        for item in items {
            assert!(seen.insert(item), "{item:?} owned twice");
            assert_eq!(sharder.locate(item).unwrap().shard, shard);
        }
    }
    assert_eq!(seen.len(), 35);
    // 35 = 11 * 3 + 2
    assert_eq!(sharder.pairs_for_shard(12).unwrap().len(), 2);
}

#[test]
fn resolving_a_shard_twice_gives_the_same_items() {
    let a = Sharder::new(20, 11, 4).unwrap();
    let b = Sharder::new(20, 11, 4).unwrap();
    for shard in 1..=a.shard_count() {
        assert_eq!(a.pairs_for_shard(shard).unwrap(), a.pairs_for_shard(shard).unwrap());
        assert_eq!(a.pairs_for_shard(shard).unwrap(), b.pairs_for_shard(shard).unwrap());
    }
}

#[test]
fn width_one_gives_one_shard_per_pair() {
    let sharder = Sharder::new(3, 4, 1).unwrap();
    assert_eq!(sharder.shard_count(), 12);
    assert_eq!(
        sharder.resolve(ShardSlot { shard: 6, slot: 0 }),
        Some(WorkItem { row: 1, outcome: 1 })
    );
    assert_eq!(sharder.resolve(ShardSlot { shard: 13, slot: 0 }), None);
    assert_eq!(sharder.resolve(ShardSlot { shard: 1, slot: 1 }), None);
}

#[test]
fn zero_width_is_rejected_and_empty_grid_has_no_shards() {
    assert!(Sharder::new(3, 2, 0).is_err());
    let empty = Sharder::new(0, 5, 2).unwrap();
    assert_eq!(empty.shard_count(), 0);
    assert!(empty.pairs_for_shard(1).is_err());
}
