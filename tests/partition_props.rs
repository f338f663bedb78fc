use dist_seq::partition::plan;
use proptest::prelude::*;

proptest! {
    #[test]
    fn counts_sum_to_total(n in 0usize..10_000, p in 1usize..64) {
        let part = plan(n, p).unwrap();
        prop_assert_eq!(part.counts().iter().sum::<usize>(), n);
        prop_assert_eq!(part.total(), n);
        prop_assert_eq!(part.group_size(), p);
    }

    #[test]
    fn offsets_are_prefix_sums(n in 0usize..10_000, p in 1usize..64) {
        let part = plan(n, p).unwrap();
        prop_assert_eq!(part.offsets()[0], 0);
        for i in 1..p {
            prop_assert_eq!(part.offset(i), part.offset(i - 1) + part.count(i - 1));
        }
    }

    #[test]
    fn balanced_and_front_loaded(n in 0usize..10_000, p in 1usize..64) {
        let part = plan(n, p).unwrap();
        let max = *part.counts().iter().max().unwrap();
        let min = *part.counts().iter().min().unwrap();
        prop_assert!(max - min <= 1);
        let rem = n % p;
        for (i, &c) in part.counts().iter().enumerate() {
            prop_assert_eq!(c, n / p + usize::from(i < rem));
        }
    }

    #[test]
    fn planning_is_deterministic(n in 0usize..100_000, p in 1usize..128) {
        prop_assert_eq!(plan(n, p).unwrap(), plan(n, p).unwrap());
    }

    #[test]
    fn every_index_has_exactly_one_owner(n in 0usize..500, p in 1usize..16) {
        let part = plan(n, p).unwrap();
        for i in 0..n {
            let owner = part.owner_of(i).unwrap();
            prop_assert!(part.range(owner).contains(&i));
        }
        prop_assert_eq!(part.owner_of(n), None);
    }
}

#[test]
fn listed_scenarios() {
    let cases: [(usize, &[usize], &[usize]); 4] = [
        (4, &[1, 1, 1, 1], &[0, 1, 2, 3]),
        (16, &[4, 4, 4, 4], &[0, 4, 8, 12]),
        (10, &[3, 3, 2, 2], &[0, 3, 6, 8]),
        (0, &[0, 0, 0, 0], &[0, 0, 0, 0]),
    ];
    for (n, counts, offsets) in cases {
        let part = plan(n, 4).unwrap();
        assert_eq!(part.counts(), counts, "n = {n}");
        assert_eq!(part.offsets(), offsets, "n = {n}");
    }
}

#[test]
fn partition_serializes_as_plain_tables() {
    let part = plan(5, 2).unwrap();
    let json = serde_json::to_value(&part).unwrap();
    assert_eq!(json["counts"], serde_json::json!([3, 2]));
    assert_eq!(json["offsets"], serde_json::json!([0, 3]));
    let back: dist_seq::partition::Partition = serde_json::from_value(json).unwrap();
    assert_eq!(back, part);
}

#[test]
fn inconsistent_tables_do_not_deserialize() {
    use dist_seq::partition::Partition;
    for bad in [
        r#"{"counts":[5],"offsets":[0,0],"total":1}"#,
        r#"{"counts":[2,2],"offsets":[0,3],"total":4}"#,
        r#"{"counts":[1,3],"offsets":[0,1],"total":4}"#,
        r#"{"counts":[18446744073709551615,1],"offsets":[0,0],"total":0}"#,
        r#"{"counts":[],"offsets":[],"total":0}"#,
    ] {
        assert!(serde_json::from_str::<Partition>(bad).is_err(), "{bad}");
    }
    let ok: Partition =
        serde_json::from_str(r#"{"counts":[2,1],"offsets":[0,2],"total":3}"#).unwrap();
    assert_eq!(ok, plan(3, 2).unwrap());
}
