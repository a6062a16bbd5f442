//! Integration tests: the concrete scenarios from the bitset's design notes,
//! plus property-based checks of the laws the core algorithms are supposed
//! to satisfy (round-trips, rank/select correspondence, set-algebra
//! identities) using randomly generated position sets.

use proptest::prelude::*;
use sparse_bitset::Bitset;

const W: u64 = 8192;

#[test]
fn scenario_empty_bitset() {
    let bitset = Bitset::new();
    assert_eq!(bitset.bit_count(), 0);
    assert!(bitset.is_empty());
    assert_eq!(bitset.min(), None);
    assert_eq!(bitset.max(), None);
    assert_eq!(bitset.rank(1000), 0);
    assert_eq!(bitset.select(1), None);
    assert_eq!(bitset.serialize(), vec![b'R', b'O', b'A', b'R', 1, 0, 0]);
}

#[test]
fn scenario_single_position_lifecycle() {
    let mut bitset = Bitset::new();
    assert!(!bitset.set(42));
    assert!(bitset.test(42));
    assert!(bitset.set(42));
    assert_eq!(bitset.bit_count(), 1);
    assert_eq!(bitset.min(), Some(42));
    assert_eq!(bitset.max(), Some(42));
    assert_eq!(bitset.select(1), Some(42));
    assert_eq!(bitset.rank(43), 1);
    assert_eq!(bitset.rank(42), 0);
}

#[test]
fn scenario_sparse_dense_all1_transitions_within_one_chunk() {
    let mut bitset = Bitset::new();
    bitset.set_range(0, 630);
    assert_eq!(bitset.bit_count(), 630);
    for p in 0..630 {
        assert!(bitset.test(p));
    }

    bitset.set(7562);
    assert_eq!(bitset.bit_count(), 631);
    assert!(bitset.test(7562));

    bitset.set_range(7563, 8192);
    assert_eq!(bitset.bit_count(), 8192);
    for p in 0..W {
        assert!(bitset.test(p));
    }
}

#[test]
fn scenario_two_chunks_rank_select() {
    let bitset = Bitset::from_array(&[100, 200, 300, 8192, 8292]);
    assert_eq!(bitset.bit_count(), 5);
    assert_eq!(bitset.min(), Some(100));
    assert_eq!(bitset.max(), Some(8292));
    assert_eq!(bitset.rank(8192), 3);
    assert_eq!(bitset.select(4), Some(8192));
}

#[test]
fn scenario_mixed_algebra_and_similarity() {
    let a = Bitset::from_array(&[1, 2, 3, 4]);
    let b = Bitset::from_array(&[3, 4, 5, 6]);
    assert_eq!(a.new_and(&b).to_array(), vec![3, 4]);
    assert_eq!(a.new_or(&b).to_array(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.new_xor(&b).to_array(), vec![1, 2, 5, 6]);
    assert_eq!(a.new_and_not(&b).to_array(), vec![1, 2]);
    assert!((a.jaccard(&b) - 2.0 / 6.0).abs() < 1e-12);
    assert_eq!(a.hamming_distance(&b), 4);
}

#[test]
fn scenario_wire_bytes_for_all1_and_sparse_set_chunks() {
    let mut bitset = Bitset::new();
    bitset.set_range(7 * W, 8 * W); // ALL_1 chunk 7
    bitset.set_many(&[3 * W + 10, 3 * W + 20]); // SPARSE_SET chunk 3

    let bytes = bitset.serialize();
    let mut expected = vec![b'R', b'O', b'A', b'R', 1, 0, 2];
    expected.push(3); // varint(3)
    expected.push(2); // TAG_SPARSE_SET
    expected.push(2); // varint(2) offsets
    expected.push(10);
    expected.push(20);
    expected.push(7); // varint(7)
    expected.push(1); // TAG_ALL_1
    assert_eq!(bytes, expected);

    let restored = Bitset::deserialize(&bytes).unwrap();
    assert_eq!(restored, bitset);
}

fn small_position_set() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..(4 * W), 0..200)
}

proptest! {
    #[test]
    fn duplicate_equals_original_and_is_independent(positions in small_position_set()) {
        let original = Bitset::from_array(&positions);
        let mut duplicate = original.clone();
        prop_assert_eq!(&duplicate, &original);
        duplicate.set(10 * W);
        prop_assert_ne!(&duplicate, &original);
        prop_assert!(!original.test(10 * W));
    }

    #[test]
    fn from_array_to_array_round_trips(positions in small_position_set()) {
        let bitset = Bitset::from_array(&positions);
        let mut expected = positions.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(bitset.to_array(), expected);
    }

    #[test]
    fn serialize_deserialize_round_trips(positions in small_position_set()) {
        let bitset = Bitset::from_array(&positions);
        let bytes = bitset.serialize();
        prop_assert_eq!(bytes.len(), bitset.serialized_size());
        let restored = Bitset::deserialize(&bytes).unwrap();
        prop_assert_eq!(restored, bitset);
    }

    #[test]
    fn not_is_involutive_within_original_chunk_domain(positions in small_position_set()) {
        let bitset = Bitset::from_array(&positions);
        let restored = bitset.new_not().new_not();
        prop_assert_eq!(restored, bitset);
    }

    #[test]
    fn flip_range_is_involutive(positions in small_position_set(), lo in 0u64..(4 * W), width in 0u64..(2 * W)) {
        let hi = lo.saturating_add(width).min(4 * W);
        let mut bitset = Bitset::from_array(&positions);
        let before = bitset.clone();
        bitset.flip_range(lo, hi);
        bitset.flip_range(lo, hi);
        prop_assert_eq!(bitset, before);
    }

    #[test]
    fn rank_select_correspondence(positions in small_position_set()) {
        let bitset = Bitset::from_array(&positions);
        let total = bitset.bit_count();
        for k in 1..=total {
            let p = bitset.select(k).expect("k within population");
            prop_assert_eq!(bitset.rank(p + 1), k);
        }
        if total > 0 {
            prop_assert_eq!(bitset.min(), bitset.select(1));
            prop_assert_eq!(bitset.max(), bitset.select(total));
        }
    }

    #[test]
    fn rank_matches_test_delta(positions in small_position_set(), p in 0u64..(4 * W)) {
        let bitset = Bitset::from_array(&positions);
        let delta = bitset.rank(p + 1) - bitset.rank(p);
        prop_assert_eq!(delta, if bitset.test(p) { 1 } else { 0 });
    }

    #[test]
    fn and_or_xor_are_commutative(
        a_positions in small_position_set(),
        b_positions in small_position_set(),
    ) {
        let a = Bitset::from_array(&a_positions);
        let b = Bitset::from_array(&b_positions);
        prop_assert_eq!(a.new_and(&b), b.new_and(&a));
        prop_assert_eq!(a.new_or(&b), b.new_or(&a));
        prop_assert_eq!(a.new_xor(&b), b.new_xor(&a));
    }

    #[test]
    fn n_way_fan_in_matches_left_fold(
        a_positions in small_position_set(),
        b_positions in small_position_set(),
        c_positions in small_position_set(),
    ) {
        let a = Bitset::from_array(&a_positions);
        let b = Bitset::from_array(&b_positions);
        let c = Bitset::from_array(&c_positions);

        let and_fold = a.new_and(&b).new_and(&c);
        prop_assert_eq!(Bitset::and_n(&[&a, &b, &c]), and_fold);

        let or_fold = a.new_or(&b).new_or(&c);
        prop_assert_eq!(Bitset::or_n(&[&a, &b, &c]), or_fold);

        let xor_fold = a.new_xor(&b).new_xor(&c);
        prop_assert_eq!(Bitset::xor_n(&[&a, &b, &c]), xor_fold);
    }

    #[test]
    fn hamming_distance_equals_xor_population(
        a_positions in small_position_set(),
        b_positions in small_position_set(),
    ) {
        let a = Bitset::from_array(&a_positions);
        let b = Bitset::from_array(&b_positions);
        prop_assert_eq!(a.hamming_distance(&b), a.new_xor(&b).bit_count());
    }

    #[test]
    fn union_inclusion_exclusion(
        a_positions in small_position_set(),
        b_positions in small_position_set(),
    ) {
        let a = Bitset::from_array(&a_positions);
        let b = Bitset::from_array(&b_positions);
        let union = a.new_or(&b).bit_count();
        let inter = a.new_and(&b).bit_count();
        prop_assert_eq!(union, a.bit_count() + b.bit_count() - inter);
    }

    #[test]
    fn and_not_removes_exactly_the_shared_bits(
        a_positions in small_position_set(),
        b_positions in small_position_set(),
    ) {
        let a = Bitset::from_array(&a_positions);
        let b = Bitset::from_array(&b_positions);
        let and_not = a.new_and_not(&b);
        prop_assert!(!and_not.intersects(&b));
        prop_assert_eq!(and_not.bit_count(), a.bit_count() - a.new_and(&b).bit_count());
        prop_assert_eq!(and_not.new_or(&a.new_and(&b)), a);
    }
}
