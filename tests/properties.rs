//! Property-style tests, SPEC_FULL.md §10.4: algebraic laws for `ValueSet`,
//! idempotence of `BipartiteMatching`'s maximal matching, and feasibility of
//! `HallIntervalPropagator`'s bounds-consistency pruning, checked with
//! `proptest` the way `jix-varisat` and `dannem1337-diffn_models` check their
//! own bitset/propagation laws.

use fdcsp::domain::ValueSet;
use fdcsp::hall::{self, Interval};
use fdcsp::matching::BipartiteMatching;
use proptest::collection::vec;
use proptest::prelude::*;

const MAX_DOMAIN: usize = 64;

fn value_set_and_members(size: usize) -> impl Strategy<Value = (ValueSet, Vec<usize>)> {
    vec(any::<bool>(), size).prop_map(move |bits| {
        let mut s = ValueSet::empty(size);
        let mut members = Vec::new();
        for (v, &b) in bits.iter().enumerate() {
            if b {
                s.insert(v);
                members.push(v);
            }
        }
        (s, members)
    })
}

fn domain_size() -> impl Strategy<Value = usize> {
    1..=MAX_DOMAIN
}

proptest! {
    /// `&a & &a.complement()` is always empty: a value is never both present
    /// and absent.
    #[test]
    fn complement_is_disjoint_from_self((s, _) in (domain_size()).prop_flat_map(value_set_and_members)) {
        prop_assert!(s.is_disjoint(&s.complement()));
    }

    /// `a.complement().complement() == a` for any value set.
    #[test]
    fn double_complement_is_identity((s, _) in (domain_size()).prop_flat_map(value_set_and_members)) {
        prop_assert_eq!(s.complement().complement(), s);
    }

    /// Intersection with the full set is the identity; intersection with the
    /// empty set is always empty.
    #[test]
    fn intersection_identities((s, _) in (domain_size()).prop_flat_map(value_set_and_members)) {
        let size = s.size();
        prop_assert_eq!(&s & &ValueSet::full(size), s.clone());
        prop_assert!((&s & &ValueSet::empty(size)).is_empty());
    }

    /// Union is commutative and intersection distributes over it, the two
    /// set-algebra laws every other law in this module reduces to.
    #[test]
    fn union_commutes_and_intersection_distributes(
        size in domain_size(),
        bits_a in vec(any::<bool>(), 1..=MAX_DOMAIN),
        bits_b in vec(any::<bool>(), 1..=MAX_DOMAIN),
    ) {
        let mut a = ValueSet::empty(size);
        let mut b = ValueSet::empty(size);
        for v in 0..size {
            if bits_a.get(v).copied().unwrap_or(false) {
                a.insert(v);
            }
            if bits_b.get(v).copied().unwrap_or(false) {
                b.insert(v);
            }
        }
        prop_assert_eq!(&a | &b, &b | &a);

        let c = ValueSet::range(size, 0, size / 2);
        let lhs = &a & &(&b | &c);
        let rhs = &(&a & &b) | &(&a & &c);
        prop_assert_eq!(lhs, rhs);
    }

    /// `count()` always agrees with a manual scan over `0..size`.
    #[test]
    fn count_matches_manual_scan((s, members) in (domain_size()).prop_flat_map(value_set_and_members)) {
        prop_assert_eq!(s.count(), members.len());
        for v in members {
            prop_assert!(s.contains(v));
        }
    }

    /// Running `compute_maximal_matching` twice in a row (with no edges
    /// changed in between) is idempotent: re-solving an already-maximum
    /// matching never shrinks it.
    #[test]
    fn maximal_matching_is_idempotent(
        num_left in 1usize..8,
        num_right in 1usize..8,
        edges in vec((0usize..8, 0usize..8), 0..24),
    ) {
        let mut m = BipartiteMatching::new(num_left, num_right);
        for &(l, r) in &edges {
            if l < num_left && r < num_right {
                m.add_edge(l, r);
            }
        }
        let first = m.compute_maximal_matching(None);
        let second = m.compute_maximal_matching(None);
        prop_assert_eq!(first, second);
    }

    /// Every left vertex matched after `compute_maximal_matching` names a
    /// right vertex it actually has an edge to, and no right vertex exceeds
    /// its declared capacity.
    #[test]
    fn matching_respects_edges_and_capacity(
        num_left in 1usize..8,
        num_right in 1usize..8,
        edges in vec((0usize..8, 0usize..8), 0..24),
        cap in 1usize..3,
    ) {
        let mut m = BipartiteMatching::new(num_left, num_right);
        for r in 0..num_right {
            m.set_right_capacity(r, cap);
        }
        for &(l, r) in &edges {
            if l < num_left && r < num_right {
                m.add_edge(l, r);
            }
        }
        m.compute_maximal_matching(None);
        for l in 0..num_left {
            if let Some(r) = m.matched_right_of(l) {
                prop_assert!(m.neighbors(l).contains(&r));
            }
        }
        for r in 0..num_right {
            prop_assert!(m.num_matched_on_right(r) <= cap);
        }
    }

    /// `check_and_prune` never widens an interval: every returned interval is
    /// a subset (in value-space) of the one passed in.
    #[test]
    fn hall_pruning_never_widens_an_interval(
        mins in vec(-20i32..20, 1..8),
        widths in vec(0i32..10, 1..8),
    ) {
        let n = mins.len().min(widths.len());
        let mut intervals: Vec<Interval> = (0..n)
            .map(|i| Interval {
                key: i,
                min_value: mins[i],
                max_value: mins[i] + widths[i],
            })
            .collect();
        let original = intervals.clone();
        hall::check_and_prune(&mut intervals, |_v| 1, |_key, _new_min| {});
        for (before, after) in original.iter().zip(intervals.iter()) {
            prop_assert!(after.min_value >= before.min_value);
            prop_assert!(after.max_value <= before.max_value);
        }
    }

    /// A feasibility check that reports `false` always does so because some
    /// value range demands strictly more intervals than its total capacity
    /// allows; re-running with every interval given unlimited width-1
    /// capacity per distinct value (capacity == number of intervals) must
    /// always succeed, confirming `check_and_prune` isn't simply wrong.
    #[test]
    fn unlimited_capacity_is_always_feasible(
        mins in vec(-10i32..10, 1..6),
        widths in vec(0i32..6, 1..6),
    ) {
        let n = mins.len().min(widths.len());
        let mut intervals: Vec<Interval> = (0..n)
            .map(|i| Interval {
                key: i,
                min_value: mins[i],
                max_value: mins[i] + widths[i],
            })
            .collect();
        let cap = n;
        let ok = hall::check_and_prune(&mut intervals, move |_v| cap, |_key, _new_min| {});
        prop_assert!(ok);
    }
}
