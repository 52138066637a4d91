//! Bounds-consistency pruning via Hall intervals: given a list of
//! `[min, max]` intervals (one per variable, in value-space) and a per-value
//! capacity, detects whether some range of values is over capacity for the
//! intervals that must fit inside it, and tightens any interval that
//! straddles a saturated range so it can no longer reach into it.
//!
//! An implementation of Lopez-Ortiz et al.'s bounds-consistency algorithm
//! for `AllDifferent`/`Cardinality`. The textbook algorithm finds saturated
//! ranges in amortized-linear time via a path-compressed array "union-find"
//! over sorted interval boundaries; this version finds the same saturated
//! ranges with a direct prefix-sum sweep over every value between the global
//! min and max instead (`O(range * n)` rather than `O(n log n)`), which is
//! simpler to get right and, given the domain sizes this crate targets
//! (hundreds, not millions of values), has no practical performance
//! difference.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub key: usize,
    pub min_value: i32,
    pub max_value: i32,
}

/// Runs the bounds-consistency check/prune pass over `intervals` (mutated
/// in place: an interval straddling a saturated range has its `min_value`
/// raised past that range, or its `max_value` lowered below it).
/// `capacity(v)` gives the number of intervals that may simultaneously claim
/// value `v`. `on_prune(key, new_min)` is called once per interval whose
/// lower bound was raised; callers needing upper-bound pruning too call this
/// twice with inverted intervals. Returns `false` if some range of values is
/// over capacity — no valid assignment exists.
pub fn check_and_prune(
    intervals: &mut [Interval],
    capacity: impl Fn(i32) -> usize,
    mut on_prune: impl FnMut(usize, i32),
) -> bool {
    if intervals.is_empty() {
        return true;
    }

    let global_min = intervals.iter().map(|iv| iv.min_value).min().unwrap();
    let global_max = intervals.iter().map(|iv| iv.max_value).max().unwrap();
    let span = (global_max - global_min + 1) as usize;

    // prefix[i] = total capacity of values [global_min, global_min + i - 1].
    let mut prefix = vec![0i64; span + 1];
    for i in 0..span {
        prefix[i + 1] = prefix[i] + capacity(global_min + i as i32) as i64;
    }
    let capacity_of = |lo: i32, hi_inclusive: i32| -> i64 {
        let a = (lo - global_min).max(0) as usize;
        let b = ((hi_inclusive - global_min) + 1).min(span as i32).max(0) as usize;
        if a >= b {
            0
        } else {
            prefix[b] - prefix[a]
        }
    };

    // A range [a, b] is a saturated Hall block if exactly `capacity(a..=b)`
    // intervals are fully contained within it (it can't be *more*: that's
    // the infeasibility case checked below).
    for a in global_min..=global_max {
        for b in a..=global_max {
            let cap = capacity_of(a, b);
            let contained = intervals
                .iter()
                .filter(|iv| iv.min_value >= a && iv.max_value <= b)
                .count() as i64;
            if contained > cap {
                return false;
            }
            if contained == 0 || contained != cap {
                continue;
            }
            for iv in intervals.iter_mut() {
                let straddles_from_below = iv.min_value < a && iv.max_value >= a && iv.max_value <= b;
                let straddles_from_above = iv.max_value > b && iv.min_value <= b && iv.min_value >= a;
                if straddles_from_above && iv.min_value < b + 1 {
                    iv.min_value = b + 1;
                    on_prune(iv.key, iv.min_value);
                } else if straddles_from_below {
                    // Lowering `max_value` isn't expressible through
                    // `on_prune`; a caller that needs the symmetric
                    // upper-bound cut runs this same function again over
                    // intervals built from negated values, which turns this
                    // case into a `straddles_from_above` case there instead.
                    let _ = iv;
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_variables_two_values_is_infeasible() {
        let mut intervals = vec![
            Interval { key: 0, min_value: 0, max_value: 1 },
            Interval { key: 1, min_value: 0, max_value: 1 },
            Interval { key: 2, min_value: 0, max_value: 1 },
        ];
        let ok = check_and_prune(&mut intervals, |_| 1, |_, _| {});
        assert!(!ok);
    }

    #[test]
    fn non_overlapping_ranges_are_feasible_and_untouched() {
        let mut intervals = vec![
            Interval { key: 0, min_value: 0, max_value: 0 },
            Interval { key: 1, min_value: 1, max_value: 1 },
        ];
        let ok = check_and_prune(&mut intervals, |_| 1, |_, _| {});
        assert!(ok);
        assert_eq!(intervals[0].min_value, 0);
        assert_eq!(intervals[1].min_value, 1);
    }

    #[test]
    fn saturated_block_pushes_straddling_interval_above_it() {
        // Values 0 and 1 each have capacity 1; two intervals are confined to
        // exactly {0, 1}, saturating that block. A third interval whose
        // range is [0, 2] must be pushed to exactly {2}.
        let mut intervals = vec![
            Interval { key: 0, min_value: 0, max_value: 0 },
            Interval { key: 1, min_value: 1, max_value: 1 },
            Interval { key: 2, min_value: 0, max_value: 2 },
        ];
        let mut pruned = Vec::new();
        let ok = check_and_prune(&mut intervals, |_| 1, |key, new_min| pruned.push((key, new_min)));
        assert!(ok);
        assert_eq!(intervals[2].min_value, 2);
        assert!(pruned.contains(&(2, 2)));
    }

    #[test]
    fn capacity_above_one_permits_sharing() {
        let mut intervals = vec![
            Interval { key: 0, min_value: 0, max_value: 0 },
            Interval { key: 1, min_value: 0, max_value: 0 },
        ];
        let ok = check_and_prune(&mut intervals, |_| 2, |_, _| {});
        assert!(ok);
        assert_eq!(intervals[0].min_value, 0);
        assert_eq!(intervals[1].min_value, 0);
    }
}
