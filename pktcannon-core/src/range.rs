//! Compact, coalesced, indexable sets of intervals over a 32-bit key space.
//!
//! The same representation is used for the IPv4 target space and the port
//! space: both are just sorted, non-overlapping `[lo, hi)` ranges with a
//! cumulative element count that lets `pick` binary-search rather than walk.

use std::net::Ipv4Addr;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    lo: u32,
    hi: u32,
    /// Count of elements in all intervals strictly before this one.
    cum: u64,
}

impl Interval {
    fn width(&self) -> u64 {
        (self.hi - self.lo) as u64
    }
}

/// A sorted, coalesced, indexable set of `[lo, hi)` intervals over `u32`.
#[derive(Debug, Clone, Default)]
pub struct RangeList {
    intervals: Vec<Interval>,
    total: u64,
}

impl RangeList {
    /// Builds a range list from raw `[lo, hi)` pairs, sorting and coalescing
    /// overlapping or touching intervals.
    pub fn from_intervals(mut raw: Vec<(u32, u32)>) -> Self {
        raw.retain(|(lo, hi)| lo < hi);
        raw.sort_unstable_by_key(|(lo, _)| *lo);

        let mut intervals: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
        for (lo, hi) in raw {
            if let Some(last) = intervals.last_mut() {
                if lo <= last.1 {
                    last.1 = last.1.max(hi);
                    continue;
                }
            }
            intervals.push((lo, hi));
        }

        let mut total = 0u64;
        let intervals = intervals
            .into_iter()
            .map(|(lo, hi)| {
                let cum = total;
                total += (hi - lo) as u64;
                Interval { lo, hi, cum }
            })
            .collect();

        Self { intervals, total }
    }

    /// Total number of elements covered by this range list.
    pub fn count(&self) -> u64 {
        self.total
    }

    /// Returns `true` if this range list covers no elements.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Returns the `i`-th element (0-indexed) in canonical sorted order.
    ///
    /// Panics if `i >= count()`: an out-of-range index is a programmer
    /// error, not a recoverable condition.
    pub fn pick(&self, i: u64) -> u32 {
        assert!(
            i < self.total,
            "range list pick index {i} out of range (count = {})",
            self.total
        );
        let idx = self
            .intervals
            .partition_point(|iv| iv.cum + iv.width() <= i);
        let iv = &self.intervals[idx];
        iv.lo + (i - iv.cum) as u32
    }

    #[cfg(test)]
    fn intervals(&self) -> &[Interval] {
        &self.intervals
    }
}

/// Parses a comma-separated port-list spec: each item is `N` or `N-M`
/// (inclusive on both ends).
pub fn parse_ports(spec: &str) -> Result<RangeList> {
    let mut raw = Vec::new();
    for item in spec.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = item.split_once('-') {
            let lo: u32 = parse_port_num(lo)?;
            let hi: u32 = parse_port_num(hi)?;
            if lo > hi {
                return Err(CoreError::InvalidArgument(format!(
                    "port range '{item}' has lo > hi"
                )));
            }
            raw.push((lo, hi + 1));
        } else {
            let n = parse_port_num(item)?;
            raw.push((n, n + 1));
        }
    }
    if raw.is_empty() {
        return Err(CoreError::InvalidArgument(
            "port spec has no items".to_string(),
        ));
    }
    Ok(RangeList::from_intervals(raw))
}

fn parse_port_num(s: &str) -> Result<u32> {
    s.trim()
        .parse::<u32>()
        .map_err(|e| CoreError::InvalidArgument(format!("invalid port '{s}': {e}")))
        .and_then(|n| {
            if n > u16::MAX as u32 {
                Err(CoreError::InvalidArgument(format!(
                    "port '{s}' out of range"
                )))
            } else {
                Ok(n)
            }
        })
}

/// Parses a comma-separated IPv4 target-list spec: each item is a dotted
/// quad, a dotted-quad range (`a.b.c.d-e.f.g.h`), or a CIDR block.
pub fn parse_targets(spec: &str) -> Result<RangeList> {
    let mut raw = Vec::new();
    for item in spec.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((net, bits)) = item.split_once('/') {
            let base: Ipv4Addr = net
                .parse()
                .map_err(|e| CoreError::InvalidArgument(format!("invalid CIDR '{item}': {e}")))?;
            let bits: u32 = bits.parse().map_err(|e| {
                CoreError::InvalidArgument(format!("invalid CIDR prefix '{item}': {e}"))
            })?;
            if bits > 32 {
                return Err(CoreError::InvalidArgument(format!(
                    "invalid CIDR prefix '{item}'"
                )));
            }
            let base = u32::from(base);
            let host_bits = 32 - bits;
            let mask = if host_bits == 32 {
                0
            } else {
                !0u32 << host_bits
            };
            let network = base & mask;
            let size = 1u64 << host_bits;
            raw.push((network, (network as u64 + size) as u32));
        } else if let Some((lo, hi)) = item.split_once('-') {
            let lo: Ipv4Addr = lo.parse().map_err(|e| {
                CoreError::InvalidArgument(format!("invalid target '{item}': {e}"))
            })?;
            let hi: Ipv4Addr = hi.parse().map_err(|e| {
                CoreError::InvalidArgument(format!("invalid target '{item}': {e}"))
            })?;
            let lo = u32::from(lo);
            let hi = u32::from(hi);
            if lo > hi {
                return Err(CoreError::InvalidArgument(format!(
                    "target range '{item}' has lo > hi"
                )));
            }
            raw.push((lo, hi + 1));
        } else {
            let addr: Ipv4Addr = item.parse().map_err(|e| {
                CoreError::InvalidArgument(format!("invalid target '{item}': {e}"))
            })?;
            let n = u32::from(addr);
            raw.push((n, n + 1));
        }
    }
    if raw.is_empty() {
        return Err(CoreError::InvalidArgument(
            "target spec has no items".to_string(),
        ));
    }
    Ok(RangeList::from_intervals(raw))
}

/// Computes `(target_index, port_index)` for enumeration item `i`, given
/// `targets_count`, `ports_count` and the duplicate `count`. Targets vary
/// fastest; duplicates for a tuple are consecutive; see spec §4.1.
pub fn enumeration_indices(i: u64, targets_count: u64, count: u64) -> (u64, u64) {
    let target_index = (i % targets_count) / count;
    let port_index = (i / targets_count) / count;
    (target_index, port_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn coalesces_adjacent_and_overlapping() {
        let a = RangeList::from_intervals(vec![(1, 4), (4, 7)]);
        let b = RangeList::from_intervals(vec![(1, 7)]);
        assert_eq!(a.count(), b.count());
        for i in 0..a.count() {
            assert_eq!(a.pick(i), b.pick(i));
        }
        assert_eq!(a.intervals().len(), 1);
    }

    #[test]
    fn coalesces_overlapping_ranges() {
        let a = RangeList::from_intervals(vec![(1, 5), (3, 8), (20, 25)]);
        assert_eq!(a.intervals().len(), 2);
        assert_eq!(a.count(), 7 + 5);
    }

    #[test]
    fn pick_is_sorted_and_dense() {
        let rl = RangeList::from_intervals(vec![(10, 13), (20, 22)]);
        let picked: Vec<u32> = (0..rl.count()).map(|i| rl.pick(i)).collect();
        assert_eq!(picked, vec![10, 11, 12, 20, 21]);
    }

    #[test]
    #[should_panic]
    fn pick_out_of_range_panics() {
        let rl = RangeList::from_intervals(vec![(0, 1)]);
        rl.pick(1);
    }

    #[test]
    fn parse_ports_simple() {
        let rl = parse_ports("22,80,1000-1002").unwrap();
        assert_eq!(rl.count(), 5);
        let picked: Vec<u32> = (0..rl.count()).map(|i| rl.pick(i)).collect();
        assert_eq!(picked, vec![22, 80, 1000, 1001, 1002]);
    }

    #[test]
    fn parse_targets_cidr() {
        let rl = parse_targets("10.0.0.0/30").unwrap();
        assert_eq!(rl.count(), 4);
        assert_eq!(Ipv4Addr::from(rl.pick(0)), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(Ipv4Addr::from(rl.pick(3)), Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn parse_targets_range_and_single() {
        let rl = parse_targets("10.0.0.1-10.0.0.3,192.168.1.1").unwrap();
        assert_eq!(rl.count(), 4);
    }

    #[test]
    fn generator_enumeration_order() {
        // targets=3, ports=2, count=2 -> pkt_count == 12
        let targets = 3u64;
        let count = 2u64;
        let n = targets * 2 * count;
        let mut seq = Vec::new();
        for i in 0..n {
            seq.push(enumeration_indices(i, targets, count));
        }
        assert_eq!(
            seq,
            vec![
                (0, 0),
                (0, 0),
                (1, 0),
                (1, 0),
                (2, 0),
                (2, 0),
                (0, 1),
                (0, 1),
                (1, 1),
                (1, 1),
                (2, 1),
                (2, 1),
            ]
        );
    }

    proptest! {
        #[test]
        fn count_equals_sum_of_widths(
            mut items in prop::collection::vec((0u32..1000, 0u32..50), 0..20)
        ) {
            let raw: Vec<(u32, u32)> = items
                .drain(..)
                .filter_map(|(lo, w)| lo.checked_add(w + 1).map(|hi| (lo, hi)))
                .collect();
            let expected: u64 = {
                // Recompute expected count via the same coalescing logic,
                // independently, by sorting and merging manually.
                let mut sorted = raw.clone();
                sorted.sort_unstable_by_key(|(lo, _)| *lo);
                let mut merged: Vec<(u32, u32)> = Vec::new();
                for (lo, hi) in sorted {
                    if let Some(last) = merged.last_mut() {
                        if lo <= last.1 {
                            last.1 = last.1.max(hi);
                            continue;
                        }
                    }
                    merged.push((lo, hi));
                }
                merged.iter().map(|(lo, hi)| (*hi - *lo) as u64).sum()
            };
            let rl = RangeList::from_intervals(raw);
            prop_assert_eq!(rl.count(), expected);
        }

        #[test]
        fn pick_strictly_increasing(
            mut items in prop::collection::vec((0u32..1000, 0u32..50), 1..20)
        ) {
            let raw: Vec<(u32, u32)> = items
                .drain(..)
                .filter_map(|(lo, w)| lo.checked_add(w + 1).map(|hi| (lo, hi)))
                .collect();
            prop_assume!(!raw.is_empty());
            let rl = RangeList::from_intervals(raw);
            prop_assume!(rl.count() > 1);
            for i in 1..rl.count() {
                prop_assert!(rl.pick(i) > rl.pick(i - 1));
            }
        }
    }
}
