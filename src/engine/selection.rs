//! Pure selection helpers: weighted source choice, rejection sampling, and
//! sequential visiting order.

use std::collections::HashSet;

use rand::{Rng, RngCore, seq::SliceRandom};

use crate::{model::DatapointId, source::DataSource};

/// Rejected draws tolerated before switching to an explicit complement.
///
/// Both paths are uniform over the unexcluded ids; the fallback only
/// bounds the work when almost everything is excluded.
const MAX_REJECTIONS: usize = 32;

/// Pick an index with probability proportional to its weight, over the
/// `active` subset only.
///
/// Prefix sums are recomputed on every call, so removing an exhausted source
/// re-normalizes the remaining weights. `None` when no active weight is left.
pub(super) fn pick_weighted(
    weights: &[u64],
    active: &[bool],
    rng: &mut dyn RngCore,
) -> Option<usize> {
    let total: u64 = weights
        .iter()
        .zip(active)
        .filter(|(_, on)| **on)
        .map(|(w, _)| *w)
        .sum();
    if total == 0 {
        return None;
    }

    let mut target = rng.gen_range(0..total);
    for (index, (weight, on)) in weights.iter().zip(active).enumerate() {
        if !on {
            continue;
        }
        if target < *weight {
            return Some(index);
        }
        target -= weight;
    }
    None
}

/// True when every id in `0..size` is excluded.
pub(super) fn is_exhausted(size: u64, excluded: &HashSet<DatapointId>) -> bool {
    let covered = excluded.iter().filter(|id| **id < size).count() as u64;
    covered >= size
}

/// Draw a datapoint not in `excluded`.
///
/// Redraws through `get_random` on a hit; after [`MAX_REJECTIONS`] misses it
/// chooses uniformly among the remaining ids instead. `None` when the source
/// has nothing left to give.
pub(super) fn draw_unexcluded(
    source: &dyn DataSource,
    size: u64,
    excluded: &HashSet<DatapointId>,
    rng: &mut dyn RngCore,
) -> Option<(DatapointId, String)> {
    for _ in 0..MAX_REJECTIONS {
        let (id, text) = source.get_random(rng)?;
        if !excluded.contains(&id) {
            return Some((id, text));
        }
    }

    let remaining: Vec<DatapointId> = (0..size).filter(|id| !excluded.contains(id)).collect();
    let id = *remaining.choose(rng)?;
    source.get(id).map(|text| (id, text))
}

/// Order in which sequential modes visit sources.
///
/// Single-stream keeps the current source first; round-robin starts one past
/// it. Without a current source both start at the first.
pub(super) fn sequential_order(
    count: usize,
    current: Option<usize>,
    round_robin: bool,
) -> impl Iterator<Item = usize> {
    let start = match current {
        None => 0,
        Some(i) if round_robin => i + 1,
        Some(i) => i,
    };
    (0..count).map(move |offset| (start + offset) % count)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::source::{TextListSource, TextListSpec};

    fn texts(n: usize) -> TextListSource {
        TextListSource::new(TextListSpec {
            texts: (0..n).map(|i| format!("t{i}")).collect(),
        })
    }

    #[test]
    fn weighted_pick_follows_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let weights = [1, 3, 0];
        let active = [true, true, true];
        let mut counts = [0u32; 3];
        for _ in 0..8000 {
            counts[pick_weighted(&weights, &active, &mut rng).unwrap()] += 1;
        }

        assert_eq!(counts[2], 0);
        let share = f64::from(counts[1]) / 8000.0;
        assert!((share - 0.75).abs() < 0.03, "share was {share}");
    }

    #[test]
    fn weighted_pick_skips_inactive() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let weights = [5, 5, 5];
        let active = [false, true, false];
        for _ in 0..100 {
            assert_eq!(pick_weighted(&weights, &active, &mut rng), Some(1));
        }
        assert_eq!(pick_weighted(&weights, &[false; 3], &mut rng), None);
    }

    #[test]
    fn exhaustion_ignores_out_of_range_ids() {
        assert!(is_exhausted(0, &HashSet::new()));
        assert!(!is_exhausted(3, &HashSet::from([0, 1, 7])));
        assert!(is_exhausted(3, &HashSet::from([0, 1, 2])));
    }

    #[test]
    fn draw_never_returns_excluded_ids() {
        let source = texts(10);
        let excluded: HashSet<DatapointId> = (0..9).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            let (id, text) = draw_unexcluded(&source, source.size(), &excluded, &mut rng).unwrap();
            assert_eq!(id, 9);
            assert_eq!(text, "t9");
        }
    }

    #[test]
    fn draw_from_fully_excluded_source_is_none() {
        let source = texts(3);
        let excluded = HashSet::from([0, 1, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(draw_unexcluded(&source, 3, &excluded, &mut rng).is_none());
    }

    #[test]
    fn sequential_order_starts_at_current() {
        assert_eq!(sequential_order(3, None, false).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(sequential_order(3, Some(1), false).collect::<Vec<_>>(), [1, 2, 0]);
        assert_eq!(sequential_order(3, Some(1), true).collect::<Vec<_>>(), [2, 0, 1]);
        assert_eq!(sequential_order(3, Some(2), true).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(sequential_order(0, None, true).count(), 0);
    }
}
