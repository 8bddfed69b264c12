//! Reachability search over before-edges.

use std::collections::BTreeMap;

use crate::record::{LockRecord, LockToken};

/// Depth-first search: can `target` be reached from `from` by following
/// before-edges?
///
/// Visited marking uses the generation stamp `color`: a node whose record
/// carries the current color has already been explored this pass and is
/// skipped. One dependency-processing pass shares a single color across all
/// of its searches — they share the same target, so a node exhausted by an
/// earlier search cannot lead to the target in a later one.
///
/// Stops at the first path found. Cost is linear in the edges reachable from
/// `from`.
pub(crate) fn reaches(
    locks: &mut BTreeMap<LockToken, LockRecord>,
    from: LockToken,
    target: LockToken,
    color: u64,
) -> bool {
    if from == target {
        return true;
    }
    let Some(record) = locks.get_mut(&from) else {
        return false;
    };
    if record.color == color {
        return false;
    }
    record.color = color;
    let next: Vec<LockToken> = record.before.iter().copied().collect();
    for token in next {
        if reaches(locks, token, target, color) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(usize, usize)]) -> BTreeMap<LockToken, LockRecord> {
        let mut locks = BTreeMap::new();
        for &(to, before) in edges {
            for raw in [to, before] {
                let token = LockToken::from_raw(raw);
                locks
                    .entry(token)
                    .or_insert_with(|| LockRecord::new(token, false, true));
            }
            locks
                .get_mut(&LockToken::from_raw(to))
                .unwrap()
                .add_before(LockToken::from_raw(before));
        }
        locks
    }

    #[test]
    fn direct_edge_is_reachable() {
        let mut locks = graph(&[(2, 1)]);
        assert!(reaches(
            &mut locks,
            LockToken::from_raw(2),
            LockToken::from_raw(1),
            1
        ));
    }

    #[test]
    fn transitive_path_is_reachable() {
        // 3 was acquired under 2, 2 under 1.
        let mut locks = graph(&[(3, 2), (2, 1)]);
        assert!(reaches(
            &mut locks,
            LockToken::from_raw(3),
            LockToken::from_raw(1),
            1
        ));
        assert!(!reaches(
            &mut locks,
            LockToken::from_raw(1),
            LockToken::from_raw(3),
            2
        ));
    }

    #[test]
    fn search_terminates_on_cycles_between_other_nodes() {
        let mut locks = graph(&[(2, 1), (1, 2), (3, 3)]);
        assert!(!reaches(
            &mut locks,
            LockToken::from_raw(2),
            LockToken::from_raw(4),
            1
        ));
    }

    #[test]
    fn stale_colors_do_not_leak_between_generations() {
        let mut locks = graph(&[(2, 1)]);
        assert!(reaches(
            &mut locks,
            LockToken::from_raw(2),
            LockToken::from_raw(1),
            7
        ));
        // A fresh generation re-explores the same nodes.
        assert!(reaches(
            &mut locks,
            LockToken::from_raw(2),
            LockToken::from_raw(1),
            8
        ));
    }
}
