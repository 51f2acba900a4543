//! Round-robin target assignment for the per-user variant
//!
//! The target at global position `u` belongs to account `u % A`, which
//! makes the at-most-once-per-user invariant hold by construction: every
//! position appears in exactly one account's list, exactly once.

use wireline::Target;

/// Partition `targets` across `accounts` slots, keeping each target's
/// global position for stagger computation.
///
/// Returns one `(position, target)` list per account, in target order.
pub fn round_robin(targets: &[Target], accounts: usize) -> Vec<Vec<(u64, Target)>> {
    let mut assigned: Vec<Vec<(u64, Target)>> = vec![Vec::new(); accounts];
    if accounts == 0 {
        return assigned;
    }
    for (u, target) in targets.iter().enumerate() {
        assigned[u % accounts].push((u as u64, target.clone()));
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn users(n: usize) -> Vec<Target> {
        (0..n).map(|i| Target::user(format!("@user{}", i))).collect()
    }

    #[test]
    fn test_five_targets_three_accounts() {
        let assigned = round_robin(&users(5), 3);

        let positions: Vec<Vec<u64>> = assigned
            .iter()
            .map(|slots| slots.iter().map(|(u, _)| *u).collect())
            .collect();

        assert_eq!(positions, vec![vec![0, 3], vec![1, 4], vec![2]]);
    }

    #[test]
    fn test_partition_is_exact() {
        let targets = users(17);
        let assigned = round_robin(&targets, 4);

        let mut seen = HashSet::new();
        for slots in &assigned {
            for (u, target) in slots {
                assert!(seen.insert(*u), "position {} assigned twice", u);
                assert_eq!(target, &targets[*u as usize]);
            }
        }
        assert_eq!(seen.len(), targets.len());
    }

    #[test]
    fn test_order_preserved_within_account() {
        let assigned = round_robin(&users(10), 3);
        for slots in &assigned {
            assert!(slots.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn test_more_accounts_than_targets() {
        let assigned = round_robin(&users(2), 5);
        assert_eq!(assigned.iter().filter(|s| !s.is_empty()).count(), 2);
        assert_eq!(assigned.iter().filter(|s| s.is_empty()).count(), 3);
    }

    #[test]
    fn test_zero_accounts() {
        assert!(round_robin(&users(3), 0).is_empty());
    }
}
