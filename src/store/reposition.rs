//! The sparse-position "move X after Y" algorithm shared by every backend
//! (spec §4.1): O(1) amortised, O(N) worst case.

use crate::error::{Error, Result};
use crate::model::BudgetItemId;

const GAP: i32 = 100;

/// Computes the position updates needed to move `moved_id` to just after
/// `preceding_id` (or to the front, if `None`), given the current
/// `(id, position)` pairs ordered by position ascending.
///
/// Returns every `(id, new_position)` pair that must be written — normally
/// just the moved item, but the whole list when a renumbering pass is
/// required.
pub fn compute_positions(
    ordered: &[(BudgetItemId, i32)],
    moved_id: BudgetItemId,
    preceding_id: Option<BudgetItemId>,
) -> Result<Vec<(BudgetItemId, i32)>> {
    if !ordered.iter().any(|(id, _)| *id == moved_id) {
        return Err(Error::not_found(format!("budget item {moved_id} not found")));
    }

    let rest: Vec<(BudgetItemId, i32)> = ordered
        .iter()
        .copied()
        .filter(|(id, _)| *id != moved_id)
        .collect();

    let insert_after = match preceding_id {
        None => 0,
        Some(pid) => {
            let idx = rest
                .iter()
                .position(|(id, _)| *id == pid)
                .ok_or_else(|| Error::not_found(format!("preceding budget item {pid} not found")))?;
            idx + 1
        }
    };

    let before_position = if insert_after == 0 {
        0
    } else {
        rest[insert_after - 1].1
    };
    let after_position = rest.get(insert_after).map(|(_, pos)| *pos);

    match after_position {
        None => {
            // Y is last (or the list is empty): place after it with a fresh gap.
            Ok(vec![(moved_id, before_position + GAP)])
        }
        Some(next_position) if next_position - before_position > 1 => {
            let midpoint = before_position + (next_position - before_position) / 2;
            Ok(vec![(moved_id, midpoint)])
        }
        Some(_) => {
            // No room: renumber the whole list, then insert at the same slot.
            let mut updates = Vec::with_capacity(rest.len() + 1);
            let mut position = GAP;
            for (idx, (id, _)) in rest.iter().enumerate() {
                if idx == insert_after {
                    updates.push((moved_id, position));
                    position += GAP;
                }
                updates.push((*id, position));
                position += GAP;
            }
            if insert_after == rest.len() {
                updates.push((moved_id, position));
            }
            Ok(updates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i32) -> BudgetItemId {
        BudgetItemId(n)
    }

    #[test]
    fn move_after_last_item_gets_plus_100() {
        let ordered = vec![(id(1), 100), (id(2), 200), (id(3), 300)];
        let updates = compute_positions(&ordered, id(1), Some(id(3))).unwrap();
        assert_eq!(updates, vec![(id(1), 400)]);
    }

    #[test]
    fn move_into_gap_uses_midpoint() {
        let ordered = vec![(id(1), 100), (id(2), 200), (id(3), 300)];
        // Move item 3 to right after item 1: gap between 100 and 200 is large enough.
        let updates = compute_positions(&ordered, id(3), Some(id(1))).unwrap();
        assert_eq!(updates, vec![(id(3), 150)]);
    }

    #[test]
    fn move_to_front_with_no_anchor() {
        let ordered = vec![(id(1), 100), (id(2), 200)];
        let updates = compute_positions(&ordered, id(2), None).unwrap();
        assert_eq!(updates, vec![(id(2), 50)]);
    }

    #[test]
    fn no_room_triggers_full_renumber() {
        let ordered = vec![(id(1), 100), (id(2), 101), (id(3), 300)];
        // Moving item 3 between 1 and 2 has no gap (100, 101): renumber all.
        let updates = compute_positions(&ordered, id(3), Some(id(1))).unwrap();
        assert_eq!(
            updates,
            vec![(id(1), 100), (id(3), 200), (id(2), 300)]
        );
    }

    #[test]
    fn moving_unknown_item_is_not_found() {
        let ordered = vec![(id(1), 100)];
        assert!(compute_positions(&ordered, id(99), None).is_err());
    }

    #[test]
    fn moving_after_unknown_item_is_not_found() {
        let ordered = vec![(id(1), 100), (id(2), 200)];
        assert!(compute_positions(&ordered, id(1), Some(id(99))).is_err());
    }
}
