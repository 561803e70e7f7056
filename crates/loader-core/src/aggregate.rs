use crate::progress::{ProgressTree, LEVELS};

/// Floor percentage of `tick` over `total`, clamped to `[0, 100]`.
/// A zero total counts as one, so `0/0` is 0% and `x/0` is 100%.
pub fn percentage(tick: u64, total: u64) -> u32 {
    let total = total.max(1);
    let tick = tick.min(total);
    (u128::from(tick) * 100 / u128::from(total)) as u32
}

/// Per-level completion percentages, coarsest level first.
///
/// Computed from the deepest level upward: each level gets the floor of its
/// own counter plus a fractional share of the level below it, which lets
/// in-flight sub-operations move the enclosing levels before their counters
/// tick. Truncation compounds at every level.
pub fn aggregate(tree: &ProgressTree) -> [u32; LEVELS] {
    let nodes = tree.nodes();
    let mut percent = [0u32; LEVELS];
    for lvl in (0..LEVELS).rev() {
        let node = &nodes[lvl];
        let base = percentage(node.tick, node.total);
        let child = match percent.get(lvl + 1) {
            Some(below) if node.total > 0 => {
                (u64::from(*below) / node.total).min(100) as u32
            }
            _ => 0,
        };
        percent[lvl] = (base + child).min(100);
    }
    percent
}
