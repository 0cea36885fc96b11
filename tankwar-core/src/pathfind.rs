//! A* over the hex grid

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::hex::Hex;
use crate::world::WorldModel;

/// Shortest path from `start` to `goal` around obstacles.
///
/// The returned path excludes `start` and ends at `goal`. Vehicles do not
/// block: occupancy changes every turn, so callers check it when they commit
/// to the next step.
pub fn find_path(world: &WorldModel, start: Hex, goal: Hex) -> Option<Vec<Hex>> {
    if start == goal {
        return Some(Vec::new());
    }
    if !world.is_passable(goal) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut came_from: FxHashMap<Hex, Hex> = FxHashMap::default();
    let mut cost: FxHashMap<Hex, i32> = FxHashMap::default();

    cost.insert(start, 0);
    open.push(Reverse((start.distance_to(goal), 0, start)));

    while let Some(Reverse((_, g, current))) = open.pop() {
        if current == goal {
            return Some(unwind(&came_from, start, goal));
        }
        if cost.get(&current).is_some_and(|&best| g > best) {
            continue;
        }
        for next in current.neighbors() {
            if !world.is_passable(next) {
                continue;
            }
            let tentative = g + 1;
            if cost.get(&next).map_or(true, |&known| tentative < known) {
                cost.insert(next, tentative);
                came_from.insert(next, current);
                open.push(Reverse((tentative + next.distance_to(goal), tentative, next)));
            }
        }
    }
    None
}

fn unwind(came_from: &FxHashMap<Hex, Hex>, start: Hex, goal: Hex) -> Vec<Hex> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
