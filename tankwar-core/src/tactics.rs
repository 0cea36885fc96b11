//! Movement and targeting queries against a world model
//!
//! Everything here is read-only. Callers turn the answers into intents and
//! apply them to whichever world they own.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::hex::{ring_band, Hex, DIRECTIONS};
use crate::intent::Intent;
use crate::snapshot::{GameAction, ACTION_MOVE, ACTION_SHOOT};
use crate::vehicle::{PlayerId, Trajectory, Vehicle, VehicleId};
use crate::world::WorldModel;

// ============================================================================
// MOVEMENT
// ============================================================================

/// Hexes the vehicle can end its move on this turn.
///
/// Breadth-first over passable hexes up to the vehicle's speed. Spawn points
/// and occupied hexes are valid to cross but not to stop on.
pub fn reachable(world: &WorldModel, vehicle: &Vehicle) -> Vec<Hex> {
    let start = vehicle.position;
    let mut visited: FxHashSet<Hex> = FxHashSet::default();
    visited.insert(start);
    let mut frontier = vec![start];
    let mut found = Vec::new();

    for _ in 0..vehicle.speed() {
        let mut next = Vec::new();
        for hex in &frontier {
            for n in hex.neighbors() {
                if world.is_passable(n) && visited.insert(n) {
                    next.push(n);
                    found.push(n);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    found.retain(|&h| !world.is_spawn(h) && !world.is_occupied(h));
    found
}

/// Greedy fallback: the reachable hex closest to the centre, ties broken at random
pub fn choose_move<R: Rng>(world: &WorldModel, vehicle: &Vehicle, rng: &mut R) -> Option<Hex> {
    let candidates = reachable(world, vehicle);
    let best = candidates.iter().map(|h| h.distance_to_center()).min()?;
    let closest: Vec<Hex> = candidates
        .into_iter()
        .filter(|h| h.distance_to_center() == best)
        .collect();
    closest.choose(rng).copied()
}

// ============================================================================
// TARGETING
// ============================================================================

/// A vehicle the shooter may legally damage
fn is_enemy(world: &WorldModel, shooter: &Vehicle, other: &Vehicle) -> bool {
    other.player != shooter.player && !world.is_neutral(shooter.player, other.player)
}

/// Lower health first, then the bigger capture threat, then id for stability
fn priority(v: &Vehicle) -> (i32, i32, VehicleId) {
    (v.hp, -v.capture_points, v.id)
}

/// Pick the best shot available to `shooter`, if any
pub fn resolve_shot(world: &WorldModel, shooter: &Vehicle) -> Option<Intent> {
    match shooter.spec().trajectory {
        Trajectory::Curved => curved_shot(world, shooter),
        Trajectory::Straight => straight_shot(world, shooter),
    }
}

fn curved_shot(world: &WorldModel, shooter: &Vehicle) -> Option<Intent> {
    ring_band(shooter.position, shooter.min_range(), shooter.max_range())
        .into_iter()
        .filter(|&h| world.is_passable(h))
        .filter_map(|h| world.occupant(h))
        .filter(|v| v.is_alive() && is_enemy(world, shooter, v))
        .min_by_key(|v| priority(v))
        .map(|target| Intent::Shoot {
            vehicle: shooter.id,
            target: target.position,
            victims: vec![target.id],
        })
}

/// Enemies a straight shot along `dir` would pass through, nearest first.
///
/// Obstacles and the grid edge stop the shot. Friendly vehicles are passed
/// over. A neutral vehicle right in front of the barrel blocks the whole line;
/// further out it is only skipped.
fn ray<'w>(world: &'w WorldModel, shooter: &Vehicle, dir: Hex) -> Vec<&'w Vehicle> {
    let mut hits = Vec::new();
    for k in 1..=shooter.max_range() as i32 {
        let hex = shooter.position + dir.scale(k);
        if !world.is_passable(hex) {
            break;
        }
        let Some(other) = world.occupant(hex) else {
            continue;
        };
        if other.player == shooter.player {
            continue;
        }
        if world.is_neutral(shooter.player, other.player) {
            if k == 1 {
                break;
            }
            continue;
        }
        if other.is_alive() && k >= shooter.min_range() as i32 {
            hits.push(other);
        }
    }
    hits
}

fn straight_shot(world: &WorldModel, shooter: &Vehicle) -> Option<Intent> {
    DIRECTIONS
        .iter()
        .filter_map(|&dir| {
            let hits = ray(world, shooter, dir);
            let (at, best) = hits
                .iter()
                .map(|v| priority(v))
                .enumerate()
                .min_by_key(|(_, p)| *p)?;
            // everything between the barrel and the chosen target is hit too
            let victims: Vec<VehicleId> = hits[..=at].iter().map(|v| v.id).collect();
            Some((best, dir, victims))
        })
        .min_by_key(|(best, _, _)| *best)
        .map(|(_, dir, victims)| Intent::Shoot {
            vehicle: shooter.id,
            target: shooter.position + dir,
            victims,
        })
}

/// Vehicles hit when `shooter` fires at `target`, for replaying logged shots.
///
/// A logged straight shot only names a direction, so the whole line out to
/// max range is taken as hit. The next snapshot diff corrects any excess.
pub fn victims_of(world: &WorldModel, shooter: &Vehicle, target: Hex) -> Vec<VehicleId> {
    match shooter.spec().trajectory {
        Trajectory::Curved => world
            .occupant(target)
            .filter(|v| v.player != shooter.player && v.is_alive())
            .map(|v| vec![v.id])
            .unwrap_or_default(),
        Trajectory::Straight => shooter
            .position
            .direction_to(target)
            .map(|dir| ray(world, shooter, dir).iter().map(|v| v.id).collect())
            .unwrap_or_default(),
    }
}

/// Rebuild an intent from an action-log entry. Unknown entries yield `None`.
pub fn intent_from_action(world: &WorldModel, action: &GameAction) -> Option<Intent> {
    let vehicle = world.vehicle(action.data.vehicle_id)?;
    match action.action_type {
        ACTION_MOVE => Some(Intent::Move {
            vehicle: vehicle.id,
            target: action.data.target,
        }),
        ACTION_SHOOT => Some(Intent::Shoot {
            vehicle: vehicle.id,
            target: action.data.target,
            victims: victims_of(world, vehicle, action.data.target),
        }),
        _ => None,
    }
}

/// How many enemy vehicles could fire on `hex` next turn
pub fn threat_level(world: &WorldModel, player: PlayerId, hex: Hex) -> usize {
    world
        .vehicles()
        .filter(|v| v.player != player && v.is_alive())
        .filter(|v| v.in_range(hex))
        .filter(|v| match v.spec().trajectory {
            Trajectory::Curved => true,
            Trajectory::Straight => v.position.direction_to(hex).is_some(),
        })
        .count()
}
