//! Class-driven turn planner
//!
//! Each vehicle class walks an ordered list of tactics and takes the first one
//! that commits to something. A tactic can act (move or shoot), deliberately
//! stay put, or pass to the next entry.

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::hex::Hex;
use crate::intent::Intent;
use crate::pathfind::find_path;
use crate::tactics::{choose_move, reachable, resolve_shot, threat_level};
use crate::vehicle::{PlayerId, Vehicle, VehicleClass, VehicleId};
use crate::world::{WorldError, WorldModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tactic {
    /// Shoot the best available target
    Fire,
    /// Head to a repair hex when damaged
    Repair,
    /// Push onto the base
    Advance,
    /// Sit at the class's optimal distance out of enemy reach
    Hold,
}

/// Outcome of evaluating one tactic
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Act(Intent),
    Stay,
    Pass,
}

pub fn tactics_for(class: VehicleClass) -> &'static [Tactic] {
    use Tactic::*;
    match class {
        VehicleClass::LightTank => &[Fire, Advance, Hold],
        VehicleClass::MediumTank => &[Repair, Fire, Advance, Hold],
        VehicleClass::HeavyTank => &[Fire, Repair, Advance, Hold],
        VehicleClass::Spg => &[Fire, Hold, Advance],
        VehicleClass::AtSpg => &[Fire, Repair, Hold, Advance],
    }
}

#[derive(Clone, Debug)]
struct CachedPath {
    goal: Hex,
    steps: Vec<Hex>,
}

/// Plans a player's turn on a world the caller owns.
///
/// Paths are cached per vehicle and dropped at each round change.
#[derive(Debug)]
pub struct BotPlanner<R: Rng> {
    rng: R,
    paths: FxHashMap<VehicleId, CachedPath>,
    round: Option<u32>,
}

impl<R: Rng> BotPlanner<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            paths: FxHashMap::default(),
            round: None,
        }
    }

    pub fn start_round(&mut self, round: u32) {
        if self.round != Some(round) {
            self.paths.clear();
            self.round = Some(round);
        }
    }

    /// Decide every vehicle of `player`, in action order.
    ///
    /// Each decision is applied to `world` before the next vehicle is
    /// considered, so later vehicles see earlier moves and kills.
    pub fn plan_turn(
        &mut self,
        world: &mut WorldModel,
        player: PlayerId,
    ) -> Result<Vec<Intent>, WorldError> {
        let order: Vec<VehicleId> = world.vehicles_of(player).iter().map(|v| v.id).collect();
        let mut intents = Vec::new();

        for id in order {
            let vehicle = world.vehicle(id).ok_or(WorldError::UnknownVehicle(id))?.clone();
            if !vehicle.is_alive() {
                continue;
            }
            if let Some(intent) = self.decide(world, &vehicle) {
                world.apply(&intent)?;
                intents.push(intent);
            }
        }
        Ok(intents)
    }

    fn decide(&mut self, world: &WorldModel, vehicle: &Vehicle) -> Option<Intent> {
        for &tactic in tactics_for(vehicle.class) {
            match self.evaluate(tactic, world, vehicle) {
                Step::Act(intent) => return Some(intent),
                Step::Stay => return None,
                Step::Pass => {}
            }
        }
        None
    }

    pub fn evaluate(&mut self, tactic: Tactic, world: &WorldModel, vehicle: &Vehicle) -> Step {
        match tactic {
            Tactic::Fire => resolve_shot(world, vehicle).map_or(Step::Pass, Step::Act),
            Tactic::Repair => self.repair(world, vehicle),
            Tactic::Advance => self.advance(world, vehicle),
            Tactic::Hold => self.hold(world, vehicle),
        }
    }

    fn repair(&mut self, world: &WorldModel, vehicle: &Vehicle) -> Step {
        if !vehicle.is_damaged() {
            return Step::Pass;
        }
        let stations: Vec<Hex> = if vehicle.class.repaired_by_heavy() {
            world.heavy_repair().collect()
        } else if vehicle.class.repaired_by_light() {
            world.light_repair().collect()
        } else {
            return Step::Pass;
        };
        let goal = stations
            .into_iter()
            .filter(|&h| !world.is_occupied(h))
            .min_by_key(|h| (h.distance_to(vehicle.position), *h));
        match goal {
            Some(goal) => self.route(world, vehicle, goal),
            None => Step::Pass,
        }
    }

    fn advance(&mut self, world: &WorldModel, vehicle: &Vehicle) -> Step {
        if world.is_base(vehicle.position) {
            return Step::Stay;
        }
        let goal = world
            .base()
            .iter()
            .copied()
            .filter(|&h| !world.is_occupied(h))
            .min_by_key(|h| (h.distance_to(vehicle.position), *h));
        match goal {
            Some(goal) => self.route(world, vehicle, goal),
            None => Step::Pass,
        }
    }

    fn hold(&mut self, world: &WorldModel, vehicle: &Vehicle) -> Step {
        let optimal = vehicle.spec().optimal_distance;
        if vehicle.at_optimal_distance() && threat_level(world, vehicle.player, vehicle.position) == 0 {
            return Step::Stay;
        }
        reachable(world, vehicle)
            .into_iter()
            .filter(|h| h.distance_to_center() == optimal)
            .filter(|&h| threat_level(world, vehicle.player, h) == 0)
            .min_by_key(|h| (h.distance_to(vehicle.position), *h))
            .map_or(Step::Pass, |target| Step::Act(Intent::Move { vehicle: vehicle.id, target }))
    }

    /// Next move towards `goal`: cached path, fresh A* path, then greedy fallback
    fn route(&mut self, world: &WorldModel, vehicle: &Vehicle, goal: Hex) -> Step {
        let speed = vehicle.speed() as usize;

        if let Some(cached) = self.paths.get_mut(&vehicle.id) {
            if cached.goal == goal {
                if let Some(dest) = next_stop(world, vehicle, &cached.steps, speed) {
                    cached.steps.drain(..speed.min(cached.steps.len()));
                    return Step::Act(Intent::Move { vehicle: vehicle.id, target: dest });
                }
            }
        }
        self.paths.remove(&vehicle.id);

        if let Some(mut steps) = find_path(world, vehicle.position, goal) {
            if let Some(dest) = next_stop(world, vehicle, &steps, speed) {
                steps.drain(..speed.min(steps.len()));
                self.paths.insert(vehicle.id, CachedPath { goal, steps });
                return Step::Act(Intent::Move { vehicle: vehicle.id, target: dest });
            }
        }

        match choose_move(world, vehicle, &mut self.rng) {
            Some(target) => Step::Act(Intent::Move { vehicle: vehicle.id, target }),
            None => Step::Pass,
        }
    }
}

/// Where a vehicle following `steps` stops this turn, if the way is clear.
///
/// The path must continue from the vehicle's hex, the hexes it crosses must be
/// free, and it may not stop on a spawn point.
fn next_stop(world: &WorldModel, vehicle: &Vehicle, steps: &[Hex], speed: usize) -> Option<Hex> {
    let first = steps.first()?;
    if first.distance_to(vehicle.position) != 1 {
        return None;
    }
    let leg = &steps[..speed.min(steps.len())];
    if leg.iter().any(|&h| !world.is_passable(h) || world.is_occupied(h)) {
        return None;
    }
    let dest = *leg.last()?;
    if world.is_spawn(dest) {
        return None;
    }
    Some(dest)
}
