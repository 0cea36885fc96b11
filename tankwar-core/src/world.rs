//! Local mirror of the server's world state

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::hex::{spiral, Hex, ORIGIN};
use crate::intent::Intent;
use crate::neutrality::ShotLedger;
use crate::snapshot::{GameSnapshot, MapInfo};
use crate::vehicle::{PlayerId, Vehicle, VehicleId, SHOT_DAMAGE};

/// Charges each catapult starts the round with
pub const CATAPULT_CHARGES: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("vehicle {vehicle} placed off the grid at {hex}")]
    OffGrid { vehicle: VehicleId, hex: Hex },
}

/// Terrain classification of a hex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Terrain {
    Empty,
    Base,
    Obstacle,
    Catapult,
    LightRepair,
    HeavyRepair,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub terrain: Terrain,
    pub occupant: Option<VehicleId>,
}

/// Fields touched by a snapshot diff
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub moved: usize,
    pub hp_changed: usize,
    pub cp_changed: usize,
    pub unknown: usize,
}

impl UpdateStats {
    pub fn total(&self) -> usize {
        self.moved + self.hp_changed + self.cp_changed
    }
}

/// Hex map, terrain indices, vehicles and shoot history.
///
/// Vehicles live in an arena indexed by a vehicle-id table. The world is rebuilt
/// each round and patched each turn; nothing else mutates it.
#[derive(Clone, Debug)]
pub struct WorldModel {
    radius: u32,
    cells: FxHashMap<Hex, Cell>,
    vehicles: Vec<Vehicle>,
    slots: FxHashMap<VehicleId, usize>,
    base: Vec<Hex>,
    obstacles: FxHashSet<Hex>,
    spawns: FxHashSet<Hex>,
    light_repair: FxHashSet<Hex>,
    heavy_repair: FxHashSet<Hex>,
    catapults: FxHashMap<Hex, u32>,
    ledger: ShotLedger,
}

impl WorldModel {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Build the round's world from the static map and the opening state
    pub fn build(map: &MapInfo, state: &GameSnapshot) -> Result<Self, WorldError> {
        let radius = map.size.saturating_sub(1);
        let mut cells: FxHashMap<Hex, Cell> = spiral(ORIGIN, radius)
            .into_iter()
            .map(|h| (h, Cell { terrain: Terrain::Empty, occupant: None }))
            .collect();

        let mut mark = |hexes: &[Hex], terrain: Terrain| -> Vec<Hex> {
            let mut kept = Vec::with_capacity(hexes.len());
            for h in hexes {
                if let Some(cell) = cells.get_mut(h) {
                    cell.terrain = terrain;
                    kept.push(*h);
                }
            }
            kept
        };

        let base = mark(&map.content.base, Terrain::Base);
        let obstacles = mark(&map.content.obstacle, Terrain::Obstacle).into_iter().collect();
        let light_repair = mark(&map.content.light_repair, Terrain::LightRepair).into_iter().collect();
        let heavy_repair = mark(&map.content.hard_repair, Terrain::HeavyRepair).into_iter().collect();
        let catapults = mark(&map.content.catapult, Terrain::Catapult)
            .into_iter()
            .map(|h| (h, CATAPULT_CHARGES))
            .collect();

        let mut players: Vec<PlayerId> = state.active_players().map(|p| p.idx).collect();
        if players.is_empty() {
            players = state.vehicles.values().map(|v| v.player_id).collect();
            players.sort_unstable();
            players.dedup();
        }

        let mut world = Self {
            radius,
            cells,
            vehicles: Vec::with_capacity(state.vehicles.len()),
            slots: FxHashMap::default(),
            base,
            obstacles,
            spawns: FxHashSet::default(),
            light_repair,
            heavy_repair,
            catapults,
            ledger: ShotLedger::new(players),
        };

        for (&id, info) in &state.vehicles {
            if !world.contains(info.position) {
                return Err(WorldError::OffGrid { vehicle: id, hex: info.position });
            }
            world.spawns.insert(info.spawn_position);
            world.slots.insert(id, world.vehicles.len());
            world.vehicles.push(Vehicle {
                id,
                player: info.player_id,
                class: info.vehicle_type,
                hp: info.health,
                full_hp: info.health,
                capture_points: info.capture_points,
                destruction_points: 0,
                position: info.position,
                spawn: info.spawn_position,
                bonus_range: 0,
            });
            if let Some(cell) = world.cells.get_mut(&info.position) {
                cell.occupant = Some(id);
            }
        }

        Ok(world)
    }

    /// Patch vehicles from a new snapshot. Only fields that differ from the
    /// cached values are touched; the server always wins.
    pub fn update(&mut self, state: &GameSnapshot) -> UpdateStats {
        let mut stats = UpdateStats::default();
        for (id, info) in &state.vehicles {
            let Some(&slot) = self.slots.get(id) else {
                stats.unknown += 1;
                continue;
            };
            if self.vehicles[slot].position != info.position {
                self.relocate(slot, info.position);
                stats.moved += 1;
            }
            let vehicle = &mut self.vehicles[slot];
            if vehicle.hp != info.health {
                vehicle.hp = info.health;
                stats.hp_changed += 1;
            }
            if vehicle.capture_points != info.capture_points {
                vehicle.capture_points = info.capture_points;
                stats.cp_changed += 1;
            }
        }
        stats
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn contains(&self, hex: Hex) -> bool {
        self.cells.contains_key(&hex)
    }

    pub fn hexes(&self) -> impl Iterator<Item = Hex> + '_ {
        self.cells.keys().copied()
    }

    pub fn terrain(&self, hex: Hex) -> Option<Terrain> {
        self.cells.get(&hex).map(|c| c.terrain)
    }

    pub fn is_obstacle(&self, hex: Hex) -> bool {
        self.obstacles.contains(&hex)
    }

    /// On the grid and not an obstacle
    pub fn is_passable(&self, hex: Hex) -> bool {
        self.contains(hex) && !self.is_obstacle(hex)
    }

    pub fn is_spawn(&self, hex: Hex) -> bool {
        self.spawns.contains(&hex)
    }

    pub fn is_base(&self, hex: Hex) -> bool {
        self.terrain(hex) == Some(Terrain::Base)
    }

    pub fn base(&self) -> &[Hex] {
        &self.base
    }

    pub fn light_repair(&self) -> impl Iterator<Item = Hex> + '_ {
        self.light_repair.iter().copied()
    }

    pub fn heavy_repair(&self) -> impl Iterator<Item = Hex> + '_ {
        self.heavy_repair.iter().copied()
    }

    pub fn catapult_charges(&self, hex: Hex) -> Option<u32> {
        self.catapults.get(&hex).copied()
    }

    pub fn occupant(&self, hex: Hex) -> Option<&Vehicle> {
        let id = self.cells.get(&hex)?.occupant?;
        self.vehicle(id).filter(|v| v.position == hex)
    }

    pub fn is_occupied(&self, hex: Hex) -> bool {
        self.occupant(hex).is_some()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.slots.get(&id).map(|&slot| &self.vehicles[slot])
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    /// A player's vehicles in the order they act
    pub fn vehicles_of(&self, player: PlayerId) -> Vec<&Vehicle> {
        let mut owned: Vec<&Vehicle> = self.vehicles.iter().filter(|v| v.player == player).collect();
        owned.sort_by_key(|v| (v.spec().action_order, v.id));
        owned
    }

    pub fn players(&self) -> &[PlayerId] {
        self.ledger.players()
    }

    pub fn ledger(&self) -> &ShotLedger {
        &self.ledger
    }

    pub fn is_neutral(&self, shooter: PlayerId, target: PlayerId) -> bool {
        self.ledger.is_neutral(shooter, target)
    }

    // ========================================================================
    // TERRAIN EFFECTS
    // ========================================================================

    /// A catapult with charges left sits on `hex`
    pub fn catapult_available(&self, hex: Hex) -> bool {
        self.catapults.get(&hex).is_some_and(|&c| c > 0)
    }

    /// Entering `hex` would fully repair `vehicle`
    pub fn repairs(&self, vehicle: &Vehicle, hex: Hex) -> bool {
        (vehicle.class.repaired_by_heavy() && self.heavy_repair.contains(&hex))
            || (vehicle.class.repaired_by_light() && self.light_repair.contains(&hex))
    }

    /// Grant bonus range when entering a charged catapult. Returns whether it fired.
    pub fn catapult_check(&mut self, id: VehicleId, hex: Hex) -> Result<bool, WorldError> {
        let slot = self.slot(id)?;
        match self.catapults.get_mut(&hex) {
            Some(charges) if *charges > 0 => {
                *charges -= 1;
                self.vehicles[slot].bonus_range = 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Heavy repair heals heavy tanks and tank destroyers only
    pub fn heavy_repair_check(&mut self, id: VehicleId, hex: Hex) -> Result<bool, WorldError> {
        let slot = self.slot(id)?;
        let vehicle = &mut self.vehicles[slot];
        if vehicle.class.repaired_by_heavy() && self.heavy_repair.contains(&hex) {
            vehicle.repair();
            return Ok(true);
        }
        Ok(false)
    }

    /// Light repair heals medium tanks only
    pub fn light_repair_check(&mut self, id: VehicleId, hex: Hex) -> Result<bool, WorldError> {
        let slot = self.slot(id)?;
        let vehicle = &mut self.vehicles[slot];
        if vehicle.class.repaired_by_light() && self.light_repair.contains(&hex) {
            vehicle.repair();
            return Ok(true);
        }
        Ok(false)
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Clear a player's shoot history at the start of its turn
    pub fn reset_shots(&mut self, player: PlayerId) {
        self.ledger.clear(player);
    }

    /// Move locally and apply terrain effects at the destination
    pub fn move_vehicle(&mut self, id: VehicleId, to: Hex) -> Result<(), WorldError> {
        let slot = self.slot(id)?;
        self.relocate(slot, to);
        self.catapult_check(id, to)?;
        self.heavy_repair_check(id, to)?;
        self.light_repair_check(id, to)?;
        Ok(())
    }

    /// One hit from `shooter` on `victim`
    pub fn apply_hit(&mut self, shooter: VehicleId, victim: VehicleId) -> Result<(), WorldError> {
        let shooter_slot = self.slot(shooter)?;
        let victim_slot = self.slot(victim)?;
        let shooter_player = self.vehicles[shooter_slot].player;
        let victim_player = self.vehicles[victim_slot].player;

        let hp = self.vehicles[victim_slot].hp - SHOT_DAMAGE;
        if hp <= 0 {
            let full_hp = self.vehicles[victim_slot].full_hp;
            self.vehicles[shooter_slot].destruction_points += full_hp;
            let spawn = self.vehicles[victim_slot].spawn;
            self.relocate(victim_slot, spawn);
            self.vehicles[victim_slot].respawn();
        } else {
            self.vehicles[victim_slot].hp = hp;
        }

        self.ledger.record(shooter_player, victim_player);
        Ok(())
    }

    pub fn apply(&mut self, intent: &Intent) -> Result<(), WorldError> {
        match intent {
            Intent::Move { vehicle, target } => self.move_vehicle(*vehicle, *target),
            Intent::Shoot { vehicle, victims, .. } => {
                for &victim in victims {
                    self.apply_hit(*vehicle, victim)?;
                }
                let slot = self.slot(*vehicle)?;
                self.vehicles[slot].bonus_range = 0;
                Ok(())
            }
        }
    }

    fn slot(&self, id: VehicleId) -> Result<usize, WorldError> {
        self.slots.get(&id).copied().ok_or(WorldError::UnknownVehicle(id))
    }

    fn relocate(&mut self, slot: usize, to: Hex) {
        let id = self.vehicles[slot].id;
        let from = self.vehicles[slot].position;
        if let Some(cell) = self.cells.get_mut(&from) {
            if cell.occupant == Some(id) {
                cell.occupant = None;
            }
        }
        if let Some(cell) = self.cells.get_mut(&to) {
            cell.occupant = Some(id);
        }
        self.vehicles[slot].position = to;
    }
}
