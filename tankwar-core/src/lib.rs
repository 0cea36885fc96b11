//! TANKWAR Core - World model and tactics
//!
//! This crate holds everything about the battle that needs no network:
//! - Hex geometry (cube coordinates, rings, spirals)
//! - Vehicle classes and the server's state documents
//! - The local world mirror and its terrain effects
//! - Neutrality bookkeeping, targeting and pathfinding
//! - The class-driven bot planner

pub mod hex;
pub mod vehicle;
pub mod snapshot;
pub mod intent;
pub mod neutrality;
pub mod world;
pub mod tactics;
pub mod pathfind;
pub mod bot;

// Re-exports for convenient access
pub use hex::{Hex, DIRECTIONS, ORIGIN, ring, spiral, ring_band};
pub use vehicle::{ClassSpec, PlayerId, Trajectory, Vehicle, VehicleClass, VehicleId, CLASS_SPECS};
pub use snapshot::{GameAction, GameActions, GameSnapshot, MapInfo, PlayerInfo};
pub use intent::Intent;
pub use neutrality::ShotLedger;
pub use world::{Terrain, UpdateStats, WorldError, WorldModel};
pub use tactics::{choose_move, intent_from_action, reachable, resolve_shot, threat_level};
pub use pathfind::find_path;
pub use bot::{BotPlanner, Tactic};
