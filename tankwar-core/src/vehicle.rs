//! Vehicle classes and per-vehicle state

use crate::hex::Hex;
use serde::{Deserialize, Serialize};

pub type VehicleId = u32;
pub type PlayerId = u32;

/// Damage dealt by a single hit, identical for every class.
pub const SHOT_DAMAGE: i32 = 1;

/// Vehicle class as named by the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    LightTank,
    MediumTank,
    HeavyTank,
    Spg,
    AtSpg,
}

/// Shot resolution model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trajectory {
    /// Lobbed over anything, hits one vehicle anywhere in the range band
    Curved,
    /// Along the three axes, pierces every vehicle on the line
    Straight,
}

/// Static characteristics of a class
#[derive(Clone, Debug)]
pub struct ClassSpec {
    pub class: VehicleClass,
    pub name: &'static str,
    pub speed: u32,
    pub min_range: u32,
    pub max_range: u32,
    /// Preferred distance from the map centre when holding position
    pub optimal_distance: i32,
    pub trajectory: Trajectory,
    /// Position in a player's per-turn action order
    pub action_order: u8,
}

impl ClassSpec {
    const fn new(
        class: VehicleClass,
        name: &'static str,
        speed: u32,
        min_range: u32,
        max_range: u32,
        optimal_distance: i32,
        trajectory: Trajectory,
        action_order: u8,
    ) -> Self {
        Self {
            class,
            name,
            speed,
            min_range,
            max_range,
            optimal_distance,
            trajectory,
            action_order,
        }
    }
}

/// All five classes, indexed by `VehicleClass as usize`
pub static CLASS_SPECS: [ClassSpec; 5] = [
    ClassSpec::new(VehicleClass::LightTank, "light_tank", 3, 2, 2, 1, Trajectory::Curved, 2),
    ClassSpec::new(VehicleClass::MediumTank, "medium_tank", 2, 2, 2, 1, Trajectory::Curved, 3),
    ClassSpec::new(VehicleClass::HeavyTank, "heavy_tank", 1, 1, 2, 2, Trajectory::Curved, 1),
    ClassSpec::new(VehicleClass::Spg, "spg", 1, 3, 3, 3, Trajectory::Curved, 4),
    ClassSpec::new(VehicleClass::AtSpg, "at_spg", 1, 1, 3, 2, Trajectory::Straight, 0),
];

impl VehicleClass {
    pub fn spec(self) -> &'static ClassSpec {
        &CLASS_SPECS[self as usize]
    }

    pub fn repaired_by_heavy(self) -> bool {
        matches!(self, VehicleClass::HeavyTank | VehicleClass::AtSpg)
    }

    pub fn repaired_by_light(self) -> bool {
        self == VehicleClass::MediumTank
    }
}

/// A tank mirrored from the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub player: PlayerId,
    pub class: VehicleClass,
    pub hp: i32,
    pub full_hp: i32,
    pub capture_points: i32,
    pub destruction_points: i32,
    pub position: Hex,
    pub spawn: Hex,
    /// Extra range granted by a catapult, cleared after firing
    pub bonus_range: u32,
}

impl Vehicle {
    pub fn spec(&self) -> &'static ClassSpec {
        self.class.spec()
    }

    pub fn speed(&self) -> u32 {
        self.spec().speed
    }

    pub fn min_range(&self) -> u32 {
        self.spec().min_range
    }

    pub fn max_range(&self) -> u32 {
        self.spec().max_range + self.bonus_range
    }

    pub fn in_range(&self, target: Hex) -> bool {
        let d = self.position.distance_to(target);
        d >= self.min_range() as i32 && d <= self.max_range() as i32
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_damaged(&self) -> bool {
        self.hp < self.full_hp
    }

    pub fn at_optimal_distance(&self) -> bool {
        self.position.distance_to_center() == self.spec().optimal_distance
    }

    pub fn repair(&mut self) {
        self.hp = self.full_hp;
    }

    /// Destroyed: back to spawn with full health. Capture points are left to the server.
    pub fn respawn(&mut self) {
        self.hp = self.full_hp;
        self.position = self.spawn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_table_indexing() {
        for spec in &CLASS_SPECS {
            assert_eq!(spec.class.spec().name, spec.name);
        }
        assert_eq!(VehicleClass::LightTank.spec().speed, 3);
        assert_eq!(VehicleClass::AtSpg.spec().trajectory, Trajectory::Straight);
    }

    #[test]
    fn test_action_order_is_a_permutation() {
        let mut orders: Vec<u8> = CLASS_SPECS.iter().map(|s| s.action_order).collect();
        orders.sort_unstable();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_wire_names() {
        let class: VehicleClass = serde_json::from_str("\"at_spg\"").unwrap();
        assert_eq!(class, VehicleClass::AtSpg);
        assert_eq!(serde_json::to_string(&VehicleClass::MediumTank).unwrap(), "\"medium_tank\"");
    }

    #[test]
    fn test_bonus_range() {
        let mut v = Vehicle {
            id: 1,
            player: 1,
            class: VehicleClass::Spg,
            hp: 1,
            full_hp: 1,
            capture_points: 0,
            destruction_points: 0,
            position: Hex::new(0, 0, 0),
            spawn: Hex::new(0, 0, 0),
            bonus_range: 0,
        };
        assert!(!v.in_range(Hex::new(4, -4, 0)));
        v.bonus_range = 1;
        assert!(v.in_range(Hex::new(4, -4, 0)));
        assert!(!v.in_range(Hex::new(2, -2, 0)));
    }
}
