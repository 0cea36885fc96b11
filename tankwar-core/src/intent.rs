//! Decisions submitted by agents and applied to the world by its owner

use serde::{Deserialize, Serialize};

use crate::hex::Hex;
use crate::vehicle::VehicleId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Move {
        vehicle: VehicleId,
        target: Hex,
    },
    /// `target` is the hex sent to the server; `victims` every vehicle the shot damages
    Shoot {
        vehicle: VehicleId,
        target: Hex,
        victims: Vec<VehicleId>,
    },
}

impl Intent {
    pub fn vehicle(&self) -> VehicleId {
        match self {
            Intent::Move { vehicle, .. } | Intent::Shoot { vehicle, .. } => *vehicle,
        }
    }

    pub fn target(&self) -> Hex {
        match self {
            Intent::Move { target, .. } | Intent::Shoot { target, .. } => *target,
        }
    }
}
