//! Hex grid geometry with cube coordinates

use serde::{Deserialize, Serialize};

/// Cube hex coordinate, `q + r + s == 0`.
///
/// On the wire the three components are named `x`, `y` and `z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hex {
    #[serde(rename = "x")]
    pub q: i32,
    #[serde(rename = "y")]
    pub r: i32,
    #[serde(rename = "z")]
    pub s: i32,
}

/// The map centre, where the base sits.
pub const ORIGIN: Hex = Hex { q: 0, r: 0, s: 0 };

/// Unit vectors for the six neighbours, walked counter-clockwise.
pub const DIRECTIONS: [Hex; 6] = [
    Hex { q: 1, r: 0, s: -1 },
    Hex { q: 1, r: -1, s: 0 },
    Hex { q: 0, r: -1, s: 1 },
    Hex { q: -1, r: 0, s: 1 },
    Hex { q: -1, r: 1, s: 0 },
    Hex { q: 0, r: 1, s: -1 },
];

impl Hex {
    pub const fn new(q: i32, r: i32, s: i32) -> Self {
        Self { q, r, s }
    }

    /// Build from axial coordinates, deriving `s`.
    pub const fn axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Check the cube invariant. Coordinates read off the wire may violate it.
    pub fn is_valid(&self) -> bool {
        self.q + self.r + self.s == 0
    }

    /// `|q| + |r| + |s|`, twice the distance from the origin. Used for tie-breaks.
    pub fn abs(&self) -> i32 {
        self.q.abs() + self.r.abs() + self.s.abs()
    }

    pub fn distance_to(&self, other: Hex) -> i32 {
        (*self - other).abs() / 2
    }

    pub fn distance_to_center(&self) -> i32 {
        self.abs() / 2
    }

    pub fn scale(&self, factor: i32) -> Hex {
        Hex::new(self.q * factor, self.r * factor, self.s * factor)
    }

    /// Neighbour in direction 0-5
    pub fn neighbor(&self, direction: usize) -> Hex {
        *self + DIRECTIONS[direction % 6]
    }

    pub fn neighbors(&self) -> impl Iterator<Item = Hex> + '_ {
        DIRECTIONS.iter().map(move |&d| *self + d)
    }

    /// True when the hex lies on one of the three axes through the origin,
    /// i.e. one cube component is zero.
    pub fn on_axis(&self) -> bool {
        self.q == 0 || self.r == 0 || self.s == 0
    }

    /// Unit direction from `self` towards `other` when both lie on a shared axis.
    pub fn direction_to(&self, other: Hex) -> Option<Hex> {
        let delta = other - *self;
        let d = delta.abs() / 2;
        if d == 0 || !delta.on_axis() {
            return None;
        }
        Some(Hex::new(delta.q / d, delta.r / d, delta.s / d))
    }

    /// Pointy-top pixel centre for a hex of the given circumradius.
    pub fn to_pixel(&self, size: f32) -> (f32, f32) {
        let x = size * 1.5 * self.r as f32;
        let y = size * 3f32.sqrt() * (self.q as f32 + self.r as f32 / 2.0);
        (x, y)
    }
}

impl std::ops::Add for Hex {
    type Output = Hex;

    fn add(self, rhs: Hex) -> Hex {
        Hex::new(self.q + rhs.q, self.r + rhs.r, self.s + rhs.s)
    }
}

impl std::ops::Sub for Hex {
    type Output = Hex;

    fn sub(self, rhs: Hex) -> Hex {
        Hex::new(self.q - rhs.q, self.r - rhs.r, self.s - rhs.s)
    }
}

impl std::fmt::Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.q, self.r, self.s)
    }
}

/// All hexes at exactly `radius` from `center`. Radius 0 yields the centre.
pub fn ring(center: Hex, radius: u32) -> Vec<Hex> {
    if radius == 0 {
        return vec![center];
    }
    let radius = radius as i32;
    let mut hex = center + DIRECTIONS[4].scale(radius);
    let mut out = Vec::with_capacity(6 * radius as usize);
    for dir in 0..6 {
        for _ in 0..radius {
            out.push(hex);
            hex = hex.neighbor(dir);
        }
    }
    out
}

/// All hexes within `radius` of `center`, centre first, then ring by ring.
pub fn spiral(center: Hex, radius: u32) -> Vec<Hex> {
    (0..=radius).flat_map(|k| ring(center, k)).collect()
}

/// Hexes whose distance from `center` lies in `[min, max]`.
pub fn ring_band(center: Hex, min: u32, max: u32) -> Vec<Hex> {
    (min.max(1)..=max).flat_map(|k| ring(center, k)).collect()
}
