//! # Core Type Definitions
//!
//! Fundamental types shared by detection, recording and replay: actor identity,
//! world locations, block coordinates and materials.
//!
//! ## Key Types
//!
//! - [`ActorId`] - Stable identifier for a connected participant
//! - [`Location`] - World name plus precise position and orientation
//! - [`BlockPos`] / [`BlockKey`] - Integer block coordinates, with and without world
//! - [`Material`] - Block material name (`"air"` is the empty block)
//! - [`ActorSnapshot`] - Live transient state sampled from the world

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for an actor in the game world.
///
/// Wraps a UUID so actor ids cannot be confused with recording ids or other
/// numeric identifiers.
///
/// ```rust
/// use xray_forensics::ActorId;
///
/// let actor = ActorId::new();
/// let parsed: ActorId = actor.to_string().parse().unwrap();
/// assert_eq!(actor, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Creates a new random actor ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for ActorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Viewers are operators, which are actors themselves.
pub type ViewerId = ActorId;

/// Stable identity of an actor: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

// ============================================================================
// Spatial types
// ============================================================================

/// A 3D position in world space with double precision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear blend from `self` towards `other` by `factor`.
    pub fn lerp(self, other: Position, factor: f64) -> Position {
        self + (other - self) * factor
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// View direction in degrees. Yaw wraps around, pitch is clamped by the client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

/// A named world plus a position and orientation inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub position: Position,
    pub orientation: Orientation,
}

impl Location {
    pub fn new(world: impl Into<String>, position: Position, orientation: Orientation) -> Self {
        Self {
            world: world.into(),
            position,
            orientation,
        }
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

/// A block position qualified by its world, used as the key for overlay state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub world: String,
    pub pos: BlockPos,
}

impl BlockKey {
    pub fn new(world: impl Into<String>, pos: BlockPos) -> Self {
        Self {
            world: world.into(),
            pos,
        }
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.pos.x, self.pos.y, self.pos.z)
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Block material identifier, e.g. `"diamond_ore"`.
///
/// Names are normalised to lowercase so `DIAMOND_ORE` and `diamond_ore` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(CompactString);

impl Material {
    pub const AIR: &'static str = "air";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(CompactString::from(name.as_ref().trim().to_ascii_lowercase()))
    }

    /// The empty block.
    pub fn air() -> Self {
        Self(CompactString::from(Self::AIR))
    }

    pub fn is_air(&self) -> bool {
        self.0 == Self::AIR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Material {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Live actor state
// ============================================================================

/// Movement flags sampled with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementFlags {
    pub crouching: bool,
    pub sprinting: bool,
    pub flying: bool,
}

/// Health and food level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: f64,
    pub food: i32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            health: 20.0,
            food: 20,
        }
    }
}

/// Transient actor state obtained live from the world.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub location: Location,
    pub flags: MovementFlags,
    pub vitals: Vitals,
}

/// Interaction mode of a viewer. Replays switch the viewer to `Spectator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

/// Kind of audio/particle echo played for a replayed block change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Break,
    Place,
}
