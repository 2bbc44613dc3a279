//! Movable, animatable world objects.
//!
//! An [`Entity`] has a continuous position and is owned by whichever chunk's
//! bounds currently contain it (or by the world's overflow set when that
//! chunk is not loaded). Static description lives in [`EntityProperties`];
//! per-frame mutable state lives in [`EntityState`] and serializes as a
//! separate `state` object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::WorldError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// World-unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// A plain 3-component vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ---------------------------------------------------------------------------
// EntityProperties / EntityState
// ---------------------------------------------------------------------------

/// Static description of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProperties {
    pub color: Color,
    /// Cube edge length as a fraction of a cell.
    pub size: f64,
    /// Halo color drawn behind the entity, if any.
    #[serde(default)]
    pub glow: Option<Color>,
    pub health: f64,
    pub max_health: f64,
    #[serde(default)]
    pub sprite_id: Option<String>,
    /// Animation frames advanced per second (0 disables animation).
    #[serde(default)]
    pub animation_fps: f64,
    /// Number of frames in the animation cycle.
    #[serde(default = "default_frames")]
    pub animation_frames: u32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_frames() -> u32 {
    1
}

impl Default for EntityProperties {
    fn default() -> Self {
        Self {
            color: Color::rgb(0xf0, 0xc0, 0x40),
            size: 0.5,
            glow: None,
            health: 100.0,
            max_health: 100.0,
            sprite_id: None,
            animation_fps: 0.0,
            animation_frames: 1,
            metadata: serde_json::Map::new(),
        }
    }
}

/// Mutable per-frame state of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub active: bool,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub animation_frame: u32,
    /// Seconds of animation accumulated so far.
    #[serde(default)]
    pub animation_time: f64,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            active: true,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            animation_frame: 0,
            animation_time: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A movable world object with continuous position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub properties: EntityProperties,
    pub state: EntityState,
}

impl Entity {
    pub fn new(id: EntityId, entity_type: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            x,
            y,
            z,
            properties: EntityProperties::default(),
            state: EntityState::default(),
        }
    }

    pub fn with_properties(mut self, properties: EntityProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.state.velocity = velocity;
        self
    }

    /// Advance position by one step of semi-implicit Euler integration.
    ///
    /// Inactive entities do not move. Entities never sink below the ground
    /// plane; hitting it zeroes vertical velocity.
    pub fn integrate(&mut self, dt: f64) {
        if !self.state.active {
            return;
        }
        let s = &mut self.state;
        s.velocity.x += s.acceleration.x * dt;
        s.velocity.y += s.acceleration.y * dt;
        s.velocity.z += s.acceleration.z * dt;
        self.x += s.velocity.x * dt;
        self.y += s.velocity.y * dt;
        self.z += s.velocity.z * dt;
        if self.z < 0.0 {
            self.z = 0.0;
            s.velocity.z = 0.0;
        }
    }

    /// Advance the animation clock and recompute the current frame.
    pub fn animate(&mut self, dt: f64) {
        let fps = self.properties.animation_fps;
        if !self.state.active || fps <= 0.0 {
            return;
        }
        self.state.animation_time += dt;
        let frames = u64::from(self.properties.animation_frames.max(1));
        let elapsed = (self.state.animation_time * fps).floor() as u64;
        self.state.animation_frame = (elapsed % frames) as u32;
    }

    /// Reduce health, deactivating the entity when it reaches zero.
    pub fn damage(&mut self, amount: f64) {
        self.properties.health = (self.properties.health - amount).max(0.0);
        if self.properties.health <= 0.0 {
            self.state.active = false;
        }
    }

    pub fn heal(&mut self, amount: f64) {
        self.properties.health = (self.properties.health + amount).min(self.properties.max_health);
    }

    /// Whether a health bar should be shown.
    pub fn is_damaged(&self) -> bool {
        self.properties.health < self.properties.max_health
    }

    /// Health as a fraction of max health, in `0.0..=1.0`.
    pub fn health_fraction(&self) -> f64 {
        if self.properties.max_health <= 0.0 {
            return 0.0;
        }
        (self.properties.health / self.properties.max_health).clamp(0.0, 1.0)
    }

    /// Squared distance to a ground-plane point.
    pub fn distance_sq_2d(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Entity should always be JSON-serializable")
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, WorldError> {
        serde_json::from_value(value.clone()).map_err(|e| WorldError::Deserialize {
            what: "entity",
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wisp() -> Entity {
        Entity::new(EntityId(7), "wisp", 1.5, 2.5, 0.0)
    }

    #[test]
    fn integrate_applies_acceleration_then_velocity() {
        let mut e = wisp();
        e.state.acceleration = Vec3::new(2.0, 0.0, 0.0);
        e.integrate(0.5);
        assert!((e.state.velocity.x - 1.0).abs() < 1e-12);
        assert!((e.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn integrate_clamps_to_ground() {
        let mut e = wisp().with_velocity(Vec3::new(0.0, 0.0, -4.0));
        e.integrate(1.0);
        assert_eq!(e.z, 0.0);
        assert_eq!(e.state.velocity.z, 0.0);
    }

    #[test]
    fn inactive_entities_do_not_move() {
        let mut e = wisp().with_velocity(Vec3::new(1.0, 1.0, 0.0));
        e.state.active = false;
        e.integrate(1.0);
        assert_eq!((e.x, e.y), (1.5, 2.5));
    }

    #[test]
    fn animation_wraps_frame_counter() {
        let mut e = wisp();
        e.properties.animation_fps = 4.0;
        e.properties.animation_frames = 3;
        e.animate(0.5); // 2 frames elapsed
        assert_eq!(e.state.animation_frame, 2);
        e.animate(0.25); // 3 frames elapsed -> wraps to 0
        assert_eq!(e.state.animation_frame, 0);
    }

    #[test]
    fn damage_deactivates_at_zero() {
        let mut e = wisp();
        e.damage(30.0);
        assert!(e.is_damaged());
        assert!((e.health_fraction() - 0.7).abs() < 1e-12);
        e.damage(500.0);
        assert_eq!(e.properties.health, 0.0);
        assert!(!e.state.active);
    }

    #[test]
    fn json_keeps_state_separate_from_properties() {
        let mut e = wisp().with_velocity(Vec3::new(0.25, -0.5, 0.0));
        e.properties.glow = Some(Color::rgba(255, 255, 200, 96));
        e.state.animation_frame = 3;

        let json = e.to_json();
        assert_eq!(json["type"], "wisp");
        assert_eq!(json["properties"]["maxHealth"], 100.0);
        assert_eq!(json["state"]["active"], true);
        assert_eq!(json["state"]["velocity"]["y"], -0.5);
        assert_eq!(json["state"]["animationFrame"], 3);

        assert_eq!(Entity::from_json(&json).unwrap(), e);
    }
}
