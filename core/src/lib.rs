#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gridbots simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then appends [`Event`] values to a caller-owned
//! log that systems and renderers drain after the tick completes.

use std::ops::{Add, Sub};

use glam::Vec2;
use serde::{Deserialize, Serialize};

mod bearing;

pub use bearing::Bearing;

/// Number of simulation steps executed per simulated second.
pub const SIMULATION_FPS: u32 = 60;

/// Duration of a single simulation step in seconds.
#[must_use]
pub fn step_interval_seconds() -> f32 {
    1.0 / SIMULATION_FPS as f32
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Registers a new entity with the world.
    AddEntity {
        /// Description of the entity to construct.
        config: EntityConfig,
    },
    /// Requests that a bot travel to the provided world position.
    SetDestination {
        /// Identifier of the bot receiving the destination.
        bot: EntityId,
        /// Destination expressed in world coordinates.
        destination: Vec2,
    },
    /// Assigns or clears the leader a bot follows.
    SetLeader {
        /// Identifier of the follower.
        bot: EntityId,
        /// Bot to follow, or `None` to stop following.
        leader: Option<EntityId>,
    },
    /// Toggles the pause flag consulted by driver loops.
    SetPaused {
        /// Whether the simulation should be paused.
        paused: bool,
    },
    /// Advances the simulation by a single step.
    Step,
}

/// Events appended by the world after processing commands and steps.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that an entity was registered.
    EntityAdded {
        /// Identifier assigned to the entity.
        id: EntityId,
        /// Variant of the entity that was added.
        kind: EntityKind,
    },
    /// Indicates that the simulation completed a step.
    TimeAdvanced {
        /// Value of the step counter after the step.
        step: u64,
    },
    /// Announces a change of the pause flag.
    PauseChanged {
        /// Whether the simulation is now paused.
        paused: bool,
    },
    /// Confirms that a bot accepted a destination and planned a route.
    DestinationAccepted {
        /// Identifier of the bot.
        bot: EntityId,
        /// Destination that was accepted.
        destination: Vec2,
        /// Number of waypoints queued to reach the destination.
        waypoints: usize,
    },
    /// Reports that a bot refused a destination.
    DestinationRejected {
        /// Identifier of the bot.
        bot: EntityId,
        /// Destination that was proposed.
        destination: Vec2,
        /// Specific reason the destination was refused.
        reason: DestinationRejection,
    },
    /// Reports that no route exists to an accepted destination.
    RouteNotFound {
        /// Identifier of the stranded bot.
        bot: EntityId,
        /// Destination that could not be routed to.
        destination: Vec2,
    },
    /// Confirms that a bot reached an intermediate waypoint.
    WaypointReached {
        /// Identifier of the bot.
        bot: EntityId,
        /// Waypoint that was reached.
        waypoint: Vec2,
    },
    /// Confirms that a bot arrived at its destination and is now idle.
    DestinationReached {
        /// Identifier of the bot.
        bot: EntityId,
        /// Destination that was reached.
        destination: Vec2,
    },
    /// Reports that a bot gained sight of a peer.
    BotSpotted {
        /// Identifier of the observing bot.
        bot: EntityId,
        /// Identifier of the peer that came into view.
        other: EntityId,
    },
    /// Reports that a bot lost sight of a peer.
    BotLostSight {
        /// Identifier of the observing bot.
        bot: EntityId,
        /// Identifier of the peer that left view.
        other: EntityId,
    },
    /// Confirms a change of the leader followed by a bot.
    LeaderAssigned {
        /// Identifier of the follower.
        bot: EntityId,
        /// Leader now followed, if any.
        leader: Option<EntityId>,
    },
    /// Reports that a follower lost track of its leader.
    LeaderLost {
        /// Identifier of the follower.
        bot: EntityId,
        /// Leader that can no longer be tracked.
        leader: EntityId,
    },
    /// Reports that a bot stopped to avoid overlapping a peer.
    MovementObstructed {
        /// Identifier of the bot that stopped.
        bot: EntityId,
        /// Identifier of the peer in the way.
        by: EntityId,
    },
    /// Reports that a command addressed an entity that is not a bot.
    BotMissing {
        /// Identifier supplied with the command.
        id: EntityId,
    },
}

/// Reasons a bot may refuse a proposed destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationRejection {
    /// The destination equals the bot's current position.
    AtPosition,
    /// The bot is already within arrival tolerance of the destination.
    AlreadyArrived,
    /// The destination lies outside the world bounds.
    OutsideWorld,
}

/// Unique identifier assigned to an entity at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Variants of entities that may inhabit the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Autonomous steering agent.
    Bot,
    /// Static shape that blocks movement, vision, or both.
    Obstacle,
    /// Passive entity with a position and no behaviour.
    Marker,
}

/// Location of a single grid cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridRef {
    x: i32,
    y: i32,
}

impl GridRef {
    /// Creates a new grid cell reference.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column of the referenced cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row of the referenced cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }
}

impl Add for GridRef {
    type Output = GridRef;

    fn add(self, other: GridRef) -> GridRef {
        GridRef::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for GridRef {
    type Output = GridRef;

    fn sub(self, other: GridRef) -> GridRef {
        GridRef::new(self.x - other.x, self.y - other.y)
    }
}

/// Dimensions of a square world and its navigation grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side length of the world in world units. The origin sits at the centre.
    pub size: f32,
    /// Number of grid cells along each side of the world.
    pub grid_size: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: 100.0,
            grid_size: 10,
        }
    }
}

/// Blueprint for any entity accepted by the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityConfig {
    /// Blueprint for a bot.
    Bot(BotConfig),
    /// Blueprint for an obstacle.
    Obstacle(ObstacleConfig),
    /// Blueprint for a passive marker.
    Marker(MarkerConfig),
}

impl EntityConfig {
    /// Kind of entity produced by the blueprint.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Bot(_) => EntityKind::Bot,
            Self::Obstacle(_) => EntityKind::Obstacle,
            Self::Marker(_) => EntityKind::Marker,
        }
    }

    /// Initial position of the entity.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        match self {
            Self::Bot(config) => config.position,
            Self::Obstacle(config) => config.position,
            Self::Marker(config) => config.position,
        }
    }
}

impl From<BotConfig> for EntityConfig {
    fn from(config: BotConfig) -> Self {
        Self::Bot(config)
    }
}

impl From<ObstacleConfig> for EntityConfig {
    fn from(config: ObstacleConfig) -> Self {
        Self::Obstacle(config)
    }
}

impl From<MarkerConfig> for EntityConfig {
    fn from(config: MarkerConfig) -> Self {
        Self::Marker(config)
    }
}

/// Per-instance tunables of a bot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Human readable label used in logs and scenes.
    pub name: String,
    /// Initial position in world coordinates.
    pub position: Vec2,
    /// Initial heading in degrees clockwise from north.
    pub heading: f32,
    /// Top speed in world units per second.
    pub max_speed: f32,
    /// Top rotation rate in degrees per second.
    pub max_rotation_rate: f32,
    /// Distance beyond which peers are not seen.
    pub vision_range: f32,
    /// Body radius used for collision avoidance.
    pub radius: f32,
    /// Whether peers that leave view are remembered.
    pub has_memory: bool,
    /// Bot to follow from the first step.
    pub leader: Option<EntityId>,
}

impl BotConfig {
    /// Default top speed in world units per second.
    pub const DEFAULT_MAX_SPEED: f32 = 60.0;
    /// Default top rotation rate in degrees per second.
    pub const DEFAULT_MAX_ROTATION_RATE: f32 = 90.0;
    /// Default vision range in world units.
    pub const DEFAULT_VISION_RANGE: f32 = 50.0;
    /// Default body radius in world units.
    pub const DEFAULT_RADIUS: f32 = 0.5;

    /// Creates a bot blueprint with default tunables.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Vec2) -> Self {
        Self {
            name: name.into(),
            position,
            ..Self::default()
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: String::from("bot"),
            position: Vec2::ZERO,
            heading: 0.0,
            max_speed: Self::DEFAULT_MAX_SPEED,
            max_rotation_rate: Self::DEFAULT_MAX_ROTATION_RATE,
            vision_range: Self::DEFAULT_VISION_RANGE,
            radius: Self::DEFAULT_RADIUS,
            has_memory: false,
            leader: None,
        }
    }
}

/// Geometric footprint of an obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObstacleShape {
    /// Circle centred on the obstacle position.
    Circle {
        /// Radius in world units.
        radius: f32,
    },
    /// Axis-aligned rectangle whose minimum corner is the obstacle position.
    Rectangle {
        /// Width and height in world units.
        size: Vec2,
    },
}

impl ObstacleShape {
    /// Reports whether `point` lies inside or on the shape anchored at `position`.
    #[must_use]
    pub fn contains(&self, position: Vec2, point: Vec2) -> bool {
        match *self {
            Self::Circle { radius } => point.distance(position) <= radius,
            Self::Rectangle { size } => {
                let max = position + size;
                (position.x..=max.x).contains(&point.x) && (position.y..=max.y).contains(&point.y)
            }
        }
    }
}

/// Blueprint for a static obstacle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Human readable label used in logs and scenes.
    #[serde(default = "default_obstacle_name")]
    pub name: String,
    /// Anchor position in world coordinates.
    pub position: Vec2,
    /// Footprint of the obstacle.
    #[serde(flatten)]
    pub shape: ObstacleShape,
    /// Whether covered cells become impassable.
    #[serde(default = "default_true")]
    pub blocks_movement: bool,
    /// Whether covered cells block line of sight.
    #[serde(default = "default_true")]
    pub blocks_vision: bool,
}

impl ObstacleConfig {
    /// Creates a circular obstacle blocking both movement and vision.
    #[must_use]
    pub fn circle(name: impl Into<String>, centre: Vec2, radius: f32) -> Self {
        Self {
            name: name.into(),
            position: centre,
            shape: ObstacleShape::Circle { radius },
            blocks_movement: true,
            blocks_vision: true,
        }
    }

    /// Creates a rectangular obstacle blocking both movement and vision.
    #[must_use]
    pub fn rectangle(name: impl Into<String>, min_corner: Vec2, size: Vec2) -> Self {
        Self {
            name: name.into(),
            position: min_corner,
            shape: ObstacleShape::Rectangle { size },
            blocks_movement: true,
            blocks_vision: true,
        }
    }
}

fn default_obstacle_name() -> String {
    String::from("obstacle")
}

fn default_true() -> bool {
    true
}

/// Blueprint for a passive marker entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Human readable label used in logs and scenes.
    pub name: String,
    /// Position in world coordinates.
    pub position: Vec2,
    /// Radius in world units.
    #[serde(default)]
    pub radius: f32,
}
