#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Gridbots.

use glam::Vec2;
use gridbots_core::{Command, EntityConfig, EntityId, Event, MarkerConfig, WorldConfig};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

mod bot;
mod grid;
mod layout;
mod obstacle;
mod priority_queue;

pub use bot::{POSITION_ARRIVAL_TOLERANCE, VISION_CONE_ANGLE};
pub use grid::Grid;
pub use layout::Layout;

use bot::{Bot, PeerSnapshot, StepContext};
use obstacle::Obstacle;

/// Errors raised while building or addressing the world.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum WorldError {
    /// World side length was zero, negative or not finite.
    #[error("world size must be positive and finite, got {size}")]
    InvalidWorldSize {
        /// Rejected side length.
        size: f32,
    },
    /// Grid must contain at least one cell per side.
    #[error("grid size must be at least one cell")]
    InvalidGridSize,
    /// Position is not covered by any grid cell.
    #[error("position {position} lies outside the grid")]
    PositionOutsideGrid {
        /// Offending world position.
        position: Vec2,
    },
}

#[derive(Clone, Debug)]
enum Entity {
    Bot(Bot),
    Obstacle(Obstacle),
    Marker(Marker),
}

#[derive(Clone, Debug)]
struct Marker {
    id: EntityId,
    name: String,
    position: Vec2,
    radius: f32,
}

impl Marker {
    fn from_config(id: EntityId, config: MarkerConfig) -> Self {
        Self {
            id,
            name: config.name,
            position: config.position,
            radius: config.radius,
        }
    }
}

/// Represents the authoritative Gridbots world state.
#[derive(Debug)]
pub struct World {
    layout: Layout,
    entities: Vec<Entity>,
    step_counter: u64,
    is_paused: bool,
}

impl World {
    /// Creates an empty, paused world.
    ///
    /// # Errors
    ///
    /// Returns an error when the world or grid size is degenerate.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        let layout = Layout::new(config)?;
        info!(
            size = config.size,
            grid_size = config.grid_size,
            "world created"
        );
        Ok(Self {
            layout,
            entities: Vec::new(),
            step_counter: 0,
            is_paused: true,
        })
    }

    /// Registers an entity and returns its identifier.
    ///
    /// Obstacles mark their cells on the grid immediately. Entities placed
    /// outside the world are accepted with a warning.
    pub fn add_entity(
        &mut self,
        config: impl Into<EntityConfig>,
        out_events: &mut Vec<Event>,
    ) -> EntityId {
        let config = config.into();
        let id = EntityId::new(u32::try_from(self.entities.len()).unwrap_or(u32::MAX));
        let kind = config.kind();
        let position = config.position();

        if !self.layout.location_is_inside_world_bounds(position) {
            warn!(id = id.get(), ?kind, ?position, "entity placed outside world bounds");
        }

        let entity = match config {
            EntityConfig::Bot(config) => {
                info!(id = id.get(), name = %config.name, ?position, "bot added");
                Entity::Bot(Bot::from_config(id, config))
            }
            EntityConfig::Obstacle(config) => {
                let obstacle = Obstacle::from_config(id, config);
                let cells = obstacle.register(&mut self.layout);
                info!(
                    id = id.get(),
                    name = %obstacle.name,
                    cells = cells.len(),
                    "obstacle added"
                );
                Entity::Obstacle(obstacle)
            }
            EntityConfig::Marker(config) => {
                info!(id = id.get(), name = %config.name, ?position, "marker added");
                Entity::Marker(Marker::from_config(id, config))
            }
        };

        self.entities.push(entity);
        out_events.push(Event::EntityAdded { id, kind });
        id
    }

    /// Proposes a destination to a bot.
    ///
    /// The outcome is reported through `out_events`: acceptance, rejection,
    /// an unroutable destination, or a missing bot.
    pub fn set_destination(
        &mut self,
        bot: EntityId,
        destination: Vec2,
        out_events: &mut Vec<Event>,
    ) {
        let layout = &self.layout;
        let Some(Entity::Bot(target)) = self.entities.get_mut(entity_index(bot)) else {
            warn!(id = bot.get(), "destination addressed to an unknown bot");
            out_events.push(Event::BotMissing { id: bot });
            return;
        };

        if let Err(reason) = target.set_destination(destination, layout, out_events) {
            debug!(bot = %target.name, ?destination, ?reason, "destination rejected");
            out_events.push(Event::DestinationRejected {
                bot,
                destination,
                reason,
            });
        }
    }

    /// Assigns or clears the leader followed by a bot.
    pub fn set_leader(
        &mut self,
        bot: EntityId,
        leader: Option<EntityId>,
        out_events: &mut Vec<Event>,
    ) {
        let Some(Entity::Bot(follower)) = self.entities.get_mut(entity_index(bot)) else {
            warn!(id = bot.get(), "leader assigned to an unknown bot");
            out_events.push(Event::BotMissing { id: bot });
            return;
        };

        if follower.leader != leader {
            debug!(bot = %follower.name, leader = ?leader.map(|id| id.get()), "leader assigned");
            follower.leader = leader;
            out_events.push(Event::LeaderAssigned { bot, leader });
        }
    }

    /// Sets the pause flag consulted by driver loops.
    pub fn set_paused(&mut self, paused: bool, out_events: &mut Vec<Event>) {
        if self.is_paused != paused {
            self.is_paused = paused;
            out_events.push(Event::PauseChanged { paused });
        }
    }

    /// Advances every bot by one step in identifier order.
    ///
    /// The pause flag is not consulted; pausing is the caller's concern.
    pub fn update(&mut self, out_events: &mut Vec<Event>) {
        let layout = &self.layout;
        let entities = &mut self.entities;

        for index in 0..entities.len() {
            let peers: Vec<PeerSnapshot> = entities
                .iter()
                .filter_map(|entity| match entity {
                    Entity::Bot(bot) => Some(bot.snapshot()),
                    Entity::Obstacle(_) | Entity::Marker(_) => None,
                })
                .collect();

            if let Some(Entity::Bot(bot)) = entities.get_mut(index) {
                let mut ctx = StepContext {
                    layout,
                    peers: &peers,
                    events: out_events,
                };
                bot.update(&mut ctx);
            }
        }

        self.step_counter = self.step_counter.saturating_add(1);
        out_events.push(Event::TimeAdvanced {
            step: self.step_counter,
        });
    }

    /// Uniformly samples a position inside the world that does not block movement.
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec2> {
        self.layout.random_position(rng)
    }
}

fn entity_index(id: EntityId) -> usize {
    usize::try_from(id.get()).unwrap_or(usize::MAX)
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::AddEntity { config } => {
            let _ = world.add_entity(config, out_events);
        }
        Command::SetDestination { bot, destination } => {
            world.set_destination(bot, destination, out_events);
        }
        Command::SetLeader { bot, leader } => world.set_leader(bot, leader, out_events),
        Command::SetPaused { paused } => world.set_paused(paused, out_events),
        Command::Step => world.update(out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeSet;

    use glam::Vec2;
    use gridbots_core::{Bearing, EntityId, GridRef, ObstacleShape};

    use super::{Entity, Layout, World};

    /// Provides read-only access to the world's spatial layout and grid.
    #[must_use]
    pub fn layout(world: &World) -> &Layout {
        &world.layout
    }

    /// Number of steps the world has advanced.
    #[must_use]
    pub fn step_counter(world: &World) -> u64 {
        world.step_counter
    }

    /// Reports whether driver loops should hold the simulation.
    #[must_use]
    pub fn is_paused(world: &World) -> bool {
        world.is_paused
    }

    /// Number of registered entities of every kind.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Captures a read-only view of the bots inhabiting the world.
    #[must_use]
    pub fn bot_view(world: &World) -> BotView {
        let snapshots = world
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Bot(bot) => Some(BotSnapshot {
                    id: bot.id,
                    name: bot.name.clone(),
                    position: bot.position,
                    heading: bot.heading,
                    velocity: bot.velocity,
                    destination: bot.destination,
                    route: bot.route.iter().copied().collect(),
                    leader: bot.leader,
                    visible_bots: bot.visible_bots.clone(),
                    remembered_bots: bot.remembered_bots.clone(),
                    has_memory: bot.has_memory,
                    vision_range: bot.vision_range,
                    radius: bot.radius,
                }),
                Entity::Obstacle(_) | Entity::Marker(_) => None,
            })
            .collect();
        BotView { snapshots }
    }

    /// Captures the obstacles registered with the world.
    #[must_use]
    pub fn obstacle_view(world: &World) -> Vec<ObstacleSnapshot> {
        world
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Obstacle(obstacle) => Some(ObstacleSnapshot {
                    id: obstacle.id,
                    name: obstacle.name.clone(),
                    position: obstacle.position,
                    shape: obstacle.shape,
                    blocks_movement: obstacle.blocks_movement,
                    blocks_vision: obstacle.blocks_vision,
                }),
                Entity::Bot(_) | Entity::Marker(_) => None,
            })
            .collect()
    }

    /// Captures the passive markers registered with the world.
    #[must_use]
    pub fn marker_view(world: &World) -> Vec<MarkerSnapshot> {
        world
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Marker(marker) => Some(MarkerSnapshot {
                    id: marker.id,
                    name: marker.name.clone(),
                    position: marker.position,
                    radius: marker.radius,
                }),
                Entity::Bot(_) | Entity::Obstacle(_) => None,
            })
            .collect()
    }

    /// Exposes the cells that block movement and vision.
    #[must_use]
    pub fn blocking_cells(world: &World) -> BlockingCells<'_> {
        let grid = world.layout.grid();
        BlockingCells {
            movement: grid.movement_blocking_cells(),
            vision: grid.vision_blocking_cells(),
        }
    }

    /// Read-only snapshot describing all bots within the world.
    #[derive(Clone, Debug)]
    pub struct BotView {
        snapshots: Vec<BotSnapshot>,
    }

    impl BotView {
        /// Iterator over the captured bot snapshots in identifier order.
        pub fn iter(&self) -> impl Iterator<Item = &BotSnapshot> {
            self.snapshots.iter()
        }

        /// Looks up the snapshot of a single bot.
        #[must_use]
        pub fn get(&self, id: EntityId) -> Option<&BotSnapshot> {
            self.snapshots.iter().find(|snapshot| snapshot.id == id)
        }

        /// Consumes the view, yielding the underlying snapshots.
        pub fn into_vec(self) -> Vec<BotSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single bot's state used for queries.
    #[derive(Clone, Debug, PartialEq)]
    pub struct BotSnapshot {
        /// Unique identifier assigned to the bot.
        pub id: EntityId,
        /// Human readable label.
        pub name: String,
        /// Current position in world coordinates.
        pub position: Vec2,
        /// Current heading.
        pub heading: Bearing,
        /// Current velocity in world units per second.
        pub velocity: Vec2,
        /// Destination being travelled to, if any.
        pub destination: Option<Vec2>,
        /// Remaining waypoints, next first.
        pub route: Vec<Vec2>,
        /// Bot being followed, if any.
        pub leader: Option<EntityId>,
        /// Peers currently in view.
        pub visible_bots: BTreeSet<EntityId>,
        /// Peers seen earlier but no longer in view.
        pub remembered_bots: BTreeSet<EntityId>,
        /// Whether lost peers are remembered.
        pub has_memory: bool,
        /// Distance beyond which peers are not seen.
        pub vision_range: f32,
        /// Body radius.
        pub radius: f32,
    }

    /// Immutable representation of an obstacle.
    #[derive(Clone, Debug, PartialEq)]
    pub struct ObstacleSnapshot {
        /// Unique identifier assigned to the obstacle.
        pub id: EntityId,
        /// Human readable label.
        pub name: String,
        /// Anchor position of the shape.
        pub position: Vec2,
        /// Footprint of the obstacle.
        pub shape: ObstacleShape,
        /// Whether covered cells block movement.
        pub blocks_movement: bool,
        /// Whether covered cells block vision.
        pub blocks_vision: bool,
    }

    /// Immutable representation of a marker.
    #[derive(Clone, Debug, PartialEq)]
    pub struct MarkerSnapshot {
        /// Unique identifier assigned to the marker.
        pub id: EntityId,
        /// Human readable label.
        pub name: String,
        /// Position in world coordinates.
        pub position: Vec2,
        /// Radius in world units.
        pub radius: f32,
    }

    /// Borrowed view of the grid's blocking cell sets.
    #[derive(Clone, Copy, Debug)]
    pub struct BlockingCells<'a> {
        /// Cells agents cannot move through.
        pub movement: &'a BTreeSet<GridRef>,
        /// Cells that obstruct line of sight.
        pub vision: &'a BTreeSet<GridRef>,
    }
}
