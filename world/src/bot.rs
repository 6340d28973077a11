//! Steering agents that consume routes and track their peers.

use std::collections::{BTreeSet, VecDeque};

use glam::Vec2;
use gridbots_core::{Bearing, BotConfig, DestinationRejection, EntityId, Event, SIMULATION_FPS};
use tracing::{debug, trace, warn};

use crate::layout::Layout;

/// Distance within which a waypoint or destination counts as reached.
pub const POSITION_ARRIVAL_TOLERANCE: f32 = 1.0;

/// Full angle of the cone in front of a bot within which peers can be seen.
pub const VISION_CONE_ANGLE: f32 = 90.0;

// Absorbs rounding in the bearing maths so a final turn of exactly one step
// completes on that step.
const TURN_EPSILON: f32 = 1e-3;

/// Position and body size of a bot as seen by its peers during a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PeerSnapshot {
    pub(crate) id: EntityId,
    pub(crate) position: Vec2,
    pub(crate) radius: f32,
}

/// Everything a bot may consult or emit while advancing one step.
pub(crate) struct StepContext<'a> {
    pub(crate) layout: &'a Layout,
    pub(crate) peers: &'a [PeerSnapshot],
    pub(crate) events: &'a mut Vec<Event>,
}

#[derive(Clone, Debug)]
pub(crate) struct Bot {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) position: Vec2,
    pub(crate) heading: Bearing,
    pub(crate) velocity: Vec2,
    pub(crate) destination: Option<Vec2>,
    pub(crate) route: VecDeque<Vec2>,
    pub(crate) leader: Option<EntityId>,
    pub(crate) visible_bots: BTreeSet<EntityId>,
    pub(crate) remembered_bots: BTreeSet<EntityId>,
    pub(crate) has_memory: bool,
    pub(crate) max_speed: f32,
    pub(crate) max_rotation_rate: f32,
    pub(crate) vision_range: f32,
    pub(crate) radius: f32,
}

impl Bot {
    pub(crate) fn from_config(id: EntityId, config: BotConfig) -> Self {
        Self {
            id,
            name: config.name,
            position: config.position,
            heading: Bearing::new(config.heading),
            velocity: Vec2::ZERO,
            destination: None,
            route: VecDeque::new(),
            leader: config.leader,
            visible_bots: BTreeSet::new(),
            remembered_bots: BTreeSet::new(),
            has_memory: config.has_memory,
            max_speed: config.max_speed,
            max_rotation_rate: config.max_rotation_rate,
            vision_range: config.vision_range,
            radius: config.radius,
        }
    }

    pub(crate) fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.id,
            position: self.position,
            radius: self.radius,
        }
    }

    /// Largest heading change permitted in a single step, in degrees.
    pub(crate) fn max_rotation_step(&self) -> f32 {
        self.max_rotation_rate / SIMULATION_FPS as f32
    }

    /// Accepts a new destination and plans a route towards it.
    ///
    /// An accepted destination whose route cannot be planned leaves the bot
    /// stopped with a destination and no route.
    pub(crate) fn set_destination(
        &mut self,
        destination: Vec2,
        layout: &Layout,
        events: &mut Vec<Event>,
    ) -> Result<(), DestinationRejection> {
        if destination == self.position {
            return Err(DestinationRejection::AtPosition);
        }
        if self.position.distance(destination) <= POSITION_ARRIVAL_TOLERANCE {
            return Err(DestinationRejection::AlreadyArrived);
        }
        if !layout.location_is_inside_world_bounds(destination) {
            return Err(DestinationRejection::OutsideWorld);
        }

        self.stop();
        self.destination = Some(destination);
        self.route.clear();

        let planned = match layout.route(self.position, destination) {
            Ok(planned) => planned,
            Err(error) => {
                warn!(bot = %self.name, %error, "cannot plan route");
                None
            }
        };
        let Some(waypoints) = planned else {
            warn!(bot = %self.name, ?destination, "no route to destination");
            events.push(Event::RouteNotFound {
                bot: self.id,
                destination,
            });
            return Ok(());
        };

        self.route.extend(waypoints);
        if self.route.len() >= 2 {
            let _ = self.route.pop_front();
        }
        debug!(bot = %self.name, ?destination, waypoints = self.route.len(), "destination accepted");
        events.push(Event::DestinationAccepted {
            bot: self.id,
            destination,
            waypoints: self.route.len(),
        });
        Ok(())
    }

    /// Advances the bot by a single simulation step.
    pub(crate) fn update(&mut self, ctx: &mut StepContext<'_>) {
        self.sense(ctx);
        self.follow_leader(ctx);
        self.steer(ctx.events);
        self.integrate(ctx);
    }

    /// Reports whether `point` lies inside the vision cone and range.
    pub(crate) fn can_see(&self, point: Vec2) -> bool {
        let offset = point - self.position;
        let distance = offset.length();
        if distance >= self.vision_range {
            return false;
        }
        if distance == 0.0 {
            return true;
        }
        self.heading.relative(offset).normalised().abs() <= VISION_CONE_ANGLE / 2.0
    }

    fn has_clear_sight(&self, point: Vec2, layout: &Layout) -> bool {
        match (
            layout.grid_ref_from_world_pos(self.position),
            layout.grid_ref_from_world_pos(point),
        ) {
            (Ok(from), Ok(to)) => layout.grid().has_line_of_sight(from, to),
            _ => true,
        }
    }

    fn sense(&mut self, ctx: &mut StepContext<'_>) {
        let visible: BTreeSet<EntityId> = ctx
            .peers
            .iter()
            .filter(|peer| peer.id != self.id)
            .filter(|peer| {
                self.can_see(peer.position) && self.has_clear_sight(peer.position, ctx.layout)
            })
            .map(|peer| peer.id)
            .collect();

        for &other in visible.difference(&self.visible_bots) {
            trace!(bot = %self.name, other = other.get(), "spotted peer");
            let _ = self.remembered_bots.remove(&other);
            ctx.events.push(Event::BotSpotted { bot: self.id, other });
        }

        let lost: Vec<EntityId> = self.visible_bots.difference(&visible).copied().collect();
        for other in lost {
            trace!(bot = %self.name, other = other.get(), "lost sight of peer");
            ctx.events.push(Event::BotLostSight { bot: self.id, other });
            if self.has_memory {
                let _ = self.remembered_bots.insert(other);
            } else if self.leader == Some(other) {
                debug!(bot = %self.name, leader = other.get(), "leader lost");
                self.leader = None;
                ctx.events.push(Event::LeaderLost {
                    bot: self.id,
                    leader: other,
                });
            }
        }

        self.visible_bots = visible;
    }

    fn follow_leader(&mut self, ctx: &mut StepContext<'_>) {
        let Some(leader) = self.leader else {
            return;
        };
        let Some(target) = ctx
            .peers
            .iter()
            .find(|peer| peer.id == leader)
            .map(|peer| peer.position)
        else {
            return;
        };
        if self.destination == Some(target) {
            return;
        }

        if let Err(reason) = self.set_destination(target, ctx.layout, ctx.events) {
            trace!(bot = %self.name, ?reason, "kept previous destination while following");
        }
    }

    fn steer(&mut self, events: &mut Vec<Event>) {
        let Some(destination) = self.destination else {
            assert!(
                self.route.is_empty(),
                "bot `{}` has waypoints but no destination",
                self.name
            );
            return;
        };

        let Some(&waypoint) = self.route.front() else {
            if self.position.distance(destination) <= POSITION_ARRIVAL_TOLERANCE {
                self.arrive(destination, events);
            }
            return;
        };

        if self.position.distance(waypoint) <= POSITION_ARRIVAL_TOLERANCE {
            let _ = self.route.pop_front();
            self.stop();
            events.push(Event::WaypointReached {
                bot: self.id,
                waypoint,
            });
            if self.route.is_empty() {
                self.arrive(destination, events);
            }
            return;
        }

        self.turn_towards(waypoint);
    }

    fn arrive(&mut self, destination: Vec2, events: &mut Vec<Event>) {
        debug!(bot = %self.name, ?destination, "destination reached");
        self.destination = None;
        self.stop();
        events.push(Event::DestinationReached {
            bot: self.id,
            destination,
        });
    }

    fn turn_towards(&mut self, waypoint: Vec2) {
        let offset = waypoint - self.position;
        let turn = self.heading.relative(offset).normalised();
        let max_step = self.max_rotation_step();

        if turn.abs() <= max_step + TURN_EPSILON {
            self.heading = Bearing::from_vector(offset);
            let speed = self
                .max_speed
                .min(offset.length() * SIMULATION_FPS as f32);
            self.velocity = self.heading.vector() * speed;
        } else {
            self.heading = self.heading.rotated(max_step.copysign(turn));
            self.stop();
        }
    }

    fn integrate(&mut self, ctx: &mut StepContext<'_>) {
        if self.velocity == Vec2::ZERO {
            return;
        }

        let next = self.position + self.velocity / SIMULATION_FPS as f32;
        let blocker = ctx.peers.iter().find(|peer| {
            if peer.id == self.id {
                return false;
            }
            let gap = next.distance(peer.position);
            gap < self.radius + peer.radius && gap < self.position.distance(peer.position)
        });

        if let Some(peer) = blocker {
            trace!(bot = %self.name, by = peer.id.get(), "movement obstructed");
            self.stop();
            ctx.events.push(Event::MovementObstructed {
                bot: self.id,
                by: peer.id,
            });
            return;
        }

        self.position = next;
    }

    fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }
}
