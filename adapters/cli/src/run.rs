//! Headless driver loop that steps the world and feeds its systems.

use std::fmt;

use anyhow::Result;
use gridbots_core::{Command, Event, GridRef};
use gridbots_rendering::{
    BotPresentation, GridPresentation, MarkerPresentation, Presentation, RenderingBackend, Scene,
};
use gridbots_system_pursuit::Pursuit;
use gridbots_world::{self as world, query, World};
use tracing::{debug, info};

/// Tallies of notable events observed during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) steps: u64,
    pub(crate) destinations_reached: u32,
    pub(crate) waypoints_reached: u32,
    pub(crate) routes_not_found: u32,
    pub(crate) sightings: u32,
    pub(crate) leaders_assigned: u32,
    pub(crate) obstructions: u32,
}

impl Summary {
    fn record(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::TimeAdvanced { step } => self.steps = *step,
                Event::DestinationReached { bot, .. } => {
                    debug!(bot = bot.get(), "destination reached");
                    self.destinations_reached += 1;
                }
                Event::WaypointReached { .. } => self.waypoints_reached += 1,
                Event::RouteNotFound { .. } => self.routes_not_found += 1,
                Event::BotSpotted { .. } => self.sightings += 1,
                Event::LeaderAssigned { .. } => self.leaders_assigned += 1,
                Event::MovementObstructed { .. } => self.obstructions += 1,
                _ => {}
            }
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steps: {}, destinations reached: {}, waypoints reached: {}, \
             routes not found: {}, sightings: {}, leaders assigned: {}, obstructions: {}",
            self.steps,
            self.destinations_reached,
            self.waypoints_reached,
            self.routes_not_found,
            self.sightings,
            self.leaders_assigned,
            self.obstructions
        )
    }
}

/// Options controlling a headless run.
#[derive(Clone, Debug)]
pub(crate) struct RunOptions {
    pub(crate) title: String,
    pub(crate) ticks: u64,
    /// Render a frame every this many steps; zero renders only the final frame.
    pub(crate) render_every: u64,
    pub(crate) highlight: Vec<GridRef>,
}

/// Unpauses the world and advances it `ticks` times, rendering periodically.
pub(crate) fn run<B: RenderingBackend>(
    world: &mut World,
    mut pursuit: Option<Pursuit>,
    options: &RunOptions,
    backend: &mut B,
) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut events = Vec::new();
    world::apply(world, Command::SetPaused { paused: false }, &mut events);

    for tick in 0..options.ticks {
        if query::is_paused(world) {
            continue;
        }

        events.clear();
        world::apply(world, Command::Step, &mut events);

        if let Some(pursuit) = pursuit.as_mut() {
            let bots = query::bot_view(world);
            let mut commands = Vec::new();
            pursuit.handle(&events, &bots, &mut commands);
            for command in commands {
                world::apply(world, command, &mut events);
            }
        }
        summary.record(&events);

        let frame = tick + 1;
        if options.render_every > 0 && frame % options.render_every == 0 && frame < options.ticks {
            backend.present(&presentation(world, options)?)?;
        }
    }

    backend.present(&presentation(world, options)?)?;
    info!(%summary, "run complete");
    Ok(summary)
}

/// Translates the world's query views into a renderable presentation.
pub(crate) fn presentation(world: &World, options: &RunOptions) -> Result<Presentation> {
    let layout = query::layout(world);
    let grid = GridPresentation::new(layout.grid().size(), layout.size())?;
    let mut scene = Scene::new(grid);

    scene.bots = query::bot_view(world)
        .into_vec()
        .into_iter()
        .map(|bot| {
            let mut presentation =
                BotPresentation::new(bot.id, bot.name, bot.position, bot.heading.degrees());
            presentation.route = bot.route;
            presentation.destination = bot.destination;
            presentation.visible = bot.visible_bots.into_iter().collect();
            presentation.remembered = bot.remembered_bots.into_iter().collect();
            presentation
        })
        .collect();
    scene.markers = query::marker_view(world)
        .into_iter()
        .map(|marker| MarkerPresentation {
            name: marker.name,
            position: marker.position,
        })
        .collect();

    let blocking = query::blocking_cells(world);
    scene.movement_blocked = blocking.movement.clone();
    scene.vision_blocked = blocking.vision.clone();
    scene.highlighted = options
        .highlight
        .iter()
        .copied()
        .filter(|&cell| layout.grid().contains(cell))
        .collect();
    scene.step = query::step_counter(world);
    scene.paused = query::is_paused(world);

    Ok(Presentation::new(options.title.clone(), scene))
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use gridbots_core::{BotConfig, WorldConfig};
    use gridbots_rendering::TextBackend;

    use super::*;

    fn options(ticks: u64, render_every: u64) -> RunOptions {
        RunOptions {
            title: String::from("test"),
            ticks,
            render_every,
            highlight: vec![GridRef::new(0, 0), GridRef::new(99, 99)],
        }
    }

    #[test]
    fn run_steps_world_and_renders_frames() {
        let mut world = World::new(WorldConfig::default()).expect("valid world");
        let mut events = Vec::new();
        let bot = world.add_entity(BotConfig::new("walker", Vec2::ZERO), &mut events);
        world.set_destination(bot, Vec2::new(0.0, 10.0), &mut events);
        let mut backend = TextBackend::new(Vec::new());

        let summary = run(&mut world, None, &options(60, 20), &mut backend).expect("run");

        assert_eq!(summary.steps, 60);
        assert_eq!(summary.destinations_reached, 1);
        let output = String::from_utf8(backend.into_inner()).expect("utf8");
        assert_eq!(output.matches("test | step").count(), 3);
        assert!(output.contains("test | step 60\n"));
    }

    #[test]
    fn presentation_drops_highlights_outside_the_grid() {
        let world = World::new(WorldConfig::default()).expect("valid world");

        let presentation = presentation(&world, &options(1, 0)).expect("presentation");

        assert_eq!(presentation.scene.highlighted.len(), 1);
        assert!(presentation.scene.paused);
    }

    #[test]
    fn summary_counts_notable_events() {
        let mut summary = Summary::default();
        let bot = gridbots_core::EntityId::new(0);
        summary.record(&[
            Event::TimeAdvanced { step: 4 },
            Event::BotSpotted {
                bot,
                other: gridbots_core::EntityId::new(1),
            },
            Event::RouteNotFound {
                bot,
                destination: Vec2::ONE,
            },
        ]);

        assert_eq!(summary.steps, 4);
        assert_eq!(summary.sightings, 1);
        assert_eq!(summary.routes_not_found, 1);
        assert!(summary.to_string().contains("routes not found: 1"));
    }
}
