use std::collections::BTreeSet;

use glam::Vec2;
use gridbots_core::{BotConfig, Command, EntityId, Event, GridRef, ObstacleConfig, WorldConfig};
use gridbots_world::{self as world, query, World, POSITION_ARRIVAL_TOLERANCE};

fn world(size: f32, grid_size: u32) -> World {
    World::new(WorldConfig { size, grid_size }).expect("valid world")
}

fn step(world: &mut World, events: &mut Vec<Event>) {
    world::apply(world, Command::Step, events);
}

fn bot_position(world: &World, id: EntityId) -> Vec2 {
    query::bot_view(world)
        .get(id)
        .map(|bot| bot.position)
        .expect("bot exists")
}

/// Vertical wall two cells wide with a single gap in the top row.
fn walled_world(events: &mut Vec<Event>) -> World {
    let mut world = world(10.0, 10);
    let _ = world.add_entity(
        ObstacleConfig::rectangle("wall", Vec2::new(-0.9, -4.9), Vec2::new(1.8, 8.8)),
        events,
    );
    world
}

#[test]
fn cell_centres_round_trip_through_world_space() {
    for (size, grid_size) in [(100.0, 10), (10.0, 10), (64.0, 16), (7.5, 3)] {
        let world = world(size, grid_size);
        let layout = query::layout(&world);
        for cell in layout.grid().cells() {
            let centre = layout.cell_centre_to_world_pos(cell);
            assert_eq!(layout.grid_ref_from_world_pos(centre), Ok(cell));
        }
    }
}

#[test]
fn routes_start_and_end_at_requested_points() {
    let mut events = Vec::new();
    let world = walled_world(&mut events);
    let layout = query::layout(&world);
    let from = Vec2::new(-3.0, 0.2);
    let to = Vec2::new(3.3, -1.0);

    let route = layout.route(from, to).expect("inside grid").expect("routable");

    assert!(route.len() >= 2);
    assert_eq!(route.first(), Some(&from));
    assert_eq!(route.last(), Some(&to));
}

#[test]
fn route_segments_never_cross_blocking_cells() {
    let mut events = Vec::new();
    let world = walled_world(&mut events);
    let layout = query::layout(&world);

    let route = layout
        .route(Vec2::new(-4.5, -4.5), Vec2::new(4.5, -4.5))
        .expect("inside grid")
        .expect("routable");

    let cells: Vec<GridRef> = route
        .iter()
        .map(|&point| layout.grid_ref_from_world_pos(point).expect("inside grid"))
        .collect();
    for pair in cells.windows(2) {
        assert!(layout.grid().has_line_of_movement(pair[0], pair[1]));
    }
    assert!(cells.iter().any(|cell| cell.y() == 9), "route must use the gap");
}

#[test]
fn route_to_blocked_cell_is_none() {
    let mut events = Vec::new();
    let world = walled_world(&mut events);
    let layout = query::layout(&world);

    assert_eq!(layout.route(Vec2::new(-3.0, 0.0), Vec2::new(0.0, 0.0)), Ok(None));
}

#[test]
fn clear_line_yields_two_point_route() {
    let mut events = Vec::new();
    let world = walled_world(&mut events);
    let layout = query::layout(&world);
    let from = Vec2::new(-4.5, -4.5);
    let to = Vec2::new(-2.5, 3.5);

    assert_eq!(layout.route(from, to), Ok(Some(vec![from, to])));
}

#[test]
fn rectangle_obstacle_blocks_exactly_covered_cells() {
    let mut world = world(10.0, 10);
    let mut events = Vec::new();
    let _ = world.add_entity(
        ObstacleConfig::rectangle("crate", Vec2::new(-3.9, -3.9), Vec2::new(0.8, 1.8)),
        &mut events,
    );

    let expected: BTreeSet<GridRef> = [GridRef::new(1, 1), GridRef::new(1, 2)].into();
    assert_eq!(query::blocking_cells(&world).movement, &expected);
}

#[test]
fn arrival_is_idempotent() {
    let mut world = world(100.0, 10);
    let mut events = Vec::new();
    let bot = world.add_entity(BotConfig::new("walker", Vec2::ZERO), &mut events);
    let destination = Vec2::new(0.0, 10.0);
    world.set_destination(bot, destination, &mut events);

    let mut arrived = false;
    for _ in 0..100 {
        events.clear();
        step(&mut world, &mut events);
        if events.contains(&Event::DestinationReached { bot, destination }) {
            arrived = true;
            break;
        }
    }
    assert!(arrived, "bot never reached its destination");

    let resting = bot_position(&world, bot);
    assert!(resting.distance(destination) <= POSITION_ARRIVAL_TOLERANCE);
    for _ in 0..30 {
        step(&mut world, &mut events);
    }

    let view = query::bot_view(&world);
    let snapshot = view.get(bot).expect("bot exists");
    assert_eq!(snapshot.position, resting);
    assert_eq!(snapshot.velocity, Vec2::ZERO);
    assert!(snapshot.destination.is_none());
    assert!(snapshot.route.is_empty());
}

#[test]
fn peers_directly_behind_are_never_visible() {
    let mut world = world(100.0, 10);
    let mut events = Vec::new();
    let watcher = world.add_entity(BotConfig::new("watcher", Vec2::ZERO), &mut events);
    let behind = world.add_entity(BotConfig::new("behind", Vec2::new(0.0, -5.0)), &mut events);
    let ahead = world.add_entity(BotConfig::new("ahead", Vec2::new(0.0, 5.0)), &mut events);

    for _ in 0..5 {
        step(&mut world, &mut events);
    }

    let view = query::bot_view(&world);
    let visible = &view.get(watcher).expect("watcher exists").visible_bots;
    assert!(!visible.contains(&behind));
    assert!(visible.contains(&ahead));
}

#[test]
fn vision_blocking_obstacle_hides_peers() {
    let mut world = world(10.0, 10);
    let mut events = Vec::new();
    let watcher = world.add_entity(BotConfig::new("watcher", Vec2::new(0.5, -3.5)), &mut events);
    let hidden = world.add_entity(BotConfig::new("hidden", Vec2::new(0.5, 3.5)), &mut events);
    let mut screen = ObstacleConfig::rectangle("screen", Vec2::new(0.1, 0.1), Vec2::new(0.8, 0.8));
    screen.blocks_movement = false;
    let _ = world.add_entity(screen, &mut events);

    step(&mut world, &mut events);

    let view = query::bot_view(&world);
    assert!(!view
        .get(watcher)
        .expect("watcher exists")
        .visible_bots
        .contains(&hidden));
    assert!(query::blocking_cells(&world).movement.is_empty());
}

#[test]
fn half_turn_takes_a_full_rotation_budget_before_moving() {
    let mut world = world(100.0, 10);
    let mut events = Vec::new();
    let bot = world.add_entity(BotConfig::new("turner", Vec2::ZERO), &mut events);
    world.set_destination(bot, Vec2::new(0.0, -20.0), &mut events);

    for _ in 0..119 {
        step(&mut world, &mut events);
    }
    assert_eq!(bot_position(&world, bot), Vec2::ZERO);

    step(&mut world, &mut events);
    let view = query::bot_view(&world);
    let snapshot = view.get(bot).expect("bot exists");
    assert_ne!(snapshot.velocity, Vec2::ZERO);
    assert!(snapshot.position.y < 0.0);
    assert!((snapshot.heading.degrees() - 180.0).abs() < 1e-3);
}

#[test]
fn bot_walks_around_wall_to_reach_destination() {
    let mut events = Vec::new();
    let mut world = walled_world(&mut events);
    let bot = world.add_entity(BotConfig::new("walker", Vec2::new(-3.0, 0.0)), &mut events);
    let destination = Vec2::new(3.0, 0.0);
    world.set_destination(bot, destination, &mut events);
    assert!(matches!(
        events.last(),
        Some(Event::DestinationAccepted { waypoints, .. }) if *waypoints > 1
    ));

    let mut highest = f32::MIN;
    let mut arrived = false;
    for _ in 0..3_000 {
        events.clear();
        step(&mut world, &mut events);
        highest = highest.max(bot_position(&world, bot).y);
        if events.contains(&Event::DestinationReached { bot, destination }) {
            arrived = true;
            break;
        }
    }

    assert!(arrived, "bot never got around the wall");
    assert!(highest > 3.0, "bot did not pass through the gap");
}

#[test]
fn follower_tracks_moving_leader() {
    let mut world = world(100.0, 10);
    let mut events = Vec::new();
    let leader = world.add_entity(BotConfig::new("leader", Vec2::new(0.0, 10.0)), &mut events);
    let mut config = BotConfig::new("follower", Vec2::ZERO);
    config.leader = Some(leader);
    let follower = world.add_entity(config, &mut events);
    world.set_destination(leader, Vec2::new(0.0, 40.0), &mut events);

    for _ in 0..120 {
        step(&mut world, &mut events);
    }

    let view = query::bot_view(&world);
    let leader_state = view.get(leader).expect("leader exists");
    let follower_state = view.get(follower).expect("follower exists");
    assert_eq!(follower_state.leader, Some(leader));
    assert!(follower_state.position.y > 30.0);
    assert!(follower_state.position.distance(leader_state.position) < 2.0);
}

#[test]
fn unreachable_destination_leaves_bot_stuck() {
    let mut events = Vec::new();
    let mut world = walled_world(&mut events);
    let bot = world.add_entity(BotConfig::new("walker", Vec2::new(-3.0, 0.0)), &mut events);
    events.clear();
    let destination = Vec2::new(0.0, 0.0);

    world.set_destination(bot, destination, &mut events);
    for _ in 0..10 {
        step(&mut world, &mut events);
    }

    assert!(events.contains(&Event::RouteNotFound { bot, destination }));
    let view = query::bot_view(&world);
    let snapshot = view.get(bot).expect("bot exists");
    assert_eq!(snapshot.destination, Some(destination));
    assert!(snapshot.route.is_empty());
    assert_eq!(snapshot.position, Vec2::new(-3.0, 0.0));
}
