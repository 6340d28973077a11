//! TOML scenario files describing the initial world and the bots inhabiting it.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use glam::Vec2;
use gridbots_core::{
    BotConfig, Command, EntityId, Event, GridRef, MarkerConfig, ObstacleConfig, WorldConfig,
};
use gridbots_system_pursuit::{Config as PursuitConfig, Pursuit};
use gridbots_world::{self as world, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::info;

/// Scenario used when no file is supplied on the command line.
pub(crate) const BUILTIN_SCENARIO: &str = include_str!("../../../scenarios/obstacles.toml");

const DEFAULT_TICKS: u64 = 600;
const DEFAULT_RANDOM_BOT_PREFIX: &str = "drone";

/// Declarative description of a run.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Scenario {
    /// Title printed above rendered frames.
    #[serde(default = "default_title")]
    pub(crate) title: String,
    /// Number of steps to simulate.
    #[serde(default = "default_ticks")]
    pub(crate) ticks: u64,
    /// Seed for randomly placed bots.
    #[serde(default)]
    pub(crate) seed: u64,
    #[serde(default)]
    pub(crate) world: WorldConfig,
    #[serde(default)]
    pub(crate) bots: Vec<BotEntry>,
    #[serde(default)]
    pub(crate) obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub(crate) markers: Vec<MarkerConfig>,
    pub(crate) random_bots: Option<RandomBots>,
    pub(crate) pursuit: Option<PursuitEntry>,
    /// Cells to highlight in rendered frames.
    #[serde(default)]
    pub(crate) highlight: Vec<GridRef>,
}

/// Bot blueprint with scenario-level extras.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct BotEntry {
    #[serde(flatten)]
    pub(crate) config: BotConfig,
    /// Name of the bot to follow.
    pub(crate) follow: Option<String>,
    /// Destination assigned before the first step.
    pub(crate) destination: Option<Vec2>,
}

/// Bots placed and sent to random free positions.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct RandomBots {
    pub(crate) count: u32,
    #[serde(default = "default_random_prefix")]
    pub(crate) prefix: String,
    #[serde(default)]
    pub(crate) has_memory: bool,
}

/// Chase configuration referencing bots by name.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct PursuitEntry {
    pub(crate) quarry: String,
    /// Hunters by name; every other bot hunts when empty.
    #[serde(default)]
    pub(crate) hunters: Vec<String>,
}

/// World populated from a scenario, ready to run.
#[derive(Debug)]
pub(crate) struct Setup {
    pub(crate) world: World,
    pub(crate) pursuit: Option<Pursuit>,
    pub(crate) highlight: Vec<GridRef>,
    pub(crate) names: BTreeMap<String, EntityId>,
}

fn default_title() -> String {
    String::from("gridbots")
}

fn default_ticks() -> u64 {
    DEFAULT_TICKS
}

fn default_random_prefix() -> String {
    String::from(DEFAULT_RANDOM_BOT_PREFIX)
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Parses a scenario from TOML text.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the world described by the scenario.
    ///
    /// Obstacles are registered first so that randomly placed bots avoid them.
    pub(crate) fn build(&self, events: &mut Vec<Event>) -> Result<Setup> {
        let mut world = World::new(self.world).context("invalid world dimensions")?;

        for obstacle in &self.obstacles {
            let _ = world.add_entity(obstacle.clone(), events);
        }
        for marker in &self.markers {
            let _ = world.add_entity(marker.clone(), events);
        }

        let mut names = BTreeMap::new();
        for entry in &self.bots {
            let mut config = entry.config.clone();
            config.leader = None;
            let name = config.name.clone();
            let id = world.add_entity(config, events);
            if names.insert(name.clone(), id).is_some() {
                bail!("bot name `{name}` is used more than once");
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut random_destinations = Vec::new();
        if let Some(random) = &self.random_bots {
            for index in 0..random.count {
                let position = world
                    .random_position(&mut rng)
                    .context("no free space left for random bots")?;
                let destination = world
                    .random_position(&mut rng)
                    .context("no free space left for random destinations")?;
                let mut config = BotConfig::new(format!("{}-{index}", random.prefix), position);
                config.has_memory = random.has_memory;
                let name = config.name.clone();
                let id = world.add_entity(config, events);
                if names.insert(name.clone(), id).is_some() {
                    bail!("bot name `{name}` is used more than once");
                }
                random_destinations.push((id, destination));
            }
        }

        for entry in &self.bots {
            let Some(id) = names.get(&entry.config.name).copied() else {
                continue;
            };
            let leader = match &entry.follow {
                Some(leader) => Some(lookup(&names, leader)?),
                None => entry.config.leader,
            };
            if leader.is_some() {
                world::apply(&mut world, Command::SetLeader { bot: id, leader }, events);
            }
            if let Some(destination) = entry.destination {
                world::apply(
                    &mut world,
                    Command::SetDestination {
                        bot: id,
                        destination,
                    },
                    events,
                );
            }
        }
        for (bot, destination) in random_destinations {
            world::apply(&mut world, Command::SetDestination { bot, destination }, events);
        }

        let pursuit = self
            .pursuit
            .as_ref()
            .map(|entry| {
                let quarry = lookup(&names, &entry.quarry)?;
                let hunters = if entry.hunters.is_empty() {
                    names.values().copied().collect::<Vec<_>>()
                } else {
                    entry
                        .hunters
                        .iter()
                        .map(|hunter| lookup(&names, hunter))
                        .collect::<Result<Vec<_>>>()?
                };
                info!(quarry = %entry.quarry, hunters = hunters.len(), "pursuit configured");
                Ok::<_, anyhow::Error>(Pursuit::new(PursuitConfig::new(quarry, hunters)))
            })
            .transpose()?;

        Ok(Setup {
            world,
            pursuit,
            highlight: self.highlight.clone(),
            names,
        })
    }
}

fn lookup(names: &BTreeMap<String, EntityId>, name: &str) -> Result<EntityId> {
    names
        .get(name)
        .copied()
        .with_context(|| format!("no bot named `{name}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbots_core::ObstacleShape;
    use gridbots_world::query;

    const FOLLOWING: &str = r#"
title = "following"
ticks = 30

[world]
size = 40.0
grid_size = 8

[[bots]]
name = "leader"
position = [0.0, 5.0]
destination = [0.0, 15.0]

[[bots]]
name = "follower"
position = [0.0, -5.0]
has_memory = true
follow = "leader"

[[obstacles]]
name = "block"
shape = "rectangle"
position = [-15.0, -15.0]
size = [4.0, 4.0]
blocks_vision = false

[[markers]]
name = "flag"
position = [10.0, 10.0]
"#;

    #[test]
    fn parses_scenario_with_defaults() {
        let scenario = Scenario::parse(FOLLOWING).expect("valid scenario");

        assert_eq!(scenario.ticks, 30);
        assert_eq!(scenario.world.grid_size, 8);
        assert_eq!(scenario.bots.len(), 2);
        assert_eq!(scenario.bots[0].config.max_speed, BotConfig::DEFAULT_MAX_SPEED);
        assert!(scenario.bots[1].config.has_memory);
        assert_eq!(scenario.bots[1].follow.as_deref(), Some("leader"));
        assert_eq!(
            scenario.obstacles[0].shape,
            ObstacleShape::Rectangle {
                size: Vec2::new(4.0, 4.0)
            }
        );
        assert!(scenario.obstacles[0].blocks_movement);
        assert!(!scenario.obstacles[0].blocks_vision);
        assert_eq!(scenario.markers[0].radius, 0.0);
    }

    #[test]
    fn builds_world_with_named_leaders() {
        let scenario = Scenario::parse(FOLLOWING).expect("valid scenario");
        let mut events = Vec::new();

        let setup = scenario.build(&mut events).expect("buildable scenario");

        let leader = setup.names["leader"];
        let follower = setup.names["follower"];
        let bots = query::bot_view(&setup.world);
        assert_eq!(bots.get(follower).and_then(|bot| bot.leader), Some(leader));
        assert_eq!(
            bots.get(leader).and_then(|bot| bot.destination),
            Some(Vec2::new(0.0, 15.0))
        );
        assert_eq!(query::obstacle_view(&setup.world).len(), 1);
        assert_eq!(query::marker_view(&setup.world).len(), 1);
        assert!(setup.pursuit.is_none());
    }

    #[test]
    fn unknown_leader_is_an_error() {
        let text = FOLLOWING.replace("follow = \"leader\"", "follow = \"ghost\"");
        let scenario = Scenario::parse(&text).expect("valid scenario");
        let mut events = Vec::new();

        let error = scenario.build(&mut events).expect_err("ghost is not a bot");

        assert!(error.to_string().contains("ghost"));
    }

    #[test]
    fn random_bots_are_reproducible() {
        let text = format!("{FOLLOWING}\n[random_bots]\ncount = 3\n");
        let scenario = Scenario::parse(&text).expect("valid scenario");

        let positions = |scenario: &Scenario| {
            let mut events = Vec::new();
            let setup = scenario.build(&mut events).expect("buildable scenario");
            query::bot_view(&setup.world)
                .into_vec()
                .into_iter()
                .map(|bot| (bot.name, bot.position))
                .collect::<Vec<_>>()
        };

        let first = positions(&scenario);
        assert_eq!(first.len(), 5);
        assert!(first.iter().any(|(name, _)| name == "drone-2"));
        assert_eq!(first, positions(&scenario));
    }

    #[test]
    fn pursuit_defaults_to_every_other_bot() {
        let text = format!("{FOLLOWING}\n[pursuit]\nquarry = \"leader\"\n");
        let scenario = Scenario::parse(&text).expect("valid scenario");
        let mut events = Vec::new();

        let setup = scenario.build(&mut events).expect("buildable scenario");

        let pursuit = setup.pursuit.expect("pursuit configured");
        assert_eq!(pursuit.quarry(), setup.names["leader"]);
    }

    #[test]
    fn builtin_scenario_parses() {
        let scenario = Scenario::parse(BUILTIN_SCENARIO).expect("valid builtin scenario");
        let mut events = Vec::new();
        assert!(scenario.build(&mut events).is_ok());
    }
}
