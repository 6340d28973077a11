#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure chase system that turns sightings of a quarry into leader assignments.

use std::collections::BTreeSet;

use gridbots_core::{Command, EntityId, Event};
use gridbots_world::query::BotView;

/// Configuration parameters required to construct the pursuit system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    quarry: EntityId,
    hunters: BTreeSet<EntityId>,
}

impl Config {
    /// Creates a configuration in which `hunters` chase `quarry` once they spot it.
    #[must_use]
    pub fn new(quarry: EntityId, hunters: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            quarry,
            hunters: hunters
                .into_iter()
                .filter(|&hunter| hunter != quarry)
                .collect(),
        }
    }
}

/// Pure system that makes hunters follow the quarry when it comes into view.
///
/// Hunters keep chasing until the world reports that they lost track of the
/// quarry, after which they wait for the next sighting.
#[derive(Debug)]
pub struct Pursuit {
    quarry: EntityId,
    hunters: BTreeSet<EntityId>,
}

impl Pursuit {
    /// Creates a new pursuit system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            quarry: config.quarry,
            hunters: config.hunters,
        }
    }

    /// Identifier of the bot being chased.
    #[must_use]
    pub const fn quarry(&self) -> EntityId {
        self.quarry
    }

    /// Consumes world events and the current bot view to emit chase commands.
    pub fn handle(&mut self, events: &[Event], bots: &BotView, out: &mut Vec<Command>) {
        let mut recruited = BTreeSet::new();

        for event in events {
            let Event::BotSpotted { bot, other } = *event else {
                continue;
            };
            if other != self.quarry || !self.hunters.contains(&bot) {
                continue;
            }

            let already_chasing = bots
                .get(bot)
                .map_or(true, |snapshot| snapshot.leader == Some(self.quarry));
            if already_chasing || !recruited.insert(bot) {
                continue;
            }

            out.push(Command::SetLeader {
                bot,
                leader: Some(self.quarry),
            });
        }
    }
}
