//! Static obstacles and the grid cells they occupy.

use glam::Vec2;
use gridbots_core::{EntityId, GridRef, ObstacleConfig, ObstacleShape};

use crate::layout::Layout;

#[derive(Clone, Debug)]
pub(crate) struct Obstacle {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) position: Vec2,
    pub(crate) shape: ObstacleShape,
    pub(crate) blocks_movement: bool,
    pub(crate) blocks_vision: bool,
}

impl Obstacle {
    pub(crate) fn from_config(id: EntityId, config: ObstacleConfig) -> Self {
        Self {
            id,
            name: config.name,
            position: config.position,
            shape: config.shape,
            blocks_movement: config.blocks_movement,
            blocks_vision: config.blocks_vision,
        }
    }

    /// Cells whose centre lies inside or on the obstacle.
    pub(crate) fn occupied_cells(&self, layout: &Layout) -> Vec<GridRef> {
        layout
            .grid()
            .cells()
            .into_iter()
            .filter(|&cell| {
                self.shape
                    .contains(self.position, layout.cell_centre_to_world_pos(cell))
            })
            .collect()
    }

    /// Registers the occupied cells with the grid according to the blocking flags.
    pub(crate) fn register(&self, layout: &mut Layout) -> Vec<GridRef> {
        let cells = self.occupied_cells(layout);
        if self.blocks_movement {
            layout.grid_mut().block_movement(cells.iter().copied());
        }
        if self.blocks_vision {
            layout.grid_mut().block_vision(cells.iter().copied());
        }
        cells
    }
}
