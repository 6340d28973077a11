//! Spatial frame of the world and its mapping onto the navigation grid.

use glam::Vec2;
use gridbots_core::{GridRef, WorldConfig};
use rand::Rng;
use tracing::debug;

use crate::{grid::Grid, WorldError};

const RANDOM_POSITION_ATTEMPTS: usize = 10_000;

/// Square world centred on the origin, overlaid by a square grid.
///
/// The world spans `[-magnitude, magnitude]` on both axes. Cell `(0, 0)` sits
/// in the south-west corner and each cell is `grid_resolution` units wide.
#[derive(Clone, Debug)]
pub struct Layout {
    size: f32,
    magnitude: f32,
    grid_offset: Vec2,
    grid_resolution: f32,
    grid: Grid,
}

impl Layout {
    pub(crate) fn new(config: WorldConfig) -> Result<Self, WorldError> {
        if !config.size.is_finite() || config.size <= 0.0 {
            return Err(WorldError::InvalidWorldSize { size: config.size });
        }
        if config.grid_size == 0 {
            return Err(WorldError::InvalidGridSize);
        }

        let magnitude = config.size / 2.0;
        Ok(Self {
            size: config.size,
            magnitude,
            grid_offset: Vec2::splat(-magnitude),
            grid_resolution: config.size / config.grid_size as f32,
            grid: Grid::new(config.grid_size),
        })
    }

    /// Side length of the world in world units.
    #[must_use]
    pub const fn size(&self) -> f32 {
        self.size
    }

    /// Half the side length; the world spans `[-magnitude, magnitude]`.
    #[must_use]
    pub const fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// World position of the grid's south-west corner.
    #[must_use]
    pub const fn grid_offset(&self) -> Vec2 {
        self.grid_offset
    }

    /// Side length of a single cell in world units.
    #[must_use]
    pub const fn grid_resolution(&self) -> f32 {
        self.grid_resolution
    }

    /// Navigation grid overlaying the world.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Cell containing a world position.
    ///
    /// Positions on the north or east edge of the world belong to the last
    /// row or column.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PositionOutsideGrid`] when the position is not
    /// covered by the grid.
    pub fn grid_ref_from_world_pos(&self, position: Vec2) -> Result<GridRef, WorldError> {
        let scaled = (position - self.grid_offset) / self.grid_resolution;
        let extent = self.grid.size() as f32;
        let covered = |value: f32| (0.0..=extent).contains(&value);
        if !covered(scaled.x) || !covered(scaled.y) {
            return Err(WorldError::PositionOutsideGrid { position });
        }

        let last = i32::try_from(self.grid.size()).unwrap_or(i32::MAX) - 1;
        Ok(GridRef::new(
            (scaled.x.floor() as i32).min(last),
            (scaled.y.floor() as i32).min(last),
        ))
    }

    /// World position of the centre of a cell.
    #[must_use]
    pub fn cell_centre_to_world_pos(&self, cell: GridRef) -> Vec2 {
        let corner = Vec2::new(cell.x() as f32, cell.y() as f32) * self.grid_resolution;
        self.grid_offset + corner + Vec2::splat(self.grid_resolution / 2.0)
    }

    /// Plans waypoints between two world positions.
    ///
    /// Without movement-blocking cells the route is simply `[to]`. Otherwise
    /// the grid route is mapped to cell centres, with its first point replaced
    /// by `from` and its last by `to`. `Ok(None)` means no route exists.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PositionOutsideGrid`] when obstacles are present
    /// and either position lies outside the grid.
    pub fn route(&self, from: Vec2, to: Vec2) -> Result<Option<Vec<Vec2>>, WorldError> {
        if self.grid.movement_blocking_cells().is_empty() {
            return Ok(Some(vec![to]));
        }

        let from_cell = self.grid_ref_from_world_pos(from)?;
        let to_cell = self.grid_ref_from_world_pos(to)?;
        let Some(cells) = self.grid.route(from_cell, to_cell) else {
            return Ok(None);
        };

        let mut waypoints: Vec<Vec2> = cells
            .into_iter()
            .map(|cell| self.cell_centre_to_world_pos(cell))
            .collect();
        if let Some(first) = waypoints.first_mut() {
            *first = from;
        }
        if let Some(last) = waypoints.last_mut() {
            *last = to;
        }
        debug!(?from, ?to, waypoints = waypoints.len(), "planned route");
        Ok(Some(waypoints))
    }

    /// Reports whether a position lies within the world, edges included.
    #[must_use]
    pub fn location_is_inside_world_bounds(&self, position: Vec2) -> bool {
        let bounds = -self.magnitude..=self.magnitude;
        bounds.contains(&position.x) && bounds.contains(&position.y)
    }

    /// Reports whether the cell containing `position` blocks movement.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PositionOutsideGrid`] when the position is not
    /// covered by the grid.
    pub fn position_is_movement_blocked(&self, position: Vec2) -> Result<bool, WorldError> {
        let cell = self.grid_ref_from_world_pos(position)?;
        Ok(self.grid.is_movement_blocking(cell))
    }

    /// Uniformly samples a position inside the world that is not movement-blocked.
    ///
    /// Returns `None` when no free position was found, which happens when every
    /// cell blocks movement.
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec2> {
        let total_cells = u64::from(self.grid.size()) * u64::from(self.grid.size());
        if self.grid.movement_blocking_cells().len() as u64 >= total_cells {
            return None;
        }

        (0..RANDOM_POSITION_ATTEMPTS).find_map(|_| {
            let candidate = Vec2::new(
                rng.gen_range(-self.magnitude..self.magnitude),
                rng.gen_range(-self.magnitude..self.magnitude),
            );
            matches!(self.position_is_movement_blocked(candidate), Ok(false))
                .then_some(candidate)
        })
    }
}
