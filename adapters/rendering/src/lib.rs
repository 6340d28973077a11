#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Gridbots adapters.
//!
//! Adapters translate world query views into a [`Scene`] and hand it to a
//! [`RenderingBackend`]. The bundled [`TextBackend`] draws the grid as ASCII,
//! north at the top.

use std::{collections::BTreeSet, error::Error, fmt, io::Write};

use anyhow::Result as AnyResult;
use glam::Vec2;
use gridbots_core::{EntityId, GridRef};

const EMPTY_GLYPH: char = '.';
const MOVEMENT_AND_VISION_GLYPH: char = '#';
const MOVEMENT_ONLY_GLYPH: char = 'X';
const VISION_ONLY_GLYPH: char = '~';
const HIGHLIGHT_GLYPH: char = '!';
const ROUTE_GLYPH: char = '+';
const DESTINATION_GLYPH: char = '*';
const MARKER_GLYPH: char = 'o';
const HEADING_GLYPHS: [char; 4] = ['^', '>', 'v', '<'];

/// Describes the square grid overlaying a centred world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridPresentation {
    /// Number of cells along each side.
    pub size: u32,
    /// Side length of the world in world units.
    pub world_size: f32,
}

impl GridPresentation {
    /// Creates a new grid descriptor.
    ///
    /// Returns an error when the grid has no cells or the world has no area.
    pub fn new(size: u32, world_size: f32) -> Result<Self, RenderingError> {
        if size == 0 {
            return Err(RenderingError::EmptyGrid);
        }
        if !world_size.is_finite() || world_size <= 0.0 {
            return Err(RenderingError::InvalidWorldSize { world_size });
        }
        Ok(Self { size, world_size })
    }

    /// Length of a single cell in world units.
    #[must_use]
    pub fn cell_length(&self) -> f32 {
        self.world_size / self.size as f32
    }

    /// Cell containing a world position, or `None` when it lies off the grid.
    #[must_use]
    pub fn cell_of(&self, position: Vec2) -> Option<GridRef> {
        let half = self.world_size / 2.0;
        let scaled = (position + Vec2::splat(half)) / self.cell_length();
        let extent = self.size as f32;
        if !(0.0..=extent).contains(&scaled.x) || !(0.0..=extent).contains(&scaled.y) {
            return None;
        }

        let last = i32::try_from(self.size).unwrap_or(i32::MAX) - 1;
        Some(GridRef::new(
            (scaled.x.floor() as i32).min(last),
            (scaled.y.floor() as i32).min(last),
        ))
    }
}

/// Immutable snapshot describing a bot within the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct BotPresentation {
    /// Identifier allocated to the bot by the world.
    pub id: EntityId,
    /// Human readable label.
    pub name: String,
    /// Position in world coordinates.
    pub position: Vec2,
    /// Heading in degrees clockwise from north.
    pub heading_degrees: f32,
    /// Remaining waypoints, next first.
    pub route: Vec<Vec2>,
    /// Destination being travelled to, if any.
    pub destination: Option<Vec2>,
    /// Peers currently in view.
    pub visible: Vec<EntityId>,
    /// Peers remembered but out of view.
    pub remembered: Vec<EntityId>,
}

impl BotPresentation {
    /// Creates a stationary bot descriptor without route or sightings.
    #[must_use]
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        position: Vec2,
        heading_degrees: f32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            heading_degrees,
            route: Vec::new(),
            destination: None,
            visible: Vec::new(),
            remembered: Vec::new(),
        }
    }

    /// Arrow glyph approximating the heading to the nearest compass point.
    #[must_use]
    pub fn heading_glyph(&self) -> char {
        let quadrant = ((self.heading_degrees.rem_euclid(360.0) + 45.0) / 90.0).floor() as usize;
        HEADING_GLYPHS[quadrant % HEADING_GLYPHS.len()]
    }
}

/// Immutable snapshot describing a passive marker.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerPresentation {
    /// Human readable label.
    pub name: String,
    /// Position in world coordinates.
    pub position: Vec2,
}

/// Aggregated scene description consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Grid overlaying the world.
    pub grid: GridPresentation,
    /// Bots to draw, in identifier order.
    pub bots: Vec<BotPresentation>,
    /// Markers to draw.
    pub markers: Vec<MarkerPresentation>,
    /// Cells that block movement.
    pub movement_blocked: BTreeSet<GridRef>,
    /// Cells that block vision.
    pub vision_blocked: BTreeSet<GridRef>,
    /// Cells singled out for attention.
    pub highlighted: BTreeSet<GridRef>,
    /// Number of steps the world has advanced.
    pub step: u64,
    /// Whether the simulation is paused.
    pub paused: bool,
}

impl Scene {
    /// Creates an empty scene over the provided grid.
    #[must_use]
    pub fn new(grid: GridPresentation) -> Self {
        Self {
            grid,
            bots: Vec::new(),
            markers: Vec::new(),
            movement_blocked: BTreeSet::new(),
            vision_blocked: BTreeSet::new(),
            highlighted: BTreeSet::new(),
            step: 0,
            paused: false,
        }
    }

    fn glyph_at(&self, cell: GridRef) -> char {
        let in_cell = |position: Vec2| self.grid.cell_of(position) == Some(cell);

        if let Some(bot) = self.bots.iter().find(|bot| in_cell(bot.position)) {
            return bot.heading_glyph();
        }
        if self.markers.iter().any(|marker| in_cell(marker.position)) {
            return MARKER_GLYPH;
        }
        if self
            .bots
            .iter()
            .filter_map(|bot| bot.destination)
            .any(in_cell)
        {
            return DESTINATION_GLYPH;
        }
        if self
            .bots
            .iter()
            .flat_map(|bot| bot.route.iter().copied())
            .any(in_cell)
        {
            return ROUTE_GLYPH;
        }
        if self.highlighted.contains(&cell) {
            return HIGHLIGHT_GLYPH;
        }

        match (
            self.movement_blocked.contains(&cell),
            self.vision_blocked.contains(&cell),
        ) {
            (true, true) => MOVEMENT_AND_VISION_GLYPH,
            (true, false) => MOVEMENT_ONLY_GLYPH,
            (false, true) => VISION_ONLY_GLYPH,
            (false, false) => EMPTY_GLYPH,
        }
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title printed above each frame.
    pub title: String,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(title: T, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            title: title.into(),
            scene,
        }
    }
}

/// Rendering backend capable of presenting Gridbots scenes.
pub trait RenderingBackend {
    /// Draws a single frame.
    fn present(&mut self, presentation: &Presentation) -> AnyResult<()>;
}

/// Backend that writes ASCII frames to any writer.
#[derive(Debug)]
pub struct TextBackend<W> {
    out: W,
}

impl<W: Write> TextBackend<W> {
    /// Creates a backend writing frames to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consumes the backend, yielding the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderingBackend for TextBackend<W> {
    fn present(&mut self, presentation: &Presentation) -> AnyResult<()> {
        self.out.write_all(render_text(presentation).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Renders a presentation as text: a header, the grid with north at the top,
/// and one summary line per bot.
#[must_use]
pub fn render_text(presentation: &Presentation) -> String {
    let scene = &presentation.scene;
    let mut text = format!("{} | step {}", presentation.title, scene.step);
    if scene.paused {
        text.push_str(" (paused)");
    }
    text.push('\n');

    let size = i32::try_from(scene.grid.size).unwrap_or(i32::MAX);
    for y in (0..size).rev() {
        text.extend((0..size).map(|x| scene.glyph_at(GridRef::new(x, y))));
        text.push('\n');
    }

    for bot in &scene.bots {
        text.push_str(&format!(
            "{} {} at ({:.1}, {:.1}) heading {:.0}",
            bot.heading_glyph(),
            bot.name,
            bot.position.x,
            bot.position.y,
            bot.heading_degrees
        ));
        if let Some(destination) = bot.destination {
            text.push_str(&format!(
                " -> ({:.1}, {:.1}) via {} waypoint(s)",
                destination.x,
                destination.y,
                bot.route.len()
            ));
        }
        if !bot.visible.is_empty() {
            text.push_str(&format!(" sees {}", join_ids(&bot.visible)));
        }
        if !bot.remembered.is_empty() {
            text.push_str(&format!(" remembers {}", join_ids(&bot.remembered)));
        }
        text.push('\n');
    }
    text
}

fn join_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(|id| id.get().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq)]
pub enum RenderingError {
    /// The grid must contain at least one cell per side.
    EmptyGrid,
    /// The world must have a positive, finite side length.
    InvalidWorldSize {
        /// Provided side length that failed validation.
        world_size: f32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGrid => write!(f, "grid must contain at least one cell"),
            Self::InvalidWorldSize { world_size } => {
                write!(f, "world size must be positive (received {world_size})")
            }
        }
    }
}

impl Error for RenderingError {}
