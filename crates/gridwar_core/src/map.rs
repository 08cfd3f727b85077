//! Tile map state and queries.
//!
//! [`MapInfo`] is the single map of a simulation: a row-major grid of
//! terrain cells plus the occupancy table of harvestable resource
//! entities. Coordinates are signed so that "current tile + direction"
//! can be queried without pre-checking the edges; anything outside the
//! grid reads as blocked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::error::{GameError, Result};

/// A tile coordinate `(x, y)`.
pub type TileCoord = (i32, i32);

/// Terrain type of a map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Walkable terrain.
    #[default]
    Open,
    /// Impassable terrain.
    Blocked,
}

impl CellType {
    /// Returns true if units can enter this cell.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Map state shared by every player of a simulation.
///
/// Snapshots are checked on load: the cell count must match the
/// dimensions and every resource must sit on an open in-bounds tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMapInfo")]
pub struct MapInfo {
    /// Grid width in tiles.
    width: u32,
    /// Grid height in tiles.
    height: u32,
    /// Cell data stored in row-major order.
    cells: Vec<CellType>,
    /// Resource entity occupying each tile.
    resources: BTreeMap<TileCoord, EntityId>,
}

/// Unchecked wire form of [`MapInfo`].
#[derive(Deserialize)]
struct RawMapInfo {
    width: u32,
    height: u32,
    cells: Vec<CellType>,
    resources: BTreeMap<TileCoord, EntityId>,
}

impl TryFrom<RawMapInfo> for MapInfo {
    type Error = GameError;

    fn try_from(raw: RawMapInfo) -> Result<Self> {
        check_dimensions(raw.width, raw.height)?;
        let expected = (raw.width as usize) * (raw.height as usize);
        if raw.cells.len() != expected {
            return Err(GameError::InvalidMap(format!(
                "{}x{} map has {} cells, expected {expected}",
                raw.width,
                raw.height,
                raw.cells.len()
            )));
        }

        let map = Self {
            width: raw.width,
            height: raw.height,
            cells: raw.cells,
            resources: BTreeMap::new(),
        };
        if let Some(&(x, y)) = raw
            .resources
            .keys()
            .find(|&&(x, y)| !map.get_cell(x, y).is_some_and(CellType::is_walkable))
        {
            return Err(GameError::InvalidMap(format!(
                "resource on unusable tile ({x}, {y})"
            )));
        }
        Ok(Self {
            resources: raw.resources,
            ..map
        })
    }
}

/// Maps are non-empty and every in-bounds tile fits in `i32`.
fn check_dimensions(width: u32, height: u32) -> Result<()> {
    let limit = i32::MAX.unsigned_abs();
    if width == 0 || height == 0 || width > limit || height > limit {
        return Err(GameError::InvalidMap(format!(
            "map size {width}x{height} is out of range"
        )));
    }
    Ok(())
}

impl MapInfo {
    /// Create a new map with all cells open.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero or larger than `i32::MAX`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "MapInfo width must be positive");
        assert!(height > 0, "MapInfo height must be positive");
        assert!(
            check_dimensions(width, height).is_ok(),
            "MapInfo size must fit in i32"
        );

        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![CellType::Open; cell_count],
            resources: BTreeMap::new(),
        }
    }

    /// Build a map from ASCII rows: `#` is blocked, `.` is open.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidMap`] for empty input, ragged rows or
    /// unknown characters.
    pub fn from_ascii(layout: &str) -> Result<Self> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .collect();
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.chars().count());
        if width == 0 || height == 0 {
            return Err(GameError::InvalidMap("layout is empty".to_string()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(GameError::InvalidMap(format!(
                    "row {y} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for ch in row.chars() {
                cells.push(match ch {
                    '.' => CellType::Open,
                    '#' => CellType::Blocked,
                    other => {
                        return Err(GameError::InvalidMap(format!(
                            "unknown tile '{other}' in row {y}"
                        )))
                    }
                });
            }
        }

        let width = u32::try_from(width).map_err(|_| GameError::InvalidMap("too wide".into()))?;
        let height = u32::try_from(height).map_err(|_| GameError::InvalidMap("too tall".into()))?;
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            cells,
            resources: BTreeMap::new(),
        })
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        if x < self.width && y < self.height {
            Some((y as usize) * (self.width as usize) + (x as usize))
        } else {
            None
        }
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// Get cell type at coordinates.
    /// Returns `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, x: i32, y: i32) -> Option<CellType> {
        self.index(x, y)
            .and_then(|index| self.cells.get(index))
            .copied()
    }

    /// Set cell type at coordinates.
    /// Returns `false` if out of bounds.
    pub fn set_cell(&mut self, x: i32, y: i32, cell_type: CellType) -> bool {
        match self.index(x, y).and_then(|index| self.cells.get_mut(index)) {
            Some(cell) => {
                *cell = cell_type;
                true
            }
            None => false,
        }
    }

    /// Whether a unit may step onto a tile.
    ///
    /// Out-of-bounds tiles, blocked terrain and tiles occupied by a
    /// resource all count as blocked.
    #[must_use]
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        match self.get_cell(x, y) {
            Some(cell) => !cell.is_walkable() || self.resources.contains_key(&(x, y)),
            None => true,
        }
    }

    /// Occupy a tile with a resource entity.
    ///
    /// Returns `false` if the tile is out of bounds, blocked terrain, or
    /// already holds a resource.
    pub fn place_resource(&mut self, x: i32, y: i32, resource: EntityId) -> bool {
        if !self.get_cell(x, y).is_some_and(CellType::is_walkable)
            || self.resources.contains_key(&(x, y))
        {
            return false;
        }
        self.resources.insert((x, y), resource);
        true
    }

    /// The resource entity occupying a tile, if any.
    #[must_use]
    pub fn resource_at(&self, x: i32, y: i32) -> Option<EntityId> {
        self.resources.get(&(x, y)).copied()
    }

    /// Clear a tile's resource occupancy, returning the former occupant.
    pub fn remove_resource_at(&mut self, x: i32, y: i32) -> Option<EntityId> {
        self.resources.remove(&(x, y))
    }

    /// All occupied resource tiles in coordinate order.
    pub fn resource_tiles(&self) -> impl Iterator<Item = (TileCoord, EntityId)> + '_ {
        self.resources.iter().map(|(tile, id)| (*tile, *id))
    }
}
