//! Compass directions accepted by MOVE and GATHER.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A direction string that is not in the direction table.
///
/// `None` means the command carried no direction at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid direction {0:?}")]
pub struct InvalidDirection(pub Option<String>);

/// One of the four tile-adjacent directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards row 0.
    North,
    /// Away from row 0.
    South,
    /// Towards higher columns.
    East,
    /// Towards column 0.
    West,
}

impl Direction {
    /// All directions, clockwise from north.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit tile offset `(dx, dy)` of this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    /// The tile one step from `(x, y)` in this direction.
    ///
    /// Saturates at the `i32` edges. Maps are never wider or taller than
    /// `i32::MAX`, so a saturated tile is always out of bounds.
    #[must_use]
    pub const fn step(self, x: i32, y: i32) -> (i32, i32) {
        let (dx, dy) = self.offset();
        (x.saturating_add(dx), y.saturating_add(dy))
    }

    /// Resolve an optional direction argument from a command record.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDirection`] if the argument is missing or unknown.
    pub fn resolve(arg: Option<&str>) -> Result<Self, InvalidDirection> {
        match arg {
            Some(text) => text.parse(),
            None => Err(InvalidDirection(None)),
        }
    }
}

impl FromStr for Direction {
    type Err = InvalidDirection;

    /// Accepts the short (`N`) and long (`north`) forms, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NORTH" => Ok(Self::North),
            "S" | "SOUTH" => Ok(Self::South),
            "E" | "EAST" => Ok(Self::East),
            "W" | "WEST" => Ok(Self::West),
            _ => Err(InvalidDirection(Some(s.to_string()))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = match self {
            Self::North => "N",
            Self::South => "S",
            Self::East => "E",
            Self::West => "W",
        };
        f.write_str(short)
    }
}
