//! Common types for the grid model: coordinates, cell states, shot outcomes
//! and board errors.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GRID_SIZE;
use crate::ship::{Ship, ShipKind};

/// A cell on the grid. `x` is the column (rendered as a letter), `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: u8,
    pub y: u8,
}

impl Coordinate {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Returns `true` when both components lie inside the grid.
    pub fn in_bounds(&self) -> bool {
        self.x < GRID_SIZE && self.y < GRID_SIZE
    }

    /// Convert signed wire values, rejecting anything off the grid.
    pub fn from_wire(x: i32, y: i32) -> Option<Self> {
        let x = u8::try_from(x).ok()?;
        let y = u8::try_from(y).ok()?;
        let coord = Self::new(x, y);
        coord.in_bounds().then_some(coord)
    }

    /// Flattened x-major index (`x * GRID_SIZE + y`).
    pub fn index(&self) -> usize {
        self.x as usize * GRID_SIZE as usize + self.y as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        let n = GRID_SIZE as usize;
        if index >= n * n {
            return None;
        }
        Some(Self::new((index / n) as u8, (index % n) as u8))
    }

    /// Every in-bounds coordinate, in index order.
    pub fn all() -> impl Iterator<Item = Coordinate> {
        (0..GRID_SIZE as usize * GRID_SIZE as usize).filter_map(Coordinate::from_index)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", b'A'.saturating_add(self.x) as char, self.y as u32 + 1)
    }
}

impl FromStr for Coordinate {
    type Err = BoardError;

    /// Parse the `A1`..`J10` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let col = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| BoardError::InvalidCoordinate(s.to_string()))?
            .to_ascii_uppercase();
        let row: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| BoardError::InvalidCoordinate(s.to_string()))?;
        if row == 0 {
            return Err(BoardError::InvalidCoordinate(s.to_string()));
        }
        let coord = Coordinate::new(col as u8 - b'A', row - 1);
        if !coord.in_bounds() {
            return Err(BoardError::OutOfBounds(coord));
        }
        Ok(coord)
    }
}

/// State of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellState {
    #[default]
    Empty,
    Ship,
    Hit,
    Miss,
}

impl CellState {
    /// Glyph used by the terminal renderer.
    pub fn glyph(self) -> char {
        match self {
            CellState::Empty => '.',
            CellState::Ship => 'S',
            CellState::Hit => 'X',
            CellState::Miss => 'o',
        }
    }
}

/// Full grid snapshot indexed `[x][y]`.
pub type Grid = [[CellState; GRID_SIZE as usize]; GRID_SIZE as usize];

/// Outcome of a single shot against an authoritative board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shot {
    pub hit: bool,
    /// The ship this shot sank, present only on the sinking shot.
    pub sunk: Option<Ship>,
}

impl Shot {
    pub const MISS: Shot = Shot {
        hit: false,
        sunk: None,
    };

    pub fn sunk_kind(&self) -> Option<ShipKind> {
        self.sunk.map(|ship| ship.kind())
    }
}

/// Errors returned by board operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("coordinate {0} is outside the grid")]
    OutOfBounds(Coordinate),
    #[error("`{0}` is not a valid coordinate")]
    InvalidCoordinate(String),
    #[error("ship placement is out of bounds")]
    ShipOutOfBounds,
    #[error("ship placement overlaps with another ship")]
    ShipOverlaps,
    #[error("{0} is already placed on the board")]
    ShipAlreadyPlaced(ShipKind),
    #[error("unable to place {0} after {1} attempts")]
    UnableToPlaceShip(ShipKind, usize),
}
