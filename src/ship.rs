//! Ship kinds and placed ships.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::bitboard::BitBoard;
use crate::common::Coordinate;
use crate::config::GRID_SIZE;

/// Cell mask sized for the standard grid.
pub type ShipMask = BitBoard<u128, { GRID_SIZE as usize }>;

/// Orientation of a ship on the board. Horizontal ships extend along `x`,
/// vertical ships along `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// The five fixed ship types of a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShipKind {
    Carrier,
    Battleship,
    Cruiser,
    Submarine,
    Destroyer,
}

impl ShipKind {
    /// Fleet order, also the order ships are placed in.
    pub const ALL: [ShipKind; 5] = [
        ShipKind::Carrier,
        ShipKind::Battleship,
        ShipKind::Cruiser,
        ShipKind::Submarine,
        ShipKind::Destroyer,
    ];

    pub const fn length(self) -> usize {
        match self {
            ShipKind::Carrier => 5,
            ShipKind::Battleship => 4,
            ShipKind::Cruiser | ShipKind::Submarine => 3,
            ShipKind::Destroyer => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ShipKind::Carrier => "Carrier",
            ShipKind::Battleship => "Battleship",
            ShipKind::Cruiser => "Cruiser",
            ShipKind::Submarine => "Submarine",
            ShipKind::Destroyer => "Destroyer",
        }
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ship placed on the board, with its hit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ship {
    kind: ShipKind,
    origin: Coordinate,
    orientation: Orientation,
    hit_count: usize,
}

impl Ship {
    /// A ship that has not been hit yet. The position is not validated here;
    /// the board checks bounds and overlap when placing it.
    pub fn new(kind: ShipKind, origin: Coordinate, orientation: Orientation) -> Self {
        Self {
            kind,
            origin,
            orientation,
            hit_count: 0,
        }
    }

    pub fn kind(&self) -> ShipKind {
        self.kind
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn length(&self) -> usize {
        self.kind.length()
    }

    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    /// Cells covered by the ship, starting at the origin. Cells past the grid
    /// edge are still produced so callers can reject the placement.
    pub fn occupied_cells(&self) -> impl Iterator<Item = Coordinate> + '_ {
        let (x, y) = (self.origin.x as usize, self.origin.y as usize);
        (0..self.length()).map(move |i| {
            let (cx, cy) = match self.orientation {
                Orientation::Horizontal => (x + i, y),
                Orientation::Vertical => (x, y + i),
            };
            Coordinate::new(
                u8::try_from(cx).unwrap_or(u8::MAX),
                u8::try_from(cy).unwrap_or(u8::MAX),
            )
        })
    }

    /// Returns `true` when every occupied cell is on the grid.
    pub fn fits(&self) -> bool {
        self.occupied_cells().all(|c| c.in_bounds())
    }

    pub fn occupies(&self, coord: Coordinate) -> bool {
        self.occupied_cells().any(|c| c == coord)
    }

    /// Occupancy mask. Only meaningful for ships that [`fit`](Self::fits).
    pub fn mask(&self) -> ShipMask {
        self.occupied_cells().collect()
    }

    pub fn is_sunk(&self) -> bool {
        self.hit_count >= self.length()
    }

    pub(crate) fn register_hit(&mut self) {
        self.hit_count += 1;
    }
}
