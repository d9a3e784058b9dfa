use crate::{
    board::Board,
    common::{CellState, Coordinate, Grid, Shot},
    config::GRID_SIZE,
    ship::{ShipKind, ShipMask},
};

/// What this side knows about the opponent's grid, learned only from shot
/// outcomes. It has no ship layer, so a cell can never read as `Ship`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetBoard {
    hits: ShipMask,
    misses: ShipMask,
    sunk: Vec<ShipKind>,
}

impl TargetBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one of our shots. The first outcome for a cell
    /// wins; later reports for the same cell are ignored. Returns `false`
    /// when nothing was recorded.
    pub fn record(&mut self, coord: Coordinate, hit: bool) -> bool {
        if !coord.in_bounds() || self.is_resolved(coord) {
            return false;
        }
        if hit {
            self.hits.insert(coord)
        } else {
            self.misses.insert(coord)
        }
    }

    pub fn record_sunk(&mut self, kind: ShipKind) {
        if !self.sunk.contains(&kind) {
            self.sunk.push(kind);
        }
    }

    /// Returns `true` once we have fired at `coord`.
    pub fn is_resolved(&self, coord: Coordinate) -> bool {
        self.hits.contains(coord) || self.misses.contains(coord)
    }

    /// Enemy ships reported sunk, in the order they went down.
    pub fn sunk_kinds(&self) -> &[ShipKind] {
        &self.sunk
    }

    pub fn hits(&self) -> ShipMask {
        self.hits
    }

    pub fn misses(&self) -> ShipMask {
        self.misses
    }

    /// Cells we have not fired at yet, in index order.
    pub fn unresolved(&self) -> impl Iterator<Item = Coordinate> {
        (!(self.hits | self.misses)).iter()
    }

    pub fn cell(&self, coord: Coordinate) -> CellState {
        if self.hits.contains(coord) {
            CellState::Hit
        } else if self.misses.contains(coord) {
            CellState::Miss
        } else {
            CellState::Empty
        }
    }

    /// Snapshot of every cell, indexed `[x][y]`.
    pub fn cells(&self) -> Grid {
        let mut grid = Grid::default();
        for coord in Coordinate::all() {
            grid[coord.x as usize][coord.y as usize] = self.cell(coord);
        }
        grid
    }
}

/// Core game logic holding the player's board and what it knows about the
/// opponent.
#[derive(Debug, Clone, Default)]
pub struct GameEngine {
    board: Board,
    target: TargetBoard,
}

impl GameEngine {
    /// Create a new engine with an empty board and no shots recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable reference to the player's board for ship placement.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// Immutable reference to the player's board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn target(&self) -> &TargetBoard {
        &self.target
    }

    /// Handle an opponent shot on the player's board.
    pub fn opponent_shot(&mut self, coord: Coordinate) -> Shot {
        self.board.receive_shot(coord)
    }

    /// Handle an opponent row bomb: every cell of `row`, left to right.
    /// An off-grid row resolves to nothing.
    pub fn opponent_row_bomb(&mut self, row: u8) -> Vec<(Coordinate, Shot)> {
        if row >= GRID_SIZE {
            return Vec::new();
        }
        (0..GRID_SIZE)
            .map(|x| {
                let coord = Coordinate::new(x, row);
                (coord, self.board.receive_shot(coord))
            })
            .collect()
    }

    /// Record the result of a shot made against the opponent.
    pub fn record_outcome(&mut self, coord: Coordinate, hit: bool, sunk: Option<ShipKind>) {
        self.target.record(coord, hit);
        if let Some(kind) = sunk {
            self.target.record_sunk(kind);
        }
    }

    /// Returns `true` when our own fleet has been destroyed.
    pub fn is_defeated(&self) -> bool {
        self.board.is_fleet_destroyed()
    }
}
