//! Authoritative board: ship placements, hits and misses.

use log::debug;
use rand::Rng;

use crate::common::{BoardError, CellState, Coordinate, Grid, Shot};
use crate::config::{FLEET_SIZE, GRID_SIZE, MAX_PLACEMENT_ATTEMPTS};
use crate::ship::{Orientation, Ship, ShipKind, ShipMask};

/// A player's own board. Cell state is derived from three masks: a cell is
/// `Ship` when occupied and not yet shot, `Hit` once an occupied cell is shot
/// and `Miss` once an empty cell is shot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    fleet: Vec<Ship>,
    ship_map: ShipMask,
    hits: ShipMask,
    misses: ShipMask,
}

impl Board {
    /// Create an empty board state (no ships placed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every ship and every shot.
    pub fn clear(&mut self) {
        self.fleet.clear();
        self.ship_map.clear();
        self.hits.clear();
        self.misses.clear();
    }

    /// Ships placed so far, in placement order. Sunk ships stay in the list.
    pub fn fleet(&self) -> &[Ship] {
        &self.fleet
    }

    pub fn is_fleet_complete(&self) -> bool {
        self.fleet.len() == FLEET_SIZE
    }

    /// Occupancy mask of all ships.
    pub fn ship_map(&self) -> ShipMask {
        self.ship_map
    }

    /// Place `kind` at `origin`. Nothing changes on error.
    pub fn place(
        &mut self,
        kind: ShipKind,
        origin: Coordinate,
        orientation: Orientation,
    ) -> Result<(), BoardError> {
        if self.fleet.iter().any(|s| s.kind() == kind) {
            return Err(BoardError::ShipAlreadyPlaced(kind));
        }
        let ship = Ship::new(kind, origin, orientation);
        if !ship.fits() {
            return Err(BoardError::ShipOutOfBounds);
        }
        let mask = ship.mask();
        if self.ship_map.intersects(&mask) {
            return Err(BoardError::ShipOverlaps);
        }
        self.ship_map |= mask;
        self.fleet.push(ship);
        Ok(())
    }

    /// Clear the board and place the standard fleet at random positions.
    pub fn randomize_placement<R: Rng>(&mut self, rng: &mut R) -> Result<(), BoardError> {
        self.randomize_fleet(&ShipKind::ALL, rng)
    }

    /// Clear the board and place `kinds` at random positions.
    ///
    /// Each ship gets up to [`MAX_PLACEMENT_ATTEMPTS`] random origins; running
    /// out means the grid is too dense for the fleet and the board is left
    /// partially filled.
    pub fn randomize_fleet<R: Rng>(
        &mut self,
        kinds: &[ShipKind],
        rng: &mut R,
    ) -> Result<(), BoardError> {
        self.clear();
        for &kind in kinds {
            let mut attempts = 0;
            loop {
                if attempts == MAX_PLACEMENT_ATTEMPTS {
                    return Err(BoardError::UnableToPlaceShip(kind, attempts));
                }
                attempts += 1;
                let origin = Coordinate::new(
                    rng.random_range(0..GRID_SIZE),
                    rng.random_range(0..GRID_SIZE),
                );
                let orientation = if rng.random() {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                if self.place(kind, origin, orientation).is_ok() {
                    debug!(
                        "placed {} at {} {:?} after {} attempts",
                        kind, origin, orientation, attempts
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Resolve an incoming shot.
    ///
    /// Off-grid coordinates and cells that were already shot report a miss
    /// and leave the board untouched.
    pub fn receive_shot(&mut self, coord: Coordinate) -> Shot {
        if !coord.in_bounds() {
            return Shot::MISS;
        }
        match self.cell(coord) {
            CellState::Ship => {
                self.hits.insert(coord);
                let Some(ship) = self.fleet.iter_mut().find(|s| s.occupies(coord)) else {
                    return Shot {
                        hit: true,
                        sunk: None,
                    };
                };
                let was_sunk = ship.is_sunk();
                ship.register_hit();
                let sunk = (!was_sunk && ship.is_sunk()).then_some(*ship);
                Shot { hit: true, sunk }
            }
            CellState::Empty => {
                self.misses.insert(coord);
                Shot::MISS
            }
            CellState::Hit | CellState::Miss => Shot::MISS,
        }
    }

    /// Returns `true` when every ship in the fleet is sunk.
    pub fn is_fleet_destroyed(&self) -> bool {
        self.fleet.iter().all(Ship::is_sunk)
    }

    pub fn cell(&self, coord: Coordinate) -> CellState {
        if self.hits.contains(coord) {
            CellState::Hit
        } else if self.misses.contains(coord) {
            CellState::Miss
        } else if self.ship_map.contains(coord) {
            CellState::Ship
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
