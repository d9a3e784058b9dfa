//! Turn synchronization between the two peers.
//!
//! [`Session`] is the pure state machine: every action and every received
//! message mutates it and returns the messages to put on the wire, so two
//! sessions can be driven against each other without any I/O. The
//! [`actor`] module wraps it in a task that owns the connection.

use core::fmt;

use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use crate::common::{BoardError, Coordinate, Grid, Shot};
use crate::config::{Rules, GRID_SIZE};
use crate::game::GameEngine;
use crate::protocol::{Message, ShotReport};
use crate::ship::{Orientation, ShipKind};

pub mod actor;

pub use actor::SessionHandle;

/// Lifecycle of a session. Phases only move forward; `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Menu,
    Setup,
    Playing,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Menu => "menu",
            Phase::Setup => "setup",
            Phase::Playing => "playing",
            Phase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

/// How a finished game ended for this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Won,
    Lost,
    /// The connection dropped before the game was decided.
    Disconnected,
}

/// Actions rejected locally. A rejected action changes nothing and sends
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not allowed during {0}")]
    WrongPhase(Phase),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("row bomb is recharging ({remaining} turns left)")]
    AbilityOnCooldown { remaining: u32 },
    #[error("{0} was already targeted")]
    AlreadyTargeted(Coordinate),
    #[error("{0} is outside the grid")]
    OutOfBounds(Coordinate),
    #[error("row {0} is outside the grid")]
    RowOutOfBounds(u8),
    #[error("{0} is not part of this game's fleet")]
    NotInFleet(ShipKind),
    #[error("place all ships first ({0} left)")]
    FleetIncomplete(usize),
    #[error("placement already confirmed")]
    AlreadyReady,
    #[error("a connection is already in progress")]
    AlreadyConnecting,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("session has stopped")]
    Stopped,
}

/// Read-only view of a session, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub status: String,
    pub is_host: bool,
    pub is_local_turn: bool,
    pub turn_counter: u32,
    pub local_ready: bool,
    pub remote_ready: bool,
    pub can_use_row_bomb: bool,
    /// Turns until the row bomb is available again; zero when charged.
    pub row_bomb_cooldown: u32,
    pub outcome: Option<Outcome>,
    pub own_grid: Grid,
    pub target_grid: Grid,
    /// Fleet ships not placed yet, in placement order.
    pub unplaced: Vec<ShipKind>,
    /// Enemy ships we have sunk.
    pub enemy_sunk: Vec<ShipKind>,
}

#[derive(Debug, Clone)]
pub struct Session {
    rules: Rules,
    phase: Phase,
    is_host: bool,
    local_ready: bool,
    remote_ready: bool,
    is_local_turn: bool,
    turn_counter: u32,
    last_ability_turn: i64,
    outcome: Option<Outcome>,
    status: String,
    engine: GameEngine,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Rules::default())
    }
}

impl Session {
    pub fn new(rules: Rules) -> Self {
        // The row bomb starts charged.
        let last_ability_turn = -rules.ability_cooldown;
        Self {
            rules,
            phase: Phase::Menu,
            is_host: false,
            local_ready: false,
            remote_ready: false,
            is_local_turn: false,
            turn_counter: 0,
            last_ability_turn,
            outcome: None,
            status: "Welcome to Battleship LAN".to_string(),
            engine: GameEngine::new(),
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_local_turn(&self) -> bool {
        self.is_local_turn
    }

    pub fn turn_counter(&self) -> u32 {
        self.turn_counter
    }

    pub fn local_ready(&self) -> bool {
        self.local_ready
    }

    pub fn remote_ready(&self) -> bool {
        self.remote_ready
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn enter(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase, "phase went backwards");
        if phase != self.phase {
            info!("phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.enter(Phase::GameOver);
        self.is_local_turn = false;
        self.outcome = Some(outcome);
        self.status = match outcome {
            Outcome::Won => "You won!",
            Outcome::Lost => "Defeat!",
            Outcome::Disconnected => "Disconnected.",
        }
        .to_string();
        info!("game over: {:?}", outcome);
    }

    /// Turns left before the row bomb can be used again.
    pub fn row_bomb_cooldown(&self) -> u32 {
        let elapsed = i64::from(self.turn_counter) - self.last_ability_turn;
        (self.rules.ability_cooldown - elapsed).max(0) as u32
    }

    pub fn can_use_row_bomb(&self) -> bool {
        self.phase == Phase::Playing && self.is_local_turn && self.row_bomb_cooldown() == 0
    }

    /// Fleet ships not placed yet, in placement order.
    pub fn unplaced_kinds(&self) -> Vec<ShipKind> {
        let fleet = self.engine.board().fleet();
        self.rules
            .fleet
            .iter()
            .copied()
            .filter(|kind| !fleet.iter().any(|s| s.kind() == *kind))
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            status: self.status.clone(),
            is_host: self.is_host,
            is_local_turn: self.is_local_turn,
            turn_counter: self.turn_counter,
            local_ready: self.local_ready,
            remote_ready: self.remote_ready,
            can_use_row_bomb: self.can_use_row_bomb(),
            row_bomb_cooldown: self.row_bomb_cooldown(),
            outcome: self.outcome,
            own_grid: self.engine.board().cells(),
            target_grid: self.engine.target().cells(),
            unplaced: self.unplaced_kinds(),
            enemy_sunk: self.engine.target().sunk_kinds().to_vec(),
        }
    }

    /// The transport is up: move to setup and greet the peer.
    pub fn connected(&mut self, is_host: bool) -> Result<Vec<Message>, SessionError> {
        if self.phase != Phase::Menu {
            return Err(SessionError::WrongPhase(self.phase));
        }
        self.is_host = is_host;
        self.enter(Phase::Setup);
        self.status = "Connected! Place your ships.".to_string();
        Ok(vec![Message::Handshake])
    }

    /// A host or join attempt failed before a connection existed.
    pub fn connect_failed(&mut self, reason: &str) {
        if self.phase == Phase::Menu {
            self.status = format!("Connection failed: {}", reason);
        }
    }

    /// The connection is gone. Ends an unfinished game.
    pub fn disconnected(&mut self, error: Option<&str>) {
        match self.phase {
            Phase::Setup | Phase::Playing => {
                info!("connection lost during {}: {}", self.phase, error.unwrap_or("closed"));
                self.finish(Outcome::Disconnected);
            }
            Phase::Menu => {
                if let Some(reason) = error {
                    self.connect_failed(reason);
                }
            }
            Phase::GameOver => debug!("connection closed after game over"),
        }
    }

    fn ensure_placing(&self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Menu | Phase::Setup) {
            return Err(SessionError::WrongPhase(self.phase));
        }
        if self.local_ready {
            return Err(SessionError::AlreadyReady);
        }
        Ok(())
    }

    /// Place one ship on our own board. Allowed until placement is confirmed.
    pub fn place_ship(
        &mut self,
        kind: ShipKind,
        origin: Coordinate,
        orientation: Orientation,
    ) -> Result<(), SessionError> {
        self.ensure_placing()?;
        if !self.rules.fleet.contains(&kind) {
            return Err(SessionError::NotInFleet(kind));
        }
        self.engine.board_mut().place(kind, origin, orientation)?;
        self.status = match self.unplaced_kinds().first() {
            Some(next) => format!("Placed {}. Next: {}", kind, next),
            None => format!("Placed {}. Fleet ready to confirm.", kind),
        };
        Ok(())
    }

    /// Replace our placement with a random one.
    pub fn randomize_ships<R: Rng>(&mut self, rng: &mut R) -> Result<(), SessionError> {
        self.ensure_placing()?;
        let fleet = self.rules.fleet.clone();
        self.engine.board_mut().randomize_fleet(&fleet, rng)?;
        self.status = "Fleet placed at random.".to_string();
        Ok(())
    }

    /// Announce that our fleet is placed. Starts the game if the peer is
    /// already ready.
    pub fn confirm_placement(&mut self) -> Result<Vec<Message>, SessionError> {
        if self.phase != Phase::Setup {
            return Err(SessionError::WrongPhase(self.phase));
        }
        if self.local_ready {
            return Err(SessionError::AlreadyReady);
        }
        let left = self.unplaced_kinds().len();
        if left > 0 {
            return Err(SessionError::FleetIncomplete(left));
        }
        self.local_ready = true;
        self.status = "Waiting for opponent...".to_string();
        self.try_start();
        Ok(vec![Message::PlacementDone])
    }

    fn try_start(&mut self) {
        if self.phase != Phase::Setup || !(self.local_ready && self.remote_ready) {
            return;
        }
        self.enter(Phase::Playing);
        // Host always moves first.
        self.is_local_turn = self.is_host;
        self.turn_counter = 0;
        self.status = if self.is_local_turn {
            "Your turn!"
        } else {
            "Opponent's turn."
        }
        .to_string();
    }

    fn ensure_our_turn(&self) -> Result<(), SessionError> {
        if self.phase != Phase::Playing {
            return Err(SessionError::WrongPhase(self.phase));
        }
        if !self.is_local_turn {
            return Err(SessionError::NotYourTurn);
        }
        Ok(())
    }

    /// Fire a single shot at the opponent. Gives up the turn.
    pub fn fire_shot(&mut self, target: Coordinate) -> Result<Message, SessionError> {
        self.ensure_our_turn()?;
        if !target.in_bounds() {
            return Err(SessionError::OutOfBounds(target));
        }
        if self.engine.target().is_resolved(target) {
            return Err(SessionError::AlreadyTargeted(target));
        }
        self.is_local_turn = false;
        self.status = format!("Firing at {}...", target);
        Ok(Message::FireShot {
            x: i32::from(target.x),
            y: i32::from(target.y),
        })
    }

    /// Bomb a whole row of the opponent's grid. Gives up the turn and starts
    /// the cooldown.
    pub fn use_row_bomb(&mut self, row: u8) -> Result<Message, SessionError> {
        self.ensure_our_turn()?;
        let remaining = self.row_bomb_cooldown();
        if remaining > 0 {
            return Err(SessionError::AbilityOnCooldown { remaining });
        }
        if row >= GRID_SIZE {
            return Err(SessionError::RowOutOfBounds(row));
        }
        self.is_local_turn = false;
        self.last_ability_turn = i64::from(self.turn_counter);
        self.status = "Launching Row Bomb...".to_string();
        Ok(Message::AbilityRowBomb {
            row: i32::from(row),
        })
    }

    /// Apply a message from the peer and return the replies to send.
    pub fn handle_message(&mut self, msg: Message) -> Vec<Message> {
        match (self.phase, msg) {
            (Phase::Setup, Message::Handshake) => {
                debug!("peer handshake received");
                Vec::new()
            }
            (Phase::Setup, Message::PlacementDone) => {
                self.remote_ready = true;
                if self.local_ready {
                    self.try_start();
                } else {
                    self.status = "Opponent is ready!".to_string();
                }
                Vec::new()
            }
            (Phase::Playing, Message::FireShot { x, y }) => {
                let shot = Coordinate::from_wire(x, y)
                    .map(|coord| self.engine.opponent_shot(coord))
                    .unwrap_or(Shot::MISS);
                let mut out = vec![Message::ShotResult(ShotReport::at(x, y, shot))];
                out.extend(self.after_incoming_attack());
                out
            }
            (Phase::Playing, Message::AbilityRowBomb { row }) => {
                let results = u8::try_from(row)
                    .map(|row| self.engine.opponent_row_bomb(row))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(coord, shot)| ShotReport::new(coord, shot))
                    .collect();
                let mut out = vec![Message::AbilityResult { results }];
                out.extend(self.after_incoming_attack());
                out
            }
            (Phase::Playing, Message::ShotResult(report)) => {
                self.apply_report(&report);
                self.status = match report.sunk_kind {
                    Some(kind) if report.sunk => format!("You sunk their {}!", kind),
                    _ if report.hit => "Hit!".to_string(),
                    _ => "Miss!".to_string(),
                };
                self.status.push_str(" Opponent's turn.");
                Vec::new()
            }
            (Phase::Playing, Message::AbilityResult { results }) => {
                for report in &results {
                    self.apply_report(report);
                }
                let hits = results.iter().filter(|r| r.hit).count();
                self.status = format!("Row Bomb impact: {} hits. Opponent's turn.", hits);
                Vec::new()
            }
            (Phase::Setup | Phase::Playing, Message::GameResult { you_won }) => {
                self.finish(if you_won { Outcome::Won } else { Outcome::Lost });
                Vec::new()
            }
            (phase, msg) => {
                debug!("ignoring {} during {}", msg.kind(), phase);
                Vec::new()
            }
        }
    }

    // Only the target board is touched; the turn was given up when firing.
    fn apply_report(&mut self, report: &ShotReport) {
        let Some(coord) = report.coordinate() else {
            debug!("ignoring report for off-grid cell ({}, {})", report.x, report.y);
            return;
        };
        let sunk = if report.sunk { report.sunk_kind } else { None };
        self.engine.record_outcome(coord, report.hit, sunk);
    }

    fn after_incoming_attack(&mut self) -> Option<Message> {
        if self.engine.is_defeated() {
            self.finish(Outcome::Lost);
            return Some(Message::GameResult { you_won: true });
        }
        self.is_local_turn = true;
        self.turn_counter += 1;
        self.status = "Your turn!".to_string();
        None
    }
}
