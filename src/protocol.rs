//! Messages exchanged between the two peers.
//!
//! Every message is one JSON object tagged by a `"type"` field. The set of
//! variants is closed; anything else fails to decode and is dropped by the
//! receiver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{Coordinate, Shot};
use crate::ship::ShipKind;

pub mod codec;

pub use codec::{CodecError, LineCodec};

/// Outcome of a single cell shot, as reported back to the attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotReport {
    pub x: i32,
    pub y: i32,
    pub hit: bool,
    pub sunk: bool,
    #[serde(default)]
    pub sunk_kind: Option<ShipKind>,
}

impl ShotReport {
    pub fn new(coord: Coordinate, shot: Shot) -> Self {
        Self::at(coord.x as i32, coord.y as i32, shot)
    }

    /// Report for raw wire coordinates, which may lie off the grid.
    pub fn at(x: i32, y: i32, shot: Shot) -> Self {
        Self {
            x,
            y,
            hit: shot.hit,
            sunk: shot.sunk.is_some(),
            sunk_kind: shot.sunk_kind(),
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_wire(self.x, self.y)
    }
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Sent by each side as soon as the connection is up.
    Handshake,
    /// The sender has finished placing its fleet.
    PlacementDone,
    /// The sender fires at `(x, y)` on the receiver's board.
    FireShot { x: i32, y: i32 },
    /// Outcome of a `FireShot`.
    ShotResult(ShotReport),
    /// The sender fires at every cell of `row` on the receiver's board.
    AbilityRowBomb { row: i32 },
    /// Outcomes of an `AbilityRowBomb`, one per cell.
    AbilityResult { results: Vec<ShotReport> },
    /// Terminal notification from the side whose fleet was destroyed.
    GameResult { you_won: bool },
}

impl Message {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Handshake => "Handshake",
            Message::PlacementDone => "PlacementDone",
            Message::FireShot { .. } => "FireShot",
            Message::ShotResult(_) => "ShotResult",
            Message::AbilityRowBomb { .. } => "AbilityRowBomb",
            Message::AbilityResult { .. } => "AbilityResult",
            Message::GameResult { .. } => "GameResult",
        }
    }
}

/// Errors produced while encoding or decoding a single message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a message as a single line of JSON, without the trailing newline.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|source| ProtocolError::Encode {
        kind: msg.kind(),
        source,
    })
}

/// Decode one line of JSON into a message.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}
