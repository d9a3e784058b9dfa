use crate::ship::ShipKind;

/// Width and height of every board.
pub const GRID_SIZE: u8 = 10;

/// Number of ships in a complete fleet.
pub const FLEET_SIZE: usize = ShipKind::ALL.len();

/// Total number of ship segments used in the standard configuration.
pub const TOTAL_SHIP_CELLS: usize = 5 + 4 + 3 + 3 + 2;

/// Turns that must pass between two row bombs.
pub const ABILITY_COOLDOWN: i64 = 5;

/// Random origins tried per ship before `randomize_placement` gives up.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

/// Port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 5555;

/// Longest frame the line codec buffers while waiting for a newline.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Per-session game rules. The default is the standard five-ship fleet with a
/// five-turn row bomb cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    /// Ships each side must place before confirming, in placement order.
    pub fleet: Vec<ShipKind>,
    /// Turns that must pass between two row bombs.
    pub ability_cooldown: i64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            fleet: ShipKind::ALL.to_vec(),
            ability_cooldown: ABILITY_COOLDOWN,
        }
    }
}

/// Look up a ship kind by its display name, ignoring case.
pub fn ship_kind_by_name(name: &str) -> Option<ShipKind> {
    ShipKind::ALL
        .iter()
        .copied()
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
}
