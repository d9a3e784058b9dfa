mod bitboard;
mod board;
mod common;
mod config;
mod game;
mod logging;
pub mod protocol;
pub mod session;
mod ship;
pub mod transport;

pub use bitboard::BitBoard;
pub use board::*;
pub use common::*;
pub use config::*;
pub use game::*;
pub use logging::init_logging;
pub use protocol::{Message, ShotReport};
pub use session::{Outcome, Phase, Session, SessionError, SessionHandle, SessionSnapshot};
pub use ship::*;
pub use transport::in_memory::InMemoryTransport;
pub use transport::tcp::{HostListener, TcpTransport};
