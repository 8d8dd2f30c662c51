//! 国际象棋对局共享协议库
//!
//! 包含:
//! - 棋子、棋盘、位置等核心数据结构
//! - 走法验证与执行 (MoveRules, MoveResult)
//! - 文本命令格式与类型化命令 (Command, PeerCommand)
//! - 对端转发与状态校验信封
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 对局记录 (JSON)

mod board;
mod command;
mod constants;
mod error;
mod message;
mod moves;
mod piece;
mod record;
mod transport;

pub use board::Board;
pub use command::Command;
pub use constants::*;
pub use error::{ChessError, CommandError, CoordinateError, ProtocolError, Result};
pub use message::{
    names, unwrap_remote, wrap_remote, MoveCommand, PeerCommand, ValidationEnvelope,
};
pub use moves::{AppliedMove, MoveContext, MovePlan, MoveResult, MoveRules};
pub use piece::{Piece, PieceId, PieceType, Position, Side};
pub use record::{MatchMetadata, MatchOutcome, MatchRecord, MoveRecord};
pub use transport::{
    CommandReader, CommandWriter, Connection, Connector, Listener, TcpConnection, TcpConnector,
    TcpListener,
};
