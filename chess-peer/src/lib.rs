//! 国际象棋对局节点
//!
//! 包含:
//! - 对局裁判（走子流程、播报、胜负）
//! - 交互式预览
//! - 对端会话（命令分派、转发、状态校验）
//! - 配置与对局记录存储
//! - 网络运行循环

pub mod config;
pub mod node;
pub mod preview;
pub mod referee;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::PeerConfig;
pub use node::PeerNode;
pub use preview::{Preview, PreviewState};
pub use referee::{MoveOutcome, MoveReport, MoveSummary, Referee};
pub use session::{MatchState, NetworkAction, Outbox, PeerSession, SeatError, SeatStatus};
pub use storage::StorageManager;
pub use sync::SyncVerdict;
