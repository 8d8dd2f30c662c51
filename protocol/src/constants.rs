//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（8x8）
pub const BOARD_SIZE: usize = 8;

/// 对局玩家数
pub const NUM_PLAYERS: usize = 2;

/// 每方初始棋子数
pub const PIECES_PER_SIDE: usize = 16;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 3100;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 默认状态校验间隔（秒）
pub const VALIDATE_INTERVAL_SECS: u64 = 5;

/// 玩家名最大长度
pub const MAX_NAME_LEN: usize = 20;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 默认状态校验间隔 Duration
pub const VALIDATE_INTERVAL: Duration = Duration::from_secs(VALIDATE_INTERVAL_SECS);

/// 玩家默认颜色名（按玩家序号）
pub const DEFAULT_COLOR_NAMES: [&str; NUM_PLAYERS] = ["Blue", "Yellow"];
