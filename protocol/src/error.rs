//! 错误类型定义

use thiserror::Error;

/// 坐标解析错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateError {
    /// 长度不是 2，无法解析
    #[error("coordinate must be exactly two characters")]
    Unparsed,

    /// 长度正确但超出 a-h / 1-8
    #[error("coordinate is outside the board")]
    OutOfRange,
}

/// 命令文本错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// 空命令
    #[error("Empty command")]
    Empty,

    /// 引号未闭合
    #[error("Unterminated quote in argument '{key}'")]
    UnterminatedQuote { key: String },

    /// 参数格式错误
    #[error("Malformed argument '{token}'")]
    MalformedArgument { token: String },

    /// 缺少必需参数
    #[error("Missing argument '{key}' for {command}")]
    MissingArgument { command: String, key: String },

    /// 参数值无效
    #[error("Invalid value '{value}' for argument '{key}'")]
    InvalidValue { key: String, value: String },

    /// 未知命令
    #[error("Unknown command '{name}'")]
    UnknownCommand { name: String },
}

/// 象棋规则错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的坐标
    #[error("Invalid coordinate '{text}': {source}")]
    InvalidCoordinate {
        text: String,
        source: CoordinateError,
    },

    /// 无效的棋盘状态串
    #[error("Invalid board state: {reason}")]
    InvalidState { reason: String },

    /// 命令错误
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 象棋规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

impl From<CommandError> for ProtocolError {
    fn from(err: CommandError) -> Self {
        ProtocolError::Chess(ChessError::Command(err))
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
