//! 消息类型定义
//!
//! 文本命令（[`Command`]）与类型化命令之间的转换，以及对端转发、
//! 状态校验两种信封。

use crate::command::Command;
use crate::error::CommandError;
use crate::piece::PieceType;

/// 命令名
pub mod names {
    pub const SERVER_INFO: &str = "ChessServerInfo";
    pub const LISTEN: &str = "ChessListen";
    pub const CONNECT: &str = "ChessConnect";
    pub const DISCONNECT: &str = "ChessDisconnect";
    pub const REMOTE_CMD: &str = "RemoteCmd";
    pub const PLAYER_INFO: &str = "ChessPlayerInfo";
    pub const BEGIN: &str = "ChessBegin";
    pub const JOIN_GAME: &str = "ChessJoinGame";
    pub const VALIDATE: &str = "ChessValidate";
    pub const RESIGN: &str = "ChessResign";
    pub const OFFER_DRAW: &str = "ChessOfferDraw";
    pub const ACCEPT_DRAW: &str = "ChessAcceptDraw";
    pub const REJECT_DRAW: &str = "ChessRejectDraw";
    pub const STATE: &str = "ChessState";
    pub const RESET: &str = "ChessReset";
    pub const MOVE: &str = "ChessMove";
}

/// 走子命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    /// 起点（代数坐标原文，由裁判解析）
    pub from: String,
    /// 终点
    pub to: String,
    /// 升变选择，非 queen/bishop/knight/rook 的值视为未选择
    pub promotion: Option<PieceType>,
    /// 自由摆放
    pub teleport: bool,
    /// 来自对端
    pub remote: bool,
}

impl MoveCommand {
    /// 创建普通走子命令
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
            teleport: false,
            remote: false,
        }
    }

    /// 指定升变
    pub fn promote_to(mut self, piece_type: PieceType) -> Self {
        self.promotion = Some(piece_type);
        self
    }

    /// 自由摆放
    pub fn teleport(mut self) -> Self {
        self.teleport = true;
        self
    }

    /// 从文本命令转换，缺少的坐标留空，交给裁判报告
    pub fn from_command(cmd: &Command) -> Self {
        Self {
            from: cmd.get("from").unwrap_or_default().to_string(),
            to: cmd.get("to").unwrap_or_default().to_string(),
            promotion: cmd.get("promoteTo").and_then(PieceType::from_promotion_name),
            teleport: cmd.get_bool("teleport"),
            remote: cmd.is_remote(),
        }
    }

    /// 转换为文本命令
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(names::MOVE)
            .with_arg("from", self.from.clone())
            .with_arg("to", self.to.clone());
        if let Some(piece_type) = self.promotion {
            cmd.set_arg("promoteTo", piece_type.name());
        }
        if self.teleport {
            cmd.set_arg("teleport", "true");
        }
        if self.remote {
            cmd.set_arg("remote", "true");
        }
        cmd
    }
}

/// 状态校验信封
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEnvelope {
    /// 64 字符棋盘状态
    pub state: String,
    /// 当前走子玩家序号
    pub current_moving_player: usize,
    /// 已完成步数，缺省时总是比较
    pub ply: Option<u32>,
}

impl ValidationEnvelope {
    /// 转换为文本命令（带 remote=true）
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(names::VALIDATE)
            .with_arg("state", self.state.clone())
            .with_arg("currentmovingplayer", self.current_moving_player.to_string());
        if let Some(ply) = self.ply {
            cmd.set_arg("ply", ply.to_string());
        }
        cmd.with_arg("remote", "true")
    }

    /// 从文本命令解析，不带 state 时返回 `None`（本地发起校验）
    pub fn from_command(cmd: &Command) -> Result<Option<Self>, CommandError> {
        let Some(state) = cmd.get("state") else {
            return Ok(None);
        };
        let current_moving_player = parse_arg(cmd, "currentmovingplayer")?;
        let ply = match cmd.get("ply") {
            Some(_) => Some(parse_arg(cmd, "ply")?),
            None => None,
        };
        Ok(Some(Self {
            state: state.to_string(),
            current_moving_player,
            ply,
        }))
    }
}

/// 读取并解析必需参数
fn parse_arg<T: std::str::FromStr>(cmd: &Command, key: &str) -> Result<T, CommandError> {
    let value = cmd.get(key).ok_or_else(|| CommandError::MissingArgument {
        command: cmd.name.clone(),
        key: key.to_string(),
    })?;
    value.parse().map_err(|_| CommandError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// 包装为转发给对端的信封：`RemoteCmd cmd=<Name> <args…> remote=true`
pub fn wrap_remote(cmd: &Command) -> Command {
    let mut envelope = Command::new(names::REMOTE_CMD).with_arg("cmd", cmd.name.clone());
    for (key, value) in &cmd.args {
        envelope.set_arg(key.clone(), value.clone());
    }
    envelope.with_arg("remote", "true")
}

/// 拆开转发信封，取出内层命令（保留 remote=true）
pub fn unwrap_remote(envelope: &Command) -> Result<Command, CommandError> {
    let mut inner = envelope.clone();
    let name = inner.remove_arg("cmd").ok_or_else(|| CommandError::MissingArgument {
        command: envelope.name.clone(),
        key: "cmd".to_string(),
    })?;
    inner.name = name;
    inner.set_arg("remote", "true");
    Ok(inner)
}

/// 类型化命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    /// 打印连接信息
    ServerInfo,
    /// 监听端口
    Listen { port: Option<u16> },
    /// 连接对端（host:port）
    Connect { address: Option<String> },
    /// 断开连接
    Disconnect { reason: Option<String> },
    /// 对端转发的命令
    RemoteCmd(Command),
    /// 玩家信息
    PlayerInfo { name: String },
    /// 开始对局
    Begin,
    /// 对端确认加入
    JoinGame,
    /// 状态校验，`None` 表示本地发起
    Validate(Option<ValidationEnvelope>),
    /// 认输（不支持）
    Resign,
    /// 提和（不支持）
    OfferDraw,
    /// 同意和棋（不支持）
    AcceptDraw,
    /// 拒绝和棋（不支持）
    RejectDraw,
    /// 打印棋盘
    State,
    /// 重置对局
    Reset,
    /// 走子
    Move(MoveCommand),
}

impl PeerCommand {
    /// 从文本命令转换
    pub fn from_command(cmd: &Command) -> Result<Self, CommandError> {
        let name = cmd.name.as_str();
        let is = |expected: &str| name.eq_ignore_ascii_case(expected);

        let command = if is(names::SERVER_INFO) {
            PeerCommand::ServerInfo
        } else if is(names::LISTEN) {
            let port = match cmd.get("port") {
                Some(_) => Some(parse_arg(cmd, "port")?),
                None => None,
            };
            PeerCommand::Listen { port }
        } else if is(names::CONNECT) {
            PeerCommand::Connect {
                address: cmd.get("ip").map(str::to_string),
            }
        } else if is(names::DISCONNECT) {
            PeerCommand::Disconnect {
                reason: cmd.get("reason").map(str::to_string),
            }
        } else if is(names::REMOTE_CMD) {
            PeerCommand::RemoteCmd(unwrap_remote(cmd)?)
        } else if is(names::PLAYER_INFO) {
            let name = cmd.get("name").ok_or_else(|| CommandError::MissingArgument {
                command: cmd.name.clone(),
                key: "name".to_string(),
            })?;
            PeerCommand::PlayerInfo { name: name.to_string() }
        } else if is(names::BEGIN) {
            PeerCommand::Begin
        } else if is(names::JOIN_GAME) {
            PeerCommand::JoinGame
        } else if is(names::VALIDATE) {
            PeerCommand::Validate(ValidationEnvelope::from_command(cmd)?)
        } else if is(names::RESIGN) {
            PeerCommand::Resign
        } else if is(names::OFFER_DRAW) {
            PeerCommand::OfferDraw
        } else if is(names::ACCEPT_DRAW) {
            PeerCommand::AcceptDraw
        } else if is(names::REJECT_DRAW) {
            PeerCommand::RejectDraw
        } else if is(names::STATE) {
            PeerCommand::State
        } else if is(names::RESET) {
            PeerCommand::Reset
        } else if is(names::MOVE) {
            PeerCommand::Move(MoveCommand::from_command(cmd))
        } else {
            return Err(CommandError::UnknownCommand {
                name: cmd.name.clone(),
            });
        };

        Ok(command)
    }

    /// 执行后是否需要转发给对端
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            PeerCommand::Move(_)
                | PeerCommand::Begin
                | PeerCommand::JoinGame
                | PeerCommand::Disconnect { .. }
                | PeerCommand::Reset
                | PeerCommand::PlayerInfo { .. }
        )
    }
}
