//! 对局会话
//!
//! 控制台与对端送来的命令都在这里分派。本地执行成功的改动命令会包装成
//! 转发信封发给对端；对端的命令带 `remote=true`，执行后不再转发。
//! 网络、存储等副作用先记入 [`Outbox`]，分派结束后由节点统一执行。

use chrono::Utc;
use thiserror::Error;

use protocol::{
    names, wrap_remote, Command, CommandError, MatchOutcome, MatchRecord, MoveCommand,
    MoveRecord, PeerCommand, PieceType, Position, Side, ValidationEnvelope,
};

use crate::config::{truncate_name, PeerConfig};
use crate::preview::{Preview, PreviewState};
use crate::referee::{MoveOutcome, MoveSummary, Referee};
use crate::sync::{self, SyncVerdict};

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchState {
    /// 没有对局
    #[default]
    Unknown,
    /// 等待连接
    Connecting,
    /// 已连接，等待开局
    Selecting,
    /// 对局中
    Playing,
    /// 已分胜负
    Over,
}

/// 本端座位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatStatus {
    Player(Side),
    Spectator,
}

/// 交给节点执行的网络动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAction {
    Listen { port: u16 },
    Connect { address: String },
    Close,
}

/// 走子被会话拒绝的原因
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SeatError {
    #[error("No match in progress; use ChessBegin")]
    NoMatch,
    #[error("Spectators can't move")]
    Spectator,
    #[error("It is not your turn")]
    NotYourTurn,
}

/// 分派过程中产生的待办
#[derive(Debug, Default)]
pub struct Outbox {
    /// 发给对端的命令（按顺序）
    pub to_peer: Vec<Command>,
    /// 控制台输出
    pub console: Vec<String>,
    /// 网络动作，在 `to_peer` 发送之后执行
    pub actions: Vec<NetworkAction>,
    /// 已结束、需要保存的对局记录
    pub finished: Vec<MatchRecord>,
}

impl Outbox {
    fn send(&mut self, cmd: Command) {
        self.to_peer.push(cmd);
    }

    fn print(&mut self, line: impl Into<String>) {
        self.console.push(line.into());
    }

    fn print_all(&mut self, lines: impl IntoIterator<Item = String>) {
        self.console.extend(lines);
    }

    fn act(&mut self, action: NetworkAction) {
        self.actions.push(action);
    }

    /// 合并另一个待办
    pub fn merge(&mut self, other: Outbox) {
        self.to_peer.extend(other.to_peer);
        self.console.extend(other.console);
        self.actions.extend(other.actions);
        self.finished.extend(other.finished);
    }

    pub fn is_empty(&self) -> bool {
        self.to_peer.is_empty()
            && self.console.is_empty()
            && self.actions.is_empty()
            && self.finished.is_empty()
    }
}

/// 对局会话
pub struct PeerSession {
    referee: Referee,
    preview: Preview,
    state: MatchState,
    status: SeatStatus,
    connected: bool,
    /// 通过监听接受的连接（执 1 号先走）
    is_host: bool,
    listen_port: Option<u16>,
    peer_address: Option<String>,
    player_name: String,
    opponent_name: Option<String>,
    record: Option<MatchRecord>,
    save_records: bool,
    default_port: u16,
    default_peer: String,
}

impl PeerSession {
    /// 创建会话，直接进入本地对局
    pub fn new(config: &PeerConfig) -> Self {
        let mut session = Self {
            referee: Referee::new(config.color_names.clone()),
            preview: Preview::new(),
            state: MatchState::Unknown,
            status: SeatStatus::Spectator,
            connected: false,
            is_host: false,
            listen_port: None,
            peer_address: None,
            player_name: truncate_name(&config.player_name),
            opponent_name: None,
            record: None,
            save_records: config.save_records,
            default_port: config.listen_port,
            default_peer: config.peer_address.clone(),
        };
        session.start_match(&mut Outbox::default());
        session
    }

    pub fn referee(&self) -> &Referee {
        &self.referee
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn status(&self) -> SeatStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent_name.as_deref()
    }

    /// 处理控制台输入的一行
    pub fn handle_line(&mut self, line: &str) -> Outbox {
        let mut out = Outbox::default();
        match Command::parse(line) {
            Ok(cmd) => self.dispatch_local(cmd, &mut out),
            Err(CommandError::Empty) => {}
            Err(e) => out.print(e.to_string()),
        }
        out
    }

    /// 处理本地命令
    pub fn handle(&mut self, cmd: Command) -> Outbox {
        let mut out = Outbox::default();
        self.dispatch_local(cmd, &mut out);
        out
    }

    /// 本地命令不能冒充对端
    fn dispatch_local(&mut self, mut cmd: Command, out: &mut Outbox) {
        if cmd.is_named(names::REMOTE_CMD) {
            out.print(format!("{} is only accepted from the peer", names::REMOTE_CMD));
            return;
        }
        while cmd.remove_arg("remote").is_some() {}
        self.dispatch(cmd, out);
    }

    /// 处理对端送来的命令
    pub fn handle_peer(&mut self, mut cmd: Command) -> Outbox {
        // 对端的命令一律不再转发
        cmd.set_arg("remote", "true");
        tracing::debug!("收到对端命令: {}", cmd);
        let mut out = Outbox::default();
        self.dispatch(cmd, &mut out);
        out
    }

    fn dispatch(&mut self, cmd: Command, out: &mut Outbox) {
        let remote = cmd.is_remote();
        let parsed = match PeerCommand::from_command(&cmd) {
            Ok(parsed) => parsed,
            Err(e) => {
                if remote {
                    tracing::warn!("无法解析对端命令 {}: {}", cmd, e);
                }
                out.print(e.to_string());
                return;
            }
        };
        let relayed = parsed.is_relayed();

        let applied = match parsed {
            PeerCommand::ServerInfo => self.handle_server_info(out),
            PeerCommand::Listen { port } => self.handle_listen(port, out),
            PeerCommand::Connect { address } => self.handle_connect(address, out),
            PeerCommand::Disconnect { reason } => self.handle_disconnect(reason, remote, out),
            PeerCommand::RemoteCmd(inner) => {
                self.dispatch(inner, out);
                false
            }
            PeerCommand::PlayerInfo { name } => self.handle_player_info(&name, remote, out),
            PeerCommand::Begin => self.handle_begin(remote, out),
            PeerCommand::JoinGame => self.handle_join_game(remote, out),
            PeerCommand::Validate(envelope) => self.handle_validate(envelope, out),
            PeerCommand::Resign
            | PeerCommand::OfferDraw
            | PeerCommand::AcceptDraw
            | PeerCommand::RejectDraw => {
                out.print(format!("{} is not supported", cmd.name));
                false
            }
            PeerCommand::State => self.handle_state(out),
            PeerCommand::Reset => self.handle_reset(out),
            PeerCommand::Move(mv) => self.handle_move(&mv, out),
        };

        if applied && relayed && !remote && self.connected {
            out.send(wrap_remote(&cmd));
        }
    }

    // ========================================================================
    // 连接
    // ========================================================================

    fn handle_server_info(&self, out: &mut Outbox) -> bool {
        out.print(format!("State: {:?}", self.state));
        out.print(match self.status {
            SeatStatus::Player(side) => format!("Seat: {}", self.referee.player_label(side)),
            SeatStatus::Spectator => "Seat: none".to_string(),
        });
        out.print(match self.listen_port {
            Some(port) => format!("Listening on port {port}"),
            None => "Not listening".to_string(),
        });
        out.print(match (&self.peer_address, self.connected) {
            (Some(addr), true) => format!("Connected to {addr}"),
            _ => "Not connected".to_string(),
        });
        out.print(format!("You: {}", self.player_name));
        if let Some(name) = &self.opponent_name {
            out.print(format!("Opponent: {name}"));
        }
        false
    }

    fn handle_listen(&mut self, port: Option<u16>, out: &mut Outbox) -> bool {
        if self.connected {
            out.print("Already connected; use ChessDisconnect first");
            return false;
        }
        let port = port.unwrap_or(self.default_port);
        self.listen_port = Some(port);
        self.state = MatchState::Connecting;
        out.print(format!("Listening on port {port}..."));
        out.act(NetworkAction::Listen { port });
        false
    }

    fn handle_connect(&mut self, address: Option<String>, out: &mut Outbox) -> bool {
        if self.connected {
            out.print("Already connected; use ChessDisconnect first");
            return false;
        }
        let address = address.unwrap_or_else(|| self.default_peer.clone());
        self.state = MatchState::Connecting;
        out.print(format!("Connecting to {address}..."));
        out.act(NetworkAction::Connect { address });
        false
    }

    fn handle_disconnect(&mut self, reason: Option<String>, remote: bool, out: &mut Outbox) -> bool {
        if !self.connected {
            out.print("Not connected");
            return false;
        }
        let reason = match (reason, remote) {
            (Some(reason), _) => reason,
            (None, true) => "Peer disconnected".to_string(),
            (None, false) => "Disconnected by user".to_string(),
        };
        if !remote {
            let cmd = Command::new(names::DISCONNECT).with_arg("reason", reason.clone());
            out.send(wrap_remote(&cmd));
        }
        self.drop_connection(&reason, out);
        false
    }

    /// 节点建立连接后调用
    pub fn on_connected(&mut self, is_host: bool, peer_address: String) -> Outbox {
        let mut out = Outbox::default();
        if self.state == MatchState::Playing {
            self.finish_match(MatchOutcome::Abandoned, &mut out);
        }

        self.connected = true;
        self.is_host = is_host;
        self.peer_address = Some(peer_address.clone());
        self.opponent_name = None;
        self.status = SeatStatus::Spectator;
        self.state = MatchState::Selecting;
        self.preview.cancel();

        tracing::info!("已连接对端 {}，本端执 {:?}", peer_address, self.seat_side());
        out.print(format!(
            "Connected to {}; you will play {}. Type ChessBegin to start",
            peer_address,
            self.referee.player_label(self.seat_side())
        ));
        let info = Command::new(names::PLAYER_INFO).with_arg("name", self.player_name.clone());
        out.send(wrap_remote(&info));
        out
    }

    /// 连接失败（连不上或监听失败）
    pub fn on_connect_failed(&mut self, reason: &str) -> Outbox {
        let mut out = Outbox::default();
        self.state = self.waiting_state();
        out.print(format!("Connection failed: {reason}"));
        out
    }

    /// 监听端口绑定失败
    pub fn on_listen_failed(&mut self, reason: &str) -> Outbox {
        self.listen_port = None;
        self.on_connect_failed(reason)
    }

    /// 传输层报告连接断开
    pub fn on_connection_lost(&mut self, reason: &str) -> Outbox {
        let mut out = Outbox::default();
        if self.connected {
            self.drop_connection(reason, &mut out);
        }
        out
    }

    fn drop_connection(&mut self, reason: &str, out: &mut Outbox) {
        if matches!(self.state, MatchState::Playing | MatchState::Over) {
            self.finish_match(
                MatchOutcome::Disconnected {
                    reason: reason.to_string(),
                },
                out,
            );
        }

        tracing::info!("断开连接: {}", reason);
        self.connected = false;
        self.peer_address = None;
        self.opponent_name = None;
        self.status = SeatStatus::Spectator;
        self.state = self.waiting_state();
        self.preview.cancel();

        out.print(format!("Disconnected: {reason}"));
        out.act(NetworkAction::Close);
    }

    /// 仍在监听时回到等待连接，否则回到无对局
    fn waiting_state(&self) -> MatchState {
        if self.listen_port.is_some() {
            MatchState::Connecting
        } else {
            MatchState::Unknown
        }
    }

    fn seat_side(&self) -> Side {
        if self.is_host {
            Side::White
        } else {
            Side::Black
        }
    }

    // ========================================================================
    // 对局
    // ========================================================================

    fn handle_player_info(&mut self, name: &str, remote: bool, out: &mut Outbox) -> bool {
        let name = truncate_name(name);
        if name.is_empty() {
            out.print("Player name can't be empty");
            return false;
        }

        if remote {
            out.print(format!("Opponent is {name}"));
            self.opponent_name = Some(name);
        } else {
            out.print(format!("You are now {name}"));
            self.player_name = name;
        }
        self.refresh_record_names();
        true
    }

    fn handle_begin(&mut self, remote: bool, out: &mut Outbox) -> bool {
        if matches!(self.state, MatchState::Connecting) && !self.connected {
            out.print("Waiting for a peer; use ChessDisconnect or wait for a connection");
            return false;
        }

        self.status = if self.connected {
            SeatStatus::Player(self.seat_side())
        } else {
            SeatStatus::Spectator
        };
        self.start_match(out);

        out.print("Match started");
        if let SeatStatus::Player(side) = self.status {
            out.print(format!("You are {}", self.referee.player_label(side)));
        }
        out.print_all(self.referee.state_lines());

        if remote {
            let join = Command::new(names::JOIN_GAME).with_arg("name", self.player_name.clone());
            out.send(wrap_remote(&join));
        }
        true
    }

    fn handle_join_game(&mut self, remote: bool, out: &mut Outbox) -> bool {
        if remote {
            let name = self.opponent_name.as_deref().unwrap_or("Opponent");
            out.print(format!("{name} joined the match"));
            return false;
        }
        if !self.connected || self.state != MatchState::Playing {
            out.print("No match to join");
            return false;
        }
        if let SeatStatus::Player(side) = self.status {
            out.print(format!("Joined as {}", self.referee.player_label(side)));
        }
        true
    }

    fn handle_state(&self, out: &mut Outbox) -> bool {
        out.print(format!("State: {:?}", self.state));
        out.print_all(self.referee.state_lines());
        false
    }

    fn handle_reset(&mut self, out: &mut Outbox) -> bool {
        if !matches!(self.state, MatchState::Playing | MatchState::Over) {
            out.print("No match to reset");
            return false;
        }
        self.start_match(out);
        out.print("Match reset");
        out.print_all(self.referee.state_lines());
        true
    }

    fn handle_move(&mut self, mv: &MoveCommand, out: &mut Outbox) -> bool {
        if let Err(e) = self.check_seat(mv.remote) {
            if mv.remote {
                tracing::warn!("拒绝对端走子 {} -> {}: {}", mv.from, mv.to, e);
            }
            out.print(e.to_string());
            return false;
        }

        let report = self.referee.submit_move(mv);
        out.print_all(report.lines);

        let MoveOutcome::Applied(summary) = report.outcome else {
            if mv.remote {
                tracing::warn!("对端走子被裁判拒绝: {} -> {}", mv.from, mv.to);
            }
            return false;
        };

        self.record_move(&summary, mv.remote);
        if summary.won {
            self.state = MatchState::Over;
            self.finish_match(MatchOutcome::KingCaptured { winner: summary.side }, out);
        }
        true
    }

    fn check_seat(&self, remote: bool) -> Result<(), SeatError> {
        if !matches!(self.state, MatchState::Playing | MatchState::Over) {
            return Err(SeatError::NoMatch);
        }
        if !self.connected {
            return Ok(());
        }
        let SeatStatus::Player(seat) = self.status else {
            return Err(SeatError::Spectator);
        };
        let expected = if remote { seat.opponent() } else { seat };
        if self.referee.current_mover() != expected {
            return Err(SeatError::NotYourTurn);
        }
        Ok(())
    }

    /// 重置棋盘并开始新的记录
    fn start_match(&mut self, out: &mut Outbox) {
        if matches!(self.state, MatchState::Playing) {
            self.finish_match(MatchOutcome::Abandoned, out);
        }
        self.referee.reset();
        self.preview.cancel();
        self.state = MatchState::Playing;
        self.record = Some(MatchRecord::new(
            self.name_for(Side::Black),
            self.name_for(Side::White),
        ));
    }

    fn finish_match(&mut self, outcome: MatchOutcome, out: &mut Outbox) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        if record.moves.is_empty() || !self.save_records {
            return;
        }
        record.finish(outcome, self.referee.board().state_string());
        out.finished.push(record);
    }

    fn record_move(&mut self, summary: &MoveSummary, remote: bool) {
        if let Some(record) = &mut self.record {
            record.add_move(MoveRecord {
                side: summary.side,
                from: summary.from.to_string(),
                to: summary.to.to_string(),
                result: summary.result,
                captured: summary.captured.map(|p| p.piece_type),
                teleport: summary.teleport,
                remote,
                timestamp: Utc::now(),
            });
        }
    }

    fn name_for(&self, side: Side) -> String {
        match self.status {
            SeatStatus::Player(seat) if seat != side => self
                .opponent_name
                .clone()
                .unwrap_or_else(|| "Opponent".to_string()),
            _ => self.player_name.clone(),
        }
    }

    fn refresh_record_names(&mut self) {
        let black = self.name_for(Side::Black);
        let white = self.name_for(Side::White);
        if let Some(record) = &mut self.record {
            record.metadata.black_player = black;
            record.metadata.white_player = white;
        }
    }

    // ========================================================================
    // 状态校验
    // ========================================================================

    fn handle_validate(&mut self, envelope: Option<ValidationEnvelope>, out: &mut Outbox) -> bool {
        let Some(envelope) = envelope else {
            if !self.connected {
                out.print("Not connected");
                return false;
            }
            out.send(sync::validation_envelope(&self.referee).to_command());
            out.print("Sent board validation");
            return false;
        };

        match sync::compare(&self.referee, &envelope) {
            SyncVerdict::InSync => tracing::debug!("状态校验一致，第 {} 步", self.referee.ply()),
            SyncVerdict::Stale {
                remote_ply,
                local_ply,
            } => tracing::debug!("忽略过期的校验信封 ({} < {})", remote_ply, local_ply),
            SyncVerdict::Desync { reason } => {
                if self.connected {
                    self.force_disconnect(&reason, out);
                } else {
                    out.print(format!("Board mismatch: {reason}"));
                }
            }
        }
        false
    }

    fn force_disconnect(&mut self, reason: &str, out: &mut Outbox) {
        tracing::error!("棋盘状态不一致: {}", reason);
        out.print(format!("Board desynchronized: {reason}"));

        let reason = format!("Desync: {reason}");
        let cmd = Command::new(names::DISCONNECT).with_arg("reason", reason.clone());
        out.send(wrap_remote(&cmd));
        self.drop_connection(&reason, out);
    }

    /// 定时校验：对局中才发送
    pub fn validation_tick(&self) -> Outbox {
        let mut out = Outbox::default();
        if self.connected && matches!(self.state, MatchState::Playing | MatchState::Over) {
            out.send(sync::validation_envelope(&self.referee).to_command());
        }
        out
    }

    // ========================================================================
    // 交互式预览
    // ========================================================================

    /// 抓起棋子
    pub fn grab(&mut self, from: Position) -> bool {
        self.preview.grab(&self.referee, from)
    }

    /// 悬停，返回是否合法
    pub fn hover(&mut self, to: Option<Position>, modifier_held: bool) -> bool {
        self.preview.hover(&self.referee, to, modifier_held)
    }

    /// 选择升变类型，返回当前目标是否合法
    pub fn set_promotion(&mut self, promotion: Option<PieceType>) -> bool {
        self.preview.set_promotion(promotion);
        match self.preview.state() {
            PreviewState::Grabbed {
                target,
                free_placement,
                ..
            } => self.preview.hover(&self.referee, target, free_placement),
            PreviewState::Idle => false,
        }
    }

    /// 确认预览：合法时按键入的走子命令处理
    pub fn commit(&mut self) -> Outbox {
        match self.preview.commit(&self.referee) {
            Ok(mv) => self.handle(mv.to_command()),
            Err(result) => {
                let mut out = Outbox::default();
                out.print(result.message());
                out
            }
        }
    }

    /// 放下棋子
    pub fn cancel(&mut self) {
        self.preview.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MoveResult;

    fn session() -> PeerSession {
        PeerSession::new(&PeerConfig::default())
    }

    /// 建立一对已连接的会话：host 监听，guest 主动连接
    fn connected_pair() -> (PeerSession, PeerSession) {
        let mut host = session();
        let mut guest = session();
        host.handle_line("ChessListen port=4000");
        let host_out = host.on_connected(true, "10.0.0.2:5000".to_string());
        let guest_out = guest.on_connected(false, "10.0.0.1:4000".to_string());
        deliver(guest_out, &mut host);
        deliver(host_out, &mut guest);
        (host, guest)
    }

    /// 把一方的待发命令交给另一方，返回对方产生的待办
    fn deliver(out: Outbox, to: &mut PeerSession) -> Outbox {
        let mut replies = Outbox::default();
        for cmd in out.to_peer {
            replies.merge(to.handle_peer(cmd));
        }
        replies
    }

    fn assert_printed(out: &Outbox, text: &str) {
        assert!(
            out.console.iter().any(|line| line.contains(text)),
            "missing {text:?} in {:?}",
            out.console
        );
    }

    #[test]
    fn test_local_hotseat_move() {
        let mut session = session();
        assert_eq!(session.state(), MatchState::Playing);

        let out = session.handle_line("ChessMove from=e2 to=e4");
        assert_printed(&out, "Moved Player #1 (Yellow)'s pawn from e2 to e4");
        assert!(out.to_peer.is_empty());

        // 本地模式下双方轮流
        let out = session.handle_line("chessmove from=e7 to=e5");
        assert_printed(&out, "Moved Player #0 (Blue)'s pawn from e7 to e5");
    }

    #[test]
    fn test_bad_and_unsupported_commands() {
        let mut session = session();
        assert!(session.handle_line("   ").is_empty());

        let out = session.handle_line("ChessMove from=\"e2");
        assert_printed(&out, "Unterminated quote");

        let out = session.handle_line("ChessResign");
        assert_printed(&out, "ChessResign is not supported");

        let out = session.handle_line("ChessFly");
        assert_printed(&out, "Unknown command");

        let out = session.handle_line("ChessMove to=e4");
        assert_printed(&out, "must have from= and to= arguments");
    }

    #[test]
    fn test_connect_exchanges_names() {
        let mut config = PeerConfig::default();
        config.player_name = "alice".to_string();
        let mut host = PeerSession::new(&config);
        let mut guest = session();

        let out = host.on_connected(true, "peer".to_string());
        assert_eq!(host.state(), MatchState::Selecting);
        assert_printed(&out, "you will play Player #1 (Yellow)");

        let replies = deliver(out, &mut guest);
        assert!(replies.to_peer.is_empty());
        assert_eq!(guest.opponent_name(), Some("alice"));
    }

    #[test]
    fn test_begin_and_relay() {
        let (mut host, mut guest) = connected_pair();

        let out = host.handle_line("ChessBegin");
        assert_eq!(host.status(), SeatStatus::Player(Side::White));
        assert_eq!(out.to_peer.len(), 1);
        assert!(out.to_peer[0].is_named("RemoteCmd"));
        assert_eq!(out.to_peer[0].get("cmd"), Some("ChessBegin"));

        // guest 开局后回一条加入确认
        let replies = deliver(out, &mut guest);
        assert_eq!(guest.state(), MatchState::Playing);
        assert_eq!(guest.status(), SeatStatus::Player(Side::Black));
        assert_eq!(replies.to_peer[0].get("cmd"), Some("ChessJoinGame"));
        let acks = deliver(replies, &mut host);
        assert_printed(&acks, "joined the match");
        assert!(acks.to_peer.is_empty());

        let out = host.handle_line("ChessMove from=e2 to=e4");
        assert_eq!(out.to_peer.len(), 1);
        assert_eq!(
            out.to_peer[0].to_string(),
            "RemoteCmd cmd=ChessMove from=e2 to=e4 remote=true"
        );

        // 对端执行后不再转发
        let replies = deliver(out, &mut guest);
        assert!(replies.to_peer.is_empty());
        assert_eq!(host.referee().board().dump(), guest.referee().board().dump());
        assert_eq!(guest.referee().current_mover(), Side::Black);

        // 校验一致，不会断开
        let replies = deliver(guest.validation_tick(), &mut host);
        assert!(replies.is_empty());
        assert!(host.is_connected());
    }

    #[test]
    fn test_turn_enforced_in_remote_mode() {
        let (mut host, mut guest) = connected_pair();
        let out = host.handle_line("ChessBegin");
        deliver(out, &mut guest);

        let out = guest.handle_line("ChessMove from=e7 to=e5");
        assert_printed(&out, "It is not your turn");
        assert!(out.to_peer.is_empty());

        // 非法走子不转发
        let out = host.handle_line("ChessMove from=e2 to=e5");
        assert!(out.to_peer.is_empty());
        assert_eq!(host.referee().ply(), 0);

        deliver(host.handle_line("ChessMove from=e2 to=e4"), &mut guest);

        // 轮到本端时对端的走子被拒绝
        let out = guest.handle_peer(Command::parse("ChessMove from=d2 to=d4").unwrap());
        assert_printed(&out, "It is not your turn");
        assert_eq!(guest.referee().ply(), 1);
    }

    #[test]
    fn test_moves_before_begin_rejected() {
        let (mut host, _guest) = connected_pair();
        let out = host.handle_line("ChessMove from=e2 to=e4");
        assert_printed(&out, "No match in progress");
    }

    #[test]
    fn test_desync_forces_disconnect() {
        let (mut host, mut guest) = connected_pair();
        let out = host.handle_line("ChessBegin");
        deliver(out, &mut guest);

        let mut other = Referee::default();
        other.submit_move(&MoveCommand::new("d2", "d4"));
        let mut envelope = sync::validation_envelope(&other);
        envelope.ply = Some(0);

        let out = guest.handle_peer(envelope.to_command());
        assert_printed(&out, "Board desynchronized");
        assert_eq!(out.actions, vec![NetworkAction::Close]);
        let disconnect = &out.to_peer[0];
        assert_eq!(disconnect.get("cmd"), Some("ChessDisconnect"));
        assert!(disconnect.get("reason").unwrap().starts_with("Desync"));
        assert!(!guest.is_connected());
        assert_eq!(guest.state(), MatchState::Unknown);

        // host 收到断开后回到等待连接
        let replies = deliver(out, &mut host);
        assert_eq!(replies.actions, vec![NetworkAction::Close]);
        assert_printed(&replies, "Disconnected: Desync");
        assert_eq!(host.state(), MatchState::Connecting);
        assert!(replies.to_peer.is_empty());
    }

    #[test]
    fn test_stale_validation_ignored() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);

        let stale = host.validation_tick();
        deliver(host.handle_line("ChessMove from=e2 to=e4"), &mut guest);

        // guest 已走到第 1 步，第 0 步的信封过期
        let out = deliver(stale, &mut guest);
        assert!(out.is_empty());
        assert!(guest.is_connected());
    }

    #[test]
    fn test_local_disconnect_notifies_peer() {
        let (mut host, _guest) = connected_pair();
        let out = host.handle_line("ChessDisconnect reason=\"gotta go\"");
        assert_eq!(out.to_peer[0].get("reason"), Some("gotta go"));
        assert_eq!(out.actions, vec![NetworkAction::Close]);
        assert_eq!(host.state(), MatchState::Connecting);

        let out = host.handle_line("ChessDisconnect");
        assert_printed(&out, "Not connected");
    }

    #[test]
    fn test_connection_lost_saves_record() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);
        deliver(host.handle_line("ChessMove from=e2 to=e4"), &mut guest);

        let out = guest.on_connection_lost("connection reset");
        assert_eq!(out.finished.len(), 1);
        let record = &out.finished[0];
        assert_eq!(record.moves.len(), 1);
        assert!(record.moves[0].remote);
        assert_eq!(
            record.metadata.outcome,
            Some(MatchOutcome::Disconnected {
                reason: "connection reset".to_string()
            })
        );
    }

    #[test]
    fn test_king_capture_ends_match() {
        let mut session = session();
        let out = session.handle_line("ChessMove from=d1 to=e8 teleport");
        assert_printed(&out, "has won the match!");
        assert_eq!(session.state(), MatchState::Over);
        assert_eq!(out.finished.len(), 1);
        assert_eq!(
            out.finished[0].metadata.outcome,
            Some(MatchOutcome::KingCaptured { winner: Side::White })
        );

        let out = session.handle_line("ChessMove from=e7 to=e5");
        assert!(out.console.is_empty());

        let out = session.handle_line("ChessReset");
        assert_printed(&out, "Match reset");
        assert_eq!(session.state(), MatchState::Playing);
    }

    #[test]
    fn test_preview_commit_is_relayed() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);

        // 非法预览只报告原因
        assert!(host.grab(Position::parse_algebraic("a1").unwrap()));
        host.hover(Some(Position::parse_algebraic("a5").unwrap()), false);
        let out = host.commit();
        assert_eq!(out.console, vec![MoveResult::PathBlocked.message().to_string()]);
        assert!(out.to_peer.is_empty());

        let from = Position::parse_algebraic("g1").unwrap();
        let to = Position::parse_algebraic("f3").unwrap();
        assert!(host.grab(from));
        assert!(host.hover(Some(to), false));
        let out = host.commit();
        assert_eq!(out.to_peer[0].get("cmd"), Some("ChessMove"));

        deliver(out, &mut guest);
        assert_eq!(guest.referee().ply(), 1);
    }

    #[test]
    fn test_preview_promotion_is_relayed() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);
        deliver(host.handle_line("ChessMove from=a2 to=a7 teleport"), &mut guest);
        deliver(guest.handle_line("ChessMove from=e7 to=e5"), &mut host);

        let from = Position::parse_algebraic("a7").unwrap();
        let to = Position::parse_algebraic("b8").unwrap();
        assert!(host.grab(from));
        assert!(!host.hover(Some(to), false));
        assert!(host.set_promotion(Some(PieceType::Queen)));

        let out = host.commit();
        assert_eq!(out.to_peer[0].get("cmd"), Some("ChessMove"));
        assert_eq!(out.to_peer[0].get("promoteTo"), Some("queen"));

        deliver(out, &mut guest);
        let (_, piece) = guest.referee().board().piece_at(to).unwrap();
        assert_eq!(piece.piece_type, PieceType::Queen);
        assert_eq!(piece.side, Side::White);
        assert_eq!(host.referee().board().dump(), guest.referee().board().dump());
    }

    #[test]
    fn test_console_cannot_pose_as_peer() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);

        // 带 remote 的键入命令仍按本地处理：轮到对方时被拒绝
        let out = guest.handle_line("ChessMove from=e7 to=e5 remote");
        assert_printed(&out, "It is not your turn");
        assert_eq!(guest.referee().ply(), 0);

        let out = guest.handle_line("RemoteCmd cmd=ChessMove from=e2 to=e4 remote=true");
        assert_printed(&out, "only accepted from the peer");
        assert_eq!(guest.referee().ply(), 0);

        // 本地走子去掉 remote 后照常转发
        deliver(host.handle_line("ChessMove from=e2 to=e4"), &mut guest);
        let out = guest.handle_line("ChessMove from=e7 to=e5 remote=true");
        assert_eq!(
            out.to_peer[0].to_string(),
            "RemoteCmd cmd=ChessMove from=e7 to=e5 remote=true"
        );
        deliver(out, &mut host);
        assert_eq!(host.referee().ply(), 2);
    }

    #[test]
    fn test_relayed_reset_and_player_info() {
        let (mut host, mut guest) = connected_pair();
        deliver(host.handle_line("ChessBegin"), &mut guest);
        deliver(host.handle_line("ChessMove from=e2 to=e4"), &mut guest);

        let out = guest.handle_line("ChessReset");
        assert_eq!(out.to_peer[0].get("cmd"), Some("ChessReset"));
        deliver(out, &mut host);
        assert_eq!(host.referee().ply(), 0);

        let out = guest.handle_line("ChessPlayerInfo name=bob");
        assert_eq!(guest.player_name(), "bob");
        deliver(out, &mut host);
        assert_eq!(host.opponent_name(), Some("bob"));
    }

    #[test]
    fn test_listen_and_connect_actions() {
        let mut session = session();
        let out = session.handle_line("ChessConnect ip=192.168.1.5:3100");
        assert_eq!(
            out.actions,
            vec![NetworkAction::Connect {
                address: "192.168.1.5:3100".to_string()
            }]
        );
        assert_eq!(session.state(), MatchState::Connecting);

        let out = session.on_connect_failed("refused");
        assert_printed(&out, "Connection failed: refused");
        assert_eq!(session.state(), MatchState::Unknown);

        let out = session.handle_line("ChessListen");
        assert_eq!(out.actions, vec![NetworkAction::Listen { port: protocol::DEFAULT_PORT }]);

        let out = session.handle_line("ChessServerInfo");
        assert_printed(&out, "Listening on port 3100");
    }
}
