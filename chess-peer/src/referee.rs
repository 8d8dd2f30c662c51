//! 对局裁判
//!
//! 持有棋盘与回合，完成“解析坐标 → 验证 → 执行 → 换手”的流程，
//! 并生成给控制台的播报文本。预览与正式走子都经过同一个 [`MoveRules`]。

use protocol::{
    Board, CoordinateError, MoveCommand, MoveContext, MoveResult, MoveRules, Piece, PieceId,
    PieceType, Position, Side, DEFAULT_COLOR_NAMES, NUM_PLAYERS,
};

/// 已执行走法的摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSummary {
    pub side: Side,
    pub from: Position,
    pub to: Position,
    pub result: MoveResult,
    /// 走子前的棋子类型（升变前）
    pub piece_type: PieceType,
    pub captured: Option<Piece>,
    pub teleport: bool,
    /// 吃掉对方王，对局结束
    pub won: bool,
}

/// 一次提交的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// 对局已分胜负，命令被忽略
    Ignored,
    /// 缺少坐标或格式不对
    Unparsed,
    /// 非法，棋盘与回合不变
    Rejected { result: MoveResult },
    /// 已执行
    Applied(MoveSummary),
}

/// 结果加播报文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    pub lines: Vec<String>,
}

impl MoveReport {
    fn new(outcome: MoveOutcome, lines: Vec<String>) -> Self {
        Self { outcome, lines }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Applied(_))
    }

    /// 验证结果（未解析或被忽略时为 `None`）
    pub fn result(&self) -> Option<MoveResult> {
        match self.outcome {
            MoveOutcome::Applied(summary) => Some(summary.result),
            MoveOutcome::Rejected { result } => Some(result),
            MoveOutcome::Ignored | MoveOutcome::Unparsed => None,
        }
    }
}

/// 对局裁判
#[derive(Debug, Clone)]
pub struct Referee {
    board: Board,
    current_mover: Side,
    next_mover: Side,
    has_won: bool,
    /// 每方最近一次移动的棋子
    last_moved: [Option<PieceId>; NUM_PLAYERS],
    /// 已完成的步数
    ply: u32,
    color_names: [String; NUM_PLAYERS],
}

impl Referee {
    pub fn new(color_names: [String; NUM_PLAYERS]) -> Self {
        Self {
            board: Board::initial(),
            current_mover: Side::White,
            next_mover: Side::Black,
            has_won: false,
            last_moved: [None; NUM_PLAYERS],
            ply: 0,
            color_names,
        }
    }

    /// 回到开局
    pub fn reset(&mut self) {
        self.board = Board::initial();
        self.current_mover = Side::White;
        self.next_mover = Side::Black;
        self.has_won = false;
        self.last_moved = [None; NUM_PLAYERS];
        self.ply = 0;
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_mover(&self) -> Side {
        self.current_mover
    }

    pub fn next_mover(&self) -> Side {
        self.next_mover
    }

    pub fn has_won(&self) -> bool {
        self.has_won
    }

    pub fn ply(&self) -> u32 {
        self.ply
    }

    pub fn last_moved(&self, side: Side) -> Option<PieceId> {
        self.last_moved[side.index()]
    }

    pub fn color_name(&self, side: Side) -> &str {
        &self.color_names[side.index()]
    }

    /// "Player #N (Color)"
    pub fn player_label(&self, side: Side) -> String {
        format!("Player #{} ({})", side.index(), self.color_name(side))
    }

    fn context(&self) -> MoveContext {
        MoveContext {
            mover: self.current_mover,
            opponent_last_moved: self.last_moved[self.next_mover.index()],
        }
    }

    /// 预览：这步棋是否合法（不修改任何状态）
    pub fn preview_move(
        &self,
        from: Position,
        to: Position,
        promotion: Option<PieceType>,
    ) -> MoveResult {
        MoveRules::validate(&self.board, self.context(), from, to, promotion)
    }

    /// 预览自由摆放
    pub fn preview_free_placement(&self, from: Position, to: Position) -> MoveResult {
        match MoveRules::test_free_placement(&self.board, self.current_mover, from, to) {
            Ok((_, result)) => result,
            Err(result) => result,
        }
    }

    /// 提交一条走子命令
    pub fn submit_move(&mut self, cmd: &MoveCommand) -> MoveReport {
        if self.has_won {
            return MoveReport::new(MoveOutcome::Ignored, Vec::new());
        }

        let (from, to) = match Self::parse_coordinates(cmd) {
            Ok(squares) => squares,
            Err(report) => return report,
        };

        if cmd.teleport {
            self.free_place(from, to, cmd.promotion)
        } else {
            self.play(from, to, cmd.promotion)
        }
    }

    fn parse_coordinates(cmd: &MoveCommand) -> Result<(Position, Position), MoveReport> {
        let from = Position::parse_algebraic(&cmd.from);
        let to = Position::parse_algebraic(&cmd.to);

        match (from, to) {
            (Ok(from), Ok(to)) => Ok((from, to)),
            (Err(CoordinateError::Unparsed), _) | (_, Err(CoordinateError::Unparsed)) => {
                Err(MoveReport::new(
                    MoveOutcome::Unparsed,
                    vec![
                        "Illegal chess move; must have from= and to= arguments!".to_string(),
                        "  ChessMove from=e2 to=e4".to_string(),
                    ],
                ))
            }
            _ => Err(MoveReport::new(
                MoveOutcome::Rejected {
                    result: MoveResult::BadLocation,
                },
                vec![
                    MoveResult::BadLocation.message().to_string(),
                    "  Examples: E2, E4; A1 is bottom left and H8 is top-right".to_string(),
                ],
            )),
        }
    }

    /// 按完整规则走子
    fn play(&mut self, from: Position, to: Position, promotion: Option<PieceType>) -> MoveReport {
        let plan = match MoveRules::plan(&self.board, self.context(), from, to, promotion) {
            Ok(plan) => plan,
            Err(result) => return self.reject(result, from, to),
        };
        let Some(piece_type) = self.board.get(plan.piece).map(|p| p.piece_type) else {
            return self.reject(MoveResult::NoPiece, from, to);
        };

        let applied = MoveRules::apply(&mut self.board, plan);
        let summary = MoveSummary {
            side: plan.side,
            from,
            to,
            result: plan.result,
            piece_type,
            captured: applied.captured,
            teleport: false,
            won: false,
        };
        self.complete(summary, plan.piece)
    }

    /// 自由摆放：只检查距离、起点棋子、归属与终点
    pub fn free_place(
        &mut self,
        from: Position,
        to: Position,
        promotion: Option<PieceType>,
    ) -> MoveReport {
        if self.has_won {
            return MoveReport::new(MoveOutcome::Ignored, Vec::new());
        }

        let (id, result) =
            match MoveRules::test_free_placement(&self.board, self.current_mover, from, to) {
                Ok(verdict) => verdict,
                Err(result) => return self.reject(result, from, to),
            };
        let Some(piece_type) = self.board.get(id).map(|p| p.piece_type) else {
            return self.reject(MoveResult::NoPiece, from, to);
        };

        let captured = MoveRules::apply_free_placement(&mut self.board, id, to, promotion);
        let summary = MoveSummary {
            side: self.current_mover,
            from,
            to,
            result,
            piece_type,
            captured,
            teleport: true,
            won: false,
        };
        self.complete(summary, id)
    }

    /// 记录走子、判断胜负、换手并生成播报
    fn complete(&mut self, mut summary: MoveSummary, id: PieceId) -> MoveReport {
        let side = summary.side;
        self.last_moved[side.index()] = Some(id);
        self.ply += 1;

        let mut lines = vec![format!(
            "Moved {}'s {} from {} to {}",
            self.player_label(side),
            summary.piece_type.name(),
            summary.from,
            summary.to
        )];
        if !matches!(summary.result, MoveResult::MoveNormal | MoveResult::CaptureNormal) {
            lines.push(summary.result.message().to_string());
        }

        if let Some(captured) = summary.captured {
            lines.push(format!(
                "{} captured {}'s {} at {}",
                self.player_label(side),
                self.player_label(captured.side),
                captured.name(),
                captured.position
            ));
            if captured.piece_type == PieceType::King {
                self.has_won = true;
                summary.won = true;
            }
        }

        if summary.won {
            tracing::info!("{} 获胜，共 {} 步", self.player_label(side), self.ply);
            lines.push(format!("{} has won the match!", self.player_label(side)));
        } else {
            std::mem::swap(&mut self.current_mover, &mut self.next_mover);
            lines.extend(self.state_lines());
        }

        MoveReport::new(MoveOutcome::Applied(summary), lines)
    }

    fn reject(&self, result: MoveResult, from: Position, to: Position) -> MoveReport {
        let mut lines = Vec::new();
        if let Some(preamble) = self.rejection_preamble(result, from, to) {
            lines.push(preamble);
        }
        lines.push(result.message().to_string());
        if result == MoveResult::BadLocation {
            lines.push("  Examples: E2, E4; A1 is bottom left and H8 is top-right".to_string());
        }
        tracing::debug!("拒绝走子 {} -> {}: {:?}", from, to, result);
        MoveReport::new(MoveOutcome::Rejected { result }, lines)
    }

    fn rejection_preamble(&self, result: MoveResult, from: Position, to: Position) -> Option<String> {
        match result {
            MoveResult::NoPiece => Some(format!("There's no chess at {from}")),
            MoveResult::NotYourPiece => {
                let (_, piece) = self.board.piece_at(from)?;
                Some(format!(
                    "The {} at {} belongs to player #{} ({}); it is currently player #{} ({})'s turn.",
                    piece.name(),
                    from,
                    piece.side.index(),
                    self.color_name(piece.side),
                    self.current_mover.index(),
                    self.color_name(self.current_mover)
                ))
            }
            MoveResult::DestinationBlocked => {
                let (_, piece) = self.board.piece_at(to)?;
                Some(format!(
                    "Cannot move to {}, since it is occupied by your own {}",
                    to,
                    piece.name()
                ))
            }
            MoveResult::MoveNormal
            | MoveResult::MovePawn2Square
            | MoveResult::MovePromotion
            | MoveResult::CastleKingside
            | MoveResult::CastleQueenside
            | MoveResult::CaptureNormal
            | MoveResult::CaptureEnPassant
            | MoveResult::BadLocation
            | MoveResult::WrongMoveShape
            | MoveResult::ZeroDistance
            | MoveResult::PawnBlocked
            | MoveResult::PathBlocked
            | MoveResult::EndsInCheck
            | MoveResult::KingTogether
            | MoveResult::NoPromotion
            | MoveResult::EnPassantStale
            | MoveResult::CastleKingHasMoved
            | MoveResult::CastleRookHasMoved
            | MoveResult::CastlePathBlocked
            | MoveResult::CastleThroughCheck
            | MoveResult::CastleOutOfCheck => None,
        }
    }

    /// "Player #N (Color) -- it's your move!"
    pub fn current_round_line(&self) -> String {
        format!("{} -- it's your move!", self.player_label(self.current_mover))
    }

    /// 轮到谁走加带边框的棋盘
    pub fn state_lines(&self) -> Vec<String> {
        let mut lines = vec![self.current_round_line()];
        lines.extend(self.board.framed_dump());
        lines
    }
}

impl Default for Referee {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR_NAMES.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(referee: &mut Referee, from: &str, to: &str) -> MoveReport {
        referee.submit_move(&MoveCommand::new(from, to))
    }

    fn pos(text: &str) -> Position {
        Position::parse_algebraic(text).unwrap()
    }

    #[test]
    fn test_opening_pawn_move() {
        let mut referee = Referee::default();
        let report = play(&mut referee, "e2", "e4");

        assert_eq!(report.result(), Some(MoveResult::MovePawn2Square));
        assert_eq!(report.lines[0], "Moved Player #1 (Yellow)'s pawn from e2 to e4");
        assert!(report.lines.contains(&"Player #0 (Blue) -- it's your move!".to_string()));

        let (_, pawn) = referee.board().piece_at(pos("e4")).unwrap();
        assert_eq!(pawn.glyph(), 'P');
        assert!(pawn.has_moved);
        assert!(referee.board().piece_at(pos("e2")).is_none());
        assert_eq!(referee.current_mover(), Side::Black);
        assert_eq!(referee.ply(), 1);
    }

    #[test]
    fn test_pawn_scenario() {
        let mut referee = Referee::default();
        assert!(play(&mut referee, "e2", "e4").is_applied());
        assert!(play(&mut referee, "e7", "e5").is_applied());

        // 斜进到空格不是合法的兵步
        let report = play(&mut referee, "e4", "d5");
        assert_eq!(report.result(), Some(MoveResult::WrongMoveShape));
        assert_eq!(referee.current_mover(), Side::White);

        assert!(play(&mut referee, "d2", "d4").is_applied());
        let report = play(&mut referee, "e5", "d4");
        assert_eq!(report.result(), Some(MoveResult::CaptureNormal));
        assert!(report
            .lines
            .contains(&"Player #0 (Blue) captured Player #1 (Yellow)'s pawn at d4".to_string()));
        assert_eq!(referee.board().piece_at(pos("d4")).unwrap().1.side, Side::Black);
    }

    #[test]
    fn test_unparsed_and_bad_location() {
        let mut referee = Referee::default();

        let report = play(&mut referee, "e", "e4");
        assert_eq!(report.outcome, MoveOutcome::Unparsed);
        assert_eq!(report.lines[0], "Illegal chess move; must have from= and to= arguments!");

        let report = play(&mut referee, "z2", "e4");
        assert_eq!(report.result(), Some(MoveResult::BadLocation));
        assert!(report.lines[1].starts_with("  Examples"));
        assert_eq!(referee.ply(), 0);
    }

    #[test]
    fn test_rejection_messages() {
        let mut referee = Referee::default();

        let report = play(&mut referee, "e7", "e5");
        assert_eq!(report.result(), Some(MoveResult::NotYourPiece));
        assert_eq!(
            report.lines[0],
            "The pawn at e7 belongs to player #0 (Blue); it is currently player #1 (Yellow)'s turn."
        );

        let report = play(&mut referee, "e4", "e5");
        assert_eq!(report.lines[0], "There's no chess at e4");

        let report = play(&mut referee, "a1", "a2");
        assert_eq!(
            report.lines[0],
            "Cannot move to a2, since it is occupied by your own pawn"
        );

        let report = play(&mut referee, "e2", "e2");
        assert_eq!(report.result(), Some(MoveResult::ZeroDistance));
        assert_eq!(referee.current_mover(), Side::White);
    }

    #[test]
    fn test_en_passant_recency() {
        let mut referee = Referee::default();
        for (from, to) in [("e2", "e4"), ("a7", "a6"), ("e4", "e5"), ("d7", "d5")] {
            assert!(play(&mut referee, from, to).is_applied());
        }
        let mut stale = referee.clone();

        let report = play(&mut referee, "e5", "d6");
        assert_eq!(report.result(), Some(MoveResult::CaptureEnPassant));
        assert!(referee.board().piece_at(pos("d5")).is_none());

        // 中间隔了一步就失效
        assert!(play(&mut stale, "h2", "h3").is_applied());
        assert!(play(&mut stale, "h7", "h6").is_applied());
        let report = play(&mut stale, "e5", "d6");
        assert_eq!(report.result(), Some(MoveResult::EnPassantStale));
    }

    #[test]
    fn test_independent_referees_agree() {
        let moves = [("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4")];
        let mut local = Referee::default();
        let mut remote = Referee::default();
        for (from, to) in moves {
            play(&mut local, from, to);
            play(&mut remote, from, to);
        }
        assert_eq!(local.board().dump(), remote.board().dump());
        assert_eq!(local.current_mover(), remote.current_mover());
        assert_eq!(local.ply(), 5);
    }

    #[test]
    fn test_free_placement_wins() {
        let mut referee = Referee::default();
        let report = referee.free_place(pos("d1"), pos("e8"), None);

        let MoveOutcome::Applied(summary) = report.outcome else {
            panic!("free placement should apply");
        };
        assert!(summary.teleport);
        assert!(summary.won);
        assert_eq!(summary.result, MoveResult::CaptureNormal);
        assert!(referee.has_won());
        assert_eq!(
            report.lines.last().unwrap(),
            "Player #1 (Yellow) has won the match!"
        );
        // 获胜后不换手，之后的命令被忽略
        assert_eq!(referee.current_mover(), Side::White);
        assert_eq!(play(&mut referee, "e7", "e5").outcome, MoveOutcome::Ignored);
    }

    #[test]
    fn test_teleport_command() {
        let mut referee = Referee::default();
        let report = referee.submit_move(&MoveCommand::new("a2", "a6").teleport());
        assert_eq!(report.result(), Some(MoveResult::MoveNormal));
        assert_eq!(referee.current_mover(), Side::Black);
        assert_eq!(referee.last_moved(Side::White), referee.board().piece_at(pos("a6")).map(|(id, _)| id));

        let report = referee.submit_move(&MoveCommand::new("a8", "a7").teleport());
        assert_eq!(report.result(), Some(MoveResult::DestinationBlocked));
    }

    #[test]
    fn test_reset() {
        let mut referee = Referee::default();
        play(&mut referee, "e2", "e4");
        referee.reset();
        assert_eq!(referee.board().dump(), Board::initial().dump());
        assert_eq!(referee.current_mover(), Side::White);
        assert_eq!(referee.ply(), 0);
        assert_eq!(referee.last_moved(Side::White), None);
    }

    #[test]
    fn test_preview_matches_submit() {
        let mut referee = Referee::default();
        let preview = referee.preview_move(pos("g1"), pos("f3"), None);
        let report = play(&mut referee, "g1", "f3");
        assert_eq!(report.result(), Some(preview));

        assert_eq!(
            referee.preview_free_placement(pos("e7"), pos("e2")),
            MoveResult::CaptureNormal
        );
    }
}
