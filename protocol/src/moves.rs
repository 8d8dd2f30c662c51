//! 走法验证和执行
//!
//! 验证是纯函数：[`MoveRules::plan`] 只读棋盘，返回 [`MovePlan`] 或非法结果；
//! 执行由 [`MoveRules::apply`] 按计划修改棋盘。界面预览与正式走子共用同一套验证。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::piece::{Piece, PieceId, PieceType, Position, Side};

/// 走子结果（合法结果与错误分类共用一个枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveResult {
    // === 合法 ===
    /// 普通移动
    MoveNormal,
    /// 兵走两格
    MovePawn2Square,
    /// 兵升变
    MovePromotion,
    /// 短易位
    CastleKingside,
    /// 长易位
    CastleQueenside,
    /// 普通吃子
    CaptureNormal,
    /// 吃过路兵
    CaptureEnPassant,

    // === 非法 ===
    /// 坐标越界
    BadLocation,
    /// 起点没有棋子
    NoPiece,
    /// 不是自己的棋子
    NotYourPiece,
    /// 棋子不能这样走
    WrongMoveShape,
    /// 起点终点相同
    ZeroDistance,
    /// 兵前方有棋子
    PawnBlocked,
    /// 终点是自己的棋子
    DestinationBlocked,
    /// 路径被挡
    PathBlocked,
    /// 走后被将军（未实现将军检测，保留）
    EndsInCheck,
    /// 两王相邻
    KingTogether,
    /// 兵到底线未选择升变
    NoPromotion,
    /// 吃过路兵必须紧跟对方兵走两格
    EnPassantStale,
    /// 易位：王已移动过
    CastleKingHasMoved,
    /// 易位：车已移动过
    CastleRookHasMoved,
    /// 易位：王车之间有棋子
    CastlePathBlocked,
    /// 易位：经过被攻击的格子（未实现，保留）
    CastleThroughCheck,
    /// 易位：正被将军（未实现，保留）
    CastleOutOfCheck,
}

impl MoveResult {
    /// 是否为合法走法
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            MoveResult::MoveNormal
                | MoveResult::MovePawn2Square
                | MoveResult::MovePromotion
                | MoveResult::CastleKingside
                | MoveResult::CastleQueenside
                | MoveResult::CaptureNormal
                | MoveResult::CaptureEnPassant
        )
    }

    /// 给玩家看的说明
    pub fn message(&self) -> &'static str {
        match self {
            MoveResult::MoveNormal => "Valid move",
            MoveResult::MovePawn2Square => "Valid move, resulting in pawn moving 2 squares",
            MoveResult::MovePromotion => "Valid move, resulting in pawn promotion",
            MoveResult::CastleKingside => "Valid move, castling kingside",
            MoveResult::CastleQueenside => "Valid move, castling queenside",
            MoveResult::CaptureNormal => "Valid move, capturing enemy piece",
            MoveResult::CaptureEnPassant => "Valid move, capturing enemy pawn en passant",
            MoveResult::BadLocation => "Invalid move; invalid board location given",
            MoveResult::NoPiece => "Invalid move; no piece at location given",
            MoveResult::NotYourPiece => "Invalid move; can't move opponent's piece",
            MoveResult::WrongMoveShape => "Invalid move; this piece can't go this shape",
            MoveResult::ZeroDistance => "Invalid move; didn't go anywhere",
            MoveResult::PawnBlocked => {
                "Invalid move; can't move pawn forward when there is a piece in front of it"
            }
            MoveResult::DestinationBlocked => "Invalid move; destination is blocked by your piece",
            MoveResult::PathBlocked => "Invalid move; path is blocked by your piece",
            MoveResult::EndsInCheck => "Invalid move; can't leave yourself in check",
            MoveResult::KingTogether => "Invalid move; can't move 1 king next to another king",
            MoveResult::NoPromotion => {
                "Invalid move; must promote this pawn to queen/bishop/knight/rook"
            }
            MoveResult::EnPassantStale => {
                "Invalid move; en passant must immediately follow a pawn double-move"
            }
            MoveResult::CastleKingHasMoved => "Invalid castle; king has moved previously",
            MoveResult::CastleRookHasMoved => "Invalid castle; that rook has moved previously",
            MoveResult::CastlePathBlocked => "Invalid castle; pieces in-between king and rook",
            MoveResult::CastleThroughCheck => "Invalid castle; king can't move through check",
            MoveResult::CastleOutOfCheck => "Invalid castle; king can't castle out of check",
        }
    }
}

impl std::fmt::Display for MoveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// 验证通过的走法计划，交给 [`MoveRules::apply`] 执行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub piece: PieceId,
    pub side: Side,
    pub from: Position,
    pub to: Position,
    pub result: MoveResult,
    /// 被吃棋子所在格（吃过路兵时不是终点）
    pub capture: Option<Position>,
    /// 易位时车的句柄和目标格
    pub castle_rook: Option<(PieceId, Position)>,
    /// 升变目标
    pub promotion: Option<PieceType>,
}

impl MovePlan {
    fn new(piece: PieceId, side: Side, from: Position, to: Position, result: MoveResult) -> Self {
        Self {
            piece,
            side,
            from,
            to,
            result,
            capture: None,
            castle_rook: None,
            promotion: None,
        }
    }

    fn capturing(mut self, square: Position) -> Self {
        self.capture = Some(square);
        self
    }
}

/// 执行走法后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMove {
    pub plan: MovePlan,
    /// 被吃掉的棋子
    pub captured: Option<Piece>,
}

/// 验证时需要的对局上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveContext {
    /// 当前走子方
    pub mover: Side,
    /// 对方最近一次移动的棋子（判断吃过路兵的时效）
    pub opponent_last_moved: Option<PieceId>,
}

/// 走法规则
pub struct MoveRules;

impl MoveRules {
    /// 公共前置检查：距离、起点棋子、归属、终点
    pub fn check_preconditions(
        board: &Board,
        mover: Side,
        from: Position,
        to: Position,
    ) -> Result<(PieceId, Piece), MoveResult> {
        if !from.is_valid() || !to.is_valid() {
            return Err(MoveResult::BadLocation);
        }
        if from == to {
            return Err(MoveResult::ZeroDistance);
        }
        let (id, piece) = board.piece_at(from).ok_or(MoveResult::NoPiece)?;
        if piece.side != mover {
            return Err(MoveResult::NotYourPiece);
        }
        if let Some((_, target)) = board.piece_at(to) {
            if target.side == mover {
                return Err(MoveResult::DestinationBlocked);
            }
        }
        Ok((id, *piece))
    }

    /// 验证走法，只返回结果
    pub fn validate(
        board: &Board,
        ctx: MoveContext,
        from: Position,
        to: Position,
        promotion: Option<PieceType>,
    ) -> MoveResult {
        match Self::plan(board, ctx, from, to, promotion) {
            Ok(plan) => plan.result,
            Err(result) => result,
        }
    }

    /// 验证走法并生成执行计划（不修改棋盘）
    pub fn plan(
        board: &Board,
        ctx: MoveContext,
        from: Position,
        to: Position,
        promotion: Option<PieceType>,
    ) -> Result<MovePlan, MoveResult> {
        let (id, piece) = Self::check_preconditions(board, ctx.mover, from, to)?;

        match piece.piece_type {
            PieceType::Pawn => Self::plan_pawn(board, ctx, id, &piece, to, promotion),
            PieceType::Knight => Self::plan_knight(board, id, &piece, to),
            PieceType::Bishop => Self::plan_bishop(board, id, &piece, to),
            PieceType::Rook => Self::plan_rook(board, id, &piece, to),
            PieceType::Queen => Self::plan_queen(board, id, &piece, to),
            PieceType::King => Self::plan_king(board, id, &piece, to),
        }
    }

    /// 按计划执行走法
    pub fn apply(board: &mut Board, plan: MovePlan) -> AppliedMove {
        let captured = plan.capture.and_then(|square| board.capture(square));

        board.relocate(plan.piece, plan.to);
        if let Some(piece) = board.get_mut(plan.piece) {
            piece.has_moved = true;
            piece.has_just_moved_two_squares = plan.result == MoveResult::MovePawn2Square;
            if let Some(new_type) = plan.promotion {
                piece.piece_type = new_type;
            }
        }

        if let Some((rook, rook_to)) = plan.castle_rook {
            board.relocate(rook, rook_to);
            if let Some(rook) = board.get_mut(rook) {
                rook.has_moved = true;
            }
        }

        AppliedMove { plan, captured }
    }

    /// 自由摆放的检查：只要求终点不是己方棋子
    pub fn test_free_placement(
        board: &Board,
        mover: Side,
        from: Position,
        to: Position,
    ) -> Result<(PieceId, MoveResult), MoveResult> {
        let (id, _) = Self::check_preconditions(board, mover, from, to)?;
        let result = if board.is_occupied(to) {
            MoveResult::CaptureNormal
        } else {
            MoveResult::MoveNormal
        };
        Ok((id, result))
    }

    /// 自由摆放：吃掉终点棋子、移动，兵给出合法选择时升变
    pub fn apply_free_placement(
        board: &mut Board,
        id: PieceId,
        to: Position,
        promotion: Option<PieceType>,
    ) -> Option<Piece> {
        let captured = board.capture(to);
        board.relocate(id, to);
        if let Some(piece) = board.get_mut(id) {
            piece.has_moved = true;
            piece.has_just_moved_two_squares = false;
            if let Some(new_type) = promotion.filter(|t| t.is_promotion_target()) {
                if piece.piece_type == PieceType::Pawn {
                    piece.piece_type = new_type;
                }
            }
        }
        captured
    }

    /// 到达底线的兵必须给出合法升变
    fn with_promotion(
        mut plan: MovePlan,
        piece: &Piece,
        promotion: Option<PieceType>,
    ) -> Result<MovePlan, MoveResult> {
        if plan.to.y != piece.side.promotion_rank() {
            return Ok(plan);
        }
        match promotion.filter(|t| t.is_promotion_target()) {
            Some(new_type) => {
                plan.result = MoveResult::MovePromotion;
                plan.promotion = Some(new_type);
                Ok(plan)
            }
            None => Err(MoveResult::NoPromotion),
        }
    }

    /// 非吃子即普通移动
    fn simple(board: &Board, id: PieceId, piece: &Piece, to: Position) -> MovePlan {
        let from = piece.position;
        if board.is_occupied(to) {
            MovePlan::new(id, piece.side, from, to, MoveResult::CaptureNormal).capturing(to)
        } else {
            MovePlan::new(id, piece.side, from, to, MoveResult::MoveNormal)
        }
    }

    /// 兵
    fn plan_pawn(
        board: &Board,
        ctx: MoveContext,
        id: PieceId,
        piece: &Piece,
        to: Position,
        promotion: Option<PieceType>,
    ) -> Result<MovePlan, MoveResult> {
        let from = piece.position;
        let (dx, dy) = from.delta(to);
        let forward = piece.side.forward();

        // 沿本列前进
        if dx == 0 {
            if dy != forward && dy != 2 * forward {
                return Err(MoveResult::WrongMoveShape);
            }
            if board.path_blocked_axial(from, to) {
                return Err(MoveResult::PathBlocked);
            }
            if board.is_occupied(to) {
                return Err(MoveResult::PawnBlocked);
            }
            if dy == 2 * forward {
                if piece.has_moved {
                    return Err(MoveResult::WrongMoveShape);
                }
                return Ok(MovePlan::new(id, piece.side, from, to, MoveResult::MovePawn2Square));
            }
            let plan = MovePlan::new(id, piece.side, from, to, MoveResult::MoveNormal);
            return Self::with_promotion(plan, piece, promotion);
        }

        // 斜进一格
        if dx.abs() != 1 || dy != forward {
            return Err(MoveResult::WrongMoveShape);
        }

        if board.is_occupied(to) {
            let plan = MovePlan::new(id, piece.side, from, to, MoveResult::CaptureNormal).capturing(to);
            return Self::with_promotion(plan, piece, promotion);
        }

        // 斜进到空格只能是吃过路兵
        let passed = Position::new_unchecked(to.x, from.y);
        let (passed_id, passed_piece) = board.piece_at(passed).ok_or(MoveResult::WrongMoveShape)?;
        if passed_piece.side == piece.side || passed_piece.piece_type != PieceType::Pawn {
            return Err(MoveResult::WrongMoveShape);
        }
        if !passed_piece.has_just_moved_two_squares {
            return Err(MoveResult::WrongMoveShape);
        }
        if ctx.opponent_last_moved != Some(passed_id) {
            return Err(MoveResult::EnPassantStale);
        }

        Ok(MovePlan::new(id, piece.side, from, to, MoveResult::CaptureEnPassant).capturing(passed))
    }

    /// 马：只看形状，不检查阻挡
    fn plan_knight(board: &Board, id: PieceId, piece: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        if !Board::is_knight_shape(piece.position, to) {
            return Err(MoveResult::WrongMoveShape);
        }
        Ok(Self::simple(board, id, piece, to))
    }

    /// 象
    fn plan_bishop(board: &Board, id: PieceId, piece: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        if !Board::is_diagonal(piece.position, to) {
            return Err(MoveResult::WrongMoveShape);
        }
        if board.path_blocked_diagonal(piece.position, to) {
            return Err(MoveResult::PathBlocked);
        }
        Ok(Self::simple(board, id, piece, to))
    }

    /// 车
    fn plan_rook(board: &Board, id: PieceId, piece: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        if !Board::is_axial(piece.position, to) {
            return Err(MoveResult::WrongMoveShape);
        }
        if board.path_blocked_axial(piece.position, to) {
            return Err(MoveResult::PathBlocked);
        }
        Ok(Self::simple(board, id, piece, to))
    }

    /// 后
    fn plan_queen(board: &Board, id: PieceId, piece: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        let from = piece.position;
        let blocked = if Board::is_diagonal(from, to) {
            board.path_blocked_diagonal(from, to)
        } else if Board::is_axial(from, to) {
            board.path_blocked_axial(from, to)
        } else {
            return Err(MoveResult::WrongMoveShape);
        };
        if blocked {
            return Err(MoveResult::PathBlocked);
        }
        Ok(Self::simple(board, id, piece, to))
    }

    /// 王：一步或易位
    fn plan_king(board: &Board, id: PieceId, piece: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        let from = piece.position;
        let (dx, dy) = from.delta(to);
        let enemy = piece.side.opponent();

        if dx.abs() <= 1 && dy.abs() <= 1 {
            if board.king_adjacent_axially(to, enemy) {
                return Err(MoveResult::KingTogether);
            }
            return Ok(Self::simple(board, id, piece, to));
        }

        if dy == 0 && dx.abs() == 2 {
            return Self::plan_castle(board, id, piece, to);
        }

        Err(MoveResult::WrongMoveShape)
    }

    /// 王车易位
    fn plan_castle(board: &Board, id: PieceId, king: &Piece, to: Position) -> Result<MovePlan, MoveResult> {
        let from = king.position;
        let direction = (to.x as i8 - from.x as i8).signum();

        // 同一行、同方向、距离超过 2 的己方车中最近的一个
        let (rook_id, rook) = board
            .pieces(king.side)
            .filter(|(_, p)| p.piece_type == PieceType::Rook && p.position.y == from.y)
            .filter(|(_, p)| {
                let offset = p.position.x as i8 - from.x as i8;
                offset.signum() == direction && offset.abs() > 2
            })
            .min_by_key(|(_, p)| (p.position.x as i8 - from.x as i8).abs())
            .ok_or(MoveResult::WrongMoveShape)?;

        if king.has_moved {
            return Err(MoveResult::CastleKingHasMoved);
        }
        if rook.has_moved {
            return Err(MoveResult::CastleRookHasMoved);
        }
        if board.path_blocked_axial(from, rook.position) {
            return Err(MoveResult::CastlePathBlocked);
        }
        // 经过的格与终点都不能挨着对方王
        let passed = Position::new_unchecked((from.x as i8 + direction) as u8, from.y);
        let enemy = king.side.opponent();
        if board.king_adjacent_axially(passed, enemy) || board.king_adjacent_axially(to, enemy) {
            return Err(MoveResult::KingTogether);
        }

        let result = if direction > 0 {
            MoveResult::CastleKingside
        } else {
            MoveResult::CastleQueenside
        };
        let rook_to = Position::new_unchecked((to.x as i8 - direction) as u8, to.y);

        let mut plan = MovePlan::new(id, king.side, from, to, result);
        plan.castle_rook = Some((rook_id, rook_to));
        Ok(plan)
    }
}
