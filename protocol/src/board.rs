//! 棋盘状态
//!
//! 棋盘以棋子存储（arena）为唯一数据源，棋子通过 [`PieceId`] 引用，
//! 格子占用情况通过扫描存储得出。

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Piece, PieceId, PieceType, Position, Side};

/// 底线棋子排列（a-h）
const BACK_RANK: [PieceType; BOARD_SIZE] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 棋子存储，被吃掉的棋子留下空槽，保证 PieceId 稳定
    pieces: Vec<Option<Piece>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self { pieces: Vec::new() }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for side in [Side::White, Side::Black] {
            let home = side.home_rank();
            let pawn_rank = (home as i8 + side.forward()) as u8;
            for (x, piece_type) in BACK_RANK.iter().enumerate() {
                let x = x as u8;
                board.place(Piece::new(*piece_type, side, Position::new_unchecked(x, home)));
                board.place(Piece::new(PieceType::Pawn, side, Position::new_unchecked(x, pawn_rank)));
            }
        }

        board
    }

    /// 放置棋子，返回其句柄
    ///
    /// 目标格已有棋子时不放置，返回 `None`。
    pub fn place(&mut self, piece: Piece) -> Option<PieceId> {
        if !piece.position.is_valid() || self.is_occupied(piece.position) {
            return None;
        }
        self.pieces.push(Some(piece));
        Some(PieceId(self.pieces.len() - 1))
    }

    /// 通过句柄获取棋子
    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id.0).and_then(|p| p.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.pieces.get_mut(id.0).and_then(|p| p.as_mut())
    }

    /// 获取指定位置的棋子
    pub fn piece_at(&self, pos: Position) -> Option<(PieceId, &Piece)> {
        self.pieces
            .iter()
            .enumerate()
            .find_map(|(i, slot)| match slot {
                Some(piece) if piece.position == pos => Some((PieceId(i), piece)),
                _ => None,
            })
    }

    /// 指定位置是否有棋子
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.piece_at(pos).is_some()
    }

    /// 吃掉指定位置的棋子，返回被吃掉的棋子
    ///
    /// 被吃的是王时，由调用方判定胜负。
    pub fn capture(&mut self, pos: Position) -> Option<Piece> {
        let (id, _) = self.piece_at(pos)?;
        self.pieces[id.0].take()
    }

    /// 移动棋子到目标格（不检查规则）
    pub(crate) fn relocate(&mut self, id: PieceId, to: Position) {
        if let Some(piece) = self.get_mut(id) {
            piece.position = to;
        }
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, side: Side) -> Option<(PieceId, Position)> {
        self.pieces(side)
            .find(|(_, piece)| piece.piece_type == PieceType::King)
            .map(|(id, piece)| (id, piece.position))
    }

    /// 获取指定阵营的所有棋子
    pub fn pieces(&self, side: Side) -> impl Iterator<Item = (PieceId, &Piece)> {
        self.all_pieces().filter(move |(_, piece)| piece.side == side)
    }

    /// 获取所有棋子
    pub fn all_pieces(&self) -> impl Iterator<Item = (PieceId, &Piece)> {
        self.pieces
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|piece| (PieceId(i), piece)))
    }

    /// 同列或同行
    pub fn is_axial(a: Position, b: Position) -> bool {
        a.x == b.x || a.y == b.y
    }

    /// 横纵距离相等
    pub fn is_diagonal(a: Position, b: Position) -> bool {
        let (dx, dy) = a.delta(b);
        dx.abs() == dy.abs()
    }

    /// 日字形 (2,1) 或 (1,2)
    pub fn is_knight_shape(a: Position, b: Position) -> bool {
        let (dx, dy) = a.delta(b);
        matches!((dx.abs(), dy.abs()), (1, 2) | (2, 1))
    }

    /// 直线路径上（不含两端）是否有棋子
    pub fn path_blocked_axial(&self, a: Position, b: Position) -> bool {
        Self::is_axial(a, b) && self.scan_blocked(a, b)
    }

    /// 斜线路径上（不含两端）是否有棋子
    pub fn path_blocked_diagonal(&self, a: Position, b: Position) -> bool {
        Self::is_diagonal(a, b) && self.scan_blocked(a, b)
    }

    /// 从 a 向 b 逐格扫描，遇到第一个被占用的中间格即返回 true
    fn scan_blocked(&self, a: Position, b: Position) -> bool {
        let (dx, dy) = a.delta(b);
        let step = (dx.signum(), dy.signum());
        let mut current = a;
        loop {
            current = match current.offset(step.0, step.1) {
                Some(next) => next,
                None => return false,
            };
            if current == b {
                return false;
            }
            if self.is_occupied(current) {
                return true;
            }
        }
    }

    /// 指定位置的上下左右是否有 `side` 方的王
    pub fn king_adjacent_axially(&self, pos: Position, side: Side) -> bool {
        [(0, 1), (0, -1), (1, 0), (-1, 0)].iter().any(|&(dx, dy)| {
            pos.offset(dx, dy)
                .and_then(|p| self.piece_at(p))
                .is_some_and(|(_, piece)| piece.piece_type == PieceType::King && piece.side == side)
        })
    }

    /// 按行输出棋盘字符，第 8 行在前，每行 a-h，空格为 '.'
    fn ranks(&self) -> impl Iterator<Item = String> + '_ {
        (0..BOARD_SIZE as u8).rev().map(move |y| {
            (0..BOARD_SIZE as u8)
                .map(|x| {
                    self.piece_at(Position::new_unchecked(x, y))
                        .map_or('.', |(_, piece)| piece.glyph())
                })
                .collect()
        })
    }

    /// 8 行 8 列的棋盘文本
    pub fn dump(&self) -> String {
        self.ranks().collect::<Vec<_>>().join("\n")
    }

    /// 64 字符的状态串（用于双端校验）
    pub fn state_string(&self) -> String {
        self.ranks().collect()
    }

    /// 带坐标边框的棋盘文本（用于控制台）
    pub fn framed_dump(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(BOARD_SIZE + 4);
        lines.push("  ABCDEFGH".to_string());
        lines.push(" +--------+".to_string());
        for (i, rank) in self.ranks().enumerate() {
            let number = BOARD_SIZE - i;
            lines.push(format!("{number}|{rank}|{number}"));
        }
        lines.push(" +--------+".to_string());
        lines.push("  ABCDEFGH".to_string());
        lines
    }

    /// 从状态串恢复棋盘（64 字符，可含换行）
    ///
    /// 不在初始位置的兵、王、车视为已移动过。
    pub fn from_state_string(text: &str) -> Result<Self, ChessError> {
        let glyphs: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if glyphs.len() != BOARD_SIZE * BOARD_SIZE {
            return Err(ChessError::InvalidState {
                reason: format!("expected 64 squares, got {}", glyphs.len()),
            });
        }

        let initial = Board::initial();
        let mut board = Board::empty();
        for (i, c) in glyphs.into_iter().enumerate() {
            if c == '.' {
                continue;
            }
            let (piece_type, side) = PieceType::from_glyph(c).ok_or_else(|| ChessError::InvalidState {
                reason: format!("unknown glyph '{c}'"),
            })?;
            let pos = Position::new_unchecked((i % BOARD_SIZE) as u8, (BOARD_SIZE - 1 - i / BOARD_SIZE) as u8);
            let mut piece = Piece::new(piece_type, side, pos);
            piece.has_moved = initial
                .piece_at(pos)
                .map_or(true, |(_, p)| p.piece_type != piece_type || p.side != side);
            board.place(piece);
        }
        Ok(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
