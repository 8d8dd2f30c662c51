//! 棋子定义

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::CoordinateError;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    /// 兵
    Pawn,
    /// 马
    Knight,
    /// 象
    Bishop,
    /// 车
    Rook,
    /// 后
    Queen,
    /// 王
    King,
}

impl PieceType {
    /// 棋子名称（用于提示信息）
    pub fn name(&self) -> &'static str {
        match self {
            PieceType::Pawn => "pawn",
            PieceType::Knight => "knight",
            PieceType::Bishop => "bishop",
            PieceType::Rook => "rook",
            PieceType::Queen => "queen",
            PieceType::King => "king",
        }
    }

    /// 获取棋盘字符（0 号玩家小写，1 号玩家大写）
    pub fn glyph(&self, side: Side) -> char {
        let c = match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        };
        match side {
            Side::Black => c,
            Side::White => c.to_ascii_uppercase(),
        }
    }

    /// 从棋盘字符解析
    pub fn from_glyph(c: char) -> Option<(PieceType, Side)> {
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        let piece_type = match c.to_ascii_lowercase() {
            'p' => PieceType::Pawn,
            'n' => PieceType::Knight,
            'b' => PieceType::Bishop,
            'r' => PieceType::Rook,
            'q' => PieceType::Queen,
            'k' => PieceType::King,
            _ => return None,
        };
        Some((piece_type, side))
    }

    /// 解析升变选择，只接受 queen/bishop/knight/rook
    pub fn from_promotion_name(name: &str) -> Option<PieceType> {
        match name {
            "queen" => Some(PieceType::Queen),
            "bishop" => Some(PieceType::Bishop),
            "knight" => Some(PieceType::Knight),
            "rook" => Some(PieceType::Rook),
            _ => None,
        }
    }

    /// 是否为合法的升变目标
    pub fn is_promotion_target(&self) -> bool {
        matches!(
            self,
            PieceType::Queen | PieceType::Bishop | PieceType::Knight | PieceType::Rook
        )
    }
}

/// 阵营（按玩家序号区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 0 号玩家（上方，向第 1 行推进）
    Black,
    /// 1 号玩家（下方，先手，向第 8 行推进）
    White,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// 玩家序号
    pub fn index(&self) -> usize {
        match self {
            Side::Black => 0,
            Side::White => 1,
        }
    }

    /// 从玩家序号转换
    pub fn from_index(index: usize) -> Option<Side> {
        match index {
            0 => Some(Side::Black),
            1 => Some(Side::White),
            _ => None,
        }
    }

    /// 兵前进方向（y 增量）
    pub fn forward(&self) -> i8 {
        match self {
            Side::Black => -1,
            Side::White => 1,
        }
    }

    /// 底线所在行
    pub fn home_rank(&self) -> u8 {
        match self {
            Side::Black => 7,
            Side::White => 0,
        }
    }

    /// 兵升变行
    pub fn promotion_rank(&self) -> u8 {
        self.opponent().home_rank()
    }
}

/// 棋子句柄（棋盘存储中的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PieceId(pub usize);

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub piece_type: PieceType,
    pub side: Side,
    pub position: Position,
    /// 是否移动过（王车易位、兵走两格）
    pub has_moved: bool,
    /// 上一步是否为兵走两格（吃过路兵）
    pub has_just_moved_two_squares: bool,
}

impl Piece {
    /// 创建未移动过的新棋子
    pub fn new(piece_type: PieceType, side: Side, position: Position) -> Self {
        Self {
            piece_type,
            side,
            position,
            has_moved: false,
            has_just_moved_two_squares: false,
        }
    }

    /// 获取棋盘字符
    pub fn glyph(&self) -> char {
        self.piece_type.glyph(self.side)
    }

    /// 棋子名称
    pub fn name(&self) -> &'static str {
        self.piece_type.name()
    }
}

/// 棋盘位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 列 (0-7, a-h)
    pub x: u8,
    /// 行 (0-7, 1-8)
    pub y: u8,
}

impl Position {
    /// 创建新位置
    pub fn new(x: u8, y: u8) -> Option<Self> {
        if (x as usize) < BOARD_SIZE && (y as usize) < BOARD_SIZE {
            Some(Self { x, y })
        } else {
            None
        }
    }

    /// 创建新位置（不检查边界，内部使用）
    pub const fn new_unchecked(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// 检查位置是否在棋盘内
    pub fn is_valid(&self) -> bool {
        (self.x as usize) < BOARD_SIZE && (self.y as usize) < BOARD_SIZE
    }

    /// 解析代数坐标（如 "e2"）
    ///
    /// 长度不为 2 返回 `Unparsed`，字母或数字越界返回 `OutOfRange`。
    pub fn parse_algebraic(text: &str) -> Result<Position, CoordinateError> {
        let bytes = text.as_bytes();
        if text.chars().count() != 2 || bytes.len() != 2 {
            return Err(CoordinateError::Unparsed);
        }

        let x = bytes[0] as i16 - b'a' as i16;
        let y = bytes[1] as i16 - b'1' as i16;
        if !(0..8).contains(&x) || !(0..8).contains(&y) {
            return Err(CoordinateError::OutOfRange);
        }

        Ok(Position::new_unchecked(x as u8, y as u8))
    }

    /// 获取偏移后的位置
    pub fn offset(&self, dx: i8, dy: i8) -> Option<Position> {
        let new_x = self.x as i8 + dx;
        let new_y = self.y as i8 + dy;
        if new_x >= 0 && (new_x as usize) < BOARD_SIZE && new_y >= 0 && (new_y as usize) < BOARD_SIZE {
            Some(Position {
                x: new_x as u8,
                y: new_y as u8,
            })
        } else {
            None
        }
    }

    /// 与另一位置的差值 (dx, dy)
    pub fn delta(&self, other: Position) -> (i8, i8) {
        (other.x as i8 - self.x as i8, other.y as i8 - self.y as i8)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'a' + self.x) as char, self.y + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph() {
        assert_eq!(PieceType::Pawn.glyph(Side::Black), 'p');
        assert_eq!(PieceType::Pawn.glyph(Side::White), 'P');
        assert_eq!(PieceType::Knight.glyph(Side::White), 'N');

        assert_eq!(PieceType::from_glyph('Q'), Some((PieceType::Queen, Side::White)));
        assert_eq!(PieceType::from_glyph('k'), Some((PieceType::King, Side::Black)));
        assert_eq!(PieceType::from_glyph('x'), None);
    }

    #[test]
    fn test_parse_wrong_length() {
        for text in ["", "e", "e22", "a10", "é2", "from"] {
            assert_eq!(Position::parse_algebraic(text), Err(CoordinateError::Unparsed), "{text}");
        }
    }

    #[test]
    fn test_parse_out_of_range() {
        for text in ["i1", "a9", "a0", "E2", "z8", "h-"] {
            assert_eq!(Position::parse_algebraic(text), Err(CoordinateError::OutOfRange), "{text}");
        }
    }

    #[test]
    fn test_parse_format_roundtrip() {
        for y in 0..8 {
            for x in 0..8 {
                let pos = Position::new_unchecked(x, y);
                assert_eq!(Position::parse_algebraic(&pos.to_string()), Ok(pos));
            }
        }
        assert_eq!(Position::parse_algebraic("a1"), Ok(Position::new_unchecked(0, 0)));
        assert_eq!(Position::parse_algebraic("h8"), Ok(Position::new_unchecked(7, 7)));
    }

    #[test]
    fn test_promotion_names() {
        assert_eq!(PieceType::from_promotion_name("queen"), Some(PieceType::Queen));
        assert_eq!(PieceType::from_promotion_name("knight"), Some(PieceType::Knight));
        assert_eq!(PieceType::from_promotion_name("king"), None);
        assert_eq!(PieceType::from_promotion_name("pawn"), None);
    }

    #[test]
    fn test_side() {
        assert_eq!(Side::White.opponent(), Side::Black);
        assert_eq!(Side::from_index(1), Some(Side::White));
        assert_eq!(Side::from_index(2), None);
        assert_eq!(Side::White.promotion_rank(), 7);
        assert_eq!(Side::Black.promotion_rank(), 0);
    }
}
