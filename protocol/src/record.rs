//! 对局记录格式
//!
//! 以 JSON 保存对局双方与每一步已执行的走法

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::moves::MoveResult;
use crate::piece::{PieceType, Side};

/// 记录版本
pub const RECORD_VERSION: &str = "1.0";

/// 对局结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// 吃掉对方的王获胜
    KingCaptured { winner: Side },
    /// 中途断开（含状态不一致）
    Disconnected { reason: String },
    /// 重置放弃
    Abandoned,
}

/// 对局元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// 0 号玩家名
    pub black_player: String,
    /// 1 号玩家名
    pub white_player: String,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 结束时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// 结果
    pub outcome: Option<MatchOutcome>,
}

/// 走法记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 走子方
    pub side: Side,
    /// 起点（代数坐标）
    pub from: String,
    /// 终点
    pub to: String,
    /// 走子结果
    pub result: MoveResult,
    /// 被吃的棋子
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceType>,
    /// 自由摆放
    #[serde(default)]
    pub teleport: bool,
    /// 来自对端
    #[serde(default)]
    pub remote: bool,
    /// 走子时间
    pub timestamp: DateTime<Utc>,
}

/// 完整对局记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub version: String,
    pub metadata: MatchMetadata,
    pub moves: Vec<MoveRecord>,
    /// 结束时的棋盘
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_state: Option<String>,
}

impl MatchRecord {
    /// 创建新的对局记录
    pub fn new(black_player: String, white_player: String) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            metadata: MatchMetadata {
                black_player,
                white_player,
                started_at: Utc::now(),
                finished_at: None,
                outcome: None,
            },
            moves: Vec::new(),
            final_state: None,
        }
    }

    /// 添加走法
    pub fn add_move(&mut self, mv: MoveRecord) {
        self.moves.push(mv);
    }

    /// 结束对局
    pub fn finish(&mut self, outcome: MatchOutcome, final_state: String) {
        self.metadata.outcome = Some(outcome);
        self.metadata.finished_at = Some(Utc::now());
        self.final_state = Some(final_state);
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_record_json() {
        let mut record = MatchRecord::new("alice".to_string(), "bob".to_string());
        record.add_move(MoveRecord {
            side: Side::White,
            from: "e2".to_string(),
            to: "e4".to_string(),
            result: MoveResult::MovePawn2Square,
            captured: None,
            teleport: false,
            remote: true,
            timestamp: Utc::now(),
        });
        record.finish(MatchOutcome::KingCaptured { winner: Side::White }, "........".repeat(8));

        let json = record.to_json().unwrap();
        assert!(json.contains("MovePawn2Square"));
        assert!(!json.contains("captured"));

        let parsed = MatchRecord::from_json(&json).unwrap();
        assert_eq!(parsed.metadata.white_player, "bob");
        assert_eq!(parsed.moves, record.moves);
        assert_eq!(
            parsed.metadata.outcome,
            Some(MatchOutcome::KingCaptured { winner: Side::White })
        );
        assert!(parsed.metadata.finished_at.is_some());
    }
}
