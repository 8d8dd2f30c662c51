//! 交互式预览
//!
//! 抓起棋子后，每次悬停都重新验证目标格，驱动合法/非法指示。
//! 确认时交出一条 [`MoveCommand`]，由会话走与键入命令相同的路径。

use protocol::{MoveCommand, MoveResult, PieceType, Position};

use crate::referee::Referee;

/// 预览状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Grabbed {
        from: Position,
        target: Option<Position>,
        /// 按住修饰键：自由摆放
        free_placement: bool,
        verdict: Option<MoveResult>,
    },
}

/// 预览控制器
#[derive(Debug, Clone, Default)]
pub struct Preview {
    state: PreviewState,
    /// 界面上选好的升变类型
    promotion: Option<PieceType>,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn is_grabbed(&self) -> bool {
        matches!(self.state, PreviewState::Grabbed { .. })
    }

    pub fn set_promotion(&mut self, promotion: Option<PieceType>) {
        self.promotion = promotion;
    }

    /// 抓起棋子，空格或对局已结束时不抓
    pub fn grab(&mut self, referee: &Referee, from: Position) -> bool {
        if referee.has_won() || !referee.board().is_occupied(from) {
            return false;
        }
        self.state = PreviewState::Grabbed {
            from,
            target: None,
            free_placement: false,
            verdict: None,
        };
        true
    }

    /// 悬停到目标格，返回是否合法
    pub fn hover(&mut self, referee: &Referee, to: Option<Position>, modifier_held: bool) -> bool {
        let PreviewState::Grabbed { from, .. } = self.state else {
            return false;
        };

        let verdict = to.map(|to| self.evaluate(referee, from, to, modifier_held));
        self.state = PreviewState::Grabbed {
            from,
            target: to,
            free_placement: modifier_held,
            verdict,
        };
        verdict.is_some_and(|v| v.is_valid())
    }

    /// 确认预览，合法时返回要提交的命令；无论结果如何都放下棋子
    pub fn commit(&mut self, referee: &Referee) -> Result<MoveCommand, MoveResult> {
        let state = std::mem::take(&mut self.state);
        let PreviewState::Grabbed {
            from,
            target,
            free_placement,
            ..
        } = state
        else {
            return Err(MoveResult::NoPiece);
        };
        let to = target.ok_or(MoveResult::BadLocation)?;

        // 悬停之后棋盘可能已被对端改变
        let verdict = self.evaluate(referee, from, to, free_placement);
        if !verdict.is_valid() {
            return Err(verdict);
        }

        let mut cmd = MoveCommand::new(from.to_string(), to.to_string());
        cmd.promotion = self.promotion;
        if free_placement {
            cmd = cmd.teleport();
        }
        Ok(cmd)
    }

    /// 放下棋子，不改变任何状态
    pub fn cancel(&mut self) {
        self.state = PreviewState::Idle;
    }

    fn evaluate(&self, referee: &Referee, from: Position, to: Position, free_placement: bool) -> MoveResult {
        if referee.has_won() {
            return MoveResult::NoPiece;
        }
        if free_placement {
            referee.preview_free_placement(from, to)
        } else {
            referee.preview_move(from, to, self.promotion)
        }
    }
}
