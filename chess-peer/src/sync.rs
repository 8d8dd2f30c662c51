//! 对端状态校验
//!
//! 两端各自模拟同一局棋，定期交换棋盘状态串与当前走子方。
//! 不一致即视为不可恢复，由会话强制断开。

use protocol::ValidationEnvelope;

use crate::referee::Referee;

/// 校验结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncVerdict {
    /// 一致
    InSync,
    /// 对端信封落后于本地（走子与校验交错），忽略
    Stale { remote_ply: u32, local_ply: u32 },
    /// 不一致
    Desync { reason: String },
}

/// 生成本地状态的校验信封
pub fn validation_envelope(referee: &Referee) -> ValidationEnvelope {
    ValidationEnvelope {
        state: referee.board().state_string(),
        current_moving_player: referee.current_mover().index(),
        ply: Some(referee.ply()),
    }
}

/// 用本地状态比较对端信封
pub fn compare(referee: &Referee, remote: &ValidationEnvelope) -> SyncVerdict {
    let local_ply = referee.ply();
    if let Some(remote_ply) = remote.ply {
        if remote_ply < local_ply {
            return SyncVerdict::Stale {
                remote_ply,
                local_ply,
            };
        }
        if remote_ply > local_ply {
            return SyncVerdict::Desync {
                reason: format!("Move count mismatch (local {local_ply}, remote {remote_ply})"),
            };
        }
    }

    let local_mover = referee.current_mover().index();
    if remote.current_moving_player != local_mover {
        return SyncVerdict::Desync {
            reason: format!(
                "Current moving player mismatch (local {}, remote {})",
                local_mover, remote.current_moving_player
            ),
        };
    }

    let local_state = referee.board().state_string();
    if remote.state != local_state {
        let square = local_state
            .chars()
            .zip(remote.state.chars())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| local_state.len().min(remote.state.len()));
        return SyncVerdict::Desync {
            reason: format!("Board state mismatch at index {square}"),
        };
    }

    SyncVerdict::InSync
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MoveCommand;

    #[test]
    fn test_in_sync() {
        let mut local = Referee::default();
        let mut remote = Referee::default();
        for referee in [&mut local, &mut remote] {
            referee.submit_move(&MoveCommand::new("e2", "e4"));
        }
        assert_eq!(compare(&local, &validation_envelope(&remote)), SyncVerdict::InSync);
    }

    #[test]
    fn test_stale_envelope_ignored() {
        let mut local = Referee::default();
        let remote = Referee::default();
        let envelope = validation_envelope(&remote);

        local.submit_move(&MoveCommand::new("e2", "e4"));
        assert_eq!(
            compare(&local, &envelope),
            SyncVerdict::Stale {
                remote_ply: 0,
                local_ply: 1
            }
        );
    }

    #[test]
    fn test_desync_detected() {
        let mut local = Referee::default();
        let mut remote = Referee::default();
        local.submit_move(&MoveCommand::new("e2", "e4"));
        remote.submit_move(&MoveCommand::new("d2", "d4"));

        let verdict = compare(&local, &validation_envelope(&remote));
        assert!(matches!(verdict, SyncVerdict::Desync { ref reason } if reason.starts_with("Board state mismatch")));

        // 不带步数的信封总是比较
        let mut envelope = validation_envelope(&remote);
        envelope.ply = None;
        envelope.current_moving_player = 1;
        assert!(matches!(compare(&local, &envelope), SyncVerdict::Desync { .. }));
    }

    #[test]
    fn test_remote_ahead_is_desync() {
        let local = Referee::default();
        let mut remote = Referee::default();
        remote.submit_move(&MoveCommand::new("e2", "e4"));
        assert!(matches!(
            compare(&local, &validation_envelope(&remote)),
            SyncVerdict::Desync { .. }
        ));
    }
}
