//! 对局记录存储
//!
//! 对局结束时把 [`MatchRecord`] 写成 JSON 文件

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use protocol::MatchRecord;

/// 记录存储管理器
pub struct StorageManager {
    records_dir: PathBuf,
}

impl StorageManager {
    /// 使用默认数据目录
    pub fn new() -> Result<Self> {
        Self::with_dir(default_records_directory()?)
    }

    /// 使用指定目录（不存在时创建）
    pub fn with_dir(records_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&records_dir)
            .with_context(|| format!("无法创建记录目录: {:?}", records_dir))?;
        Ok(Self { records_dir })
    }

    /// 保存对局记录，返回记录 ID（文件名）
    pub fn save_record(&self, record: &MatchRecord) -> Result<String> {
        let filename = generate_filename(
            &record.metadata.started_at,
            &record.metadata.white_player,
            &record.metadata.black_player,
        );
        let filepath = self.records_dir.join(&filename);

        let json = record.to_json().context("序列化对局记录失败")?;
        fs::write(&filepath, json).with_context(|| format!("写入文件失败: {:?}", filepath))?;

        tracing::info!("对局记录已保存: {:?}", filepath);
        Ok(filename)
    }

    /// 读取对局记录
    pub fn load_record(&self, record_id: &str) -> Result<MatchRecord> {
        let filepath = self.records_dir.join(record_id);
        if !filepath.exists() {
            anyhow::bail!("记录文件不存在: {}", record_id);
        }

        let json = fs::read_to_string(&filepath)
            .with_context(|| format!("读取文件失败: {:?}", filepath))?;
        MatchRecord::from_json(&json).context("解析记录文件失败")
    }
}

fn default_records_directory() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
    Ok(data_dir.join("chess-peer").join("records"))
}

/// 文件名：时间戳_白方vs黑方.json
fn generate_filename(timestamp: &DateTime<Utc>, white_player: &str, black_player: &str) -> String {
    format!(
        "{}_{}vs{}.json",
        timestamp.format("%Y%m%d_%H%M%S"),
        sanitize_filename(white_player),
        sanitize_filename(black_player)
    )
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{MatchOutcome, MoveRecord, MoveResult, Side};
    use tempfile::TempDir;

    fn create_test_storage() -> (StorageManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::with_dir(temp_dir.path().join("records")).unwrap();
        (storage, temp_dir)
    }

    fn sample_record(white: &str) -> MatchRecord {
        let mut record = MatchRecord::new("blue".to_string(), white.to_string());
        record.add_move(MoveRecord {
            side: Side::White,
            from: "e2".to_string(),
            to: "e4".to_string(),
            result: MoveResult::MovePawn2Square,
            captured: None,
            teleport: false,
            remote: false,
            timestamp: Utc::now(),
        });
        record.finish(MatchOutcome::Abandoned, "x".repeat(64));
        record
    }

    #[test]
    fn test_save_and_load_record() {
        let (storage, _temp_dir) = create_test_storage();

        let record_id = storage.save_record(&sample_record("yellow")).unwrap();
        assert!(record_id.ends_with("_yellowvsblue.json"));

        let loaded = storage.load_record(&record_id).unwrap();
        assert_eq!(loaded.metadata.white_player, "yellow");
        assert_eq!(loaded.moves.len(), 1);
        assert_eq!(loaded.metadata.outcome, Some(MatchOutcome::Abandoned));
    }

    #[test]
    fn test_missing_record() {
        let (storage, _temp_dir) = create_test_storage();
        assert!(storage.load_record("nope.json").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("alice"), "alice");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("who?"), "who");
    }
}
