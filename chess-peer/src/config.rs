//! 节点配置
//!
//! JSON 持久化，默认位于 `<config_dir>/chess-peer/config.json`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use protocol::{DEFAULT_COLOR_NAMES, DEFAULT_PORT, MAX_NAME_LEN, NUM_PLAYERS, VALIDATE_INTERVAL_SECS};

/// 节点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// 本地玩家名
    pub player_name: String,
    /// `ChessListen` 未给端口时使用
    pub listen_port: u16,
    /// `ChessConnect` 未给地址时使用
    pub peer_address: String,
    /// 0 号、1 号玩家的颜色名
    pub color_names: [String; NUM_PLAYERS],
    /// 状态校验间隔（秒），0 表示只在命令触发时校验
    pub validate_interval_secs: u64,
    /// 对局结束时保存记录
    pub save_records: bool,
    /// 记录目录，缺省为数据目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_dir: Option<PathBuf>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            player_name: "Player".to_string(),
            listen_port: DEFAULT_PORT,
            peer_address: format!("127.0.0.1:{DEFAULT_PORT}"),
            color_names: DEFAULT_COLOR_NAMES.map(str::to_string),
            validate_interval_secs: VALIDATE_INTERVAL_SECS,
            save_records: true,
            records_dir: None,
        }
    }
}

impl PeerConfig {
    /// 默认配置文件路径
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("chess-peer");
            path.push("config.json");
            path
        })
    }

    /// 加载配置，文件缺失或无效时使用默认值
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            tracing::warn!("无法获取配置目录，使用默认配置");
            return Self::default();
        };

        if !path.exists() {
            tracing::info!("配置文件不存在，使用默认配置");
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!("已加载配置: {:?}", path);
                    config.sanitized()
                }
                Err(e) => {
                    tracing::warn!("配置文件格式无效: {}，使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取配置文件: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 保存配置
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::config_path)
            .context("无法获取配置目录")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        std::fs::write(&path, content)
            .with_context(|| format!("写入配置文件失败: {:?}", path))?;

        tracing::info!("配置已保存: {:?}", path);
        Ok(path)
    }

    /// 设置玩家名（截断过长的名字）
    pub fn set_player_name(&mut self, name: &str) {
        self.player_name = truncate_name(name);
    }

    /// 校验间隔，0 时返回 `None`
    pub fn validate_interval(&self) -> Option<Duration> {
        (self.validate_interval_secs > 0).then(|| Duration::from_secs(self.validate_interval_secs))
    }

    fn sanitized(mut self) -> Self {
        self.player_name = truncate_name(&self.player_name);
        if self.player_name.is_empty() {
            self.player_name = Self::default().player_name;
        }
        self
    }
}

/// 按字符截断到 [`MAX_NAME_LEN`]
pub fn truncate_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PeerConfig::default();
        assert_eq!(config.listen_port, DEFAULT_PORT);
        assert_eq!(config.color_names, ["Blue".to_string(), "Yellow".to_string()]);
        assert_eq!(config.validate_interval(), Some(Duration::from_secs(VALIDATE_INTERVAL_SECS)));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = PeerConfig::default();
        config.set_player_name("alice");
        config.color_names = ["Red".to_string(), "Green".to_string()];
        config.validate_interval_secs = 0;
        config.save(Some(&path)).unwrap();

        let loaded = PeerConfig::load(Some(&path));
        assert_eq!(loaded, config);
        assert_eq!(loaded.validate_interval(), None);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(PeerConfig::load(Some(&path)), PeerConfig::default());

        // 缺少的字段取默认值
        std::fs::write(&path, r#"{ "player_name": "bob" }"#).unwrap();
        let loaded = PeerConfig::load(Some(&path));
        assert_eq!(loaded.player_name, "bob");
        assert_eq!(loaded.listen_port, DEFAULT_PORT);
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("  carol  "), "carol");
        assert_eq!(truncate_name(&"x".repeat(50)).len(), MAX_NAME_LEN);
    }
}
