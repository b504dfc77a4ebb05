//! 测试配置 - 通过JSON文件调整模拟录像与模拟引擎参数

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::playback::RecordingProfile;
use crate::tracker::TrackerProfile;

/// 默认配置文件
pub const DEFAULT_CONFIG_PATH: &str = "bt_replay.json";

/// 吞吐测试配置
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    // === 模拟录像 ===
    #[serde(default)]
    pub recording: RecordingProfile,

    // === 模拟追踪引擎 ===
    #[serde(default)]
    pub tracker: TrackerProfile,
}

impl BenchConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::warn!("⚠️  默认配置写入失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件, 失败由调用方决定如何处理
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        let rec = &self.recording;
        let trk = &self.tracker;
        println!("\n🎛️  模拟配置:");
        println!(
            "  录像: {}帧 @ {}fps, 起始偏移 {}us, 读帧耗时 {}us",
            rec.frame_count,
            rec.fps.hz(),
            rec.start_offset_us,
            rec.read_delay_us
        );
        println!(
            "  引擎: 容量 {}, 推理耗时 {}us, 检测概率 {:.2}\n",
            trk.capacity, trk.latency_us, trk.body_probability
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");

        let config = BenchConfig::load(&path);
        assert_eq!(config, BenchConfig::default());
        assert!(path.exists());
        assert_eq!(BenchConfig::load(&path), config);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        let mut tracker = TrackerProfile::default();
        tracker.capacity = 7;
        let json = serde_json::json!({ "tracker": tracker });
        fs::write(&path, json.to_string()).unwrap();

        let config = BenchConfig::load(&path);
        assert_eq!(config.tracker.capacity, 7);
        assert_eq!(config.recording, RecordingProfile::default());
    }

    #[test]
    fn test_save_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("bench.json");
        assert!(BenchConfig::default().save(&path).is_err());

        // 写不进去时仍然返回默认配置
        assert_eq!(BenchConfig::load(&path), BenchConfig::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(BenchConfig::load(&path), BenchConfig::default());
    }
}
