//! SDK 入口 (回放 + 骨骼追踪)
//!
//! 处理器通过 `Sdk` 打开录像并创建追踪引擎, 便于替换为原生实现或测试替身.

use std::path::Path;
use std::sync::Arc;

use crate::config::BenchConfig;
use crate::error::{PlaybackError, TrackerError};
use crate::playback::{Calibration, CaptureSource, RecordingProfile, SimulatedPlayback};
use crate::tracker::{SimulatedTracker, TrackerConfiguration, TrackerProfile, TrackingEngine};

pub trait Sdk {
    fn open_playback(&self, path: &Path) -> Result<Box<dyn CaptureSource>, PlaybackError>;

    fn create_tracker(
        &self,
        calibration: &Calibration,
        config: TrackerConfiguration,
    ) -> Result<Arc<dyn TrackingEngine>, TrackerError>;
}

/// 模拟 SDK: 录像内容与推理耗时由配置模拟
#[derive(Clone, Debug, Default)]
pub struct SimulatedSdk {
    pub recording: RecordingProfile,
    pub tracker: TrackerProfile,
}

impl SimulatedSdk {
    pub fn new(recording: RecordingProfile, tracker: TrackerProfile) -> Self {
        Self { recording, tracker }
    }
}

impl From<&BenchConfig> for SimulatedSdk {
    fn from(config: &BenchConfig) -> Self {
        Self::new(config.recording.clone(), config.tracker.clone())
    }
}

impl Sdk for SimulatedSdk {
    fn open_playback(&self, path: &Path) -> Result<Box<dyn CaptureSource>, PlaybackError> {
        Ok(Box::new(SimulatedPlayback::open(path, &self.recording)?))
    }

    fn create_tracker(
        &self,
        calibration: &Calibration,
        config: TrackerConfiguration,
    ) -> Result<Arc<dyn TrackingEngine>, TrackerError> {
        Ok(Arc::new(SimulatedTracker::create(
            calibration,
            config,
            &self.tracker,
        )?))
    }
}
