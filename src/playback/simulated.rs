/// 模拟录像回放
/// Simulated playback: fixed frame rate captures generated in memory
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    Calibration, Capture, CaptureSource, ColorResolution, DepthMode, FrameRate, Image,
    RecordConfig, SeekOrigin,
};
use crate::error::PlaybackError;

/// 模拟录像参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingProfile {
    pub fps: FrameRate,
    pub frame_count: u64,
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    pub start_offset_us: u64, // 第一帧设备时间戳 (微秒)
    pub read_delay_us: u64,   // 每帧模拟解码耗时 (微秒)
    /// 每隔 N 帧缺失一次深度图 (0 = 不缺失)
    pub missing_depth_every: u64,
}

impl Default for RecordingProfile {
    fn default() -> Self {
        Self {
            fps: FrameRate::Fps30,
            frame_count: 300,
            depth_mode: DepthMode::NfovUnbinned,
            color_resolution: ColorResolution::R720p,
            start_offset_us: 0,
            read_delay_us: 0,
            missing_depth_every: 0,
        }
    }
}

/// 模拟回放源
pub struct SimulatedPlayback {
    config: RecordConfig,
    /// 每帧相对录像开头的时间戳
    timeline: Vec<Duration>,
    length: Duration,
    read_delay: Duration,
    missing_depth_every: u64,
    position: usize,
}

impl SimulatedPlayback {
    /// 打开录像文件 (文件必须存在, 内容由 profile 模拟)
    pub fn open(path: &Path, profile: &RecordingProfile) -> Result<Self, PlaybackError> {
        if !path.is_file() {
            return Err(PlaybackError::Open {
                path: path.to_path_buf(),
                reason: "文件不存在".to_string(),
            });
        }
        Ok(Self::from_profile(profile))
    }

    /// 按固定帧率生成时间轴
    pub fn from_profile(profile: &RecordingProfile) -> Self {
        let hz = profile.fps.hz() as u64;
        let timeline = (0..profile.frame_count)
            .map(|i| Duration::from_micros(i * 1_000_000 / hz))
            .collect();
        let length = Duration::from_micros(profile.frame_count * 1_000_000 / hz);
        Self::build(profile, timeline, length)
    }

    /// 使用显式时间轴 (可乱序), 用于构造非单调录像
    pub fn from_timeline(profile: &RecordingProfile, timeline: Vec<Duration>) -> Self {
        let length = timeline.iter().max().copied().unwrap_or_default();
        Self::build(profile, timeline, length)
    }

    fn build(profile: &RecordingProfile, timeline: Vec<Duration>, length: Duration) -> Self {
        let config = RecordConfig {
            camera_fps: profile.fps,
            depth_mode: profile.depth_mode,
            color_resolution: profile.color_resolution,
            depth_track_enabled: profile.depth_mode != DepthMode::Off,
            color_track_enabled: profile.color_resolution != ColorResolution::Off,
            ir_track_enabled: profile.depth_mode != DepthMode::Off,
            start_timestamp_offset: Duration::from_micros(profile.start_offset_us),
        };
        Self {
            config,
            timeline,
            length,
            read_delay: Duration::from_micros(profile.read_delay_us),
            missing_depth_every: profile.missing_depth_every,
            position: 0,
        }
    }

    fn make_capture(&self, index: usize) -> Capture {
        let ts = self.config.start_timestamp_offset + self.timeline[index];
        let image = |width, height| Image {
            device_timestamp: ts,
            width,
            height,
        };
        let frame_index = index as u64;
        let drop_depth =
            self.missing_depth_every > 0 && frame_index % self.missing_depth_every == 0;

        Capture {
            frame_index,
            depth: (self.config.depth_track_enabled && !drop_depth).then(|| image(640, 576)),
            color: self.config.color_track_enabled.then(|| image(1280, 720)),
            ir: self.config.ir_track_enabled.then(|| image(640, 576)),
        }
    }
}

impl CaptureSource for SimulatedPlayback {
    fn record_configuration(&self) -> &RecordConfig {
        &self.config
    }

    fn record_length(&self) -> Duration {
        self.length
    }

    fn calibration(&self) -> Calibration {
        Calibration {
            depth_mode: self.config.depth_mode,
            color_resolution: self.config.color_resolution,
            raw: Arc::from(&b"simulated-calibration"[..]),
        }
    }

    fn seek(&mut self, timestamp: Duration, origin: SeekOrigin) -> bool {
        let target = match origin {
            SeekOrigin::Begin => timestamp,
            SeekOrigin::End => match self.length.checked_sub(timestamp) {
                Some(t) => t,
                None => return false,
            },
            SeekOrigin::DeviceTime => {
                match timestamp.checked_sub(self.config.start_timestamp_offset) {
                    Some(t) => t,
                    None => return false,
                }
            }
        };
        if target > self.length {
            return false;
        }

        self.position = self
            .timeline
            .iter()
            .position(|ts| *ts >= target)
            .unwrap_or(self.timeline.len());
        true
    }

    fn next_capture(&mut self) -> Result<Option<Capture>, PlaybackError> {
        if self.position >= self.timeline.len() {
            return Ok(None);
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        let capture = self.make_capture(self.position);
        self.position += 1;
        Ok(Some(capture))
    }
}
