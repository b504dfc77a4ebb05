/// 录像回放系统 (Recording Playback)
///
/// 顺序读取录像中的采集帧, 支持按时间戳跳转.
/// - CaptureSource: 回放接口 (原生解码器或模拟实现)
/// - SimulatedPlayback: 按固定帧率生成采集帧的模拟回放
pub mod simulated;

pub use simulated::{RecordingProfile, SimulatedPlayback};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

// ========== 录像配置 ==========

/// 相机帧率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRate {
    Fps5,
    Fps15,
    Fps30,
}

impl FrameRate {
    pub fn hz(&self) -> u32 {
        match self {
            FrameRate::Fps5 => 5,
            FrameRate::Fps15 => 15,
            FrameRate::Fps30 => 30,
        }
    }
}

/// 深度相机模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthMode {
    Off,
    NfovBinned,
    NfovUnbinned,
    WfovBinned,
    WfovUnbinned,
    PassiveIr,
}

/// 彩色相机分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorResolution {
    Off,
    R720p,
    R1080p,
    R1440p,
    R1536p,
    R2160p,
    R3072p,
}

/// 录像配置 (RecordConfig)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordConfig {
    pub camera_fps: FrameRate,
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    pub depth_track_enabled: bool,
    pub color_track_enabled: bool,
    pub ir_track_enabled: bool,
    /// 录像第一帧相对设备时钟的偏移
    pub start_timestamp_offset: Duration,
}

/// 标定数据, 原样传递给追踪引擎
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    pub raw: Arc<[u8]>,
}

/// 跳转基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// 相对录像开头
    Begin,
    /// 相对录像结尾 (向前)
    End,
    /// 绝对设备时间戳
    DeviceTime,
}

// ========== 采集帧 ==========

/// 单个模态的图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub device_timestamp: Duration,
    pub width: u32,
    pub height: u32,
}

/// 一组同步采集的图像 (深度/彩色/红外, 可能缺失)
///
/// 由当前持有者独占, 离开作用域即释放.
#[derive(Debug, PartialEq, Eq)]
pub struct Capture {
    pub frame_index: u64,
    pub depth: Option<Image>,
    pub color: Option<Image>,
    pub ir: Option<Image>,
}

impl Capture {
    /// 设备时间戳: 依次取深度、彩色、红外中第一个存在的
    pub fn device_timestamp(&self) -> Option<Duration> {
        self.depth
            .as_ref()
            .or(self.color.as_ref())
            .or(self.ir.as_ref())
            .map(|img| img.device_timestamp)
    }
}

// ========== 回放接口 ==========

/// 顺序读取采集帧的录像源
///
/// 录像源只在一个线程中使用, 需要能移动到后台线程.
pub trait CaptureSource: Send {
    fn record_configuration(&self) -> &RecordConfig;

    /// 录像总时长
    fn record_length(&self) -> Duration;

    fn calibration(&self) -> Calibration;

    /// 跳转到指定时间戳, 返回 false 表示跳转失败
    fn seek(&mut self, timestamp: Duration, origin: SeekOrigin) -> bool;

    /// 读取下一帧, `Ok(None)` 表示录像结束
    fn next_capture(&mut self) -> Result<Option<Capture>, PlaybackError>;
}
