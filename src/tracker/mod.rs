/// 骨骼追踪引擎 (Body Tracking Engine)
///
/// 有界队列的异步推理引擎: 入队采集帧, 按入队顺序出队追踪结果.
/// 入队/出队都是带超时的阻塞调用, 超时后由调用方重试.
pub mod simulated;

pub use simulated::{SimulatedTracker, TrackerProfile};

use std::fmt;
use std::time::Duration;

use crate::params::{ModelVariant, ProcessingMode};
use crate::playback::Capture;

/// 追踪引擎配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfiguration {
    pub processing_mode: ProcessingMode,
    pub model_path: String,
    pub gpu_device_id: u32,
}

impl TrackerConfiguration {
    pub fn new(processing_mode: ProcessingMode, model: ModelVariant) -> Self {
        Self {
            processing_mode,
            model_path: model.model_path().to_string(),
            gpu_device_id: 0,
        }
    }
}

/// 一帧的追踪结果, 由出队方独占
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingResult {
    pub frame_index: u64,
    pub device_timestamp: Option<Duration>,
    pub body_count: u32,
}

/// 入队失败
pub enum EnqueueError {
    /// 队列已满, 超时内未能入队, 采集帧原样返回以便重试
    Timeout(Capture),
    /// 引擎已关闭
    Closed(Capture),
}

impl fmt::Debug for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Timeout(c) => write!(f, "Timeout(frame {})", c.frame_index),
            EnqueueError::Closed(c) => write!(f, "Closed(frame {})", c.frame_index),
        }
    }
}

/// 出队失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// 超时内没有可用结果
    Timeout,
    /// 引擎已关闭且没有剩余结果
    Closed,
}

/// 追踪引擎接口
///
/// 引擎在一个生产者和一个消费者线程之间共享, 不额外加锁,
/// 实现必须支持单生产者/单消费者并发调用.
pub trait TrackingEngine: Send + Sync {
    fn try_enqueue(&self, capture: Capture, timeout: Duration) -> Result<(), EnqueueError>;

    fn try_pop(&self, timeout: Duration) -> Result<TrackingResult, PopError>;

    /// 已入队但尚未出队的数量
    fn queue_size(&self) -> usize;

    /// 队列容量
    fn capacity(&self) -> usize;

    /// 释放引擎资源 (幂等), 调用时不得有其他线程正在入队/出队
    fn shutdown(&self);
}
