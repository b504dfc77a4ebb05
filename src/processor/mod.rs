/// 帧处理流水线 (Frame Processing Pipeline)
///
/// 录像源 → 追踪引擎 → 结果统计, 三种并发策略:
/// - SingleThread:        调用线程串行完成读帧、入队、出队
/// - PopInBackground:     调用线程读帧入队, 后台线程出队
/// - EnqueueInBackground: 后台线程读帧入队, 调用线程出队
///
/// 调用方反复调用 `next_frame()` 直到返回 `Ok(None)`, 最后 `dispose()`.
mod enqueue_background;
mod pop_background;
mod single_thread;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use enqueue_background::EnqueueInBackground;
use pop_background::PopInBackground;
use single_thread::SingleThread;

use crate::error::{ProcessorError, ProcessorResult};
use crate::params::{ParameterSet, ProcessorKind};
use crate::playback::{Capture, CaptureSource, RecordConfig, SeekOrigin};
use crate::sdk::Sdk;
use crate::tracker::{EnqueueError, PopError, TrackerConfiguration, TrackingEngine, TrackingResult};

/// 入队/出队单次阻塞上限
pub const QUEUE_TIMEOUT: Duration = Duration::from_millis(20);
/// 超时后重试前的休眠
pub const RETRY_BACKOFF: Duration = Duration::from_millis(2);

// ========== 生命周期 ==========

/// 处理器状态: Created → Running → Stopping → Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ProcessorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ProcessorState::Created,
            1 => ProcessorState::Running,
            2 => ProcessorState::Stopping,
            _ => ProcessorState::Stopped,
        }
    }
}

/// 跨线程共享的停止标志, 无锁读写
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ProcessorState::Created as u8))
    }

    pub(crate) fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    fn transition(&self, from: ProcessorState, to: ProcessorState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn start(&self) -> bool {
        self.transition(ProcessorState::Created, ProcessorState::Running)
    }

    /// 请求停止, 返回本次调用是否完成了 → Stopping 的切换
    pub(crate) fn request_stop(&self) -> bool {
        self.transition(ProcessorState::Running, ProcessorState::Stopping)
            || self.transition(ProcessorState::Created, ProcessorState::Stopping)
    }

    /// 后台线程退出后调用, 不会跳过 Stopping
    pub(crate) fn mark_stopped(&self) {
        self.request_stop();
        self.transition(ProcessorState::Stopping, ProcessorState::Stopped);
    }
}

// ========== 时间区间 ==========

/// 时间区间过滤: [start, end), 以录像起始偏移修正设备时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub start: Option<Duration>,
    pub end: Option<Duration>,
    pub start_offset: Duration,
}

impl Interval {
    pub fn new(start: Option<Duration>, end: Option<Duration>, start_offset: Duration) -> Self {
        Self {
            start,
            end,
            start_offset,
        }
    }

    /// 录像时间戳单调递增, 第一个不在区间内的帧即视为区间结束
    pub fn contains(&self, capture: Option<&Capture>) -> bool {
        let Some(capture) = capture else {
            return false;
        };
        let Some(end) = self.end else {
            return true;
        };
        let Some(ts) = capture.device_timestamp() else {
            return false;
        };

        let relative = ts.saturating_sub(self.start_offset);
        self.start.map_or(true, |start| relative >= start) && relative < end
    }
}

// ========== 重试 ==========

pub(crate) enum EnqueueOutcome {
    Accepted,
    Cancelled,
    Closed,
}

/// 带超时重试入队, 直到成功、引擎关闭或 `keep_going` 返回 false
pub(crate) fn enqueue_with_retry(
    engine: &dyn TrackingEngine,
    capture: Capture,
    keep_going: impl Fn() -> bool,
) -> EnqueueOutcome {
    let mut capture = capture;
    loop {
        match engine.try_enqueue(capture, QUEUE_TIMEOUT) {
            Ok(()) => return EnqueueOutcome::Accepted,
            Err(EnqueueError::Timeout(returned)) => {
                if !keep_going() {
                    return EnqueueOutcome::Cancelled;
                }
                log::trace!("入队超时, 帧{} 重试", returned.frame_index);
                capture = returned;
                thread::sleep(RETRY_BACKOFF);
            }
            Err(EnqueueError::Closed(_)) => return EnqueueOutcome::Closed,
        }
    }
}

pub(crate) enum PopOutcome {
    Result(TrackingResult),
    Cancelled,
    Closed,
}

/// 带超时重试出队, 直到拿到结果、引擎关闭或 `keep_going` 返回 false
pub(crate) fn pop_with_retry(
    engine: &dyn TrackingEngine,
    keep_going: impl Fn() -> bool,
) -> PopOutcome {
    loop {
        match engine.try_pop(QUEUE_TIMEOUT) {
            Ok(result) => return PopOutcome::Result(result),
            Err(PopError::Timeout) => {
                if !keep_going() {
                    return PopOutcome::Cancelled;
                }
                log::trace!("出队超时, 重试");
                thread::sleep(RETRY_BACKOFF);
            }
            Err(PopError::Closed) => return PopOutcome::Closed,
        }
    }
}

// ========== 共享状态 ==========

/// 一帧处理结果摘要 (追踪结果本身在读取人数后立即释放)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    pub frame_index: u64,
    pub device_timestamp: Option<Duration>,
    pub body_count: u32,
}

/// 各策略共用的状态: 引擎句柄、区间、统计
pub(crate) struct Core {
    engine: Option<Arc<dyn TrackingEngine>>,
    interval: Interval,
    lifecycle: Arc<Lifecycle>,
    total_frames: u64,
    frames_with_body: u64,
}

impl Core {
    pub(crate) fn engine(&self) -> ProcessorResult<&Arc<dyn TrackingEngine>> {
        self.engine.as_ref().ok_or(ProcessorError::EngineClosed)
    }

    pub(crate) fn interval(&self) -> Interval {
        self.interval
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// 统计一帧结果并释放
    pub(crate) fn record(&mut self, result: TrackingResult) -> FrameSummary {
        self.total_frames += 1;
        if result.body_count > 0 {
            self.frames_with_body += 1;
        }
        FrameSummary {
            frame_index: result.frame_index,
            device_timestamp: result.device_timestamp,
            body_count: result.body_count,
        }
    }
}

// ========== 处理器 ==========

enum Strategy {
    SingleThread(SingleThread),
    PopInBackground(PopInBackground),
    EnqueueInBackground(EnqueueInBackground),
}

impl Strategy {
    fn next_frame(&mut self, core: &mut Core) -> ProcessorResult<Option<FrameSummary>> {
        match self {
            Strategy::SingleThread(s) => s.next_frame(core),
            Strategy::PopInBackground(s) => s.next_frame(core),
            Strategy::EnqueueInBackground(s) => s.next_frame(core),
        }
    }

    /// 停止并等待后台线程退出, 交还录像源
    fn stop(&mut self) -> Option<Box<dyn CaptureSource>> {
        match self {
            Strategy::SingleThread(s) => s.stop(),
            Strategy::PopInBackground(s) => s.stop(),
            Strategy::EnqueueInBackground(s) => s.stop(),
        }
    }
}

/// 帧处理器
pub struct Processor {
    kind: ProcessorKind,
    core: Core,
    strategy: Strategy,
    record_config: RecordConfig,
    record_length: Duration,
    disposed: bool,
}

impl Processor {
    /// 打开录像, 创建追踪引擎, 按参数选择并发策略
    pub fn create(params: &ParameterSet, sdk: &dyn Sdk) -> ProcessorResult<Self> {
        let mut source = sdk
            .open_playback(params.source_path())
            .map_err(ProcessorError::Open)?;
        let record_config = source.record_configuration().clone();
        let record_length = source.record_length();

        if let Some(start) = params.start_time() {
            if !source.seek(start, SeekOrigin::Begin) {
                log::error!("❌ 跳转到 {:.3}s 失败", start.as_secs_f64());
                return Err(ProcessorError::Seek(start));
            }
        }

        let tracker_config =
            TrackerConfiguration::new(params.processing_mode(), params.model_variant());
        let engine = sdk.create_tracker(&source.calibration(), tracker_config)?;

        let interval = Interval::new(
            params.start_time(),
            params.end_time(),
            record_config.start_timestamp_offset,
        );
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.start();

        let kind = params.processor_kind();
        let strategy = match kind {
            ProcessorKind::SingleThread => Ok(Strategy::SingleThread(SingleThread::new(source))),
            ProcessorKind::PopInBackground => {
                PopInBackground::start(source, engine.clone(), lifecycle.clone())
                    .map(Strategy::PopInBackground)
            }
            ProcessorKind::EnqueueInBackground => EnqueueInBackground::start(
                source,
                engine.clone(),
                interval,
                lifecycle.clone(),
            )
            .map(Strategy::EnqueueInBackground),
        };
        let strategy = match strategy {
            Ok(strategy) => strategy,
            Err(e) => {
                lifecycle.mark_stopped();
                engine.shutdown();
                return Err(e);
            }
        };

        log::info!(
            "✅ 处理器已创建: 策略={} 录像时长={:.2}s {}fps",
            kind,
            record_length.as_secs_f64(),
            record_config.camera_fps.hz()
        );

        Ok(Self {
            kind,
            core: Core {
                engine: Some(engine),
                interval,
                lifecycle,
                total_frames: 0,
                frames_with_body: 0,
            },
            strategy,
            record_config,
            record_length,
            disposed: false,
        })
    }

    /// 取下一帧结果, `Ok(None)` 表示录像或区间结束
    pub fn next_frame(&mut self) -> ProcessorResult<Option<FrameSummary>> {
        if self.disposed {
            return Ok(None);
        }
        self.strategy.next_frame(&mut self.core)
    }

    /// 停止后台线程 → 释放引擎 → 关闭录像, 可重复调用
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.core.lifecycle.request_stop();
        let source = self.strategy.stop();
        self.core.lifecycle.mark_stopped();

        if let Some(engine) = self.core.engine.take() {
            engine.shutdown();
        }
        drop(source);

        log::info!(
            "🛑 处理器已释放: 策略={} 共处理{}帧, 其中{}帧有人",
            self.kind,
            self.core.total_frames,
            self.core.frames_with_body
        );
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    pub fn state(&self) -> ProcessorState {
        self.core.lifecycle.state()
    }

    pub fn total_frame_count(&self) -> u64 {
        self.core.total_frames
    }

    pub fn frame_with_body_count(&self) -> u64 {
        self.core.frames_with_body
    }

    pub fn queue_size(&self) -> usize {
        self.core.engine.as_ref().map_or(0, |e| e.queue_size())
    }

    pub fn record_config(&self) -> &RecordConfig {
        &self.record_config
    }

    pub fn record_length(&self) -> Duration {
        self.record_length
    }

    pub fn is_capture_in_interval(&self, capture: Option<&Capture>) -> bool {
        self.core.interval.contains(capture)
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::Image;

    fn capture_at(us: u64) -> Capture {
        Capture {
            frame_index: 0,
            depth: Some(Image {
                device_timestamp: Duration::from_micros(us),
                width: 640,
                height: 576,
            }),
            color: None,
            ir: None,
        }
    }

    #[test]
    fn test_interval_absent_capture() {
        let interval = Interval::default();
        assert!(!interval.contains(None));
        assert!(interval.contains(Some(&capture_at(0))));
    }

    #[test]
    fn test_interval_without_end_accepts_everything() {
        let interval = Interval::new(Some(Duration::from_secs(5)), None, Duration::ZERO);
        assert!(interval.contains(Some(&capture_at(1_000_000))));
    }

    #[test]
    fn test_interval_bounds_with_offset() {
        let interval = Interval::new(
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(4)),
            Duration::from_secs(1),
        );
        assert!(!interval.contains(Some(&capture_at(2_999_999))));
        assert!(interval.contains(Some(&capture_at(3_000_000))));
        assert!(interval.contains(Some(&capture_at(4_999_999))));
        assert!(!interval.contains(Some(&capture_at(5_000_000))));
    }

    #[test]
    fn test_interval_capture_without_timestamp() {
        let interval = Interval::new(None, Some(Duration::from_secs(1)), Duration::ZERO);
        let mut capture = capture_at(0);
        capture.depth = None;
        assert!(!interval.contains(Some(&capture)));
    }

    #[test]
    fn test_lifecycle_never_skips_stopping() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ProcessorState::Created);
        assert!(lifecycle.start());
        assert!(lifecycle.is_running());

        assert!(lifecycle.request_stop());
        assert!(!lifecycle.request_stop());
        assert_eq!(lifecycle.state(), ProcessorState::Stopping);

        lifecycle.mark_stopped();
        assert_eq!(lifecycle.state(), ProcessorState::Stopped);
        assert!(!lifecycle.start());
    }
}
