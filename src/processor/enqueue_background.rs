/// 后台入队策略
///
/// 后台线程读帧、过滤、入队, 最多领先消费端引擎容量那么多帧;
/// 调用线程在 `next_frame` 中出队. 生产端停止后仍会取完已入队的帧.
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{
    enqueue_with_retry, pop_with_retry, Core, EnqueueOutcome, FrameSummary, Interval, Lifecycle,
    PopOutcome,
};
use crate::error::{ProcessorError, ProcessorResult};
use crate::playback::CaptureSource;
use crate::tracker::TrackingEngine;

/// 生产线程退出时交还录像源
struct ProducerExit {
    source: Box<dyn CaptureSource>,
    error: Option<ProcessorError>,
}

pub(crate) struct EnqueueInBackground {
    producer: Option<JoinHandle<ProducerExit>>,
    source: Option<Box<dyn CaptureSource>>,
}

impl EnqueueInBackground {
    pub(crate) fn start(
        source: Box<dyn CaptureSource>,
        engine: Arc<dyn TrackingEngine>,
        interval: Interval,
        lifecycle: Arc<Lifecycle>,
    ) -> ProcessorResult<Self> {
        let producer = thread::Builder::new()
            .name("bt-producer".into())
            .spawn(move || Self::producer_loop(source, engine, interval, lifecycle))?;

        Ok(Self {
            producer: Some(producer),
            source: None,
        })
    }

    fn producer_loop(
        mut source: Box<dyn CaptureSource>,
        engine: Arc<dyn TrackingEngine>,
        interval: Interval,
        lifecycle: Arc<Lifecycle>,
    ) -> ProducerExit {
        log::debug!("🎬 入队线程启动");
        let mut error = None;
        let mut enqueued = 0u64;

        while lifecycle.is_running() {
            let capture = match source.next_capture() {
                Ok(Some(capture)) => capture,
                Ok(None) => {
                    log::info!("📼 录像读取完毕");
                    break;
                }
                Err(e) => {
                    log::error!("❌ 读取采集帧失败: {}", e);
                    error = Some(ProcessorError::Read(e));
                    break;
                }
            };
            if !interval.contains(Some(&capture)) {
                log::info!("📼 帧{} 超出时间区间, 停止读帧", capture.frame_index);
                break;
            }

            match enqueue_with_retry(engine.as_ref(), capture, || lifecycle.is_running()) {
                EnqueueOutcome::Accepted => enqueued += 1,
                EnqueueOutcome::Cancelled => break,
                EnqueueOutcome::Closed => {
                    error = Some(ProcessorError::EngineClosed);
                    break;
                }
            }
        }

        // 无论因何退出都置停止标志, 消费端据此判断结束
        lifecycle.request_stop();
        log::debug!("✅ 入队线程退出, 共入队{}帧", enqueued);
        ProducerExit { source, error }
    }

    pub(crate) fn next_frame(&mut self, core: &mut Core) -> ProcessorResult<Option<FrameSummary>> {
        let engine = core.engine()?.clone();
        let lifecycle = core.lifecycle().clone();
        // 先读状态再读队列长度: 停止之前入队的帧一定计入队列长度
        let pending = || lifecycle.is_running() || engine.queue_size() > 0;

        if pending() {
            match pop_with_retry(engine.as_ref(), pending) {
                PopOutcome::Result(result) => return Ok(Some(core.record(result))),
                PopOutcome::Cancelled => {}
                PopOutcome::Closed => {
                    self.join(core)?;
                    return Err(ProcessorError::EngineClosed);
                }
            }
        }

        self.join(core)?;
        Ok(None)
    }

    /// 等待生产线程退出, 取回录像源; 返回生产端的读帧错误 (只返回一次)
    fn join(&mut self, core: &Core) -> ProcessorResult<()> {
        let Some(handle) = self.producer.take() else {
            return Ok(());
        };
        let exit = handle.join();
        core.lifecycle().mark_stopped();
        match exit {
            Ok(exit) => {
                self.source = Some(exit.source);
                exit.error.map_or(Ok(()), Err)
            }
            Err(_) => Err(ProcessorError::WorkerPanicked),
        }
    }

    pub(crate) fn stop(&mut self) -> Option<Box<dyn CaptureSource>> {
        if let Some(handle) = self.producer.take() {
            match handle.join() {
                Ok(exit) => self.source = Some(exit.source),
                Err(_) => log::error!("❌ 入队线程异常退出"),
            }
        }
        self.source.take()
    }
}
