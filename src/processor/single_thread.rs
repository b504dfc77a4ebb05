/// 单线程策略: 读帧 → 入队 → 出队, 帧与帧之间没有流水
use super::{enqueue_with_retry, pop_with_retry, Core, EnqueueOutcome, FrameSummary, PopOutcome};
use crate::error::{ProcessorError, ProcessorResult};
use crate::playback::CaptureSource;

pub(crate) struct SingleThread {
    source: Option<Box<dyn CaptureSource>>,
}

impl SingleThread {
    pub(crate) fn new(source: Box<dyn CaptureSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub(crate) fn next_frame(&mut self, core: &mut Core) -> ProcessorResult<Option<FrameSummary>> {
        if !core.lifecycle().is_running() {
            return Ok(None);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        let capture = match source.next_capture() {
            Ok(capture) => capture,
            Err(e) => {
                log::error!("❌ 读取采集帧失败: {}", e);
                core.lifecycle().mark_stopped();
                return Err(ProcessorError::Read(e));
            }
        };
        let interval = core.interval();
        let Some(capture) = capture.filter(|c| interval.contains(Some(c))) else {
            log::info!("📼 录像或时间区间结束");
            core.lifecycle().mark_stopped();
            return Ok(None);
        };

        let engine = core.engine()?.clone();
        match enqueue_with_retry(engine.as_ref(), capture, || true) {
            EnqueueOutcome::Accepted => {}
            EnqueueOutcome::Cancelled | EnqueueOutcome::Closed => {
                core.lifecycle().mark_stopped();
                return Err(ProcessorError::EngineClosed);
            }
        }

        match pop_with_retry(engine.as_ref(), || true) {
            PopOutcome::Result(result) => Ok(Some(core.record(result))),
            PopOutcome::Cancelled | PopOutcome::Closed => {
                core.lifecycle().mark_stopped();
                Err(ProcessorError::EngineClosed)
            }
        }
    }

    pub(crate) fn stop(&mut self) -> Option<Box<dyn CaptureSource>> {
        self.source.take()
    }
}
