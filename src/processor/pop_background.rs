/// 后台出队策略
///
/// 调用线程在 `next_frame` 中读帧、过滤、入队; 后台线程持续出队,
/// 结果经有界通道交给调用线程, 引擎输出端不会堵塞.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError,
};

use super::{Core, FrameSummary, Lifecycle, QUEUE_TIMEOUT, RETRY_BACKOFF};
use crate::error::{ProcessorError, ProcessorResult};
use crate::playback::{Capture, CaptureSource};
use crate::tracker::{EnqueueError, PopError, TrackingEngine, TrackingResult};

pub(crate) struct PopInBackground {
    source: Option<Box<dyn CaptureSource>>,
    /// 入队超时后暂存, 下次继续入队
    pending: Option<Capture>,
    feeding: bool,
    drained: Receiver<TrackingResult>,
    abort: Arc<AtomicBool>,
    popper: Option<JoinHandle<()>>,
    error: Option<ProcessorError>,
}

impl PopInBackground {
    pub(crate) fn start(
        source: Box<dyn CaptureSource>,
        engine: Arc<dyn TrackingEngine>,
        lifecycle: Arc<Lifecycle>,
    ) -> ProcessorResult<Self> {
        // 与引擎相同容量, 调用方消费慢时后台线程同样受到背压
        let (tx, rx) = bounded::<TrackingResult>(engine.capacity().max(1));
        let abort = Arc::new(AtomicBool::new(false));

        let popper_abort = abort.clone();
        let popper = thread::Builder::new()
            .name("bt-popper".into())
            .spawn(move || Self::popper_loop(engine, tx, lifecycle, popper_abort))?;

        Ok(Self {
            source: Some(source),
            pending: None,
            feeding: true,
            drained: rx,
            abort,
            popper: Some(popper),
            error: None,
        })
    }

    fn popper_loop(
        engine: Arc<dyn TrackingEngine>,
        tx: Sender<TrackingResult>,
        lifecycle: Arc<Lifecycle>,
        abort: Arc<AtomicBool>,
    ) {
        log::debug!("🔄 出队线程启动");
        let mut popped = 0u64;

        loop {
            if abort.load(Ordering::Acquire) {
                break;
            }
            // 先读状态再读队列长度: 停止之前入队的帧一定计入队列长度
            if !lifecycle.is_running() && engine.queue_size() == 0 {
                break;
            }

            match engine.try_pop(QUEUE_TIMEOUT) {
                Ok(result) => {
                    popped += 1;
                    if !Self::forward(&tx, result, &abort) {
                        break;
                    }
                }
                Err(PopError::Timeout) => thread::sleep(RETRY_BACKOFF),
                Err(PopError::Closed) => break,
            }
        }

        log::debug!("✅ 出队线程退出, 共出队{}帧", popped);
    }

    /// 把结果交给调用线程, 通道满时带超时重试
    fn forward(tx: &Sender<TrackingResult>, result: TrackingResult, abort: &AtomicBool) -> bool {
        let mut result = result;
        loop {
            match tx.send_timeout(result, QUEUE_TIMEOUT) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if abort.load(Ordering::Acquire) {
                        return false;
                    }
                    result = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    pub(crate) fn next_frame(&mut self, core: &mut Core) -> ProcessorResult<Option<FrameSummary>> {
        loop {
            match self.drained.try_recv() {
                Ok(result) => return Ok(Some(core.record(result))),
                Err(TryRecvError::Disconnected) => return self.finish(core),
                Err(TryRecvError::Empty) => {}
            }

            if self.feeding {
                self.feed(core)?;
                continue;
            }

            match self.drained.recv_timeout(QUEUE_TIMEOUT) {
                Ok(result) => return Ok(Some(core.record(result))),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return self.finish(core),
            }
        }
    }

    /// 读一帧并尝试入队一次; 超时则暂存, 回到 `next_frame` 先交出已出队的结果
    fn feed(&mut self, core: &mut Core) -> ProcessorResult<()> {
        let capture = match self.pending.take() {
            Some(capture) => capture,
            None => match self.read_next(core) {
                Some(capture) => capture,
                None => return Ok(()),
            },
        };

        match core.engine()?.try_enqueue(capture, QUEUE_TIMEOUT) {
            Ok(()) => Ok(()),
            Err(EnqueueError::Timeout(returned)) => {
                log::trace!("入队超时, 帧{} 稍后重试", returned.frame_index);
                self.pending = Some(returned);
                thread::sleep(RETRY_BACKOFF);
                Ok(())
            }
            Err(EnqueueError::Closed(_)) => {
                self.end_input(core);
                Err(ProcessorError::EngineClosed)
            }
        }
    }

    fn read_next(&mut self, core: &Core) -> Option<Capture> {
        let source = self.source.as_mut()?;
        match source.next_capture() {
            Ok(Some(capture)) if core.interval().contains(Some(&capture)) => Some(capture),
            Ok(_) => {
                log::info!("📼 录像或时间区间结束, 等待剩余结果");
                self.end_input(core);
                None
            }
            Err(e) => {
                log::error!("❌ 读取采集帧失败: {}", e);
                self.error = Some(ProcessorError::Read(e));
                self.end_input(core);
                None
            }
        }
    }

    fn end_input(&mut self, core: &Core) {
        self.feeding = false;
        core.lifecycle().request_stop();
    }

    /// 出队线程已退出且结果已取完
    fn finish(&mut self, core: &Core) -> ProcessorResult<Option<FrameSummary>> {
        if let Some(handle) = self.popper.take() {
            if handle.join().is_err() {
                core.lifecycle().mark_stopped();
                return Err(ProcessorError::WorkerPanicked);
            }
        }
        core.lifecycle().mark_stopped();
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    pub(crate) fn stop(&mut self) -> Option<Box<dyn CaptureSource>> {
        self.abort.store(true, Ordering::Release);
        self.feeding = false;
        if let Some(handle) = self.popper.take() {
            if handle.join().is_err() {
                log::error!("❌ 出队线程异常退出");
            }
        }
        self.pending = None;
        self.source.take()
    }
}
