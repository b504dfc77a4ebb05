/// 模拟追踪引擎
/// Simulated tracker: worker thread with a bounded in-flight budget
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{EnqueueError, PopError, TrackerConfiguration, TrackingEngine, TrackingResult};
use crate::error::TrackerError;
use crate::playback::{Calibration, Capture};

/// 模拟引擎参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerProfile {
    pub capacity: usize,        // 最多同时处理的帧数
    pub latency_us: u64,        // 单帧推理耗时 (微秒)
    pub body_probability: f64,  // 一帧检测到人的概率
    pub max_bodies: u32,        // 一帧最多人数
    pub seed: u64,
}

impl Default for TrackerProfile {
    fn default() -> Self {
        Self {
            capacity: 3,
            latency_us: 15_000,
            body_probability: 0.8,
            max_bodies: 2,
            seed: 42,
        }
    }
}

/// 模拟追踪引擎
///
/// 入队前先取一个槽位令牌, 出队后归还, 已入队未出队的数量不会超过容量.
pub struct SimulatedTracker {
    capacity: usize,
    slots_tx: Sender<()>,
    slots_rx: Receiver<()>,
    input_tx: Mutex<Option<Sender<Capture>>>,
    output_rx: Receiver<TrackingResult>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedTracker {
    pub fn create(
        calibration: &Calibration,
        config: TrackerConfiguration,
        profile: &TrackerProfile,
    ) -> Result<Self, TrackerError> {
        if profile.capacity == 0 {
            return Err(TrackerError::Create("队列容量必须大于0".to_string()));
        }
        if !(0.0..=1.0).contains(&profile.body_probability) {
            return Err(TrackerError::Create(format!(
                "检测概率超出范围: {}",
                profile.body_probability
            )));
        }
        if calibration.raw.is_empty() {
            return Err(TrackerError::Create("标定数据为空".to_string()));
        }

        let (slots_tx, slots_rx) = bounded::<()>(profile.capacity);
        for _ in 0..profile.capacity {
            let _ = slots_tx.send(());
        }
        let (input_tx, input_rx) = unbounded::<Capture>();
        let (output_tx, output_rx) = unbounded::<TrackingResult>();
        let closed = Arc::new(AtomicBool::new(false));

        let worker_closed = closed.clone();
        let latency = Duration::from_micros(profile.latency_us);
        let rng = StdRng::seed_from_u64(profile.seed);
        let (probability, max_bodies) = (profile.body_probability, profile.max_bodies.max(1));
        let worker = thread::Builder::new()
            .name("bt-sim-tracker".into())
            .spawn(move || {
                Self::worker_loop(
                    input_rx,
                    output_tx,
                    worker_closed,
                    latency,
                    rng,
                    probability,
                    max_bodies,
                );
            })
            .map_err(|e| TrackerError::Create(format!("推理线程启动失败: {}", e)))?;

        log::info!(
            "✅ 模拟追踪引擎已创建: 模式={} 模型={} GPU={} 容量={} 延迟={:?}",
            config.processing_mode,
            config.model_path,
            config.gpu_device_id,
            profile.capacity,
            latency
        );

        Ok(Self {
            capacity: profile.capacity,
            slots_tx,
            slots_rx,
            input_tx: Mutex::new(Some(input_tx)),
            output_rx,
            closed,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn worker_loop(
        input_rx: Receiver<Capture>,
        output_tx: Sender<TrackingResult>,
        closed: Arc<AtomicBool>,
        latency: Duration,
        mut rng: StdRng,
        probability: f64,
        max_bodies: u32,
    ) {
        log::debug!("🔍 推理线程启动");

        for capture in input_rx.iter() {
            if closed.load(Ordering::Acquire) {
                break;
            }
            if !latency.is_zero() {
                thread::sleep(latency);
            }

            let body_count = if rng.gen_bool(probability) {
                rng.gen_range(1..=max_bodies)
            } else {
                0
            };
            let result = TrackingResult {
                frame_index: capture.frame_index,
                device_timestamp: capture.device_timestamp(),
                body_count,
            };
            drop(capture);

            if output_tx.send(result).is_err() {
                break;
            }
        }

        log::debug!("✅ 推理线程退出");
    }
}

impl TrackingEngine for SimulatedTracker {
    fn try_enqueue(&self, capture: Capture, timeout: Duration) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::Closed(capture));
        }
        if self.slots_rx.recv_timeout(timeout).is_err() {
            return Err(EnqueueError::Timeout(capture));
        }

        let guard = self.input_tx.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(capture).map_err(|e| {
                let _ = self.slots_tx.try_send(());
                EnqueueError::Closed(e.into_inner())
            }),
            None => {
                let _ = self.slots_tx.try_send(());
                Err(EnqueueError::Closed(capture))
            }
        }
    }

    fn try_pop(&self, timeout: Duration) -> Result<TrackingResult, PopError> {
        match self.output_rx.recv_timeout(timeout) {
            Ok(result) => {
                let _ = self.slots_tx.try_send(());
                Ok(result)
            }
            Err(RecvTimeoutError::Timeout) if !self.closed.load(Ordering::Acquire) => {
                Err(PopError::Timeout)
            }
            Err(_) => Err(PopError::Closed),
        }
    }

    fn queue_size(&self) -> usize {
        self.capacity - self.slots_rx.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.input_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            log::debug!("等待推理线程退出...");
            let _ = handle.join();
        }
        log::info!("🛑 模拟追踪引擎已关闭");
    }
}

impl Drop for SimulatedTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ModelVariant, ProcessingMode};
    use crate::playback::{ColorResolution, DepthMode};

    const TIMEOUT: Duration = Duration::from_millis(20);

    fn calibration() -> Calibration {
        Calibration {
            depth_mode: DepthMode::NfovUnbinned,
            color_resolution: ColorResolution::R720p,
            raw: Arc::from(&b"calib"[..]),
        }
    }

    fn capture(frame_index: u64) -> Capture {
        Capture {
            frame_index,
            depth: None,
            color: None,
            ir: None,
        }
    }

    fn tracker(profile: TrackerProfile) -> SimulatedTracker {
        SimulatedTracker::create(
            &calibration(),
            TrackerConfiguration::new(ProcessingMode::Cpu, ModelVariant::Lite),
            &profile,
        )
        .unwrap()
    }

    #[test]
    fn test_fifo_and_capacity() {
        let engine = tracker(TrackerProfile {
            capacity: 2,
            latency_us: 0,
            ..Default::default()
        });

        engine.try_enqueue(capture(0), TIMEOUT).unwrap();
        engine.try_enqueue(capture(1), TIMEOUT).unwrap();
        assert_eq!(engine.queue_size(), 2);
        assert!(matches!(
            engine.try_enqueue(capture(2), TIMEOUT),
            Err(EnqueueError::Timeout(c)) if c.frame_index == 2
        ));

        assert_eq!(engine.try_pop(Duration::from_secs(1)).unwrap().frame_index, 0);
        assert_eq!(engine.queue_size(), 1);
        assert_eq!(engine.try_pop(Duration::from_secs(1)).unwrap().frame_index, 1);
        assert_eq!(engine.queue_size(), 0);
        assert_eq!(engine.try_pop(TIMEOUT), Err(PopError::Timeout));
    }

    #[test]
    fn test_no_bodies_when_probability_zero() {
        let engine = tracker(TrackerProfile {
            latency_us: 0,
            body_probability: 0.0,
            ..Default::default()
        });
        for i in 0..10 {
            engine.try_enqueue(capture(i), Duration::from_secs(1)).unwrap();
            let result = engine.try_pop(Duration::from_secs(1)).unwrap();
            assert_eq!(result.frame_index, i);
            assert_eq!(result.body_count, 0);
        }
    }

    #[test]
    fn test_shutdown_is_idempotent_and_closes() {
        let engine = tracker(TrackerProfile::default());
        engine.shutdown();
        engine.shutdown();
        assert!(matches!(
            engine.try_enqueue(capture(0), TIMEOUT),
            Err(EnqueueError::Closed(_))
        ));
        assert_eq!(engine.try_pop(TIMEOUT), Err(PopError::Closed));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = SimulatedTracker::create(
            &calibration(),
            TrackerConfiguration::new(ProcessingMode::Cpu, ModelVariant::Default),
            &TrackerProfile {
                capacity: 0,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
