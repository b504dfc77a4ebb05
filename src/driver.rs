//! 驱动循环: 反复取帧直到结束, 统计帧数与耗时

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::error::ProcessorResult;
use crate::params::ProcessorKind;
use crate::processor::Processor;

/// 一次运行的统计结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kind: ProcessorKind,
    pub started_at: DateTime<Local>,
    pub total_frames: u64,
    pub frames_with_body: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// 取完全部帧; 返回前不释放处理器, 由调用方 `dispose()`
pub fn run(processor: &mut Processor) -> ProcessorResult<RunSummary> {
    let started_at = Local::now();
    let start = Instant::now();
    let mut last = Instant::now();
    let mut window_frames = 0u64;
    let mut total_frames = 0u64;
    let mut frames_with_body = 0u64;

    while let Some(frame) = processor.next_frame()? {
        total_frames += 1;
        window_frames += 1;
        if frame.body_count > 0 {
            frames_with_body += 1;
        }

        if last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = last.elapsed().as_secs_f64();
            log::info!(
                "📊 [{}] 已处理{}帧 | 当前{:.1}fps | 队列{}",
                processor.kind(),
                total_frames,
                window_frames as f64 / elapsed,
                processor.queue_size()
            );
            last = Instant::now();
            window_frames = 0;
        }
    }

    let summary = RunSummary {
        kind: processor.kind(),
        started_at,
        total_frames,
        frames_with_body,
        elapsed: start.elapsed(),
    };
    log::info!(
        "✅ [{}] 完成: {}帧, {}帧有人, {:.2}s, {:.1}fps",
        summary.kind,
        summary.total_frames,
        summary.frames_with_body,
        summary.elapsed.as_secs_f64(),
        summary.fps()
    );
    Ok(summary)
}

/// 打印多次运行的对比表
pub fn print_report(summaries: &[RunSummary]) {
    println!("\n📊 吞吐对比:");
    println!(
        "  {:<24} {:>8} {:>8} {:>10} {:>10}",
        "策略", "帧数", "有人", "耗时(s)", "fps"
    );
    for s in summaries {
        println!(
            "  {:<24} {:>8} {:>8} {:>10.2} {:>10.1}",
            s.kind.name(),
            s.total_frames,
            s.frames_with_body,
            s.elapsed.as_secs_f64(),
            s.fps()
        );
    }
    if let Some(first) = summaries.first() {
        println!("  开始时间: {}", first.started_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps() {
        let summary = RunSummary {
            kind: ProcessorKind::SingleThread,
            started_at: Local::now(),
            total_frames: 90,
            frames_with_body: 10,
            elapsed: Duration::from_secs(3),
        };
        assert!((summary.fps() - 30.0).abs() < 1e-9);

        let empty = RunSummary {
            elapsed: Duration::ZERO,
            ..summary
        };
        assert_eq!(empty.fps(), 0.0);
    }
}
