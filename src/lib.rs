// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 测试配置
pub mod driver; // 驱动循环与统计
pub mod error; // 错误类型
pub mod params; // 运行参数
pub mod playback; // 录像回放
pub mod processor; // 帧处理流水线
pub mod sdk; // 回放 + 追踪入口
pub mod tracker; // 骨骼追踪引擎

pub use crate::config::BenchConfig;
pub use crate::driver::RunSummary;
pub use crate::error::{ConfigError, PlaybackError, ProcessorError, TrackerError};
pub use crate::params::{ModelVariant, ParameterSet, ProcessingMode, ProcessorKind};
pub use crate::playback::{Capture, CaptureSource, RecordConfig};
pub use crate::processor::{FrameSummary, Processor, ProcessorState};
pub use crate::sdk::{Sdk, SimulatedSdk};
pub use crate::tracker::{TrackingEngine, TrackingResult};
