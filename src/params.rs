//! 运行参数 (ParameterSet)
//!
//! 所有字段通过 `ParameterSetBuilder` 的 setter 写入, 每个 setter 先校验再提交,
//! 校验失败时不修改任何字段. `build()` 之后参数只读.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// 录像文件扩展名
pub const RECORDING_EXTENSION: &str = "mkv";

// ========== 枚举类型 ==========

/// 推理加速后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    Cpu,
    #[default]
    Gpu,
    Cuda,
    TensorRt,
    DirectMl,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 5] = [
        ProcessingMode::Cpu,
        ProcessingMode::Gpu,
        ProcessingMode::Cuda,
        ProcessingMode::TensorRt,
        ProcessingMode::DirectMl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessingMode::Cpu => "cpu",
            ProcessingMode::Gpu => "gpu",
            ProcessingMode::Cuda => "cuda",
            ProcessingMode::TensorRt => "tensorrt",
            ProcessingMode::DirectMl => "directml",
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == key)
            .ok_or_else(|| ConfigError::UnknownProcessingMode(s.to_string()))
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 骨骼追踪模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    #[default]
    Default,
    Lite,
}

impl ModelVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Default => "default",
            ModelVariant::Lite => "lite",
        }
    }

    /// 模型文件路径
    pub fn model_path(&self) -> &'static str {
        match self {
            ModelVariant::Default => "dnn_model_2_0_op11.onnx",
            ModelVariant::Lite => "dnn_model_2_0_lite_op11.onnx",
        }
    }
}

impl FromStr for ModelVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(ModelVariant::Default),
            "lite" => Ok(ModelVariant::Lite),
            _ => Err(ConfigError::UnknownModelVariant(s.to_string())),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 并发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorKind {
    /// 单线程: 入队 → 出队完全串行
    #[default]
    SingleThread,
    /// 后台线程出队
    PopInBackground,
    /// 后台线程入队
    EnqueueInBackground,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 3] = [
        ProcessorKind::SingleThread,
        ProcessorKind::PopInBackground,
        ProcessorKind::EnqueueInBackground,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessorKind::SingleThread => "single-thread",
            ProcessorKind::PopInBackground => "pop-in-background",
            ProcessorKind::EnqueueInBackground => "enqueue-in-background",
        }
    }
}

impl FromStr for ProcessorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "singlethread" | "single" => Ok(ProcessorKind::SingleThread),
            "popinbackground" | "pop" => Ok(ProcessorKind::PopInBackground),
            "enqueueinbackground" | "enqueue" => Ok(ProcessorKind::EnqueueInBackground),
            _ => Err(ConfigError::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ========== 校验函数 ==========

/// 校验录像路径: 非空, 无非法字符, 扩展名为 .mkv (不区分大小写), 文件存在
pub fn validate_source_path(raw: &str) -> ConfigResult<PathBuf> {
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    if let Some(c) = raw
        .chars()
        .find(|c| c.is_control() || matches!(c, '"' | '<' | '>' | '|'))
    {
        return Err(ConfigError::InvalidPathChar(c));
    }

    let path = PathBuf::from(raw);
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(RECORDING_EXTENSION));
    if !ext_ok {
        return Err(ConfigError::WrongExtension {
            path,
            expected: RECORDING_EXTENSION,
        });
    }
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path));
    }
    Ok(path)
}

/// 解析秒数 ("2.5" → 2.5s)
pub fn parse_seconds(raw: &str) -> ConfigResult<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTime(raw.to_string()))?;
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidTime(raw.to_string()))
}

// ========== 参数集 ==========

/// 已校验的只读参数集
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    source_path: PathBuf,
    processing_mode: ProcessingMode,
    model_variant: ModelVariant,
    processor_kind: ProcessorKind,
    start_time: Option<Duration>,
    end_time: Option<Duration>,
}

impl ParameterSet {
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.processing_mode
    }

    pub fn model_variant(&self) -> ModelVariant {
        self.model_variant
    }

    pub fn processor_kind(&self) -> ProcessorKind {
        self.processor_kind
    }

    pub fn start_time(&self) -> Option<Duration> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Duration> {
        self.end_time
    }

    /// 复制一份参数, 仅替换并发策略 (对比全部策略时使用)
    pub fn with_processor_kind(&self, kind: ProcessorKind) -> Self {
        Self {
            processor_kind: kind,
            ..self.clone()
        }
    }

    /// 打印当前参数
    pub fn print_summary(&self) {
        println!("\n🎛️  当前参数:");
        println!("  录像文件: {}", self.source_path.display());
        println!("  处理模式: {}", self.processing_mode);
        println!("  模型: {} ({})", self.model_variant, self.model_variant.model_path());
        println!("  并发策略: {}", self.processor_kind);
        match (self.start_time, self.end_time) {
            (None, None) => println!("  时间区间: 全部"),
            (s, e) => {
                let end = e
                    .map(|e| format!("{:.3}s)", e.as_secs_f64()))
                    .unwrap_or_else(|| "结尾]".to_string());
                println!(
                    "  时间区间: [{:.3}s, {}",
                    s.unwrap_or_default().as_secs_f64(),
                    end
                );
            }
        }
        println!();
    }
}

/// 参数集构建器
#[derive(Debug, Clone, Default)]
pub struct ParameterSetBuilder {
    source_path: Option<PathBuf>,
    processing_mode: ProcessingMode,
    model_variant: ModelVariant,
    processor_kind: ProcessorKind,
    start_time: Option<Duration>,
    end_time: Option<Duration>,
}

impl ParameterSetBuilder {
    pub fn set_source_path(&mut self, raw: &str) -> ConfigResult<()> {
        self.source_path = Some(validate_source_path(raw)?);
        Ok(())
    }

    pub fn set_processing_mode(&mut self, mode: ProcessingMode) {
        self.processing_mode = mode;
    }

    pub fn set_model_variant(&mut self, variant: ModelVariant) {
        self.model_variant = variant;
    }

    pub fn set_processor_kind(&mut self, kind: ProcessorKind) {
        self.processor_kind = kind;
    }

    /// 设置起始时间, 与已有结束时间交叉校验
    pub fn set_start_time(&mut self, start: Option<Duration>) -> ConfigResult<()> {
        if let (Some(start), Some(end)) = (start, self.end_time) {
            if start > end {
                return Err(ConfigError::InvertedInterval { start, end });
            }
        }
        self.start_time = start;
        Ok(())
    }

    /// 设置结束时间, 与已有起始时间交叉校验
    pub fn set_end_time(&mut self, end: Option<Duration>) -> ConfigResult<()> {
        if let (Some(start), Some(end)) = (self.start_time, end) {
            if start > end {
                return Err(ConfigError::InvertedInterval { start, end });
            }
        }
        self.end_time = end;
        Ok(())
    }

    pub fn set_start_time_str(&mut self, raw: &str) -> ConfigResult<()> {
        let start = parse_seconds(raw)?;
        self.set_start_time(Some(start))
    }

    pub fn set_end_time_str(&mut self, raw: &str) -> ConfigResult<()> {
        let end = parse_seconds(raw)?;
        self.set_end_time(Some(end))
    }

    pub fn build(&self) -> ConfigResult<ParameterSet> {
        let source_path = self
            .source_path
            .clone()
            .ok_or(ConfigError::Missing("source_path"))?;
        Ok(ParameterSet {
            source_path,
            processing_mode: self.processing_mode,
            model_variant: self.model_variant,
            processor_kind: self.processor_kind,
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".MKV").tempfile().unwrap()
    }

    #[test]
    fn test_path_validation() {
        assert_eq!(validate_source_path("   "), Err(ConfigError::EmptyPath));
        assert_eq!(
            validate_source_path("a|b.mkv"),
            Err(ConfigError::InvalidPathChar('|'))
        );
        assert!(matches!(
            validate_source_path("clip.mp4"),
            Err(ConfigError::WrongExtension { .. })
        ));
        assert!(matches!(
            validate_source_path("/nonexistent/clip.mkv"),
            Err(ConfigError::FileNotFound(_))
        ));

        // 扩展名不区分大小写
        let file = recording();
        let raw = file.path().to_str().unwrap();
        assert_eq!(validate_source_path(raw).unwrap(), file.path());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("2.5").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_seconds(" 4 ").unwrap(), Duration::from_secs(4));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("abc").is_err());
        assert!(parse_seconds("NaN").is_err());
    }

    #[test]
    fn test_interval_cross_validation() {
        let mut builder = ParameterSet::builder();
        builder.set_end_time_str("4.0").unwrap();

        let err = builder.set_start_time_str("5.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvertedInterval { .. }));
        assert_eq!(builder.start_time, None);
        assert_eq!(builder.end_time, Some(Duration::from_secs(4)));

        builder.set_start_time_str("2.0").unwrap();
        assert!(builder.set_end_time_str("1.0").is_err());
        assert_eq!(builder.end_time, Some(Duration::from_secs(4)));

        // start == end 允许
        builder.set_end_time(Some(Duration::from_secs(2))).unwrap();
    }

    #[test]
    fn test_rejected_path_keeps_previous_value() {
        let file = recording();
        let mut builder = ParameterSet::builder();
        builder.set_source_path(file.path().to_str().unwrap()).unwrap();
        assert!(builder.set_source_path("bad.avi").is_err());

        let params = builder.build().unwrap();
        assert_eq!(params.source_path(), file.path());
    }

    #[test]
    fn test_build_requires_source() {
        assert_eq!(
            ParameterSet::builder().build(),
            Err(ConfigError::Missing("source_path"))
        );
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("CUDA".parse::<ProcessingMode>().unwrap(), ProcessingMode::Cuda);
        assert_eq!("lite".parse::<ModelVariant>().unwrap(), ModelVariant::Lite);
        assert_eq!(
            "EnqueueInBackground".parse::<ProcessorKind>().unwrap(),
            ProcessorKind::EnqueueInBackground
        );
        assert_eq!(
            "pop-in-background".parse::<ProcessorKind>().unwrap(),
            ProcessorKind::PopInBackground
        );
        assert_eq!(
            "round-robin".parse::<ProcessorKind>(),
            Err(ConfigError::UnsupportedStrategy("round-robin".to_string()))
        );
        assert!("vulkan".parse::<ProcessingMode>().is_err());
    }
}
