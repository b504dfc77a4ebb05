//! 错误类型 (Error types)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 参数校验错误, 在设置参数时立即返回, 不重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("路径不能为空")]
    EmptyPath,

    #[error("路径包含非法字符 {0:?}")]
    InvalidPathChar(char),

    #[error("文件扩展名必须为 .{expected}: {}", .path.display())]
    WrongExtension { path: PathBuf, expected: &'static str },

    #[error("文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("无效的时间值 {0:?} (应为非负秒数)")]
    InvalidTime(String),

    #[error("起始时间 {start:?} 晚于结束时间 {end:?}")]
    InvertedInterval { start: Duration, end: Duration },

    #[error("未知的处理模式: {0}")]
    UnknownProcessingMode(String),

    #[error("未知的模型类型: {0}")]
    UnknownModelVariant(String),

    #[error("不支持的处理策略: {0}")]
    UnsupportedStrategy(String),

    #[error("缺少必填参数: {0}")]
    Missing(&'static str),
}

/// 录像回放错误
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("无法打开录像 {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("读取采集帧失败: {0}")]
    Read(String),
}

/// 追踪引擎错误
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("追踪引擎创建失败: {0}")]
    Create(String),
}

/// 处理器错误, 均为致命错误, 直接终止本次运行
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Open(PlaybackError),

    #[error("跳转到 {0:?} 失败")]
    Seek(Duration),

    #[error(transparent)]
    Read(PlaybackError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("追踪引擎已关闭")]
    EngineClosed,

    #[error("后台线程创建失败: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("后台线程异常退出")]
    WorkerPanicked,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ProcessorResult<T> = Result<T, ProcessorError>;
