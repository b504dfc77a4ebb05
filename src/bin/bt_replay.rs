/// 离线骨骼追踪吞吐测试
/// Offline body tracking throughput benchmark
///
/// 回放录像 → 追踪引擎 → 统计帧数, 对比三种并发策略:
/// cargo run --bin bt-replay --release -- -s recording.mkv --all
use std::path::PathBuf;

use anyhow::{Context, Result};
use bodytrack_replay::{
    driver, BenchConfig, ParameterSet, Processor, ProcessorKind, RunSummary, SimulatedSdk,
};
use clap::Parser;

/// 离线回放参数
#[derive(Parser, Debug)]
#[command(author, version, about = "离线骨骼追踪吞吐测试", long_about = None)]
struct Args {
    /// 录像文件 (.mkv)
    #[arg(short, long)]
    source: String,

    /// 处理模式 (cpu/gpu/cuda/tensorrt/directml)
    #[arg(short, long, default_value = "gpu")]
    mode: String,

    /// 模型 (default/lite)
    #[arg(long, default_value = "default")]
    model: String,

    /// 并发策略 (single-thread/pop-in-background/enqueue-in-background)
    #[arg(short, long, default_value = "single-thread")]
    processor: String,

    /// 依次运行全部策略并对比
    #[arg(long)]
    all: bool,

    /// 起始时间 (秒)
    #[arg(long)]
    start: Option<String>,

    /// 结束时间 (秒)
    #[arg(long)]
    end: Option<String>,

    /// 模拟配置文件
    #[arg(short, long, default_value = bodytrack_replay::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn build_params(args: &Args) -> Result<ParameterSet> {
    let mut builder = ParameterSet::builder();
    builder
        .set_source_path(&args.source)
        .context("录像路径无效")?;
    builder.set_processing_mode(args.mode.parse().context("处理模式无效")?);
    builder.set_model_variant(args.model.parse().context("模型无效")?);
    builder.set_processor_kind(args.processor.parse().context("并发策略无效")?);
    if let Some(start) = &args.start {
        builder.set_start_time_str(start).context("起始时间无效")?;
    }
    if let Some(end) = &args.end {
        builder.set_end_time_str(end).context("结束时间无效")?;
    }
    Ok(builder.build()?)
}

fn run_once(params: &ParameterSet, sdk: &SimulatedSdk) -> Result<RunSummary> {
    let mut processor = Processor::create(params, sdk)
        .with_context(|| format!("创建处理器失败 ({})", params.processor_kind()))?;
    let summary = driver::run(&mut processor);
    processor.dispose();
    Ok(summary?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let params = build_params(&args)?;
    let config = BenchConfig::load(&args.config);
    let sdk = SimulatedSdk::from(&config);

    println!("🚀 离线骨骼追踪吞吐测试");
    params.print_summary();
    config.print_summary();

    let kinds: Vec<ProcessorKind> = if args.all {
        ProcessorKind::ALL.to_vec()
    } else {
        vec![params.processor_kind()]
    };

    let mut summaries = Vec::with_capacity(kinds.len());
    for kind in kinds {
        summaries.push(run_once(&params.with_processor_kind(kind), &sdk)?);
    }

    driver::print_report(&summaries);
    Ok(())
}
