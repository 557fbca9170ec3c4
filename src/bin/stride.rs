use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
/// 冰球球员步幅分析
///
/// 主程序入口 - 直接运行: cargo run --bin stride --release -- --simulate
use clap::Parser;
use hockey_stride::inference::{HostedBackend, ReplayBackend, SimulatedBackend, SimulatedScene};
use hockey_stride::input::{BlankVideo, ImageSequence};
use hockey_stride::{BBox, DetectionBackend, FrameSource, InferenceGateway, PipelineConfig, StridePipeline};

/// 步幅分析程序
#[derive(Parser, Debug)]
#[command(author, version, about = "冰球球员步幅 / 速度分析", long_about = None)]
struct Args {
    /// 录制的检测服务返回 (JSON)
    #[arg(long, conflicts_with_all = ["endpoint", "simulate"])]
    detections: Option<PathBuf>,

    /// 托管检测服务地址
    #[arg(long, conflicts_with = "simulate")]
    endpoint: Option<String>,

    /// 托管检测服务 API key
    #[arg(long, requires = "endpoint")]
    api_key: Option<String>,

    /// 使用仿真后端 (固定种子的滑行球员)
    #[arg(long)]
    simulate: bool,

    /// 仿真种子
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// 已解码帧所在目录 (png/jpg/bmp, 按文件名排序)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// 视频帧率
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// 无帧目录时的空白帧宽度
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// 无帧目录时的空白帧高度
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// 无帧目录时的帧数
    #[arg(long, default_value_t = 90)]
    frame_count: usize,

    /// 初始目标框 x,y,w,h (左上角 + 宽高)
    #[arg(long)]
    bbox: Option<BBox>,

    /// 配置文件
    #[arg(long, default_value = "stride_config.json")]
    config: PathBuf,

    /// 报告输出目录
    #[arg(short, long, default_value = "reports")]
    output: PathBuf,
}

fn build_source(args: &Args) -> Result<Arc<dyn FrameSource>> {
    let source: Arc<dyn FrameSource> = match &args.frames {
        Some(dir) => Arc::new(
            ImageSequence::open(dir, args.fps)
                .with_context(|| format!("failed to open frames in {}", dir.display()))?,
        ),
        None => Arc::new(BlankVideo::new(
            "blank",
            args.fps,
            args.frame_count,
            args.width,
            args.height,
        )),
    };
    Ok(source)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = PipelineConfig::load(&args.config);
    config.log_summary();
    let pipeline = StridePipeline::new(config.clone()).context("invalid configuration")?;

    let source = build_source(&args)?;
    let (width, height) = source.dimensions();
    println!(
        "📹 视频: {} | {}x{} | {} 帧 @ {:.1} fps",
        source.identifier(),
        width,
        height,
        source.frame_count(),
        source.frame_rate()
    );

    let scene = SimulatedScene {
        seed: args.seed,
        ..SimulatedScene::default()
    };
    let initial_bbox = match (args.bbox, args.simulate) {
        (Some(bbox), _) => bbox,
        (None, true) => scene.start,
        (None, false) => anyhow::bail!("--bbox x,y,w,h is required unless --simulate is set"),
    };

    // 后端在网关的初始化线程中构造
    let fps = args.fps;
    let detections = args.detections.clone();
    let endpoint = args.endpoint.clone();
    let api_key = args.api_key.clone();
    let simulate = args.simulate;
    let factory = move || -> Result<Arc<dyn DetectionBackend>> {
        if let Some(path) = detections {
            Ok(Arc::new(ReplayBackend::from_file(path, fps)?))
        } else if let Some(url) = endpoint {
            Ok(Arc::new(HostedBackend::new(url, api_key)?))
        } else if simulate {
            Ok(Arc::new(SimulatedBackend::new(scene)))
        } else {
            anyhow::bail!("no detection backend: use --detections, --endpoint or --simulate")
        }
    };

    let mut gateway = InferenceGateway::from_config(factory, &config);
    let report = pipeline
        .run(&mut gateway, source, initial_bbox)
        .context("stride analysis failed")?;
    let path = report.save(&args.output)?;

    let s = &report.summary;
    println!();
    println!("📊 步幅分析结果 ({:?})", report.strategy);
    println!("   步幅次数: {}", s.stride_count);
    println!("   平均步幅: {:.1} px", s.avg_stride_length);
    println!("   平均速度: {:.1} px/s", s.avg_speed);
    println!("   步频:     {:.2} 步/s", s.stride_frequency);
    println!(
        "   匹配帧:   {}/{} ({:.0}%)",
        report.quality.matched,
        report.history.len(),
        report.quality.matched_fraction * 100.0
    );
    println!("💾 报告: {}", path.display());
    Ok(())
}
