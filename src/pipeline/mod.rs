/// 步幅分析流水线 (Stride analysis pipeline)
///
/// 单线程串联三个阶段:
/// - Gateway:  检测 (批量优先, 必要时回退逐帧)
/// - Tracker:  按采样网格逐帧匹配目标
/// - Metrics:  轨迹 → 步幅 / 速度 / 步频
pub mod report;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::detection::{BBox, Detection};
use crate::error::Result;
use crate::inference::InferenceGateway;
use crate::input::{sampled_indices, sampling_step, FrameSource};
use crate::kinematics::{self, TrackQuality};
use crate::tracking::TargetTracker;

pub use report::StrideReport;

pub struct StridePipeline {
    config: PipelineConfig,
}

impl StridePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 对一段视频运行完整分析
    ///
    /// 只有后端不可用与解码失败会返回错误; 没有检测的帧记为 `NO_DETECTION`。
    pub fn run(
        &self,
        gateway: &mut InferenceGateway,
        source: Arc<dyn FrameSource>,
        initial_bbox: BBox,
    ) -> Result<StrideReport> {
        let start = Instant::now();
        let fps = source.frame_rate();
        let max_rate = self.config.gateway.max_rate;
        let step = sampling_step(fps, max_rate);
        let total = source.frame_count();

        log::info!(
            "🎯 开始分析 {}: {} 帧 @ {:.1} fps, 采样步长 {}, 初始框 ({:.0}, {:.0}, {:.0}x{:.0})",
            source.identifier(),
            total,
            fps,
            step,
            initial_bbox.x,
            initial_bbox.y,
            initial_bbox.width,
            initial_bbox.height
        );

        let (strategy, detections) = gateway.detect(source.clone(), max_rate)?;
        let by_frame = group_by_frame(detections, step, total);

        let mut tracker = TargetTracker::new(self.config.matcher.clone(), fps);
        tracker.initialize(initial_bbox)?;
        for index in sampled_indices(total, step) {
            let candidates = by_frame.get(&index).map(Vec::as_slice).unwrap_or(&[]);
            tracker.update(index, candidates)?;
        }
        let history = tracker.finalize()?.to_vec();

        let sample_rate = fps / step as f64;
        let (samples, summary) = kinematics::consume(&history, sample_rate, &self.config.metrics);
        let quality = TrackQuality::from_history(&history);

        log::info!(
            "✅ 分析完成: {:?} 策略, {} 个样本 ({:.0}% 匹配), 耗时 {:.2}s",
            strategy,
            history.len(),
            quality.matched_fraction * 100.0,
            start.elapsed().as_secs_f64()
        );

        Ok(StrideReport {
            video: source.identifier().to_string(),
            frame_rate: fps,
            sampling_step: step,
            strategy,
            history,
            samples,
            summary,
            quality,
            gateway: gateway.stats(),
        })
    }
}

/// 按帧号分组, 只保留采样网格上的帧; 网格外与超出视频范围的检测丢弃
///
/// 与逐帧策略看到的候选一致, 采样帧不会用到之后帧的检测。
fn group_by_frame(
    detections: Vec<Detection>,
    step: usize,
    frame_count: usize,
) -> BTreeMap<usize, Vec<Detection>> {
    let mut by_frame: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
    let mut off_grid = 0usize;
    let mut dropped = 0usize;
    for detection in detections {
        let index = detection.frame_index();
        if index >= frame_count {
            dropped += 1;
        } else if index % step != 0 {
            off_grid += 1;
        } else {
            by_frame.entry(index).or_default().push(detection);
        }
    }
    if off_grid > 0 {
        log::debug!("跳过 {} 个不在采样帧上的检测", off_grid);
    }
    if dropped > 0 {
        log::warn!("⚠️  丢弃 {} 个超出视频范围的检测", dropped);
    }
    by_frame
}
