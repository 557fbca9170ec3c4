//! 运动学指标 (Kinematic metrics)
//!
//! 参考点 = 边界框底边中点 (脚部位置代理)。
//! 相邻样本位移 > 阈值记为一次步幅:
//! - stride_length = displacement
//! - speed         = displacement · frame_rate
//!
//! 纯函数: 不修改输入, 相同输入得到相同输出。

use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;
use crate::detection::Point2;
use crate::tracking::{TrackSample, TrackStatus};

/// 逐样本运动学数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicSample {
    pub frame_index: usize,
    pub timestamp: f64,
    pub position: Point2,
    pub stride_length: Option<f32>,
    /// 像素/秒
    pub speed: Option<f64>,
}

/// 步幅汇总
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrideSummary {
    pub stride_count: usize,
    pub avg_stride_length: f64,
    pub avg_speed: f64,
    /// 步/秒
    pub stride_frequency: f64,
    /// 最后样本时间 − 第一个样本时间
    pub elapsed_time: f64,
}

/// 轨迹质量 (各状态帧数)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackQuality {
    pub matched: usize,
    pub held: usize,
    pub no_detection: usize,
    pub matched_fraction: f64,
}

impl TrackQuality {
    pub fn from_history(history: &[TrackSample]) -> Self {
        let mut quality = Self::default();
        for sample in history {
            match sample.status {
                TrackStatus::Matched => quality.matched += 1,
                TrackStatus::Held => quality.held += 1,
                TrackStatus::NoDetection => quality.no_detection += 1,
            }
        }
        if !history.is_empty() {
            quality.matched_fraction = quality.matched as f64 / history.len() as f64;
        }
        quality
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// 将轨迹归约为逐样本运动学数据与汇总
///
/// `frame_rate` 为相邻样本之间的采样率 (采样后 = fps / step)。
pub fn consume(
    history: &[TrackSample],
    frame_rate: f64,
    config: &MetricsConfig,
) -> (Vec<KinematicSample>, StrideSummary) {
    let mut samples = Vec::with_capacity(history.len());
    let mut lengths = Vec::new();
    let mut speeds = Vec::new();
    let mut previous: Option<Point2> = None;

    for track in history {
        let position = track.bbox.bottom_center();
        let mut sample = KinematicSample {
            frame_index: track.frame_index,
            timestamp: track.timestamp,
            position,
            stride_length: None,
            speed: None,
        };

        if let Some(last) = previous {
            let displacement = position.distance(&last);
            if displacement > config.stride_threshold {
                let speed = displacement as f64 * frame_rate;
                sample.stride_length = Some(displacement);
                sample.speed = Some(speed);
                lengths.push(displacement as f64);
                speeds.push(speed);
            }
        }

        previous = Some(position);
        samples.push(sample);
    }

    let elapsed_time = match (history.first(), history.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => 0.0,
    };
    let stride_count = lengths.len();
    let summary = StrideSummary {
        stride_count,
        avg_stride_length: mean(&lengths),
        avg_speed: mean(&speeds),
        stride_frequency: if elapsed_time > 0.0 {
            stride_count as f64 / elapsed_time
        } else {
            0.0
        },
        elapsed_time,
    };

    log::info!("📊 步幅分析完成:");
    log::info!("   步幅次数: {}", summary.stride_count);
    log::info!("   平均步幅: {:.1} px", summary.avg_stride_length);
    log::info!("   平均速度: {:.1} px/s", summary.avg_speed);
    log::info!("   步频: {:.2} 步/s", summary.stride_frequency);

    (samples, summary)
}
